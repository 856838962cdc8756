use crate::errors::{AppError, AppResult};
use crate::models::{PromptHistoryEntry, UpgradeTrigger};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub trait PromptHistoryStore: Send + Sync {
    fn load(&self, trigger: UpgradeTrigger) -> AppResult<Option<PromptHistoryEntry>>;
    fn load_all(&self) -> AppResult<Vec<PromptHistoryEntry>>;
    fn save(&self, entry: &PromptHistoryEntry) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<BTreeMap<UpgradeTrigger, PromptHistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> AppResult<std::sync::MutexGuard<'_, BTreeMap<UpgradeTrigger, PromptHistoryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("prompt history mutex poisoned".to_string()))
    }
}

impl PromptHistoryStore for MemoryHistoryStore {
    fn load(&self, trigger: UpgradeTrigger) -> AppResult<Option<PromptHistoryEntry>> {
        Ok(self.entries()?.get(&trigger).cloned())
    }

    fn load_all(&self) -> AppResult<Vec<PromptHistoryEntry>> {
        Ok(self.entries()?.values().cloned().collect())
    }

    fn save(&self, entry: &PromptHistoryEntry) -> AppResult<()> {
        self.entries()?.insert(entry.trigger, entry.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        self.entries()?.clear();
        Ok(())
    }
}

impl<S: PromptHistoryStore + ?Sized> PromptHistoryStore for std::sync::Arc<S> {
    fn load(&self, trigger: UpgradeTrigger) -> AppResult<Option<PromptHistoryEntry>> {
        (**self).load(trigger)
    }

    fn load_all(&self) -> AppResult<Vec<PromptHistoryEntry>> {
        (**self).load_all()
    }

    fn save(&self, entry: &PromptHistoryEntry) -> AppResult<()> {
        (**self).save(entry)
    }

    fn clear(&self) -> AppResult<()> {
        (**self).clear()
    }
}
