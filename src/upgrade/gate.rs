use crate::errors::AppResult;
use crate::models::{DismissalDuration, PromptHistoryEntry, PromptMetrics, UpgradeTrigger};
use crate::upgrade::store::PromptHistoryStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

pub struct UpgradePromptGate<S: PromptHistoryStore> {
    store: S,
    cooldown_overrides: RwLock<BTreeMap<UpgradeTrigger, Duration>>,
}

impl<S: PromptHistoryStore> UpgradePromptGate<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cooldown_overrides: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn set_cooldown_overrides(&self, overrides: &BTreeMap<UpgradeTrigger, u64>) {
        let converted = overrides
            .iter()
            .map(|(trigger, seconds)| {
                let seconds = i64::try_from(*seconds).unwrap_or(i64::MAX);
                (*trigger, Duration::try_seconds(seconds).unwrap_or(Duration::MAX))
            })
            .collect();
        match self.cooldown_overrides.write() {
            Ok(mut writer) => *writer = converted,
            Err(poisoned) => *poisoned.into_inner() = converted,
        }
    }

    pub fn cooldown(&self, trigger: UpgradeTrigger) -> Duration {
        let overrides = self
            .cooldown_overrides
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        overrides
            .get(&trigger)
            .copied()
            .unwrap_or_else(|| trigger.default_cooldown())
    }

    pub fn history(&self, trigger: UpgradeTrigger) -> AppResult<Option<PromptHistoryEntry>> {
        self.store.load(trigger)
    }

    pub fn should_show_prompt(&self, trigger: UpgradeTrigger) -> AppResult<bool> {
        self.should_show_prompt_at(trigger, Utc::now())
    }

    pub fn should_show_prompt_at(&self, trigger: UpgradeTrigger, now: DateTime<Utc>) -> AppResult<bool> {
        let Some(entry) = self.store.load(trigger)? else {
            return Ok(true);
        };
        if let Some(until) = entry.dismissed_until {
            if now < until {
                return Ok(false);
            }
        }
        if let Some(shown_at) = entry.last_shown_at {
            if now.signed_duration_since(shown_at) < self.cooldown(trigger) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn record_shown(&self, trigger: UpgradeTrigger) -> AppResult<PromptHistoryEntry> {
        self.record_shown_at(trigger, Utc::now())
    }

    pub fn record_shown_at(&self, trigger: UpgradeTrigger, now: DateTime<Utc>) -> AppResult<PromptHistoryEntry> {
        let entry = self.update(trigger, |entry| {
            entry.last_shown_at = Some(now);
            entry.shown_count = entry.shown_count.saturating_add(1);
        })?;
        tracing::info!(trigger = trigger.as_str(), shown_count = entry.shown_count, "upgrade prompt shown");
        Ok(entry)
    }

    pub fn record_dismissed(
        &self,
        trigger: UpgradeTrigger,
        duration: DismissalDuration,
    ) -> AppResult<PromptHistoryEntry> {
        self.record_dismissed_at(trigger, duration, Utc::now())
    }

    pub fn record_dismissed_at(
        &self,
        trigger: UpgradeTrigger,
        duration: DismissalDuration,
        now: DateTime<Utc>,
    ) -> AppResult<PromptHistoryEntry> {
        let entry = self.update(trigger, |entry| {
            entry.last_dismissed_at = Some(now);
            entry.dismissed_until = Some(now + duration.duration());
            entry.dismiss_count = entry.dismiss_count.saturating_add(1);
        })?;
        tracing::info!(
            trigger = trigger.as_str(),
            duration = ?duration,
            dismiss_count = entry.dismiss_count,
            "upgrade prompt dismissed"
        );
        Ok(entry)
    }

    pub fn record_converted(&self, trigger: UpgradeTrigger) -> AppResult<PromptHistoryEntry> {
        let entry = self.update(trigger, |entry| {
            entry.converted_count = entry.converted_count.saturating_add(1);
        })?;
        tracing::info!(
            trigger = trigger.as_str(),
            converted_count = entry.converted_count,
            "upgrade prompt converted"
        );
        Ok(entry)
    }

    pub fn get_metrics(&self) -> AppResult<PromptMetrics> {
        let mut metrics = PromptMetrics::default();
        for entry in self.store.load_all()? {
            metrics.total_shown += u64::from(entry.shown_count);
            metrics.total_dismissed += u64::from(entry.dismiss_count);
            metrics.total_converted += u64::from(entry.converted_count);
        }
        if metrics.total_shown > 0 {
            let shown = metrics.total_shown as f64;
            metrics.conversion_rate = metrics.total_converted as f64 / shown;
            metrics.dismiss_rate = metrics.total_dismissed as f64 / shown;
        }
        Ok(metrics)
    }

    pub fn reset_history(&self) -> AppResult<()> {
        self.store.clear()?;
        tracing::info!("upgrade prompt history reset");
        Ok(())
    }

    pub fn clear_all_dismissals(&self) -> AppResult<()> {
        for mut entry in self.store.load_all()? {
            if entry.dismissed_until.take().is_some() {
                self.store.save(&entry)?;
            }
        }
        tracing::info!("upgrade prompt dismissals cleared");
        Ok(())
    }

    fn update(
        &self,
        trigger: UpgradeTrigger,
        apply: impl FnOnce(&mut PromptHistoryEntry),
    ) -> AppResult<PromptHistoryEntry> {
        let mut entry = self
            .store
            .load(trigger)?
            .unwrap_or_else(|| PromptHistoryEntry::new(trigger));
        apply(&mut entry);
        self.store.save(&entry)?;
        Ok(entry)
    }
}
