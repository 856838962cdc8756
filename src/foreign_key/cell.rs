use crate::connections::ConnectionRegistry;
use crate::executor::QueryExecutor;
use crate::foreign_key::query::{build_lookup_query, find_foreign_key, indicates_connection_gone, rows_to_records};
use crate::models::{
    CellPhase, ColumnMetadata, ForeignKeyCellSnapshot, ForeignKeyQueryResult, ForeignKeyRef, QueryOptions,
};
use crate::notices::{Notice, NoticeSink};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::{Mutex as StdMutex, MutexGuard};

pub const DEFAULT_RELATED_ROW_LIMIT: u32 = 10;
pub const MAX_RELATED_ROW_LIMIT: u32 = 1000;

struct ResolverInner {
    registry: ConnectionRegistry,
    executor: Arc<dyn QueryExecutor>,
    notices: Arc<dyn NoticeSink>,
    row_limit: AtomicU32,
}

#[derive(Clone)]
pub struct ForeignKeyResolver {
    inner: Arc<ResolverInner>,
}

impl ForeignKeyResolver {
    pub fn new(
        registry: ConnectionRegistry,
        executor: Arc<dyn QueryExecutor>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                registry,
                executor,
                notices,
                row_limit: AtomicU32::new(DEFAULT_RELATED_ROW_LIMIT),
            }),
        }
    }

    pub fn row_limit(&self) -> u32 {
        self.inner.row_limit.load(Ordering::Relaxed)
    }

    pub fn set_row_limit(&self, limit: u32) {
        self.inner
            .row_limit
            .store(limit.clamp(1, MAX_RELATED_ROW_LIMIT), Ordering::Relaxed);
    }

    pub fn cell(
        &self,
        field_key: &str,
        value: Value,
        metadata: &[ColumnMetadata],
        connection_hint: Option<String>,
    ) -> ForeignKeyCell {
        ForeignKeyCell {
            resolver: self.clone(),
            field_key: field_key.to_string(),
            value,
            reference: find_foreign_key(field_key, metadata).cloned(),
            connection_hint,
            state: StdMutex::new(CellState::default()),
            is_loading: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
    NoActiveConnection,
    NoForeignKey,
    AlreadyLoading,
    Discarded,
}

#[derive(Default)]
struct CellState {
    expanded: bool,
    data: Option<ForeignKeyQueryResult>,
}

struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ForeignKeyCell {
    resolver: ForeignKeyResolver,
    field_key: String,
    value: Value,
    reference: Option<ForeignKeyRef>,
    connection_hint: Option<String>,
    state: StdMutex<CellState>,
    is_loading: AtomicBool,
    detached: AtomicBool,
}

impl ForeignKeyCell {
    pub fn field_key(&self) -> &str {
        &self.field_key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyRef> {
        self.reference.as_ref()
    }

    pub fn is_expanded(&self) -> bool {
        self.lock_state().expanded
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::Acquire)
    }

    pub fn foreign_key_data(&self) -> Option<ForeignKeyQueryResult> {
        self.lock_state().data.clone()
    }

    pub fn phase(&self) -> CellPhase {
        let state = self.lock_state();
        if !state.expanded {
            return CellPhase::Collapsed;
        }
        if self.is_loading() {
            return CellPhase::Loading;
        }
        match &state.data {
            Some(data) if data.error.is_some() => CellPhase::Errored,
            Some(_) => CellPhase::Loaded,
            None => CellPhase::Unavailable,
        }
    }

    pub fn snapshot(&self) -> ForeignKeyCellSnapshot {
        let phase = self.phase();
        let state = self.lock_state();
        ForeignKeyCellSnapshot {
            field_key: self.field_key.clone(),
            value: self.value.clone(),
            foreign_key: self.reference.clone(),
            expanded: state.expanded,
            is_loading: self.is_loading(),
            phase,
            data: state.data.clone(),
        }
    }

    pub async fn toggle(&self) -> CellPhase {
        let should_load = {
            let mut state = self.lock_state();
            state.expanded = !state.expanded;
            state.expanded && state.data.is_none() && self.reference.is_some()
        };
        if should_load {
            self.load_foreign_key_data().await;
        }
        self.phase()
    }

    // Marks the cell as gone. A fetch still in flight completes, but its result is
    // dropped instead of being stored.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub async fn load_foreign_key_data(&self) -> LoadOutcome {
        let Some(reference) = self.reference.clone() else {
            return LoadOutcome::NoForeignKey;
        };
        if self.is_detached() {
            return LoadOutcome::Discarded;
        }
        let Some(_guard) = LoadingGuard::acquire(&self.is_loading) else {
            tracing::debug!(field = %self.field_key, "foreign key fetch already in flight");
            return LoadOutcome::AlreadyLoading;
        };

        let inner = &self.resolver.inner;
        let Some(connection) = inner.registry.first_connected().await else {
            tracing::warn!(
                field = %self.field_key,
                table = %reference.table,
                "no active connection for foreign key lookup"
            );
            inner.notices.notify(Notice::no_active_connection());
            return LoadOutcome::NoActiveConnection;
        };
        if let Some(hint) = self.connection_hint.as_deref() {
            if hint != connection.id && hint != connection.session_id {
                tracing::debug!(
                    hint = %hint,
                    connection_id = %connection.id,
                    "connection hint is stale; using live connection"
                );
            }
        }

        let limit = self.resolver.row_limit();
        let sql = build_lookup_query(&reference, &self.value, limit);
        tracing::info!(
            connection_id = %connection.id,
            table = %reference.table,
            column = %reference.column,
            schema = reference.schema.as_deref().unwrap_or(""),
            "loading foreign key rows"
        );
        let response = inner
            .executor
            .execute(&connection.session_id, &sql, QueryOptions { limit })
            .await;

        if self.is_detached() {
            tracing::debug!(table = %reference.table, "discarding foreign key rows for detached cell");
            return LoadOutcome::Discarded;
        }

        let mut result = ForeignKeyQueryResult {
            table_name: reference.table.clone(),
            column_name: reference.column.clone(),
            schema: reference.schema.clone(),
            ..Default::default()
        };

        let outcome = if response.success {
            let data = response.data.unwrap_or_default();
            result.related_rows = rows_to_records(&data);
            result.total_count = data.row_count;
            result.columns = data.columns;
            LoadOutcome::Loaded
        } else {
            let message = response
                .message
                .unwrap_or_else(|| "Failed to load related rows".to_string());
            tracing::warn!(
                connection_id = %connection.id,
                table = %reference.table,
                error = %message,
                "foreign key lookup failed"
            );
            if indicates_connection_gone(&message) {
                inner.notices.notify(Notice::connection_lost());
            }
            result.error = Some(message);
            LoadOutcome::Failed
        };

        self.lock_state().data = Some(result);
        outcome
    }

    fn lock_state(&self) -> MutexGuard<'_, CellState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
