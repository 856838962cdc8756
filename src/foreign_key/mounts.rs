use crate::errors::{AppError, AppResult};
use crate::foreign_key::cell::{ForeignKeyCell, ForeignKeyResolver};
use crate::foreign_key::query::find_foreign_key;
use crate::models::{ForeignKeyCellSnapshot, MountForeignKeyCellPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct CellMounts {
    cells: Arc<RwLock<HashMap<String, Arc<ForeignKeyCell>>>>,
}

impl CellMounts {
    pub fn new() -> Self {
        Self::default()
    }

    // Cached state survives only while field, value and target stay the same.
    pub async fn mount(
        &self,
        resolver: &ForeignKeyResolver,
        payload: MountForeignKeyCellPayload,
    ) -> ForeignKeyCellSnapshot {
        let mut cells = self.cells.write().await;
        if let Some(existing) = cells.get(&payload.cell_key) {
            if existing.field_key() == payload.field_key
                && existing.value() == &payload.value
                && existing.foreign_key() == find_foreign_key(&payload.field_key, &payload.metadata)
            {
                return existing.snapshot();
            }
            existing.detach();
        }

        let cell = Arc::new(resolver.cell(
            &payload.field_key,
            payload.value,
            &payload.metadata,
            payload.connection_id,
        ));
        let snapshot = cell.snapshot();
        cells.insert(payload.cell_key, cell);
        snapshot
    }

    pub async fn toggle(&self, cell_key: &str) -> AppResult<ForeignKeyCellSnapshot> {
        let cell = self.get(cell_key).await?;
        cell.toggle().await;
        Ok(cell.snapshot())
    }

    pub async fn snapshot(&self, cell_key: &str) -> AppResult<ForeignKeyCellSnapshot> {
        Ok(self.get(cell_key).await?.snapshot())
    }

    pub async fn unmount(&self, cell_key: &str) -> bool {
        let removed = self.cells.write().await.remove(cell_key);
        match removed {
            Some(cell) => {
                cell.detach();
                true
            }
            None => false,
        }
    }

    pub async fn mounted_count(&self) -> usize {
        self.cells.read().await.len()
    }

    async fn get(&self, cell_key: &str) -> AppResult<Arc<ForeignKeyCell>> {
        self.cells
            .read()
            .await
            .get(cell_key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No mounted cell {}", cell_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::CellMounts;
    use crate::connections::ConnectionRegistry;
    use crate::executor::{ExecuteFuture, QueryExecutor};
    use crate::foreign_key::ForeignKeyResolver;
    use crate::models::{
        CellPhase, ColumnMetadata, ForeignKeyRef, MountForeignKeyCellPayload, QueryData, QueryExecution, QueryOptions,
    };
    use crate::notices::DiscardNotices;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    impl QueryExecutor for CountingExecutor {
        fn execute<'a>(&'a self, _session_id: &'a str, _sql: &'a str, _options: QueryOptions) -> ExecuteFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                QueryExecution::succeeded(QueryData {
                    columns: vec!["id".to_string()],
                    rows: vec![vec![json!(1)]],
                    row_count: Some(1),
                })
            })
        }
    }

    fn payload(cell_key: &str, value: Value) -> MountForeignKeyCellPayload {
        MountForeignKeyCellPayload {
            cell_key: cell_key.to_string(),
            field_key: "owner_id".to_string(),
            value,
            metadata: vec![ColumnMetadata {
                name: "owner_id".to_string(),
                result_name: None,
                foreign_key: Some(ForeignKeyRef {
                    table: "owners".to_string(),
                    column: "id".to_string(),
                    schema: None,
                }),
            }],
            connection_id: None,
        }
    }

    async fn resolver(executor: Arc<CountingExecutor>) -> ForeignKeyResolver {
        let registry = ConnectionRegistry::new();
        registry.register("local", "session-1").await;
        ForeignKeyResolver::new(registry, executor, Arc::new(DiscardNotices))
    }

    #[tokio::test]
    async fn remounting_same_value_keeps_cached_rows() {
        let executor = Arc::new(CountingExecutor::default());
        let resolver = resolver(executor.clone()).await;
        let mounts = CellMounts::new();

        mounts.mount(&resolver, payload("row-1:owner_id", json!(1))).await;
        let expanded = mounts.toggle("row-1:owner_id").await.expect("toggle");
        assert_eq!(expanded.phase, CellPhase::Loaded);

        let remounted = mounts.mount(&resolver, payload("row-1:owner_id", json!(1))).await;
        assert_eq!(remounted.phase, CellPhase::Loaded);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_value_discards_cached_rows() {
        let executor = Arc::new(CountingExecutor::default());
        let resolver = resolver(executor.clone()).await;
        let mounts = CellMounts::new();

        mounts.mount(&resolver, payload("row-1:owner_id", json!(1))).await;
        mounts.toggle("row-1:owner_id").await.expect("toggle");

        let fresh = mounts.mount(&resolver, payload("row-1:owner_id", json!(2))).await;
        assert_eq!(fresh.phase, CellPhase::Collapsed);
        assert!(fresh.data.is_none());
        assert_eq!(mounts.mounted_count().await, 1);
    }

    #[tokio::test]
    async fn changed_target_table_discards_cached_rows() {
        let executor = Arc::new(CountingExecutor::default());
        let resolver = resolver(executor.clone()).await;
        let mounts = CellMounts::new();

        mounts.mount(&resolver, payload("row-1:owner_id", json!(1))).await;
        mounts.toggle("row-1:owner_id").await.expect("toggle");

        let mut retargeted = payload("row-1:owner_id", json!(1));
        retargeted.metadata[0].foreign_key = Some(ForeignKeyRef {
            table: "accounts".to_string(),
            column: "id".to_string(),
            schema: Some("billing".to_string()),
        });
        let fresh = mounts.mount(&resolver, retargeted).await;
        assert_eq!(fresh.phase, CellPhase::Collapsed);
        assert!(fresh.data.is_none());
        assert_eq!(fresh.foreign_key.as_ref().map(|fk| fk.table.as_str()), Some("accounts"));

        let expanded = mounts.toggle("row-1:owner_id").await.expect("toggle");
        assert_eq!(expanded.data.expect("data").table_name, "accounts");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unmount_removes_the_cell() {
        let executor = Arc::new(CountingExecutor::default());
        let resolver = resolver(executor).await;
        let mounts = CellMounts::new();

        mounts.mount(&resolver, payload("k", json!(1))).await;
        assert!(mounts.unmount("k").await);
        assert!(!mounts.unmount("k").await);
        assert!(mounts.snapshot("k").await.is_err());
        assert!(mounts.toggle("k").await.is_err());
    }
}
