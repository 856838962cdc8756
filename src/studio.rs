use crate::connections::ConnectionRegistry;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::executor::{QueryExecutor, SqliteQueryService};
use crate::foreign_key::{CellMounts, ForeignKeyResolver};
use crate::models::{
    AppSettings, BooleanResponse, ConnectSqlitePayload, ConnectionSummary, DismissalDuration,
    ExecuteQueryPayload, ForeignKeyCellSnapshot, MountForeignKeyCellPayload, PromptHistoryEntry, PromptMetrics,
    QueryExecution, QueryOptions, RecordDismissedPayload, UpgradeTrigger,
};
use crate::notices::NoticeSink;
use crate::upgrade::UpgradePromptGate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct StudioCore {
    db: Arc<Database>,
    registry: ConnectionRegistry,
    sqlite: SqliteQueryService,
    resolver: ForeignKeyResolver,
    mounts: CellMounts,
    prompts: UpgradePromptGate<Arc<Database>>,
    app_data_dir: PathBuf,
}

impl StudioCore {
    pub fn new(app_data_dir: PathBuf, notices: Arc<dyn NoticeSink>) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&app_data_dir.join("state.sqlite"))?);
        let registry = ConnectionRegistry::new();
        let sqlite = SqliteQueryService::new();
        let executor: Arc<dyn QueryExecutor> = Arc::new(sqlite.clone());
        let resolver = ForeignKeyResolver::new(registry.clone(), executor, notices);
        let prompts = UpgradePromptGate::new(db.clone());

        let this = Self {
            db,
            registry,
            sqlite,
            resolver,
            mounts: CellMounts::new(),
            prompts,
            app_data_dir,
        };
        let settings = this.db.get_settings()?;
        this.apply_settings(&settings);
        tracing::info!(data_dir = %this.app_data_dir.display(), "studio core ready");

        Ok(Arc::new(this))
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    // ─── Connections ────────────────────────────────────────────────────────

    pub async fn connect_sqlite(&self, payload: ConnectSqlitePayload) -> AppResult<ConnectionSummary> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Connection name cannot be empty".to_string()));
        }
        let session_id = self.sqlite.open(Path::new(&payload.path)).await?;
        let summary = self.registry.register(name, &session_id).await;
        tracing::info!(connection_id = %summary.id, session_id = %session_id, "sqlite connection opened");
        Ok(summary)
    }

    pub async fn disconnect(&self, connection_id: &str) -> AppResult<BooleanResponse> {
        let Some(connection) = self.registry.get(connection_id).await else {
            return Err(AppError::NotFound(format!("No connection with id {}", connection_id)));
        };
        self.registry.set_connected(connection_id, false).await?;
        let closed = self.sqlite.close(&connection.session_id).await;
        tracing::info!(connection_id = %connection_id, closed, "connection closed");
        Ok(BooleanResponse { success: closed })
    }

    pub async fn remove_connection(&self, connection_id: &str) -> AppResult<BooleanResponse> {
        let Some(connection) = self.registry.remove(connection_id).await else {
            return Ok(BooleanResponse { success: false });
        };
        self.sqlite.close(&connection.session_id).await;
        Ok(BooleanResponse { success: true })
    }

    pub async fn list_connections(&self) -> Vec<ConnectionSummary> {
        self.registry.list().await
    }

    pub async fn execute_query(&self, payload: ExecuteQueryPayload) -> AppResult<QueryExecution> {
        if payload.query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query cannot be empty".to_string()));
        }
        let limit = match payload.limit.filter(|limit| *limit > 0) {
            Some(limit) => limit,
            None => self.db.get_settings()?.default_query_limit,
        };
        tracing::info!(
            session_id = %payload.session_id,
            query_length = payload.query.len(),
            limit,
            "executing query"
        );
        Ok(self
            .sqlite
            .execute(&payload.session_id, &payload.query, QueryOptions { limit })
            .await)
    }

    // ─── Foreign Key Cells ──────────────────────────────────────────────────

    pub async fn mount_foreign_key_cell(&self, payload: MountForeignKeyCellPayload) -> ForeignKeyCellSnapshot {
        self.mounts.mount(&self.resolver, payload).await
    }

    pub async fn toggle_foreign_key_cell(&self, cell_key: &str) -> AppResult<ForeignKeyCellSnapshot> {
        self.mounts.toggle(cell_key).await
    }

    pub async fn foreign_key_cell_state(&self, cell_key: &str) -> AppResult<ForeignKeyCellSnapshot> {
        self.mounts.snapshot(cell_key).await
    }

    pub async fn unmount_foreign_key_cell(&self, cell_key: &str) -> BooleanResponse {
        BooleanResponse {
            success: self.mounts.unmount(cell_key).await,
        }
    }

    // ─── Upgrade Prompts ────────────────────────────────────────────────────

    pub fn should_show_upgrade_prompt(&self, trigger: UpgradeTrigger) -> AppResult<bool> {
        self.prompts.should_show_prompt(trigger)
    }

    pub fn record_upgrade_prompt_shown(&self, trigger: UpgradeTrigger) -> AppResult<PromptHistoryEntry> {
        self.prompts.record_shown(trigger)
    }

    pub fn record_upgrade_prompt_dismissed(&self, payload: RecordDismissedPayload) -> AppResult<PromptHistoryEntry> {
        let duration = payload.duration.unwrap_or(DismissalDuration::Medium);
        self.prompts.record_dismissed(payload.trigger, duration)
    }

    pub fn record_upgrade_prompt_converted(&self, trigger: UpgradeTrigger) -> AppResult<PromptHistoryEntry> {
        self.prompts.record_converted(trigger)
    }

    pub fn upgrade_prompt_metrics(&self) -> AppResult<PromptMetrics> {
        self.prompts.get_metrics()
    }

    pub fn reset_upgrade_prompt_history(&self) -> AppResult<BooleanResponse> {
        self.prompts.reset_history()?;
        Ok(BooleanResponse { success: true })
    }

    pub fn clear_upgrade_prompt_dismissals(&self) -> AppResult<BooleanResponse> {
        self.prompts.clear_all_dismissals()?;
        Ok(BooleanResponse { success: true })
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let settings = self.db.update_settings(update)?;
        self.apply_settings(&settings);
        Ok(settings)
    }

    fn apply_settings(&self, settings: &AppSettings) {
        self.resolver.set_row_limit(settings.related_row_limit);
        self.prompts
            .set_cooldown_overrides(&settings.prompt_cooldown_overrides);
    }
}

#[cfg(test)]
mod tests {
    use super::StudioCore;
    use crate::models::{ConnectSqlitePayload, ExecuteQueryPayload, UpgradeTrigger};
    use crate::notices::DiscardNotices;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn rejects_blank_connection_names_and_queries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let core = StudioCore::new(dir.path().to_path_buf(), Arc::new(DiscardNotices)).expect("core");

        let result = core
            .connect_sqlite(ConnectSqlitePayload {
                name: "  ".to_string(),
                path: "ignored".to_string(),
            })
            .await;
        assert!(result.is_err());

        let result = core
            .execute_query(ExecuteQueryPayload {
                session_id: "any".to_string(),
                query: " ".to_string(),
                limit: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn settings_updates_apply_to_running_services() {
        let dir = tempfile::tempdir().expect("tempdir");
        let core = StudioCore::new(dir.path().to_path_buf(), Arc::new(DiscardNotices)).expect("core");

        core.update_settings(json!({ "relatedRowLimit": 3, "promptCooldownOverrides": { "connections": 0 } }))
            .expect("update");
        assert_eq!(core.resolver.row_limit(), 3);

        core.record_upgrade_prompt_shown(UpgradeTrigger::Connections).expect("shown");
        assert!(core.should_show_upgrade_prompt(UpgradeTrigger::Connections).expect("check"));
    }

    #[tokio::test]
    async fn unknown_connections_cannot_be_disconnected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let core = StudioCore::new(dir.path().to_path_buf(), Arc::new(DiscardNotices)).expect("core");
        assert!(core.disconnect("missing").await.is_err());
        assert!(!core.remove_connection("missing").await.expect("remove").success);
    }
}
