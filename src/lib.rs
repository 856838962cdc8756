pub mod connections;
pub mod db;
pub mod errors;
pub mod executor;
pub mod foreign_key;
pub mod logging;
pub mod models;
pub mod notices;
pub mod studio;
pub mod upgrade;

pub use crate::errors::{AppError, AppResult};
pub use crate::studio::StudioCore;

#[cfg(feature = "desktop")]
mod commands {
    use crate::models::{
        AppSettings, BooleanResponse, ConnectSqlitePayload, ConnectionSummary, ExecuteQueryPayload,
        ForeignKeyCellSnapshot, MountForeignKeyCellPayload, PromptHistoryEntry, PromptMetrics, QueryExecution,
        RecordDismissedPayload, UpgradeTrigger,
    };
    use crate::notices::TauriNoticeSink;
    use crate::studio::StudioCore;
    use std::sync::Arc;
    use tauri::Manager;

    #[derive(Clone)]
    struct AppState {
        core: Arc<StudioCore>,
    }

    #[tauri::command]
    async fn connect_sqlite(
        state: tauri::State<'_, AppState>,
        payload: ConnectSqlitePayload,
    ) -> Result<ConnectionSummary, String> {
        state.core.connect_sqlite(payload).await.map_err(to_client_error)
    }

    #[tauri::command]
    async fn disconnect(state: tauri::State<'_, AppState>, connection_id: String) -> Result<BooleanResponse, String> {
        state.core.disconnect(&connection_id).await.map_err(to_client_error)
    }

    #[tauri::command]
    async fn remove_connection(
        state: tauri::State<'_, AppState>,
        connection_id: String,
    ) -> Result<BooleanResponse, String> {
        state
            .core
            .remove_connection(&connection_id)
            .await
            .map_err(to_client_error)
    }

    #[tauri::command]
    async fn list_connections(state: tauri::State<'_, AppState>) -> Result<Vec<ConnectionSummary>, String> {
        Ok(state.core.list_connections().await)
    }

    #[tauri::command]
    async fn execute_query(
        state: tauri::State<'_, AppState>,
        payload: ExecuteQueryPayload,
    ) -> Result<QueryExecution, String> {
        state.core.execute_query(payload).await.map_err(to_client_error)
    }

    #[tauri::command]
    async fn foreign_key_cell_mount(
        state: tauri::State<'_, AppState>,
        payload: MountForeignKeyCellPayload,
    ) -> Result<ForeignKeyCellSnapshot, String> {
        Ok(state.core.mount_foreign_key_cell(payload).await)
    }

    #[tauri::command]
    async fn foreign_key_cell_toggle(
        state: tauri::State<'_, AppState>,
        cell_key: String,
    ) -> Result<ForeignKeyCellSnapshot, String> {
        state
            .core
            .toggle_foreign_key_cell(&cell_key)
            .await
            .map_err(to_client_error)
    }

    #[tauri::command]
    async fn foreign_key_cell_get(
        state: tauri::State<'_, AppState>,
        cell_key: String,
    ) -> Result<ForeignKeyCellSnapshot, String> {
        state
            .core
            .foreign_key_cell_state(&cell_key)
            .await
            .map_err(to_client_error)
    }

    #[tauri::command]
    async fn foreign_key_cell_unmount(
        state: tauri::State<'_, AppState>,
        cell_key: String,
    ) -> Result<BooleanResponse, String> {
        Ok(state.core.unmount_foreign_key_cell(&cell_key).await)
    }

    #[tauri::command]
    fn upgrade_prompt_should_show(state: tauri::State<'_, AppState>, trigger: UpgradeTrigger) -> Result<bool, String> {
        state
            .core
            .should_show_upgrade_prompt(trigger)
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_record_shown(
        state: tauri::State<'_, AppState>,
        trigger: UpgradeTrigger,
    ) -> Result<PromptHistoryEntry, String> {
        state
            .core
            .record_upgrade_prompt_shown(trigger)
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_record_dismissed(
        state: tauri::State<'_, AppState>,
        payload: RecordDismissedPayload,
    ) -> Result<PromptHistoryEntry, String> {
        state
            .core
            .record_upgrade_prompt_dismissed(payload)
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_record_converted(
        state: tauri::State<'_, AppState>,
        trigger: UpgradeTrigger,
    ) -> Result<PromptHistoryEntry, String> {
        state
            .core
            .record_upgrade_prompt_converted(trigger)
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_metrics(state: tauri::State<'_, AppState>) -> Result<PromptMetrics, String> {
        state.core.upgrade_prompt_metrics().map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_reset_history(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
        state
            .core
            .reset_upgrade_prompt_history()
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn upgrade_prompt_clear_dismissals(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
        state
            .core
            .clear_upgrade_prompt_dismissals()
            .map_err(to_client_error)
    }

    #[tauri::command]
    fn get_settings(state: tauri::State<'_, AppState>) -> Result<AppSettings, String> {
        state.core.get_settings().map_err(to_client_error)
    }

    #[tauri::command]
    fn update_settings(state: tauri::State<'_, AppState>, update: serde_json::Value) -> Result<AppSettings, String> {
        state.core.update_settings(update).map_err(to_client_error)
    }

    pub fn run() {
        tauri::Builder::default()
            .setup(|app| {
                let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
                std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
                crate::logging::init_tracing(&app_data_dir.join("logs"))?;

                let notices = Arc::new(TauriNoticeSink::new(app.handle().clone()));
                let core = StudioCore::new(app_data_dir, notices).map_err(|error| error.to_string())?;

                app.manage(AppState { core });
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                connect_sqlite,
                disconnect,
                remove_connection,
                list_connections,
                execute_query,
                foreign_key_cell_mount,
                foreign_key_cell_toggle,
                foreign_key_cell_get,
                foreign_key_cell_unmount,
                upgrade_prompt_should_show,
                upgrade_prompt_record_shown,
                upgrade_prompt_record_dismissed,
                upgrade_prompt_record_converted,
                upgrade_prompt_metrics,
                upgrade_prompt_reset_history,
                upgrade_prompt_clear_dismissals,
                get_settings,
                update_settings
            ])
            .run(tauri::generate_context!())
            .expect("failed to run tauri app");
    }

    fn to_client_error(error: impl std::fmt::Display) -> String {
        error.to_string()
    }
}

#[cfg(feature = "desktop")]
pub use commands::run;
