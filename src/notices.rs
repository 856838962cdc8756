use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const NOTICE_EVENT: &str = "studio://notice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: &str, message: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn no_active_connection() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "No active connection",
            "Connect to a database to load related rows.",
        )
    }

    pub fn connection_lost() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "Connection lost",
            "The connection used by this result is gone. Re-run the query to refresh it.",
        )
    }
}

pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl NoticeSink for mpsc::UnboundedSender<Notice> {
    fn notify(&self, notice: Notice) {
        if self.send(notice).is_err() {
            tracing::debug!("notice receiver dropped");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardNotices;

impl NoticeSink for DiscardNotices {
    fn notify(&self, _notice: Notice) {}
}

#[cfg(feature = "desktop")]
pub struct TauriNoticeSink {
    app_handle: tauri::AppHandle,
}

#[cfg(feature = "desktop")]
impl TauriNoticeSink {
    pub fn new(app_handle: tauri::AppHandle) -> Self {
        Self { app_handle }
    }
}

#[cfg(feature = "desktop")]
impl NoticeSink for TauriNoticeSink {
    fn notify(&self, notice: Notice) {
        use tauri::Emitter;

        if let Err(error) = self.app_handle.emit(NOTICE_EVENT, &notice) {
            tracing::warn!(error = %error, title = %notice.title, "failed to emit notice");
        }
    }
}
