use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ─── Result Metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(default, alias = "result_name", skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
    #[serde(default, alias = "foreign_key", skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

// ─── Query Execution ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecution {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryData>,
}

impl QueryExecution {
    pub fn succeeded(data: QueryData) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub is_connected: bool,
}

// ─── Foreign Key Lookups ────────────────────────────────────────────────────

pub type RelatedRow = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyQueryResult {
    pub table_name: String,
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub related_rows: Vec<RelatedRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellPhase {
    Collapsed,
    Loading,
    Loaded,
    Errored,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyCellSnapshot {
    pub field_key: String,
    pub value: Value,
    pub foreign_key: Option<ForeignKeyRef>,
    pub expanded: bool,
    pub is_loading: bool,
    pub phase: CellPhase,
    pub data: Option<ForeignKeyQueryResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountForeignKeyCellPayload {
    pub cell_key: String,
    pub field_key: String,
    pub value: Value,
    #[serde(default)]
    pub metadata: Vec<ColumnMetadata>,
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectSqlitePayload {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryPayload {
    pub session_id: String,
    pub query: String,
    pub limit: Option<u32>,
}

// ─── Upgrade Prompts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeTrigger {
    Connections,
    QueryHistory,
    MultiDevice,
    AiMemory,
    Export,
    Manual,
    Periodic,
    Feature,
}

impl UpgradeTrigger {
    pub const ALL: [UpgradeTrigger; 8] = [
        Self::Connections,
        Self::QueryHistory,
        Self::MultiDevice,
        Self::AiMemory,
        Self::Export,
        Self::Manual,
        Self::Periodic,
        Self::Feature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connections => "connections",
            Self::QueryHistory => "queryHistory",
            Self::MultiDevice => "multiDevice",
            Self::AiMemory => "aiMemory",
            Self::Export => "export",
            Self::Manual => "manual",
            Self::Periodic => "periodic",
            Self::Feature => "feature",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|trigger| trigger.as_str() == raw)
    }

    pub fn default_cooldown(self) -> Duration {
        match self {
            Self::Connections => Duration::hours(24),
            Self::QueryHistory => Duration::days(7),
            Self::MultiDevice => Duration::days(30),
            Self::AiMemory => Duration::days(7),
            Self::Export => Duration::days(3),
            Self::Manual => Duration::zero(),
            Self::Periodic => Duration::days(14),
            Self::Feature => Duration::days(3),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DismissalDuration {
    Short,
    #[default]
    Medium,
    Long,
    Permanent,
}

impl DismissalDuration {
    pub fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::days(1),
            Self::Medium => Duration::days(7),
            Self::Long => Duration::days(30),
            Self::Permanent => Duration::days(365),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptHistoryEntry {
    pub trigger: UpgradeTrigger,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub last_dismissed_at: Option<DateTime<Utc>>,
    pub dismissed_until: Option<DateTime<Utc>>,
    pub shown_count: u32,
    pub dismiss_count: u32,
    pub converted_count: u32,
}

impl PromptHistoryEntry {
    pub fn new(trigger: UpgradeTrigger) -> Self {
        Self {
            trigger,
            last_shown_at: None,
            last_dismissed_at: None,
            dismissed_until: None,
            shown_count: 0,
            dismiss_count: 0,
            converted_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetrics {
    pub total_shown: u64,
    pub total_dismissed: u64,
    pub total_converted: u64,
    pub conversion_rate: f64,
    pub dismiss_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDismissedPayload {
    pub trigger: UpgradeTrigger,
    pub duration: Option<DismissalDuration>,
}

// ─── Settings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub related_row_limit: u32,
    pub default_query_limit: u32,
    pub prompt_cooldown_overrides: BTreeMap<UpgradeTrigger, u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            related_row_limit: 10,
            default_query_limit: 1000,
            prompt_cooldown_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}
