use crate::errors::{AppError, AppResult};
use crate::foreign_key::MAX_RELATED_ROW_LIMIT;
use crate::models::{AppSettings, PromptHistoryEntry, UpgradeTrigger};
use crate::upgrade::PromptHistoryStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_default_settings()?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_default()),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        if !update.is_object() {
            return Err(AppError::InvalidInput("Settings update must be a JSON object".to_string()));
        }
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let mut settings: AppSettings = serde_json::from_value(merged)
            .map_err(|error| AppError::InvalidInput(error.to_string()))?;
        settings.related_row_limit = settings.related_row_limit.clamp(1, MAX_RELATED_ROW_LIMIT);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![
                    serde_json::to_string(&AppSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

impl PromptHistoryStore for Database {
    fn load(&self, trigger: UpgradeTrigger) -> AppResult<Option<PromptHistoryEntry>> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                "SELECT trigger_key, last_shown_at, last_dismissed_at, dismissed_until,
                        shown_count, dismiss_count, converted_count
                 FROM prompt_history WHERE trigger_key = ?1",
                [trigger.as_str()],
                parse_prompt_history_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn load_all(&self) -> AppResult<Vec<PromptHistoryEntry>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT trigger_key, last_shown_at, last_dismissed_at, dismissed_until,
                    shown_count, dismiss_count, converted_count
             FROM prompt_history ORDER BY trigger_key",
        )?;
        let rows = statement.query_map([], parse_prompt_history_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn save(&self, entry: &PromptHistoryEntry) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO prompt_history (
               trigger_key, last_shown_at, last_dismissed_at, dismissed_until,
               shown_count, dismiss_count, converted_count, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(trigger_key) DO UPDATE SET
               last_shown_at = excluded.last_shown_at,
               last_dismissed_at = excluded.last_dismissed_at,
               dismissed_until = excluded.dismissed_until,
               shown_count = excluded.shown_count,
               dismiss_count = excluded.dismiss_count,
               converted_count = excluded.converted_count,
               updated_at = excluded.updated_at",
            params![
                entry.trigger.as_str(),
                entry.last_shown_at.map(|at| at.to_rfc3339()),
                entry.last_dismissed_at.map(|at| at.to_rfc3339()),
                entry.dismissed_until.map(|at| at.to_rfc3339()),
                entry.shown_count,
                entry.dismiss_count,
                entry.converted_count,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM prompt_history", [])?;
        Ok(())
    }
}

fn parse_prompt_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PromptHistoryEntry> {
    let raw_trigger: String = row.get(0)?;
    Ok(PromptHistoryEntry {
        trigger: parse_trigger(&raw_trigger)?,
        last_shown_at: parse_optional_time(row.get(1)?)?,
        last_dismissed_at: parse_optional_time(row.get(2)?)?,
        dismissed_until: parse_optional_time(row.get(3)?)?,
        shown_count: row.get(4)?,
        dismiss_count: row.get(5)?,
        converted_count: row.get(6)?,
    })
}

fn parse_trigger(raw: &str) -> rusqlite::Result<UpgradeTrigger> {
    UpgradeTrigger::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown upgrade trigger {}", raw),
            )),
        )
    })
}

fn parse_optional_time(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_time).transpose()
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                if value.is_null() {
                    target_map.remove(&key);
                    continue;
                }
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
