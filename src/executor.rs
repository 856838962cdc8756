use crate::errors::{AppError, AppResult};
use crate::models::{QueryData, QueryExecution, QueryOptions};
use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = QueryExecution> + Send + 'a>>;

pub trait QueryExecutor: Send + Sync {
    fn execute<'a>(&'a self, session_id: &'a str, sql: &'a str, options: QueryOptions) -> ExecuteFuture<'a>;
}

type SharedConnection = Arc<StdMutex<Connection>>;

#[derive(Clone, Default)]
pub struct SqliteQueryService {
    sessions: Arc<RwLock<HashMap<String, SharedConnection>>>,
}

impl SqliteQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, path: &Path) -> AppResult<String> {
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "SQLite database not found at {}",
                path.display()
            )));
        }
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || Connection::open(path)).await??;

        let session_id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::new(StdMutex::new(conn)));
        Ok(session_id)
    }

    pub async fn close(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id).is_some()
    }

    pub async fn is_open(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    async fn run(&self, session_id: &str, sql: &str, limit: u32) -> AppResult<QueryData> {
        let conn = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| AppError::Query(format!("connection not found: {}", session_id)))?
        };
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| AppError::Internal("session mutex poisoned".to_string()))?;
            read_rows(&conn, &sql, limit)
        })
        .await?
    }
}

impl QueryExecutor for SqliteQueryService {
    fn execute<'a>(&'a self, session_id: &'a str, sql: &'a str, options: QueryOptions) -> ExecuteFuture<'a> {
        Box::pin(async move {
            match self.run(session_id, sql, options.limit).await {
                Ok(data) => QueryExecution::succeeded(data),
                Err(AppError::Query(message)) => QueryExecution::failed(message),
                Err(error) => QueryExecution::failed(error.to_string()),
            }
        })
    }
}

fn read_rows(conn: &Connection, sql: &str, limit: u32) -> AppResult<QueryData> {
    let mut statement = conn
        .prepare(sql)
        .map_err(|error| AppError::Query(error.to_string()))?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let column_count = columns.len();

    let mut rows = statement
        .query([])
        .map_err(|error| AppError::Query(error.to_string()))?;
    let mut collected = Vec::new();
    while collected.len() < limit as usize {
        let Some(row) = rows.next().map_err(|error| AppError::Query(error.to_string()))? else {
            break;
        };
        let mut cells = Vec::with_capacity(column_count);
        for index in 0..column_count {
            let cell = row
                .get_ref(index)
                .map_err(|error| AppError::Query(error.to_string()))?;
            cells.push(cell_to_json(cell));
        }
        collected.push(cells);
    }

    Ok(QueryData {
        columns,
        row_count: Some(collected.len() as u64),
        rows: collected,
    })
}

fn cell_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::from(value),
        ValueRef::Real(value) => serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(value) => Value::String(String::from_utf8_lossy(value).into_owned()),
        ValueRef::Blob(value) => Value::String(base64::engine::general_purpose::STANDARD.encode(value)),
    }
}
