use crate::errors::{AppError, AppResult};
use crate::models::ConnectionSummary;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<Vec<ConnectionSummary>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str, session_id: &str) -> ConnectionSummary {
        let summary = ConnectionSummary {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            name: name.to_string(),
            is_connected: true,
        };

        let mut connections = self.connections.write().await;
        connections.push(summary.clone());
        summary
    }

    pub async fn set_connected(&self, id: &str, connected: bool) -> AppResult<()> {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.iter_mut().find(|entry| entry.id == id) else {
            return Err(AppError::NotFound(format!("No connection with id {}", id)));
        };
        entry.is_connected = connected;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Option<ConnectionSummary> {
        let mut connections = self.connections.write().await;
        let index = connections.iter().position(|entry| entry.id == id)?;
        Some(connections.remove(index))
    }

    pub async fn get(&self, id: &str) -> Option<ConnectionSummary> {
        let connections = self.connections.read().await;
        connections.iter().find(|entry| entry.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<ConnectionSummary> {
        self.connections.read().await.clone()
    }

    pub async fn first_connected(&self) -> Option<ConnectionSummary> {
        let connections = self.connections.read().await;
        connections.iter().find(|entry| entry.is_connected).cloned()
    }
}
