use crate::domain::audit::{AuditEvent, AuditLogger};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Writes each audit event as one JSON line on the `audit` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditLogger;

#[async_trait]
impl AuditLogger for LogAuditLogger {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let line = serde_json::to_string(&event)?;
        log::info!(target: "audit", "{}", line);
        Ok(())
    }
}

/// Keeps audit events in memory. Clones share the same buffer, so a test can
/// hand one clone to the engine and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
