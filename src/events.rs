//! Session progress events. A broadcast bus so callers (CLI progress
//! output, audit sinks) can watch a pipeline run without the pipeline
//! knowing who is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;
const HISTORY_CAPACITY: usize = 1024;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extraction,
    Normalization,
    GraphAssembly,
    ConflictDetection,
    PatternEvaluation,
    RiskAggregation,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub session_id: Uuid,
    pub stage: PipelineStage,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(session_id: Uuid, stage: PipelineStage, detail: impl Into<String>) -> Self {
        PipelineEvent {
            session_id,
            stage,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus with a bounded in-memory history. Publishing never fails:
/// with no subscribers the event still lands in the history.
pub struct PipelineEventBus {
    sender: broadcast::Sender<PipelineEvent>,
    history: Arc<RwLock<Vec<PipelineEvent>>>,
}

impl PipelineEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        PipelineEventBus {
            sender,
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn publish(&self, event: PipelineEvent) {
        debug!(
            session = %event.session_id,
            stage = ?event.stage,
            detail = %event.detail,
            "pipeline event"
        );

        {
            let mut history = self.history.write().await;
            history.push(event.clone());
            if history.len() > HISTORY_CAPACITY {
                let excess = history.len() - HISTORY_CAPACITY;
                history.drain(0..excess);
            }
        }

        // send fails only when nobody is subscribed
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub async fn history(&self) -> Vec<PipelineEvent> {
        self.history.read().await.clone()
    }

    /// Events recorded for one session, in publish order.
    pub async fn session_history(&self, session_id: Uuid) -> Vec<PipelineEvent> {
        self.history
            .read()
            .await
            .iter()
            .filter(|event| event.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PipelineEventBus {
    fn default() -> Self {
        Self::new()
    }
}
