use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use lae_provision::{DeploymentRequest, Provisioner, Served};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Signup,
    Replacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Served,
    Failed,
}

/// One pipeline invocation started through the API.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: Uuid,
    pub kind: RunKind,
    pub customer_email: String,
    pub state: RunState,
    pub served: Option<Served>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// How long a finished run stays queryable.
const RETENTION_HOURS: i64 = 24;

/// In-process table of runs. Lost on restart; the server log is the
/// durable record. Finished runs are dropped once older than the
/// retention window; running ones are always kept.
#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<Uuid, Run>>>,
    retention: TimeDelta,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_retention(TimeDelta::hours(RETENTION_HOURS))
    }
}

impl RunRegistry {
    pub fn with_retention(retention: TimeDelta) -> Self {
        Self {
            runs: Arc::default(),
            retention,
        }
    }

    pub async fn start(&self, kind: RunKind, customer_email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let run = Run {
            id,
            kind,
            customer_email: customer_email.to_string(),
            state: RunState::Running,
            served: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        let mut runs = self.runs.write().await;
        let cutoff = Utc::now() - self.retention;
        let before = runs.len();
        runs.retain(|_, run| run.finished_at.is_none_or(|at| at > cutoff));
        if runs.len() < before {
            tracing::debug!(evicted = before - runs.len(), "dropped expired runs");
        }
        runs.insert(id, run);
        id
    }

    pub async fn finish(&self, id: Uuid, outcome: &lae_provision::Result<Served>) {
        let mut runs = self.runs.write().await;
        let Some(run) = runs.get_mut(&id) else {
            return;
        };

        match outcome {
            Ok(served) => {
                run.state = RunState::Served;
                run.served = Some(served.clone());
            }
            Err(e) => {
                run.state = RunState::Failed;
                run.error = Some(e.to_string());
            }
        }
        run.finished_at = Some(Utc::now());
    }

    pub async fn get(&self, id: Uuid) -> Option<Run> {
        self.runs.read().await.get(&id).cloned()
    }

    /// Register a run and drive it on its own task.
    pub async fn spawn(&self, provisioner: Provisioner, kind: RunKind, request: DeploymentRequest) -> Uuid {
        let id = self.start(kind, &request.customer.email).await;
        let registry = self.clone();

        tokio::spawn(async move {
            let outcome = provisioner.run(&request).await;
            if let Err(e) = &outcome {
                tracing::error!(run_id = %id, error = %e, "provisioning run failed");
            }
            registry.finish(id, &outcome).await;
        });

        tracing::info!(run_id = %id, kind = ?kind, "provisioning run started");
        id
    }
}
