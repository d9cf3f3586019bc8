//! Engine Service
//!
//! Hosts a [`DefenseEngine`] inside a single tokio task so that concurrent
//! ingress tasks can share it. Every request is applied in arrival order by
//! that one task, which makes each decision atomic per source without any
//! locking inside the engine.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::DefenseEngine;
use crate::report::ThreatReport;
use crate::types::{ArrivalEvent, Decision, Seconds, SourceIdentity};

/// Default request queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("defense engine task has stopped")]
    EngineStopped,
}

enum Request<S> {
    Evaluate {
        event: ArrivalEvent<S>,
        reply: oneshot::Sender<Decision>,
    },
    RecordViolation {
        source: S,
        reply: oneshot::Sender<u32>,
    },
    IsBlocked {
        source: S,
        reply: oneshot::Sender<bool>,
    },
    Report {
        reply: oneshot::Sender<ThreatReport<S>>,
    },
}

/// Cloneable handle for submitting work to the engine task
pub struct EngineHandle<S> {
    tx: mpsc::Sender<Request<S>>,
}

impl<S> Clone for EngineHandle<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

/// Move `engine` into its own task.
///
/// The task ends once every handle is dropped and hands the engine back
/// through the returned join handle.
pub fn spawn<S>(
    engine: DefenseEngine<S>,
    queue_depth: usize,
) -> (EngineHandle<S>, JoinHandle<DefenseEngine<S>>)
where
    S: SourceIdentity + Send + 'static,
{
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(run_engine(engine, rx));
    (EngineHandle { tx }, task)
}

async fn run_engine<S: SourceIdentity>(
    mut engine: DefenseEngine<S>,
    mut rx: mpsc::Receiver<Request<S>>,
) -> DefenseEngine<S> {
    info!("🛡️  Defense engine task started");

    while let Some(request) = rx.recv().await {
        match request {
            Request::Evaluate { event, reply } => {
                let decision = engine.evaluate(&event);
                // Caller may have gone away; the decision still counts
                let _ = reply.send(decision);
            }
            Request::RecordViolation { source, reply } => {
                let _ = reply.send(engine.record_violation(&source));
            }
            Request::IsBlocked { source, reply } => {
                let _ = reply.send(engine.is_blocked(&source));
            }
            Request::Report { reply } => {
                let _ = reply.send(engine.generate_report());
            }
        }
    }

    debug!("All engine handles dropped, stopping engine task");
    engine
}

impl<S: SourceIdentity> EngineHandle<S> {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request<S>,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::EngineStopped)?;
        response.await.map_err(|_| ServiceError::EngineStopped)
    }

    /// Submit one control message and wait for the decision
    pub async fn should_accept(&self, source: S, timestamp: Seconds) -> Result<Decision, ServiceError> {
        self.evaluate(ArrivalEvent::new(source, timestamp)).await
    }

    /// Submit an [`ArrivalEvent`] and wait for the decision
    pub async fn evaluate(&self, event: ArrivalEvent<S>) -> Result<Decision, ServiceError> {
        self.request(|reply| Request::Evaluate { event, reply }).await
    }

    /// Attribute an external violation; returns the new count
    pub async fn record_violation(&self, source: S) -> Result<u32, ServiceError> {
        self.request(|reply| Request::RecordViolation { source, reply }).await
    }

    /// Check if a source is permanently blocked
    pub async fn is_blocked(&self, source: S) -> Result<bool, ServiceError> {
        self.request(|reply| Request::IsBlocked { source, reply }).await
    }

    /// Snapshot threat report
    pub async fn report(&self) -> Result<ThreatReport<S>, ServiceError> {
        self.request(|reply| Request::Report { reply }).await
    }
}
