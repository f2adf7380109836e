//! Host side of the fitting contract: single-flight request lifecycle,
//! stale-message filtering, and cancellation by worker replacement.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};
use fitting::Bounds;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::message::{FitRequest, FitResponse, FitResultPayload};
use crate::worker::{spawn_worker, WorkerHandle};

/// Errors surfaced synchronously by the host API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("a fit request is already running")]
    Busy,
    #[error("the worker is unavailable")]
    WorkerGone,
}

/// A fit job before the host assigns its request id.
#[derive(Debug, Clone)]
pub enum FitJob {
    FermiEdge {
        energy: Vec<f64>,
        observed_spectrum: Vec<f64>,
        temp: f64,
        fit_temp: bool,
        use_global_opt: bool,
    },
    EstimateIrf {
        observed_spectrum: Vec<f64>,
        temp: f64,
        bounds: Option<Bounds>,
        max_iterations: usize,
    },
}

/// Events the host delivers for the active request.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Progress {
        id: String,
        iteration: usize,
        fitness: f64,
        progress: f64,
    },
    Finished {
        id: String,
        result: FitResultPayload,
    },
    Failed {
        id: String,
        error: String,
    },
    Cancelled {
        id: String,
        reason: String,
    },
}

impl HostEvent {
    pub fn id(&self) -> &str {
        match self {
            HostEvent::Progress { id, .. } => id,
            HostEvent::Finished { id, .. } => id,
            HostEvent::Failed { id, .. } => id,
            HostEvent::Cancelled { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HostEvent::Progress { .. })
    }
}

/// Owns the worker thread and the request lifecycle.
///
/// One request may be in flight at a time; submitting while running is
/// rejected synchronously. Messages bearing any id other than the active
/// one are dropped (a superseded generation may still be flushing).
pub struct FitHost {
    response_tx: Sender<FitResponse>,
    response_rx: Receiver<FitResponse>,
    worker: Option<WorkerHandle>,
    active: Option<String>,
    sequence: u64,
}

impl FitHost {
    pub fn new() -> Self {
        let (response_tx, response_rx) = crossbeam_channel::unbounded();
        let worker = spawn_worker(response_tx.clone());
        Self {
            response_tx,
            response_rx,
            worker: Some(worker),
            active: None,
            sequence: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Submit a job; returns the assigned request id.
    pub fn submit(&mut self, job: FitJob) -> Result<String, HostError> {
        if self.active.is_some() {
            return Err(HostError::Busy);
        }
        let id = self.next_id();
        let request = match job {
            FitJob::FermiEdge {
                energy,
                observed_spectrum,
                temp,
                fit_temp,
                use_global_opt,
            } => FitRequest::FitFermiEdge {
                id: id.clone(),
                energy,
                observed_spectrum,
                temp,
                fit_temp,
                use_global_opt,
            },
            FitJob::EstimateIrf {
                observed_spectrum,
                temp,
                bounds,
                max_iterations,
            } => FitRequest::EstimateIRF {
                id: id.clone(),
                observed_spectrum,
                temp,
                bounds,
                max_iterations,
            },
        };
        let request_json =
            serde_json::to_string(&request).expect("fit requests always serialize");
        let worker = self.worker.as_ref().ok_or(HostError::WorkerGone)?;
        if !worker.submit(request_json) {
            return Err(HostError::WorkerGone);
        }
        info!(id = id.as_str(), "fit request submitted");
        self.active = Some(id.clone());
        Ok(id)
    }

    /// Non-blocking: next event for the active request, if any.
    pub fn poll(&mut self) -> Option<HostEvent> {
        loop {
            let message = self.response_rx.try_recv().ok()?;
            if let Some(event) = self.filter(message) {
                return Some(event);
            }
        }
    }

    /// Block up to `timeout` for the next event for the active request.
    pub fn next_event_timeout(&mut self, timeout: Duration) -> Option<HostEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let message = self.response_rx.recv_timeout(remaining).ok()?;
            if let Some(event) = self.filter(message) {
                return Some(event);
            }
        }
    }

    /// Block up to `timeout` for the terminal event, discarding progress.
    pub fn wait_terminal(&mut self, timeout: Duration) -> Option<HostEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = self.next_event_timeout(remaining)?;
            if event.is_terminal() {
                return Some(event);
            }
        }
    }

    /// Cancel the in-flight request, if any.
    ///
    /// The current worker generation is flagged and abandoned (whatever it
    /// was computing is discarded) and a fresh worker is spawned before
    /// new work is accepted. The returned event carries the contract's
    /// "Operation cancelled" reason.
    pub fn cancel(&mut self) -> Option<HostEvent> {
        let id = self.active.take()?;
        if let Some(worker) = self.worker.take() {
            worker.cancel();
            // The old generation drains on its own; its messages are
            // filtered out by id from here on.
            drop(worker);
        }
        self.worker = Some(spawn_worker(self.response_tx.clone()));
        info!(id = id.as_str(), "fit request cancelled, worker replaced");
        Some(HostEvent::Cancelled {
            id,
            reason: "Operation cancelled".to_string(),
        })
    }

    /// Graceful shutdown: cancel anything in flight and join the worker.
    pub fn shutdown(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel();
            worker.shutdown();
        }
    }

    fn next_id(&mut self) -> String {
        self.sequence += 1;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("req-{}-{}", self.sequence, millis)
    }

    fn filter(&mut self, message: FitResponse) -> Option<HostEvent> {
        let active = match &self.active {
            Some(active) => active.as_str(),
            None => {
                debug!(id = message.id(), "dropping message with no active request");
                return None;
            }
        };
        if message.id() != active {
            warn!(
                id = message.id(),
                active, "dropping stale message from superseded request"
            );
            return None;
        }
        match message {
            FitResponse::Progress {
                id,
                iteration,
                fitness,
                progress,
            } => Some(HostEvent::Progress {
                id,
                iteration,
                fitness,
                progress,
            }),
            FitResponse::Result { id, result } => {
                self.active = None;
                Some(HostEvent::Finished { id, result: *result })
            }
            FitResponse::Error { id, error } => {
                self.active = None;
                Some(HostEvent::Failed { id, error })
            }
        }
    }
}

impl Default for FitHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FitHost {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let mut host = FitHost::new();
        let a = host.next_id();
        let b = host.next_id();
        assert_ne!(a, b);
        assert!(a.starts_with("req-1-"));
        assert!(b.starts_with("req-2-"));
    }

    #[test]
    fn test_poll_idle_returns_none() {
        let mut host = FitHost::new();
        assert!(host.poll().is_none());
        assert!(!host.is_running());
    }

    #[test]
    fn test_stale_messages_dropped() {
        let mut host = FitHost::new();
        host.active = Some("req-7-0".into());
        host.response_tx
            .send(FitResponse::Progress {
                id: "req-6-0".into(),
                iteration: 1,
                fitness: 0.5,
                progress: 2.0,
            })
            .unwrap();
        host.response_tx
            .send(FitResponse::Progress {
                id: "req-7-0".into(),
                iteration: 3,
                fitness: 0.25,
                progress: 6.0,
            })
            .unwrap();
        let event = host.poll().unwrap();
        match event {
            HostEvent::Progress { id, iteration, .. } => {
                assert_eq!(id, "req-7-0");
                assert_eq!(iteration, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_terminal_clears_active() {
        let mut host = FitHost::new();
        host.active = Some("req-8-0".into());
        host.response_tx
            .send(FitResponse::Error {
                id: "req-8-0".into(),
                error: "boom".into(),
            })
            .unwrap();
        let event = host.poll().unwrap();
        assert!(event.is_terminal());
        assert!(!host.is_running());
        // Anything after the terminal message for that id is ignored
        host.response_tx
            .send(FitResponse::Progress {
                id: "req-8-0".into(),
                iteration: 9,
                fitness: 0.1,
                progress: 18.0,
            })
            .unwrap();
        assert!(host.poll().is_none());
    }

    #[test]
    fn test_cancel_without_active_is_noop() {
        let mut host = FitHost::new();
        assert!(host.cancel().is_none());
    }
}
