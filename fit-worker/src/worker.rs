//! The computation side of the contract: a worker thread that
//! deserializes requests, runs the requested fit, forwards progress, and
//! posts exactly one terminal message per request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use fitting::{estimate_irf, fit_fermi_edge, IrfEstimationOptions};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::message::{
    progress_percent, FitRequest, FitResponse, FitResultPayload, FERMI_EDGE_NOMINAL_ITERATIONS,
};

/// Handle to a spawned worker generation.
pub struct WorkerHandle {
    sender: Sender<String>,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Queue a serialized request for the worker.
    pub fn submit(&self, request_json: String) -> bool {
        self.sender.send(request_json).is_ok()
    }

    /// Flag the generation as cancelled; the in-flight fit aborts at its
    /// next progress checkpoint and produces no terminal message.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Disconnect and wait for the thread to drain.
    pub fn shutdown(mut self) {
        drop(self.sender);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("fit worker thread panicked during shutdown");
            }
        }
    }
}

/// Spawn a worker thread feeding `response_tx`.
pub fn spawn_worker(response_tx: Sender<FitResponse>) -> WorkerHandle {
    let (sender, receiver) = crossbeam_channel::unbounded::<String>();
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_thread = cancel.clone();

    let join = std::thread::spawn(move || {
        info!("fit worker started");
        while let Ok(request_json) = receiver.recv() {
            if cancel_thread.load(Ordering::SeqCst) {
                break;
            }
            dispatch_message(&request_json, &response_tx, &cancel_thread);
        }
        info!("fit worker shutting down");
    });

    WorkerHandle {
        sender,
        cancel,
        join: Some(join),
    }
}

/// Deserialize one request and run it, posting progress and the terminal
/// response to `response_tx`.
///
/// A message whose `type` tag is not recognized yields a terminal error
/// with the fixed text "Unknown message type"; other deserialization
/// failures surface their own description. A cancelled run posts nothing.
pub fn dispatch_message(
    request_json: &str,
    response_tx: &Sender<FitResponse>,
    cancel: &Arc<AtomicBool>,
) {
    match serde_json::from_str::<FitRequest>(request_json) {
        Ok(request) => run_request(request, response_tx, cancel),
        Err(parse_error) => {
            let (id, error) = describe_parse_failure(request_json, &parse_error);
            warn!(id = id.as_str(), error = error.as_str(), "rejecting request");
            let _ = response_tx.send(FitResponse::Error { id, error });
        }
    }
}

fn describe_parse_failure(request_json: &str, parse_error: &serde_json::Error) -> (String, String) {
    let value: Value = match serde_json::from_str(request_json) {
        Ok(value) => value,
        Err(_) => return (String::new(), parse_error.to_string()),
    };
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match value.get("type").and_then(Value::as_str) {
        Some("FitFermiEdge") | Some("EstimateIRF") => (id, parse_error.to_string()),
        _ => (id, "Unknown message type".to_string()),
    }
}

fn run_request(request: FitRequest, response_tx: &Sender<FitResponse>, cancel: &Arc<AtomicBool>) {
    let id = request.id().to_string();
    debug!(id = id.as_str(), "dispatching fit request");

    let payload = match request {
        FitRequest::FitFermiEdge {
            energy,
            observed_spectrum,
            temp,
            fit_temp,
            use_global_opt,
            ..
        } => {
            let mut on_progress = progress_forwarder(
                &id,
                FERMI_EDGE_NOMINAL_ITERATIONS,
                response_tx,
                cancel,
            );
            let result = fit_fermi_edge(
                &energy,
                &observed_spectrum,
                temp,
                fit_temp,
                use_global_opt,
                Some(&mut on_progress),
            );
            FitResultPayload::FermiEdge(result)
        }
        FitRequest::EstimateIRF {
            observed_spectrum,
            temp,
            bounds,
            max_iterations,
            ..
        } => {
            let options = IrfEstimationOptions {
                max_iterations,
                bounds,
            };
            let mut on_progress = progress_forwarder(&id, max_iterations, response_tx, cancel);
            let result = estimate_irf(&observed_spectrum, temp, &options, Some(&mut on_progress));
            FitResultPayload::Irf(result)
        }
    };

    // A cancelled generation is abandoned wholesale: its partial result
    // must never reach the host.
    if cancel.load(Ordering::SeqCst) {
        debug!(id = id.as_str(), "dropping result of cancelled request");
        return;
    }
    let _ = response_tx.send(FitResponse::Result {
        id,
        result: Box::new(payload),
    });
}

/// Build the optimizer progress callback: forward each sweep, abort on
/// cancellation.
fn progress_forwarder<'a>(
    id: &'a str,
    max_iterations: usize,
    response_tx: &'a Sender<FitResponse>,
    cancel: &'a Arc<AtomicBool>,
) -> impl FnMut(usize, f64) -> bool + 'a {
    move |iteration, fitness| {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let _ = response_tx.send(FitResponse::Progress {
            id: id.to_string(),
            iteration,
            fitness,
            progress: progress_percent(iteration, max_iterations),
        });
        true
    }
}
