//! Background fitting worker.
//!
//! Long fits run on a dedicated worker thread that communicates with its
//! host purely by message passing: serialized requests in, progress and
//! terminal result/error messages out. The host enforces the single-flight
//! request lifecycle (`idle -> running -> success | error | cancelled`),
//! drops stale messages from superseded requests, and replaces the whole
//! worker generation on cancellation.

pub mod host;
pub mod message;
pub mod worker;

pub use host::{FitHost, FitJob, HostError, HostEvent};
pub use message::{FitRequest, FitResponse, FitResultPayload};
pub use worker::{spawn_worker, WorkerHandle};
