//! Integration tests for the host/worker contract: progress streams,
//! terminal messages, single-flight enforcement, and cancellation.

use std::time::Duration;

use fit_worker::{FitHost, FitJob, FitResultPayload, HostError, HostEvent};
use shared::algo::fermi::fermi_dirac_convolved;
use simulator::{simulate, SimulatorParams};

const EVENT_TIMEOUT: Duration = Duration::from_secs(60);

fn synthetic_edge() -> (Vec<f64>, Vec<f64>) {
    let n = 200;
    let energy: Vec<f64> = (0..n)
        .map(|i| -0.05 + i as f64 * 0.1 / (n - 1) as f64)
        .collect();
    let spectrum = fermi_dirac_convolved(&energy, 0.001, 10.0, 0.002);
    (energy, spectrum)
}

fn irf_job(max_iterations: usize) -> FitJob {
    FitJob::EstimateIrf {
        observed_spectrum: simulate(&SimulatorParams::default()).spectrum_clean,
        temp: 5.0,
        bounds: None,
        max_iterations,
    }
}

#[test]
fn test_irf_progress_stream_is_exact() {
    let mut host = FitHost::new();
    let id = host.submit(irf_job(3)).unwrap();

    let mut iterations = Vec::new();
    let terminal = loop {
        let event = host
            .next_event_timeout(EVENT_TIMEOUT)
            .expect("worker must keep emitting events");
        assert_eq!(event.id(), id);
        match event {
            HostEvent::Progress {
                iteration,
                progress,
                fitness,
                ..
            } => {
                iterations.push(iteration);
                assert!(progress > 0.0 && progress <= 100.0);
                assert!(fitness.is_finite());
            }
            terminal => break terminal,
        }
    };

    // One progress message per sweep, strictly increasing, then the result
    assert_eq!(iterations, vec![1, 2, 3]);
    match terminal {
        HostEvent::Finished { result, .. } => match result {
            FitResultPayload::Irf(inner) => {
                assert!(inner.success);
                assert_eq!(inner.iterations, 3);
            }
            other => panic!("expected IRF payload, got {other:?}"),
        },
        other => panic!("expected Finished, got {other:?}"),
    }
    assert!(!host.is_running());
    host.shutdown();
}

#[test]
fn test_second_submit_rejected_while_running() {
    let mut host = FitHost::new();
    host.submit(irf_job(10)).unwrap();

    let (energy, spectrum) = synthetic_edge();
    let second = host.submit(FitJob::FermiEdge {
        energy,
        observed_spectrum: spectrum,
        temp: 10.0,
        fit_temp: false,
        use_global_opt: true,
    });
    assert_eq!(second.unwrap_err(), HostError::Busy);

    host.cancel();
    host.shutdown();
}

#[test]
fn test_fermi_edge_job_completes_with_progress() {
    let mut host = FitHost::new();
    let (energy, spectrum) = synthetic_edge();
    let id = host
        .submit(FitJob::FermiEdge {
            energy,
            observed_spectrum: spectrum,
            temp: 10.0,
            fit_temp: false,
            use_global_opt: true,
        })
        .unwrap();

    let mut last_iteration = 0;
    let terminal = loop {
        let event = host.next_event_timeout(EVENT_TIMEOUT).expect("event");
        assert_eq!(event.id(), id);
        match event {
            HostEvent::Progress {
                iteration,
                progress,
                ..
            } => {
                assert!(iteration > last_iteration);
                last_iteration = iteration;
                // Fermi-edge progress is scaled by the nominal 100 sweeps
                assert!(progress <= 100.0);
            }
            terminal => break terminal,
        }
    };

    assert!(last_iteration > 0);
    match terminal {
        HostEvent::Finished { result, .. } => match result {
            FitResultPayload::FermiEdge(inner) => {
                assert!(inner.success, "fit failed: {:?}", inner.error_message);
                assert!(inner.r_squared > 0.99);
            }
            other => panic!("expected fermi-edge payload, got {other:?}"),
        },
        other => panic!("expected Finished, got {other:?}"),
    }
    host.shutdown();
}

#[test]
fn test_invalid_job_reports_failed_fit_result() {
    let mut host = FitHost::new();
    let id = host
        .submit(FitJob::FermiEdge {
            energy: Vec::new(),
            observed_spectrum: Vec::new(),
            temp: 5.0,
            fit_temp: false,
            use_global_opt: true,
        })
        .unwrap();

    let terminal = host.wait_terminal(EVENT_TIMEOUT).expect("terminal event");
    assert_eq!(terminal.id(), id);
    match terminal {
        HostEvent::Finished { result, .. } => match result {
            FitResultPayload::FermiEdge(inner) => {
                assert!(!inner.success);
                assert!(inner.error_message.is_some());
            }
            other => panic!("expected fermi-edge payload, got {other:?}"),
        },
        other => panic!("expected Finished, got {other:?}"),
    }
    host.shutdown();
}

#[test]
fn test_cancellation_discards_request_and_accepts_new_work() {
    let mut host = FitHost::new();
    let old_id = host.submit(irf_job(50)).unwrap();

    // Let the run actually start producing progress before cancelling
    let first = host.next_event_timeout(EVENT_TIMEOUT).expect("progress");
    assert_eq!(first.id(), old_id);
    assert!(!first.is_terminal());

    let cancelled = host.cancel().expect("something was in flight");
    match &cancelled {
        HostEvent::Cancelled { id, reason } => {
            assert_eq!(id, &old_id);
            assert_eq!(reason, "Operation cancelled");
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(!host.is_running());

    // The replacement worker accepts and completes new work; nothing from
    // the superseded id ever surfaces
    let new_id = host.submit(irf_job(2)).unwrap();
    assert_ne!(new_id, old_id);
    let mut saw_terminal = false;
    while let Some(event) = host.next_event_timeout(EVENT_TIMEOUT) {
        assert_eq!(event.id(), new_id);
        if event.is_terminal() {
            saw_terminal = true;
            break;
        }
    }
    assert!(saw_terminal);
    host.shutdown();
}
