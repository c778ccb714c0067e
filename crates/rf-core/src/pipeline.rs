//! Bounded processing pipeline: capture → file write + checksum → publish.
//!
//! A single consumer drains the bounded job queue on its own thread, off the
//! control-plane path entirely. Capacity is fixed at 32; producers (the sweep
//! runner) enforce the 1-second put timeout themselves via `Sender::send_timeout`
//! so a stalled consumer degrades into dropped captures rather than blocking
//! the next frequency step.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};

use crate::capture_writer::write_capture;
use crate::models::{ApplicationInfo, MetadataRecord, ProcessingJob};

/// Queue capacity between the sweep runner and the processing worker.
pub const QUEUE_CAPACITY: usize = 32;

/// Logged as a warning once the queue backlog crosses this fraction of
/// capacity, so an operator sees backpressure building before drops start.
pub const BACKLOG_WARN_FRACTION: f64 = 0.8;

/// Publishes a finished [`MetadataRecord`] over the message bus. Implemented
/// by the binary crate's NATS-backed producer and its null variant; kept as
/// a trait here so the pipeline doesn't depend on the bus client.
pub trait Publisher: Send + Sync {
    fn publish(&self, record: &MetadataRecord) -> Result<()>;
}

/// Creates the bounded job channel used between the sweep runner and the
/// processing worker.
pub fn job_channel() -> (Sender<ProcessingJob>, Receiver<ProcessingJob>) {
    crossbeam_channel::bounded(QUEUE_CAPACITY)
}

/// Handle to the spawned processing worker thread.
pub struct PipelineHandle {
    handle: JoinHandle<()>,
}

impl PipelineHandle {
    /// Blocks until the worker has drained the queue and exited. Callers
    /// must have already dropped every job-queue `Sender` so the worker's
    /// receive loop terminates.
    pub fn join(self) {
        if let Err(e) = self.handle.join() {
            tracing::error!(?e, "processing worker thread panicked");
        }
    }
}

/// Spawns the single processing-queue consumer. For each job: writes the
/// capture to disk, checksums it, builds the metadata record, and publishes
/// it. Per-job failures are logged and do not stop the worker; the consumer
/// naturally drains every already-enqueued job before exiting once all
/// senders are dropped (clean shutdown), or exits immediately if no jobs are
/// queued.
pub fn spawn_processing_worker(
    app_info: Arc<ApplicationInfo>,
    publisher: Arc<dyn Publisher>,
    output_path: PathBuf,
    rx: Receiver<ProcessingJob>,
) -> PipelineHandle {
    let handle = std::thread::Builder::new()
        .name("processing-worker".into())
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                warn_if_backlogged(rx.len());
                if let Err(e) = process_job(&app_info, &*publisher, &output_path, &job) {
                    tracing::error!(
                        freq_hz = job.raw.center_freq_hz,
                        error = %e,
                        "failed to process capture"
                    );
                }
            }
            tracing::info!("processing worker drained queue, exiting");
        })
        .expect("failed to spawn processing worker thread");

    PipelineHandle { handle }
}

/// Logs a warning once the queue backlog crosses [`BACKLOG_WARN_FRACTION`]
/// of [`QUEUE_CAPACITY`], so an operator sees backpressure building before
/// the sweep runner starts dropping captures on put timeout.
fn warn_if_backlogged(backlog: usize) {
    if backlog as f64 >= QUEUE_CAPACITY as f64 * BACKLOG_WARN_FRACTION {
        tracing::warn!(backlog, capacity = QUEUE_CAPACITY, "processing queue backlog above warning threshold");
    }
}

fn process_job(
    app_info: &ApplicationInfo,
    publisher: &dyn Publisher,
    output_path: &std::path::Path,
    job: &ProcessingJob,
) -> Result<()> {
    let (file_path, checksum) = write_capture(
        output_path,
        &app_info.serial,
        &app_info.hostname,
        job.raw.capture_timestamp,
        &job.raw.iq_data,
    )?;

    let record = MetadataRecord::from_job(
        app_info,
        job,
        file_path.display().to_string(),
        checksum,
    );

    publisher.publish(&record)?;
    Ok(())
}
