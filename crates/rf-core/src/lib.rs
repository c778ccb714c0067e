pub mod capture_writer;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod receiver;
pub mod reconfigure;
pub mod scheduler;
pub mod supervisor;
pub mod sweep;
pub mod watchdog;

pub use capture_writer::{capture_file_name, checksum_hex, write_capture};
pub use error::{ReceiverError, ReconfigureError, WatchdogTimeout};
pub use models::{
    ApplicationInfo, MetadataRecord, ProcessingJob, RawCapture, ReceiverConfig, SweepConfig,
};
pub use pipeline::{job_channel, spawn_processing_worker, PipelineHandle, Publisher, QUEUE_CAPACITY};
pub use receiver::{CaptureResult, MockReceiver, Receiver};
pub use reconfigure::{
    apply_reconfiguration, begin_reconfiguration, finish_reconfiguration, TargetStatus,
    SWEEP_SETTLE_TIMEOUT,
};
pub use scheduler::{wait_time, wait_time_with_jitter};
pub use supervisor::{ConfigSnapshot, LiveConfig, SurveySupervisor};
pub use sweep::{run_sweep, CancelToken, SweepOutcome};
pub use watchdog::Watchdog;
