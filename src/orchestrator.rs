//! Top-level orchestrator (T3, §4.9): composes every subsystem, registers
//! signal handlers, runs them as siblings, and tears everything down on
//! shutdown or a fatal child error. The single-instance lock is acquired
//! before anything else starts and held for the process lifetime.

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use fs2::FileExt;
use rf_core::{
    job_channel, spawn_processing_worker, ApplicationInfo, LiveConfig, MockReceiver, Receiver,
    SurveySupervisor, Watchdog,
};
use uuid::Uuid;

use crate::config::AppSettings;
use crate::metrics_exporter::{LiveMetricsExporter, Metrics, MetricsExporter, NullMetricsExporter};
use crate::producer::{NatsProducer, NullProducer};
use crate::zms::{LiveZmsMonitor, NullZmsMonitor, ZmsMonitor, ZmsRestClient};

pub const EXIT_OK: i32 = 0;
pub const EXIT_INIT_FAILURE: i32 = 1;
pub const EXIT_SINGLETON_CONTENTION: i32 = 2;
pub const EXIT_WATCHDOG_TIMEOUT: i32 = 3;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_shutdown_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_shutdown_signal as *const () as libc::sighandler_t);
    }
}

/// Acquires the advisory single-instance lock, holding the `File` for the
/// process lifetime so the lock releases automatically on drop.
fn acquire_singleton_lock(settings: &AppSettings) -> Result<std::fs::File> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&settings.lock_path)
        .with_context(|| format!("opening lock file {}", settings.lock_path.display()))?;

    file.try_lock_exclusive().with_context(|| {
        format!(
            "another rf-survey-engine instance already holds the lock at {}",
            settings.lock_path.display()
        )
    })?;

    Ok(file)
}

/// Runs the full application. Returns the process exit code rather than
/// propagating `Result` to `main`, since the exit-code taxonomy (§6) needs
/// to distinguish singleton contention from a watchdog trip from a clean
/// shutdown.
pub fn run(settings: AppSettings) -> Result<i32> {
    let _lock = match acquire_singleton_lock(&settings) {
        Ok(lock) => lock,
        Err(err) => {
            tracing::error!(error = %err, "failed to acquire single-instance lock");
            return Ok(EXIT_SINGLETON_CONTENTION);
        }
    };

    install_signal_handlers();

    let receiver: Arc<dyn Receiver> = Arc::new(MockReceiver::new(settings.receiver));
    receiver.initialize().context("initializing receiver")?;

    let app_info = Arc::new(ApplicationInfo {
        hostname: settings.hostname.clone(),
        organization: settings.organization.clone(),
        coordinates: settings.coordinates.clone(),
        output_path: settings.storage_path.clone(),
        group_id: Uuid::new_v4().to_string(),
        serial: receiver.serial(),
    });

    let metrics: Arc<dyn MetricsExporter> = if settings.metrics_enabled {
        let metrics = Arc::new(Metrics::new(&app_info).context("constructing metrics registry")?);
        Arc::new(LiveMetricsExporter::new(settings.metrics_bind_addr.clone(), metrics))
    } else {
        Arc::new(NullMetricsExporter)
    };
    if let Some(handle) = metrics.metrics() {
        handle.update_sweep_config(&settings.sweep);
        handle.update_receiver_config(&settings.receiver);
    }

    let publisher: Arc<dyn rf_core::Publisher> = match &settings.nats_server_addr {
        Some(addr) => Arc::new(
            NatsProducer::connect(addr, settings.nats_subject.clone(), None)
                .context("connecting to message bus")?,
        ),
        None => Arc::new(NullProducer),
    };

    let zms_monitor: Arc<dyn ZmsMonitor> = match &settings.zms {
        Some(zms) => {
            let client = ZmsRestClient::new(zms.rest_base_url.clone(), zms.bearer_token.clone())
                .context("constructing ZMS REST client")?;
            Arc::new(LiveZmsMonitor::new(zms.monitor_id.clone(), zms.ws_url.clone(), zms.api_token.clone(), client))
        }
        None => Arc::new(NullZmsMonitor),
    };

    let live_config = Arc::new(LiveConfig::new(settings.sweep.clone(), settings.receiver));
    let shutdown = Arc::new(AtomicBool::new(false));
    let watchdog = Watchdog::new(settings.watchdog_timeout_sec);
    let supervisor = SurveySupervisor::new(Arc::clone(&live_config), Arc::clone(&shutdown), settings.zms.is_none());

    let (queue_tx, queue_rx) = job_channel();
    let pipeline = spawn_processing_worker(
        Arc::clone(&app_info),
        Arc::clone(&publisher),
        settings.storage_path.clone(),
        queue_rx,
    );

    let watchdog_trip_rx = watchdog.trip_receiver();
    let watchdog_handle = watchdog.spawn();
    let supervisor_handle = supervisor.spawn(Arc::clone(&receiver), queue_tx.clone(), Arc::clone(&watchdog));

    let metrics_handle = {
        let metrics = Arc::clone(&metrics);
        let shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("metrics-exporter".into())
            .spawn(move || metrics.run(shutdown))
            .expect("failed to spawn metrics exporter thread")
    };

    let zms_handle = {
        let zms_monitor = Arc::clone(&zms_monitor);
        let supervisor = Arc::clone(&supervisor);
        let receiver = Arc::clone(&receiver);
        let watchdog = Arc::clone(&watchdog);
        let live_config = Arc::clone(&live_config);
        let shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("zms-monitor".into())
            .spawn(move || zms_monitor.run(supervisor, receiver, watchdog, live_config, shutdown))
            .expect("failed to spawn ZMS monitor thread")
    };

    let exit_code = Arc::new(Mutex::new(EXIT_OK));

    // Root wait loop: structured-concurrency scope (§4.9) — any of shutdown
    // signal, watchdog trip, or supervisor exit tears the whole tree down.
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            tracing::info!("shutdown signal received");
            break;
        }
        if let Ok(trip) = watchdog_trip_rx.try_recv() {
            tracing::error!(%trip, "watchdog tripped, shutting down");
            *exit_code.lock().unwrap() = EXIT_WATCHDOG_TIMEOUT;
            break;
        }
        if supervisor_handle.is_finished() {
            tracing::info!("supervisor finished its configured run, shutting down");
            break;
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    shutdown.store(true, Ordering::SeqCst);
    supervisor.pause();
    watchdog.stop();

    let _ = supervisor_handle.join();
    drop(queue_tx);
    pipeline.join();
    let _ = metrics_handle.join();
    let _ = zms_handle.join();
    if let Some(handle) = watchdog_handle {
        let _ = handle.join();
    }

    let code = *exit_code.lock().unwrap();
    Ok(code)
}
