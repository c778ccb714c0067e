//! Prometheus metrics exporter (§10.6): a `Metrics` registry mirroring
//! `original_source/rf_survey/metrics.py`'s gauge set, served over a
//! hand-rolled HTTP/1.0 `/metrics` responder on a raw `TcpListener` rather
//! than pulling in an async web framework — the exporter is one read-only
//! endpoint, not worth the dependency weight.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use rf_core::{ApplicationInfo, ReceiverConfig, SweepConfig};

pub struct Metrics {
    registry: Registry,
    build_info: IntGauge,
    sdr_temperature_celsius: Gauge,
    processing_queue_size: IntGauge,
    config_start_hz: IntGauge,
    config_end_hz: IntGauge,
    config_step_hz: IntGauge,
    config_cycles: IntGauge,
    config_records_per_step: IntGauge,
    config_interval_sec: Gauge,
    config_max_jitter_sec: Gauge,
    receiver_config_gain_db: IntGauge,
    receiver_config_bandwidth_hz: IntGauge,
    receiver_config_duration_sec: Gauge,
}

impl Metrics {
    pub fn new(app_info: &ApplicationInfo) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let build_info = IntGauge::with_opts(
            prometheus::Opts::new("rf_survey_build_info", "Host and version information for the application")
                .const_label("version", env!("CARGO_PKG_VERSION"))
                .const_label("hostname", &app_info.hostname),
        )?;
        build_info.set(1);
        registry.register(Box::new(build_info.clone()))?;

        let sdr_temperature_celsius = Gauge::new(
            "rf_survey_sdr_temperature_celsius",
            "Current temperature of the SDR hardware in Celsius",
        )?;
        registry.register(Box::new(sdr_temperature_celsius.clone()))?;

        let processing_queue_size = IntGauge::new(
            "rf_survey_processing_queue_size",
            "Number of items in the processing queue",
        )?;
        registry.register(Box::new(processing_queue_size.clone()))?;

        let config_start_hz = IntGauge::new("rf_survey_config_start_hz", "Current start frequency of the sweep in Hz")?;
        registry.register(Box::new(config_start_hz.clone()))?;
        let config_end_hz = IntGauge::new("rf_survey_config_end_hz", "Current end frequency of the sweep in Hz")?;
        registry.register(Box::new(config_end_hz.clone()))?;
        let config_step_hz = IntGauge::new("rf_survey_config_step_hz", "Current step frequency of the sweep in Hz")?;
        registry.register(Box::new(config_step_hz.clone()))?;
        let config_cycles = IntGauge::new(
            "rf_survey_config_cycles",
            "Configured number of sweep cycles to run (0 for infinite)",
        )?;
        registry.register(Box::new(config_cycles.clone()))?;
        let config_records_per_step = IntGauge::new(
            "rf_survey_config_records_per_step",
            "Number of records to capture at each frequency step",
        )?;
        registry.register(Box::new(config_records_per_step.clone()))?;
        let config_interval_sec = Gauge::new(
            "rf_survey_config_interval_sec",
            "Current interval between captures in seconds",
        )?;
        registry.register(Box::new(config_interval_sec.clone()))?;
        let config_max_jitter_sec = Gauge::new(
            "rf_survey_config_max_jitter_sec",
            "Maximum random delay to add before a capture in seconds",
        )?;
        registry.register(Box::new(config_max_jitter_sec.clone()))?;

        let receiver_config_gain_db =
            IntGauge::new("rf_survey_receiver_config_gain_db", "Current receiver gain in dB")?;
        registry.register(Box::new(receiver_config_gain_db.clone()))?;
        let receiver_config_bandwidth_hz = IntGauge::new(
            "rf_survey_receiver_config_bandwidth_hz",
            "Current receiver bandwidth in Hz",
        )?;
        registry.register(Box::new(receiver_config_bandwidth_hz.clone()))?;
        let receiver_config_duration_sec = Gauge::new(
            "rf_survey_receiver_config_duration_sec",
            "Current capture duration in seconds",
        )?;
        registry.register(Box::new(receiver_config_duration_sec.clone()))?;

        Ok(Self {
            registry,
            build_info,
            sdr_temperature_celsius,
            processing_queue_size,
            config_start_hz,
            config_end_hz,
            config_step_hz,
            config_cycles,
            config_records_per_step,
            config_interval_sec,
            config_max_jitter_sec,
            receiver_config_gain_db,
            receiver_config_bandwidth_hz,
            receiver_config_duration_sec,
        })
    }

    pub fn update_temperature(&self, temp_c: f64) {
        self.sdr_temperature_celsius.set(temp_c);
    }

    pub fn update_queue_size(&self, size: i64) {
        self.processing_queue_size.set(size);
    }

    pub fn update_sweep_config(&self, sweep: &SweepConfig) {
        self.config_start_hz.set(sweep.start_hz as i64);
        self.config_end_hz.set(sweep.end_hz as i64);
        self.config_step_hz.set(sweep.step_hz as i64);
        self.config_cycles.set(sweep.cycles as i64);
        self.config_records_per_step.set(sweep.records_per_step as i64);
        self.config_interval_sec.set(sweep.interval_sec);
        self.config_max_jitter_sec.set(sweep.max_jitter_sec);
    }

    pub fn update_receiver_config(&self, receiver: &ReceiverConfig) {
        self.receiver_config_gain_db.set(receiver.gain_db as i64);
        self.receiver_config_bandwidth_hz.set(receiver.bandwidth_hz as i64);
        self.receiver_config_duration_sec.set(receiver.duration_sec);
    }

    fn render(&self) -> Vec<u8> {
        let _ = &self.build_info; // keep alive; set once at construction
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buf).expect("prometheus encoding is infallible for gauges");
        buf
    }
}

/// A metrics sink. [`LiveMetricsExporter`] serves `/metrics` over HTTP;
/// [`NullMetricsExporter`] does nothing (§9 "Null implementations").
pub trait MetricsExporter: Send + Sync {
    fn metrics(&self) -> Option<&Arc<Metrics>>;
    fn run(&self, shutdown: Arc<AtomicBool>);
}

pub struct NullMetricsExporter;

impl MetricsExporter for NullMetricsExporter {
    fn metrics(&self) -> Option<&Arc<Metrics>> {
        None
    }
    fn run(&self, _shutdown: Arc<AtomicBool>) {}
}

pub struct LiveMetricsExporter {
    bind_addr: String,
    metrics: Arc<Metrics>,
}

impl LiveMetricsExporter {
    pub fn new(bind_addr: String, metrics: Arc<Metrics>) -> Self {
        Self { bind_addr, metrics }
    }
}

impl MetricsExporter for LiveMetricsExporter {
    fn metrics(&self) -> Option<&Arc<Metrics>> {
        Some(&self.metrics)
    }

    fn run(&self, shutdown: Arc<AtomicBool>) {
        let listener = match TcpListener::bind(&self.bind_addr) {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, addr = %self.bind_addr, "failed to bind metrics listener");
                return;
            }
        };
        // Poll shutdown between accepts rather than blocking forever.
        listener.set_nonblocking(true).ok();
        tracing::info!(addr = %self.bind_addr, "metrics exporter listening");

        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => serve_one(stream, &self.metrics),
                Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "metrics listener accept failed");
                }
            }
        }
    }
}

fn serve_one(mut stream: TcpStream, metrics: &Arc<Metrics>) {
    let mut buf = [0u8; 1024];
    // We only need to know a request arrived; the exporter has one route.
    let _ = stream.read(&mut buf);

    let body = metrics.render();
    let response = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if stream.write_all(response.as_bytes()).is_ok() {
        let _ = stream.write_all(&body);
    }
}
