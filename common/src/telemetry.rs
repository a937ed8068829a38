//! Provides helper functions for initializing log output and trace publication.
use anyhow::Result;
use clap::ValueEnum;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace, Resource};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter, Registry};

/// Name reported to the trace collector.
pub const SERVICE_NAME: &str = "capd-ipam";

/// Format of the log lines written to stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable single line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Initialize logging and, when an endpoint is given, OTLP trace export.
pub fn init(log_format: LogFormat, otlp_endpoint: Option<String>) -> Result<()> {
    let telemetry = match otlp_endpoint {
        Some(endpoint) => Some(
            tracing_opentelemetry::layer()
                .with_tracer(tracer(endpoint)?)
                .with_filter(env_filter()?),
        ),
        None => None,
    };

    let (compact, json) = match log_format {
        LogFormat::Compact => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json(),
            ),
        ),
    };
    let collector = Registry::default()
        .with(telemetry)
        .with(compact.with_filter(env_filter()?))
        .with(json.with_filter(env_filter()?));

    #[cfg(feature = "tokio-console")]
    let collector = {
        let console_filter = EnvFilter::builder().parse("tokio=trace,runtime=trace")?;
        let console_layer = console_subscriber::spawn().with_filter(console_filter);
        collector.with(console_layer)
    };

    tracing::subscriber::set_global_default(collector)?;
    Ok(())
}

/// Flush any buffered spans before the process exits.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

// Default to INFO if no env is specified
fn env_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?)
}

fn tracer(endpoint: String) -> Result<trace::Tracer> {
    let hostname = gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_owned());
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(trace::config().with_resource(Resource::new(vec![
            KeyValue::new("hostname", hostname),
            KeyValue::new("service.name", SERVICE_NAME),
        ])))
        .install_batch(runtime::Tokio)?;
    Ok(tracer)
}
