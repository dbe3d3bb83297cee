use std::fs::OpenOptions;

use anyhow::{Context, Result};
use opentelemetry::global;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVICE_NAME: &str = "lambda-sync";

// stdout carries the output document, so every exporter logs to stderr or a file.
pub fn init_telemetry() -> Result<()> {
    let exporter_type = std::env::var("OTEL_EXPORTER").unwrap_or_else(|_| "stdout".to_string());

    match exporter_type.as_str() {
        "otlp" => init_otlp()?,
        "file" => init_file()?,
        "json" => init_json()?,
        "stdout" => init_stdout()?,
        _ => {
            eprintln!("Unknown OTEL_EXPORTER: {}, falling back to stdout", exporter_type);
            init_stdout()?;
        }
    }

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_otlp() -> Result<()> {
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
            opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                service_name,
            )]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .context("Failed to install OTLP pipeline")?;

    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(telemetry)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn init_stdout() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn init_json() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn init_file() -> Result<()> {
    let log_file_path =
        std::env::var("LOG_FILE").unwrap_or_else(|_| format!("{}.log", SERVICE_NAME));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .with_context(|| format!("Failed to open log file: {}", log_file_path))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Arc::new(log_file))
                .with_ansi(false),
        )
        .with(env_filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    eprintln!("Logging to file: {}", log_file_path);

    Ok(())
}

pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
