use std::time::Duration;

use hyper::{Body, http::Request, Response};
use tokio::task::JoinHandle;
use tower_request_id::RequestId;
use tracing::subscriber::set_global_default;
use tracing::{Level, Span, Subscriber};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Bunyan-formatted JSON subscriber. `RUST_LOG` wins over `env_filter`.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter));
    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Sends WARN and ERROR records to `errors`, everything else to `rest`.
/// The binary uses `split_by_level(std::io::stderr, std::io::stdout)`.
pub fn split_by_level<E, R>(
    errors: E,
    rest: R,
) -> impl for<'a> MakeWriter<'a> + Send + Sync + 'static
where
    E: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    R: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    errors.with_max_level(Level::WARN).or_else(rest)
}

/// Installs the subscriber process-wide and routes `log` records into it.
/// Must be called at most once.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    LogTracer::init().expect("Failed to set logger.");
    set_global_default(subscriber).expect("Failed to set subscriber.");
}

/// Span for one HTTP request. The query string is left out because it can
/// carry email addresses.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".into());
    tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

pub fn record_response<B>(response: &Response<B>, latency: Duration, span: &Span) {
    span.record("status", response.status().as_u16());
    span.record("latency_ms", latency.as_millis() as u64);
    if response.status().is_server_error() {
        tracing::error!(parent: span, "request failed");
    } else {
        tracing::info!(parent: span, "request completed");
    }
}

pub fn spawn_blocking_with_tracing<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = tracing::Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}
