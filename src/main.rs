use anyhow::Context;
use sheandsoul::configuration::get_configuration;
use sheandsoul::startup::Application;
use sheandsoul::telemetry::{get_subscriber, init_subscriber, split_by_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber(
        "sheandsoul".into(),
        "info".into(),
        split_by_level(std::io::stderr, std::io::stdout),
    );
    init_subscriber(subscriber);

    log_environment();

    if let Err(e) = start().await {
        tracing::error!(error.cause_chain = ?e, "Failed to start application");
        return Err(e);
    }
    Ok(())
}

async fn start() -> anyhow::Result<()> {
    let configuration = get_configuration().context("Failed to read configuration.")?;
    let application = Application::build(configuration).await?;
    application
        .run_until_stopped()
        .await
        .context("Server terminated with an error.")
}

/// Startup diagnostics. The database URL is never printed.
fn log_environment() {
    let var_or_null = |name: &str| std::env::var(name).unwrap_or_else(|_| "null".into());
    tracing::info!("Starting application...");
    tracing::info!("PORT environment variable: {}", var_or_null("PORT"));
    tracing::info!(
        "DATABASE_URL environment variable: {}",
        if std::env::var_os("DATABASE_URL").is_some() {
            "[REDACTED]"
        } else {
            "null"
        }
    );
    tracing::info!("APP_ENVIRONMENT: {}", var_or_null("APP_ENVIRONMENT"));
}
