use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    body::BoxBody,
    routing::{get, patch, post, IntoMakeService},
    Router,
};
use hyper::{server::conn::AddrIncoming, Body, Request, Response};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_request_id::RequestIdLayer;
use tracing::Span;

use crate::configuration::{DatabaseSettings, Settings};
use crate::email_client::EmailClient;
use crate::otp_email::EmailService;
use crate::otp_service::{spawn_otp_cleanup, OtpService};
use crate::routes::{health_check, patch_basic_info, resend_otp, verify_email};
use crate::store::{OtpStore, PostgresStore, ProfileStore, UserStore};
use crate::telemetry::{record_response, request_span};
use crate::utils::{handler_404, shutdown_signal};

type Server = axum::Server<AddrIncoming, IntoMakeService<Router>>;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub otp_service: Arc<OtpService>,
}

/// The persistence backends the application runs against.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub otps: Arc<dyn OtpStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            users: store.clone(),
            profiles: store.clone(),
            otps: store,
        }
    }
}

pub struct Application {
    port: u16,
    server: Server,
    otp_service: Arc<OtpService>,
    otp_cleanup_interval: Duration,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database)
            .context("Invalid database configuration.")?;
        Self::build_with_stores(configuration, Stores::postgres(connection_pool))
    }

    pub fn build_with_stores(
        configuration: Settings,
        stores: Stores,
    ) -> Result<Self, anyhow::Error> {
        let sender_email = configuration
            .email_client
            .sender()
            .map_err(anyhow::Error::msg)
            .context("Invalid sender email address.")?;
        let base_url = reqwest::Url::parse(&configuration.email_client.base_url)
            .context("Failed to parse the email API base URL.")?;
        let timeout = configuration.email_client.timeout();

        let email_client = EmailClient::new(
            base_url,
            sender_email,
            configuration.email_client.authorization_token,
            timeout,
        )
        .context("Failed to build the email HTTP client.")?;

        let otp_service = Arc::new(OtpService::new(
            Arc::clone(&stores.users),
            stores.otps,
            EmailService::new(email_client),
        ));

        let address = format!(
            "{}:{}",
            configuration.application.host,
            configuration.application.port
        );
        let listener = TcpListener::bind(&address)
            .with_context(|| format!("Failed to bind {}", address))?;
        let port = listener.local_addr()?.port();
        tracing::info!(
            mode = %configuration.application.mode,
            "Listening on {}:{}",
            configuration.application.host,
            port
        );

        let state = AppState {
            users: stores.users,
            profiles: stores.profiles,
            otp_service: Arc::clone(&otp_service),
        };
        let server = run(listener, state)?;

        Ok(Self {
            port,
            server,
            otp_service,
            otp_cleanup_interval: configuration.application.otp_cleanup_interval(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Logs the startup banner, starts the OTP cleanup task and serves until
    /// a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> Result<(), hyper::Error> {
        log_startup_banner(self.port);
        let cleanup = spawn_otp_cleanup(self.otp_service, self.otp_cleanup_interval);
        let outcome = self.server.with_graceful_shutdown(shutdown_signal()).await;
        cleanup.abort();
        outcome
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    Ok(PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db()?))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/actuator/health", get(health_check))
        .route("/api/profile/basic", patch(patch_basic_info))
        .route("/api/resend-otp", post(resend_otp))
        .route("/api/verify-email", post(verify_email))
        .fallback(handler_404)
        .layer(
            ServiceBuilder::new().layer(RequestIdLayer).layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request<Body>| request_span(request))
                    .on_response(
                        |response: &Response<BoxBody>, latency: Duration, span: &Span| {
                            record_response(response, latency, span)
                        },
                    ),
            ),
        )
        .with_state(state)
}

fn run(listener: TcpListener, state: AppState) -> Result<Server, anyhow::Error> {
    let server = axum::Server::from_tcp(listener)
        .context("Failed to serve from the bound listener.")?
        .serve(router(state).into_make_service());
    Ok(server)
}

pub fn health_check_url(port: u16) -> String {
    format!("http://localhost:{}/actuator/health", port)
}

pub fn startup_banner(port: u16) -> Vec<String> {
    let separator = "========================================".to_string();
    vec![
        separator.clone(),
        "Application Started Successfully!".to_string(),
        format!("Server is running on port: {}", port),
        format!("Health check endpoint: {}", health_check_url(port)),
        separator,
    ]
}

fn log_startup_banner(port: u16) {
    for line in startup_banner(port) {
        tracing::info!("{}", line);
    }
}
