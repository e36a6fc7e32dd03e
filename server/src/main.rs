// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::http::HeaderName;
use std::net::SocketAddr;
use std::sync::Arc;
use taskdesk_server::{
    AppState,
    auth::SessionKeys,
    clock::{Clock, SystemClock},
    config::{AppConfig, DEVELOPMENT_SESSION_SECRET},
    database, lifecycle,
    mail::{LogMailer, Mailer, Notifier, Outbox, SmtpMailer},
    routes,
};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tower_http::cors::{Any, CorsLayer};

/// Runs the overdue/reminder sweep every `interval_secs`.
fn spawn_sweep_loop(state: AppState, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("In-process sweep disabled; relying on the scheduled trigger.");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs));

        // The first tick completes immediately. Skip it to wait for the first interval.
        interval.tick().await;

        loop {
            interval.tick().await;

            match lifecycle::run_sweep(&state.pool, &state.notifier, state.clock.now()).await {
                Ok(report) => tracing::info!(
                    "Sweep finished: {} tasks marked overdue, {} reminders queued.",
                    report.modified_count,
                    report.reminders_sent
                ),
                Err(e) => tracing::error!("Error during automatic sweep: {:?}", e),
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the server...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if config.session.secret == DEVELOPMENT_SESSION_SECRET {
        tracing::warn!("Using the development session secret. Set APP__SESSION__SECRET in production.");
    }

    let db_pool =
        match database::establish_connection_pool(&config.database.url, config.database.max_connections).await {
            Ok(pool) => {
                tracing::info!("Database connection was made successfully.");
                pool
            }
            Err(e) => {
                tracing::error!("Failed to connect with the database: {:?}", e);
                std::process::exit(1);
            }
        };

    let mailer: Arc<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)),
        None => {
            tracing::warn!("No SMTP relay configured; outgoing mail will only be logged.");
            Arc::new(LogMailer)
        }
    };
    let (outbox, mail_worker) = Outbox::start(mailer);
    let notifier = match Notifier::new(outbox, &config.server.public_url) {
        Ok(notifier) => notifier,
        Err(e) => {
            tracing::error!("Failed to prepare mail templates: {:?}", e);
            std::process::exit(1);
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState {
        pool: db_pool,
        sessions: Arc::new(SessionKeys::new(
            &config.session.secret,
            config.session.ttl_hours,
            config.session.cookie_name.clone(),
        )),
        notifier,
        clock,
        cron_secret: config.cron.secret.clone(),
    };

    let sweep = spawn_sweep_loop(state.clone(), config.cron.interval_secs);

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("authorization"),
        ])
        .allow_origin(Any);

    let app = routes::create_router(state).layer(cors);

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid listen address: {}", e);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("The server listens on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
    }

    // The sweep holds the last notifier outside the router; once it is gone
    // the outbox closes and the worker drains what is left.
    if let Some(sweep) = sweep {
        sweep.abort();
        let _ = sweep.await;
    }
    if let Err(e) = mail_worker.await {
        tracing::error!("Mail worker ended abnormally: {}", e);
    }
    tracing::info!("Server stopped.");
}
