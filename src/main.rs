// SPDX-License-Identifier: MIT

//! calsync API Server
//!
//! Stores calendar events in Firestore and keeps them in sync with each
//! user's Google Calendar via OAuth2.

use calsync::{
    config::Config,
    db::FirestoreDb,
    services::{AuthService, CalendarService, GoogleAuthClient, GoogleCalendarClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting calsync API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let http_timeout = Duration::from_secs(config.http_timeout_secs);

    // OAuth client + credential lifecycle service
    let auth_client = GoogleAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
        http_timeout,
    );
    let auth_service = AuthService::new(auth_client, db.clone());

    // Calendar adapter + synchronization engine
    let calendar_client = GoogleCalendarClient::new(http_timeout);
    let calendar_service = CalendarService::new(
        db.clone(),
        calendar_client,
        auth_service.clone(),
        config.default_calendar_id.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth_service,
        calendar_service,
    });

    // Build router
    let app = calsync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("calsync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
