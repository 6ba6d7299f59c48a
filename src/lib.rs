// SPDX-License-Identifier: MIT

//! calsync: calendar microservice with Google Calendar synchronization.
//!
//! This crate provides the backend API for storing calendar events and
//! keeping them consistent with each user's Google Calendar, including the
//! OAuth2 credential lifecycle.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{AuthService, CalendarService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth_service: AuthService,
    pub calendar_service: CalendarService,
}
