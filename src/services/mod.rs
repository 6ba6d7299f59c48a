// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod calendar;
pub mod google_auth;
pub mod google_calendar;

pub use calendar::{CalendarService, SyncSummary};
pub use google_auth::{AuthService, GoogleAuthClient};
pub use google_calendar::GoogleCalendarClient;
