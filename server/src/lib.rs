// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Department-scoped staff and task management service.

pub mod auth;
pub mod clock;
pub mod config;
pub mod database;
pub mod handlers;
pub mod lifecycle;
pub mod mail;
pub mod policy;
pub mod routes;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::SessionKeys;
use crate::clock::Clock;
use crate::mail::Notifier;

/// Everything a handler needs, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionKeys>,
    pub notifier: Notifier,
    pub clock: Arc<dyn Clock>,
    /// Shared secret of the scheduled trigger. `None` keeps that route closed.
    pub cron_secret: Option<String>,
}
