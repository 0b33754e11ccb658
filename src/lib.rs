//! BookSwap library -- book-swapping web backend.
//!
//! This crate provides the core components for running the BookSwap
//! service: HTTP request handling, hosted-provider sign-in, the book
//! database, pluggable cover image storage, and best-effort remote
//! logging with a console fallback.

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod oidc;
pub mod pages;
pub mod server;
pub mod storage;

use crate::config::Settings;
use crate::db::BookStore;
use crate::logging::AppLogger;
use crate::oidc::OidcClient;
use crate::storage::CoverStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Resolved configuration.
    pub settings: Settings,
    /// Book database.
    pub store: BookStore,
    /// Cover image storage backend (S3 gateway or in-memory).
    pub covers: Arc<dyn CoverStore>,
    /// OAuth2 client for the hosted identity provider.
    pub oidc: OidcClient,
    /// Application logger (remote sink with console fallback).
    pub logger: AppLogger,
}
