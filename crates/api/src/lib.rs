//! Mercato API library.
//!
//! The REST API as a library, so the router can be driven in tests and the
//! CLI can share repositories and services.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - Repositories and pool setup
//! - [`models`] - Domain models
//! - [`services`] - Auth, two-factor, cart, checkout, orders
//! - [`middleware`] - Auth extractors, request ids, headers, rate limits
//! - [`routes`] - HTTP handlers and the application router

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
