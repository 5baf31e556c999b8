//! Mercato Core - Shared domain types.
//!
//! This crate provides the types used across all Mercato components:
//! - `api` - REST API for browsing, cart, checkout and order administration
//! - `cli` - Command-line tools for migrations, catalog seeding and admin flags
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP. The optional `postgres` feature adds `sqlx` encoding so the
//! same types can be bound directly into queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, money amounts and status vocabularies

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
