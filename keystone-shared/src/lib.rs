//! # Keystone Shared Library
//!
//! This crate contains the types, storage access and business rules shared by
//! the Keystone API server and its command line tooling.
//!
//! ## Module Organization
//!
//! - `auth`: JWT tokens, auth cookies, password hashing, request middleware
//!   and workspace authorization
//! - `db`: Connection pool and embedded migrations
//! - `models`: Users, workspaces and workspace memberships
//! - `accounts`: Account creation and superuser bootstrap
//! - `cache`: Optional Redis-backed JSON cache
//! - `search`: Filter/sort/paginate query building

pub mod accounts;
pub mod auth;
pub mod cache;
pub mod db;
pub mod models;
pub mod search;

/// Current version of the Keystone shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
