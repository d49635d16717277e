//! # Keystone API Server
//!
//! HTTP server for cookie-based JWT authentication and workspaces.
//!
//! ## Module Organization
//!
//! - `app`: Shared state and router
//! - `cli`: `keystone serve` / `keystone migrate`
//! - `config`: Environment configuration
//! - `error`: HTTP error mapping
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
