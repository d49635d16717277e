/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh, logout and the current user
/// - `workspaces`: Workspace CRUD, search and membership
///
/// Successful JSON responses share the [`Envelope`] shape.

pub mod auth;
pub mod health;
pub mod workspaces;

use serde::Serialize;

/// Success response body: `{"data": ..., "message": "...", "errors": []}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub message: String,
    pub errors: Vec<serde_json::Value>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}
