/// Middleware modules for the API server
///
/// - Security headers
///
/// Cookie authentication lives in `keystone_shared::auth::middleware` and is
/// wired up in `app`.

pub mod security;
