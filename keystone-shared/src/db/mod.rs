/// Database layer for Keystone
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded, reversible schema migrations
///
/// Models are in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
