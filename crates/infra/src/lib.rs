//! Infrastructure layer: configuration, identity store, seed data and
//! Postgres adapters for the activity logs.

pub mod config;
pub mod identity;
pub mod postgres;
pub mod seed;

pub use config::{AppConfig, ConfigError};
pub use identity::{IdentityError, IdentityStore, InMemoryIdentityStore};
pub use postgres::{PostgresAuditStore, PostgresTimelineStore};
pub use seed::{Seed, SeedReport};
