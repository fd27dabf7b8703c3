// Library exports for Scribe
// This allows integration tests and the binary to share modules

pub mod ability;
pub mod auth;
pub mod cache;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mail;
pub mod posts;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod subscriptions;
pub mod users;
