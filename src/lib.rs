pub mod auth;
pub mod caption;
pub mod config;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod spotify;
