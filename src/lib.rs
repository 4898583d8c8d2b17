pub mod api;
pub mod client;
pub mod config;
pub mod cors;
pub mod error;
pub mod observability;
pub mod routing;
pub mod state;
pub mod transport;
