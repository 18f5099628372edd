pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod infra;
pub mod logging;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::TokenPairServer;
