pub mod client;
pub mod config;
pub mod error;
pub mod notice;
pub mod refresh;
pub mod state;
