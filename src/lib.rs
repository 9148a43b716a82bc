pub mod acquire;
pub mod config;
pub mod environment;
pub mod error;
pub mod harness;
pub mod manifest;
pub mod runner;
pub mod settings;
