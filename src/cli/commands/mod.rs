//! Command handlers
//!
//! Each handler is synchronous and owns its Tokio runtime; `main` only parses
//! arguments and dispatches.

pub mod cache;
pub mod config;
pub mod export;
pub mod generate;
pub mod projects;
pub mod research;
pub mod serve;
pub mod slides;
pub mod workshop;
