//! Exchange Core Library
//!
//! Shared types, API clients, and database repositories for the
//! automated spot-trading service.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod types;

pub use error::{Error, Result};
