//! demscout core - domain models, configuration, storage layout and ports
//!
//! This crate holds the types every other demscout crate agrees on: tile
//! records, the working-directory layout, layered configuration and the
//! `RemoteSource` port used to reach the metadata service.

pub mod config;
pub mod error;
pub mod http;
pub mod layout;
pub mod models;
pub mod ports;
pub mod store;

pub use error::{Result, ScrapeError};
