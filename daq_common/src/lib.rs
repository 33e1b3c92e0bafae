//! DAQ Common Library
//!
//! This crate provides the shared definitions for the DAQ workspace crates:
//! the serial command model, persisted storage layouts, protocol constants,
//! error types and configuration loading.
//!
//! # Module Structure
//!
//! - [`command`] - Parsed command model for the serial protocol
//! - [`config`] - TOML configuration loading and validation
//! - [`consts`] - Protocol and storage constants
//! - [`error`] - Error types shared across the workspace
//! - [`records`] - Persisted byte layouts (ring index, header, data records)

pub mod command;
pub mod config;
pub mod consts;
pub mod error;
pub mod records;
