//! FileJump FUSE filesystem library
//!
//! This library exposes the internal modules for testing purposes

pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod filejump_service;
pub mod fuse;
pub mod index;
pub mod log_appender;
