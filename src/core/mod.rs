//! The core module holds the settings and error types shared by every other module.

pub mod error;
pub mod settings;
