//! pxe-builder library exports.
//!
//! The binary is a thin clap front end over these modules; integration tests
//! drive [`builder::PxeBuilder`] directly with their own service doubles.

pub mod artifact;
pub mod builder;
pub mod commands;
pub mod common;
pub mod config;
pub mod error;
pub mod preflight;
pub mod process;
pub mod result;
pub mod system;
pub mod timing;
