//! modgate host library
//!
//! This module exports the components of the `modgate` binary for testing purposes.

pub mod assets;
pub mod config;
pub mod console;
pub mod pipeline;
