//! Configuration and validation
//!
//! Run configuration, tool locations, and the startup validation gate.

pub mod loader;
pub mod types;
pub mod validator;
