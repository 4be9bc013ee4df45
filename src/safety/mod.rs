//! Safety and cleanup
//!
//! One pipeline per workspace, and nothing of a run left behind once it ends.

pub mod cleanup;
pub mod lock_manager;
pub mod workspace;
