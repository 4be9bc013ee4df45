//! autopie: automated reduction of failing C/C++ programs
//! Slices a failing program around its failure site, then minimizes it with external
//! reducers, keeping one consistent "current best source + failure line" throughout.
//!
//! # Architecture
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Run configuration, tool locations and the error enum
//! - [`config::loader`]: Tool location loading and program lookup
//! - [`config::validator`]: Startup validation gate
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::cleanup`]: Artifact ledger with best-effort removal
//! - [`safety::lock_manager`]: One pipeline per workspace
//! - [`safety::workspace`]: Scoped workspace acquisition and release
//!
//! ## Execution ([`exec`])
//! - [`exec::invoker`]: Blocking tool invocation and the shared argument contract
//! - [`exec::container`]: Container-hosted slicers
//!
//! ## Slicing ([`slicing`])
//! - [`slicing::criteria`]: Criterion extraction at the failure site
//! - [`slicing::pass`]: Static and dynamic slicing passes
//! - [`slicing::entry`]: Structural entry-point location
//! - [`slicing::inject`]: Argument injection and dynamic instrumentation
//! - [`slicing::shift`]: Line-shift compensation
//! - [`slicing::unify`]: Slice unification
//! - [`slicing::materialize`]: Sliced source extraction
//!
//! ## Reduction ([`reduce`])
//! Graph-minimizing and statement-removal stages.
//!
//! ## Pipeline ([`pipeline`])
//! - [`pipeline::state`]: Stages, pipeline state and run summary
//! - [`pipeline::orchestrator`]: The state machine
//!
//! # Design Principles
//!
//! 1. **Fallback over abort** - a failed stage keeps the previous state
//! 2. **Register before create** - every artifact is known before the call that makes it
//! 3. **Line numbers follow the source** - every rewrite is undone on the way back

// Configuration
pub mod config;

// Safety & Cleanup
pub mod safety;

// External tools
pub mod exec;

// Slicing
pub mod slicing;

// Reduction
pub mod reduce;

// Pipeline
pub mod pipeline;

// CLI entrypoint
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use pipeline::{Orchestrator, PipelineState, RunSummary, Stage};
