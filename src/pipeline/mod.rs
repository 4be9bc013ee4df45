//! Reduction pipeline
//!
//! INIT -> VALIDATE -> EXTRACT_CRITERIA -> [STATIC_SLICE] -> [DYNAMIC_SLICE] -> [GRAPH_REDUCE]
//! -> STATEMENT_REDUCE -> SAVE -> CLEANUP -> DONE

pub mod orchestrator;
pub mod state;

pub use orchestrator::Orchestrator;
pub use state::{PipelineContext, PipelineState, RunSummary, Stage, StageOutcome};
