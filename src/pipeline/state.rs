/// Pipeline state machine types: stages, the state threaded through them, and the run record
use crate::config::types::{Language, PipelineConfig, Result};
use crate::exec::invoker::ToolInvoker;
use crate::safety::cleanup::CleanupReport;
use crate::safety::workspace::Workspace;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Orchestrator states in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Validate,
    ExtractCriteria,
    StaticSlice,
    DynamicSlice,
    GraphReduce,
    StatementReduce,
    Save,
    Cleanup,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Validate => "validate",
            Stage::ExtractCriteria => "extract_criteria",
            Stage::StaticSlice => "static_slice",
            Stage::DynamicSlice => "dynamic_slice",
            Stage::GraphReduce => "graph_reduce",
            Stage::StatementReduce => "statement_reduce",
            Stage::Save => "save",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
        }
    }

    /// Next state for this configuration. Optional states are skipped when disabled;
    /// criterion extraction only runs if some slicing pass is enabled.
    pub fn next(self, config: &PipelineConfig) -> Stage {
        let mut candidate = self.successor();
        while !candidate.enabled(config) {
            candidate = candidate.successor();
        }
        candidate
    }

    fn successor(self) -> Stage {
        match self {
            Stage::Init => Stage::Validate,
            Stage::Validate => Stage::ExtractCriteria,
            Stage::ExtractCriteria => Stage::StaticSlice,
            Stage::StaticSlice => Stage::DynamicSlice,
            Stage::DynamicSlice => Stage::GraphReduce,
            Stage::GraphReduce => Stage::StatementReduce,
            Stage::StatementReduce => Stage::Save,
            Stage::Save => Stage::Cleanup,
            Stage::Cleanup | Stage::Done => Stage::Done,
        }
    }

    pub fn enabled(self, config: &PipelineConfig) -> bool {
        match self {
            Stage::ExtractCriteria => config.slicing_enabled(),
            Stage::StaticSlice => config.static_slice,
            Stage::DynamicSlice => config.dynamic_slice,
            Stage::GraphReduce => config.delta,
            _ => true,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The single "current best" view of the run.
///
/// `failure_line` always indexes a line of the current `source_path`. `language` is fixed at
/// creation; stages replace the state only through [`PipelineState::adopt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineState {
    pub source_path: PathBuf,
    pub failure_line: u32,
    pub language: Language,
    pub program_arguments: String,
}

impl PipelineState {
    pub fn initial(config: &PipelineConfig, language: Language) -> Self {
        Self {
            source_path: config.source_file.clone(),
            failure_line: config.line_number,
            language,
            program_arguments: config.arguments.clone(),
        }
    }

    /// Successor state with a new source and failure line; language and arguments carry over.
    pub fn adopt(&self, source_path: PathBuf, failure_line: u32) -> Self {
        Self {
            source_path,
            failure_line,
            language: self.language,
            program_arguments: self.program_arguments.clone(),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.language.extension()
    }
}

/// Number of lines in a source file
pub fn line_count(path: &Path) -> Result<usize> {
    Ok(fs::read_to_string(path)?.lines().count())
}

/// Everything a stage needs besides the state itself
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub workspace: Workspace,
    pub invoker: Box<dyn ToolInvoker>,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        workspace: Workspace,
        invoker: Box<dyn ToolInvoker>,
    ) -> Self {
        Self {
            config,
            workspace,
            invoker,
        }
    }
}

/// How a state ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Stage finished; no state change expected
    Completed,
    /// Stage produced a new state
    Adopted,
    /// Stage failed; the previous state was kept
    KeptPrevious,
    /// Stage disabled by configuration
    Skipped,
    /// Stage failed and the run cannot complete normally
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub detail: String,
}

/// Per-run record, logged at the end and optionally written as JSON
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub stages: Vec<StageRecord>,
    pub final_state: Option<PipelineState>,
    pub output_path: Option<PathBuf>,
    pub cleanup: Option<CleanupReport>,
}

impl RunSummary {
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: impl Into<String>) {
        let detail = detail.into();
        match outcome {
            StageOutcome::KeptPrevious | StageOutcome::Failed => {
                log::warn!("[{}] {:?}: {}", stage, outcome, detail)
            }
            _ => log::info!("[{}] {:?}: {}", stage, outcome, detail),
        }
        self.stages.push(StageRecord {
            stage,
            outcome,
            detail,
        });
    }

    pub fn outcome_of(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .rev()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
