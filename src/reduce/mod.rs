//! Reduction stages
//!
//! Graph-minimizing and statement-removal reducers share one contract: the current source,
//! failure line and error signature go in, `temp/autoPieOut.<ext>` comes out. The product
//! is adopted only on exit code 0 with the output present.

use crate::config::types::{PipelineConfig, PipelineError, Result};
use crate::exec::invoker::{ToolCommand, ToolInvoker};
use crate::pipeline::state::{line_count, PipelineState, Stage};
use crate::safety::workspace::Workspace;
use crate::slicing::materialize::{read_adjusted_line, ADJUSTED_LINE_FILE};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

/// Directory the reducers write into
pub const REDUCER_OUTPUT_DIR: &str = "temp";
/// Reducer product, without extension
pub const REDUCER_OUTPUT_STEM: &str = "autoPieOut";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReductionKind {
    /// Dependency-graph guided minimization
    Graph,
    /// Candidate-statement deletion with an acceptance ratio
    Statement,
}

impl ReductionKind {
    pub fn stage(self) -> Stage {
        match self {
            ReductionKind::Graph => Stage::GraphReduce,
            ReductionKind::Statement => Stage::StatementReduce,
        }
    }

    fn product_prefix(self) -> &'static str {
        match self {
            ReductionKind::Graph => "graph",
            ReductionKind::Statement => "statement",
        }
    }
}

/// Raw result of one reducer invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReductionOutcome {
    pub exit_code: i32,
    pub output_path: Option<PathBuf>,
}

impl ReductionOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.output_path.as_ref().map_or(false, |p| p.is_file())
    }
}

pub struct ReductionStage<'a> {
    kind: ReductionKind,
    config: &'a PipelineConfig,
}

impl<'a> ReductionStage<'a> {
    pub fn new(kind: ReductionKind, config: &'a PipelineConfig) -> Self {
        Self { kind, config }
    }

    pub fn command(&self, state: &PipelineState) -> ToolCommand {
        let config = self.config;
        let program = match self.kind {
            ReductionKind::Graph => &config.tools.graph_reducer,
            ReductionKind::Statement => &config.tools.statement_reducer,
        };

        let mut command = ToolCommand::new(program)
            .loc_line(state.failure_line)
            .error_message(&config.error_message)
            .arguments(&state.program_arguments);
        if self.kind == ReductionKind::Statement {
            command = command.option("ratio", config.reduction_ratio);
        }
        command
            .flag("dump-dot", config.dump_dot)
            .flag("verbose", config.verbose)
            .flag("log", config.log)
            .source(&state.source_path)
    }

    /// Run the reducer once and report what it left behind
    pub fn invoke(
        &self,
        state: &PipelineState,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<ReductionOutcome> {
        let stage = self.kind.stage();
        workspace.create_dir(REDUCER_OUTPUT_DIR, stage)?;
        let output = workspace.prepare_output(
            &format!("{}/{}.{}", REDUCER_OUTPUT_DIR, REDUCER_OUTPUT_STEM, state.extension()),
            stage,
        )?;
        workspace.prepare_output(ADJUSTED_LINE_FILE, stage)?;

        let exit_code = self.command(state).run(invoker, workspace.root())?;
        Ok(ReductionOutcome {
            exit_code,
            output_path: output.is_file().then_some(output),
        })
    }

    /// Reduce and adopt the product. An error leaves `state` as it was.
    pub fn reduce(
        &self,
        state: &PipelineState,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<PipelineState> {
        let command = self.command(state);
        let outcome = self.invoke(state, workspace, invoker)?;

        let output = match outcome.output_path.clone() {
            Some(path) if outcome.succeeded() => path,
            _ if outcome.exit_code != 0 => {
                return Err(PipelineError::ToolFailed {
                    tool: command.tool_name(),
                    code: outcome.exit_code,
                })
            }
            _ => {
                return Err(PipelineError::Tool(format!(
                    "{} exited normally but wrote no {}.{}",
                    command.tool_name(),
                    REDUCER_OUTPUT_STEM,
                    state.extension()
                )))
            }
        };

        let stage = self.kind.stage();
        let product_name =
            format!("{}_reduced.{}", self.kind.product_prefix(), state.extension());
        let product = workspace.copy_in(&output, &product_name, stage)?;

        let lines = line_count(&product)? as u32;
        if lines == 0 {
            return Err(PipelineError::Tool(format!(
                "{} produced an empty file",
                command.tool_name()
            )));
        }

        let line = match read_adjusted_line(&workspace.path(ADJUSTED_LINE_FILE)) {
            Some(line) => line,
            None => state.failure_line,
        };
        let clamped = line.min(lines);
        if clamped != line {
            warn!(
                "Failure line {} clamped to {} (reduced file has {} lines)",
                line, clamped, lines
            );
        }

        info!("Reduced source {} ({} lines)", product.display(), lines);
        Ok(state.adopt(product, clamped))
    }
}
