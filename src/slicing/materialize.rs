/// Turns a unified slice into a smaller source file and an adjusted failure line
use crate::config::types::{PipelineConfig, PipelineError, Result};
use crate::exec::invoker::{ToolCommand, ToolInvoker};
use crate::pipeline::state::{line_count, PipelineState, Stage};
use crate::safety::workspace::Workspace;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Slice extractor product, without extension
pub const SLICE_OUTPUT_STEM: &str = "slice";
/// Failure line in the extracted source, written next to it by the extractor or reducers
pub const ADJUSTED_LINE_FILE: &str = "adjustedLineNumber.txt";

/// Read a single decimal line number; `None` if missing or not numeric.
pub fn read_adjusted_line(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    let value = content.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok().filter(|&n: &u32| n > 0)
}

pub struct SliceMaterializer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> SliceMaterializer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, state: &PipelineState, unification: &Path) -> ToolCommand {
        ToolCommand::new(&self.config.tools.slice_extractor)
            .loc_line(state.failure_line)
            .option("slice-file", unification.display())
            .flag("verbose", self.config.verbose)
            .flag("log", self.config.log)
            .output(SLICE_OUTPUT_STEM)
            .source(&state.source_path)
    }

    /// Extract the sliced source and adopt it under `product_name`.
    ///
    /// Errors leave `state` untouched; the caller keeps the previous state.
    pub fn materialize(
        &self,
        state: &PipelineState,
        unification: &Path,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
        owner: Stage,
        product_name: &str,
    ) -> Result<PipelineState> {
        info!("Extracting source code for the unified slice...");

        let produced = workspace.prepare_output(
            &format!("{}.{}", SLICE_OUTPUT_STEM, state.extension()),
            owner,
        )?;
        let adjusted = workspace.prepare_output(ADJUSTED_LINE_FILE, owner)?;

        self.command(state, unification)
            .run_checked(invoker, workspace.root())?;

        let produced_len = fs::metadata(&produced).map(|m| m.len()).unwrap_or(0);
        if produced_len == 0 {
            return Err(PipelineError::Tool(format!(
                "slice extractor produced no {}",
                produced.display()
            )));
        }

        let line = match read_adjusted_line(&adjusted) {
            Some(line) => line,
            None => {
                warn!("No usable {}, keeping line {}", ADJUSTED_LINE_FILE, state.failure_line);
                state.failure_line
            }
        };

        let product = workspace.move_in(&produced, product_name, owner)?;
        let lines = line_count(&product)?;
        if line as usize > lines {
            return Err(PipelineError::Tool(format!(
                "adjusted line {} outside of extracted slice ({} lines)",
                line, lines
            )));
        }

        info!("Sliced source {} ({} lines), failure line {}", product.display(), lines, line);
        Ok(state.adopt(product, line))
    }
}
