/// Slicing criteria and their extraction at the failure site
use crate::config::types::{PipelineConfig, PipelineError, Result};
use crate::exec::invoker::{ToolCommand, ToolInvoker};
use crate::pipeline::state::{PipelineState, Stage};
use crate::safety::workspace::Workspace;
use log::{info, warn};
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Output of the variable extractor
pub const CRITERIA_FILE: &str = "criteria.txt";

/// A `(line, variable)` pair whose value a slicer must preserve
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Criterion {
    pub line: u32,
    pub variable: String,
}

impl Criterion {
    pub fn new(line: u32, variable: impl Into<String>) -> Self {
        Self {
            line,
            variable: variable.into(),
        }
    }

    /// Same variable, different line
    pub fn at_line(&self, line: u32) -> Self {
        Self::new(line, self.variable.clone())
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.variable)
    }
}

impl FromStr for Criterion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PipelineError::Tool(format!("invalid criterion '{}'", s));
        let (line, variable) = s.trim().split_once(':').ok_or_else(invalid)?;
        let line: u32 = line.trim().parse().map_err(|_| invalid())?;
        let variable = variable.trim();
        let is_identifier = variable
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && variable.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if line == 0 || !is_identifier {
            return Err(invalid());
        }
        Ok(Criterion::new(line, variable))
    }
}

/// Parse newline-delimited `line:variable` tokens. Blank and malformed lines are skipped.
pub fn parse_criteria(content: &str) -> Vec<Criterion> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match l.parse::<Criterion>() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Ignoring extractor output: {}", e);
                None
            }
        })
        .collect()
}

pub struct CriterionExtractor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> CriterionExtractor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, state: &PipelineState) -> ToolCommand {
        ToolCommand::new(&self.config.tools.variable_extractor)
            .loc_line(state.failure_line)
            .flag("verbose", self.config.verbose)
            .flag("log", self.config.log)
            .output(CRITERIA_FILE)
            .source(&state.source_path)
    }

    /// Criteria live at the failure site. Any failure yields an empty list so the
    /// slicing passes become no-ops.
    pub fn extract(
        &self,
        state: &PipelineState,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Vec<Criterion> {
        info!("Extracting variables...");
        match self.try_extract(state, workspace, invoker) {
            Ok(criteria) => {
                info!("Extracted {} criteria", criteria.len());
                criteria
            }
            Err(e) => {
                warn!("Variable extraction failed: {}", e);
                Vec::new()
            }
        }
    }

    fn try_extract(
        &self,
        state: &PipelineState,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<Vec<Criterion>> {
        let output = workspace.prepare_output(CRITERIA_FILE, Stage::ExtractCriteria)?;
        self.command(state).run_checked(invoker, workspace.root())?;
        let content = fs::read_to_string(&output)?;
        Ok(parse_criteria(&content))
    }
}
