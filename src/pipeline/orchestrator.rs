/// Orchestrator: runs the stage sequence over one pipeline state.
///
/// Every stage either returns a new state or the previous one; nothing but validation and
/// workspace acquisition ends a run early. The workspace is released on every exit path,
/// including unwinding.
use crate::config::types::{PipelineConfig, PipelineError, Result};
use crate::config::validator::validate_config;
use crate::exec::invoker::ToolInvoker;
use crate::pipeline::state::{PipelineContext, PipelineState, RunSummary, Stage, StageOutcome};
use crate::reduce::{ReductionKind, ReductionStage};
use crate::safety::workspace::Workspace;
use crate::slicing::criteria::{Criterion, CriterionExtractor};
use crate::slicing::pass::{SliceKind, SlicePass};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Optional states, recorded as skipped when disabled
const OPTIONAL_STAGES: [Stage; 4] = [
    Stage::ExtractCriteria,
    Stage::StaticSlice,
    Stage::DynamicSlice,
    Stage::GraphReduce,
];

pub struct Orchestrator {
    config: PipelineConfig,
    base_dir: PathBuf,
    invoker: Box<dyn ToolInvoker>,
}

impl Orchestrator {
    /// Relative paths in `config` are taken relative to `base_dir`
    pub fn new(
        config: PipelineConfig,
        base_dir: impl Into<PathBuf>,
        invoker: Box<dyn ToolInvoker>,
    ) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            invoker,
        }
    }

    /// Run the whole pipeline.
    ///
    /// `Err` only for a failed validation or an unavailable workspace, both before any
    /// artifact exists. A failed save is reported through `RunSummary::output_path`.
    pub fn run(self) -> Result<RunSummary> {
        let Orchestrator {
            mut config,
            base_dir,
            invoker,
        } = self;
        let mut summary = RunSummary::default();

        // INIT
        absolutize(&mut config, &base_dir);
        config.tools.resolve(&base_dir);
        summary.record(
            Stage::Init,
            StageOutcome::Completed,
            format!("{} line {}", config.source_file.display(), config.line_number),
        );

        // VALIDATE (hard gate)
        info!("Validating the configuration...");
        let language = validate_config(&config, &base_dir)?;
        config.source_file = config.source_file.canonicalize()?;
        summary.record(Stage::Validate, StageOutcome::Completed, format!("language {}", language));

        let workspace = Workspace::acquire(&config.work_dir)?;
        summary.run_id = workspace.run_id().to_string();
        let mut ctx = PipelineContext::new(config, workspace, invoker);

        for stage in OPTIONAL_STAGES {
            if !stage.enabled(&ctx.config) {
                summary.record(stage, StageOutcome::Skipped, "disabled");
            }
        }

        let mut state = PipelineState::initial(&ctx.config, language);
        let mut criteria: Vec<Criterion> = Vec::new();
        let mut stage = Stage::Validate.next(&ctx.config);
        while stage != Stage::Save {
            state = execute_stage(stage, state, &mut criteria, &mut ctx, &mut summary);
            stage = stage.next(&ctx.config);
        }

        // SAVE
        summary.output_path = save(&state, &ctx.config, &mut summary);
        summary.final_state = Some(state);

        // CLEANUP
        let report = ctx.workspace.release();
        summary.record(
            Stage::Cleanup,
            StageOutcome::Completed,
            format!(
                "{} removed, {} already gone, {} failed",
                report.removed,
                report.already_gone,
                report.failed.len()
            ),
        );
        summary.cleanup = Some(report);
        summary.record(Stage::Done, StageOutcome::Completed, "");

        if let Ok(json) = serde_json::to_string(&summary) {
            debug!("Run summary: {}", json);
        }
        Ok(summary)
    }
}

/// Anchor relative input, workspace and output paths at the invocation directory.
/// Collaborators run inside the workspace, so nothing may stay relative.
fn absolutize(config: &mut PipelineConfig, base_dir: &Path) {
    let anchor = |path: &Path| -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    };
    config.source_file = anchor(&config.source_file);
    config.work_dir = anchor(&config.work_dir);
    config.output_file = Some(anchor(&config.resolved_output_file()));
}

/// One state transition. Failures are recorded and the incoming state is returned.
fn execute_stage(
    stage: Stage,
    state: PipelineState,
    criteria: &mut Vec<Criterion>,
    ctx: &mut PipelineContext,
    summary: &mut RunSummary,
) -> PipelineState {
    info!("== {} ({} line {}) ==", stage, state.source_path.display(), state.failure_line);

    match stage {
        Stage::ExtractCriteria => {
            *criteria = CriterionExtractor::new(&ctx.config).extract(
                &state,
                &mut ctx.workspace,
                ctx.invoker.as_ref(),
            );
            let listed: Vec<String> = criteria.iter().map(Criterion::to_string).collect();
            summary.record(
                stage,
                StageOutcome::Completed,
                format!("{} criteria [{}]", criteria.len(), listed.join(", ")),
            );
            state
        }
        Stage::StaticSlice | Stage::DynamicSlice => {
            if criteria.is_empty() {
                summary.record(stage, StageOutcome::KeptPrevious, "no criteria");
                return state;
            }
            let kind = if stage == Stage::StaticSlice {
                SliceKind::Static
            } else {
                SliceKind::Dynamic
            };
            let result = SlicePass::new(kind, &ctx.config).run(
                &state,
                criteria,
                &mut ctx.workspace,
                ctx.invoker.as_ref(),
            );
            adopt_or_keep(stage, state, result, summary)
        }
        Stage::GraphReduce | Stage::StatementReduce => {
            let kind = if stage == Stage::GraphReduce {
                ReductionKind::Graph
            } else {
                ReductionKind::Statement
            };
            let result = ReductionStage::new(kind, &ctx.config).reduce(
                &state,
                &mut ctx.workspace,
                ctx.invoker.as_ref(),
            );
            adopt_or_keep(stage, state, result, summary)
        }
        _ => state,
    }
}

fn adopt_or_keep(
    stage: Stage,
    previous: PipelineState,
    result: Result<PipelineState>,
    summary: &mut RunSummary,
) -> PipelineState {
    match result {
        Ok(next) => {
            summary.record(
                stage,
                StageOutcome::Adopted,
                format!("{} line {}", next.source_path.display(), next.failure_line),
            );
            next
        }
        Err(e) => {
            summary.record(stage, StageOutcome::KeptPrevious, e.to_string());
            previous
        }
    }
}

/// Copy the best source to the output location, falling back to the original input.
fn save(
    state: &PipelineState,
    config: &PipelineConfig,
    summary: &mut RunSummary,
) -> Option<PathBuf> {
    let output = config.resolved_output_file();

    match save_first_usable(&[&state.source_path, &config.source_file], &output) {
        Ok(source) => {
            summary.record(
                Stage::Save,
                StageOutcome::Completed,
                format!("{} -> {}", source.display(), output.display()),
            );
            Some(output)
        }
        Err(e) => {
            error!("The result variant could not be saved.");
            summary.record(Stage::Save, StageOutcome::Failed, e.to_string());
            None
        }
    }
}

fn save_first_usable(candidates: &[&Path], output: &Path) -> Result<PathBuf> {
    let mut problems = Vec::new();
    for candidate in candidates {
        let usable = fs::metadata(candidate).map(|m| m.is_file() && m.len() > 0).unwrap_or(false);
        if !usable {
            problems.push(format!("{} is missing or empty", candidate.display()));
            continue;
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                problems.push(format!("{}: {}", parent.display(), e));
                continue;
            }
        }
        match fs::copy(candidate, output) {
            Ok(_) => return Ok(candidate.to_path_buf()),
            Err(e) => problems.push(format!(
                "{} -> {}: {}",
                candidate.display(),
                output.display(),
                e
            )),
        }
    }
    Err(PipelineError::Save(problems.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("example.c");
        fs::write(&original, "int main() {}\n").unwrap();
        let empty = dir.path().join("statement_reduced.c");
        fs::write(&empty, "").unwrap();
        let output = dir.path().join("out/example_reduced.c");

        let used = save_first_usable(&[&empty, &original], &output).unwrap();
        assert_eq!(used, original);
        assert_eq!(fs::read_to_string(&output).unwrap(), "int main() {}\n");
    }

    #[test]
    fn test_save_fails_without_any_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.c");
        let err = save_first_usable(&[&missing], &dir.path().join("out.c")).unwrap_err();
        assert!(matches!(err, PipelineError::Save(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_absolutize_anchors_relative_paths() {
        let mut config = PipelineConfig::new("src/example.c", 4);
        absolutize(&mut config, Path::new("/home/user"));
        assert_eq!(config.source_file, PathBuf::from("/home/user/src/example.c"));
        assert_eq!(config.work_dir, PathBuf::from("/home/user/.autopie"));
        assert_eq!(
            config.output_file,
            Some(PathBuf::from("/home/user/example_reduced.c"))
        );
    }
}
