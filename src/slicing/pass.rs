/// Static and dynamic slicing passes
///
/// A pass slices the current source once per criterion, maps every raw slice back to the
/// current source numbering, unifies the slices and materializes the result.
use crate::config::types::{PipelineConfig, PipelineError, Result, SliceBackend};
use crate::exec::container::ContainerSliceAdapter;
use crate::exec::invoker::{ToolCommand, ToolInvoker};
use crate::pipeline::state::{PipelineState, Stage};
use crate::safety::workspace::Workspace;
use crate::slicing::criteria::Criterion;
use crate::slicing::inject::{instrument_text, ArgumentInjector, Injection};
use crate::slicing::materialize::SliceMaterializer;
use crate::slicing::unify::{read_slice, unify, write_slice, UNIFICATION_FILE};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw slicer product: one retained line number per line
pub const SLICE_LINES_FILE: &str = "slice_lines.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    Static,
    Dynamic,
}

impl SliceKind {
    pub fn stage(self) -> Stage {
        match self {
            SliceKind::Static => Stage::StaticSlice,
            SliceKind::Dynamic => Stage::DynamicSlice,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            SliceKind::Static => "static",
            SliceKind::Dynamic => "dynamic",
        }
    }
}

pub struct SlicePass<'a> {
    kind: SliceKind,
    config: &'a PipelineConfig,
}

impl<'a> SlicePass<'a> {
    pub fn new(kind: SliceKind, config: &'a PipelineConfig) -> Self {
        Self { kind, config }
    }

    /// Slice, unify and materialize. An error means the pass produced nothing usable
    /// and the caller keeps `state`.
    pub fn run(
        &self,
        state: &PipelineState,
        criteria: &[Criterion],
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<PipelineState> {
        let slices = match self.kind {
            SliceKind::Static => self.slice_static(state, criteria, workspace, invoker)?,
            SliceKind::Dynamic => self.slice_dynamic(state, criteria, workspace, invoker)?,
        };

        let unification = workspace.prepare_output(UNIFICATION_FILE, self.kind.stage())?;
        unify(&slices, &unification)?;

        let product = format!("{}_sliced.{}", self.kind.prefix(), state.extension());
        SliceMaterializer::new(self.config).materialize(
            state,
            &unification,
            workspace,
            invoker,
            self.kind.stage(),
            &product,
        )
    }

    /// One slice file per criterion, in the numbering of `state.source_path`.
    /// A failed criterion is skipped.
    fn slice_static(
        &self,
        state: &PipelineState,
        criteria: &[Criterion],
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<Vec<PathBuf>> {
        let stage = self.kind.stage();
        let injector = ArgumentInjector::new(&state.program_arguments);
        let mut slices = Vec::new();

        for (i, criterion) in criteria.iter().enumerate() {
            info!("Running static slicing with the criterion '{}'...", criterion);

            let scratch = workspace.prepare_output(
                &format!("static_input_{}.{}", i, state.extension()),
                stage,
            )?;
            fs::copy(&state.source_path, &scratch)?;

            let mut injection: Option<Injection> = None;
            if self.config.inject && !injector.is_empty() {
                match injector.inject_file(&scratch, state.language) {
                    Ok(done) => injection = Some(done),
                    Err(e) => warn!("Argument injection skipped: {}", e),
                }
            }
            let effective = match &injection {
                Some(done) => done.shift_criterion(criterion),
                None => criterion.clone(),
            };

            let raw = match self.invoke_slicer(&scratch, &effective, "", workspace, invoker) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Static slicing of '{}' failed: {}", criterion, e);
                    continue;
                }
            };

            let mut lines = read_slice(&raw)?;
            if let Some(done) = &injection {
                lines = done.restore(&lines);
            }
            slices.push(self.store_slice(i, &lines, workspace)?);
        }

        Ok(slices)
    }

    fn slice_dynamic(
        &self,
        state: &PipelineState,
        criteria: &[Criterion],
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<Vec<PathBuf>> {
        let stage = self.kind.stage();
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        // One instrumented copy shared by every criterion of the pass
        let source = fs::read_to_string(&state.source_path)?;
        let (text, instrumentation) =
            instrument_text(&source, state.language, state.failure_line, criteria)?;
        let instrumented =
            workspace.prepare_output(&format!("dynamic_input.{}", state.extension()), stage)?;
        fs::write(&instrumented, text)?;

        let mut slices = Vec::new();
        for (i, criterion) in instrumentation.criteria(criteria).iter().enumerate() {
            info!("Running dynamic slicing with the criterion '{}'...", criterion);

            let raw = match self.invoke_slicer(
                &instrumented,
                criterion,
                &state.program_arguments,
                workspace,
                invoker,
            ) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Dynamic slicing of '{}' failed: {}", criterion, e);
                    continue;
                }
            };

            let lines = instrumentation.restore(&read_slice(&raw)?);
            slices.push(self.store_slice(i, &lines, workspace)?);
        }

        Ok(slices)
    }

    /// Run the configured slicer; returns the workspace path of the raw result.
    fn invoke_slicer(
        &self,
        input: &Path,
        criterion: &Criterion,
        arguments: &str,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
    ) -> Result<PathBuf> {
        let stage = self.kind.stage();
        let tools = &self.config.tools;

        match self.config.slicer_backend {
            SliceBackend::Container => {
                let spec = match self.kind {
                    SliceKind::Static => &tools.static_container,
                    SliceKind::Dynamic => &tools.dynamic_container,
                };
                ContainerSliceAdapter::new(&tools.container_runtime, spec)
                    .slice(workspace, invoker, input, criterion, arguments, stage)
            }
            SliceBackend::Local => {
                let raw = workspace.prepare_output(SLICE_LINES_FILE, stage)?;
                let program = match self.kind {
                    SliceKind::Static => &tools.static_slicer,
                    SliceKind::Dynamic => &tools.dynamic_slicer,
                };

                let mut command = ToolCommand::new(program)
                    .loc_line(criterion.line)
                    .option("criterion", criterion);
                if self.kind == SliceKind::Dynamic {
                    command = command.arguments(arguments);
                }
                command
                    .flag("verbose", self.config.verbose)
                    .flag("log", self.config.log)
                    .output(SLICE_LINES_FILE)
                    .source(input)
                    .run_checked(invoker, workspace.root())?;

                if !raw.is_file() {
                    return Err(PipelineError::Tool(format!(
                        "{} produced no {}",
                        program.display(),
                        SLICE_LINES_FILE
                    )));
                }
                Ok(raw)
            }
        }
    }

    fn store_slice(
        &self,
        index: usize,
        lines: &[u32],
        workspace: &mut Workspace,
    ) -> Result<PathBuf> {
        let path = workspace.prepare_output(
            &format!("{}_slice_{}.txt", self.kind.prefix(), index),
            self.kind.stage(),
        )?;
        write_slice(&path, lines)?;
        Ok(path)
    }
}
