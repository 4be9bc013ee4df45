/// Container-hosted slicers
///
/// Stages the input into a host directory bound into the image, runs the image's
/// compile -> slice -> map-to-source chain, waits for the container, then moves the
/// result into the workspace and removes the container.
use crate::config::types::{ContainerSpec, PipelineError, Result};
use crate::exec::invoker::ToolInvoker;
use crate::pipeline::state::Stage;
use crate::safety::workspace::Workspace;
use crate::slicing::criteria::Criterion;
use crate::slicing::pass::SLICE_LINES_FILE;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct ContainerSliceAdapter<'a> {
    runtime: &'a Path,
    spec: &'a ContainerSpec,
}

impl<'a> ContainerSliceAdapter<'a> {
    pub fn new(runtime: &'a Path, spec: &'a ContainerSpec) -> Self {
        Self { runtime, spec }
    }

    /// Fill the command template for one input file and criterion
    pub fn render_command(
        &self,
        file_name: &str,
        criterion: &Criterion,
        arguments: &str,
    ) -> String {
        let stem = file_name.split('.').next().unwrap_or(file_name);
        self.spec
            .command_template
            .replace("{file}", file_name)
            .replace("{stem}", stem)
            .replace("{criterion_line}", &criterion.line.to_string())
            .replace("{criterion}", &criterion.to_string())
            .replace("{arguments}", &arguments.replace('\'', "'\\''"))
            .replace("{output}", SLICE_LINES_FILE)
    }

    /// Container runtime argv for one run
    pub fn run_argv(&self, container_name: &str, mount: &Path, command: String) -> Vec<String> {
        vec![
            "run".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            "-v".to_string(),
            format!("{}:{}:rw", mount.display(), self.spec.mount_point),
            self.spec.image.clone(),
            "/bin/bash".to_string(),
            "-c".to_string(),
            command,
        ]
    }

    /// Slice `input` for `criterion`. Returns the workspace path of the moved result file.
    pub fn slice(
        &self,
        workspace: &mut Workspace,
        invoker: &dyn ToolInvoker,
        input: &Path,
        criterion: &Criterion,
        arguments: &str,
        owner: Stage,
    ) -> Result<PathBuf> {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                PipelineError::Container(format!("bad input path {}", input.display()))
            })?;

        info!("Copying the input file to the shared medium...");
        let mount = workspace.create_dir(&self.spec.mount_dir, owner)?;
        workspace.copy_in(input, &format!("{}/{}", self.spec.mount_dir, file_name), owner)?;
        let produced = workspace
            .prepare_output(&format!("{}/{}", self.spec.mount_dir, SLICE_LINES_FILE), owner)?;
        workspace.prepare_output(SLICE_LINES_FILE, owner)?;

        let container_name = format!("autopie-{}", Uuid::new_v4());
        let command = self.render_command(&file_name, criterion, arguments);
        debug!("Container command: {}", command);

        info!("Running {} as {}...", self.spec.image, container_name);
        let status = invoker.invoke(
            self.runtime,
            &self.run_argv(&container_name, &mount, command),
            workspace.root(),
        );

        // The container is removed on every path, including a failed run.
        let rm = ["rm".to_string(), "-f".to_string(), container_name.clone()];
        match invoker.invoke(self.runtime, &rm, workspace.root()) {
            Ok(0) => debug!("Removed container {}", container_name),
            Ok(code) => warn!("Removing container {} exited with {}", container_name, code),
            Err(e) => warn!("Failed to remove container {}: {}", container_name, e),
        }

        match status? {
            0 => {}
            code => {
                return Err(PipelineError::ToolFailed {
                    tool: self.spec.image.clone(),
                    code,
                })
            }
        }

        if !produced.is_file() {
            return Err(PipelineError::Container(format!(
                "{} produced no {}",
                self.spec.image, SLICE_LINES_FILE
            )));
        }

        info!("Container exited, retrieving slice");
        workspace.move_in(&produced, SLICE_LINES_FILE, owner)
    }
}
