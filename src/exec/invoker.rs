/// Blocking invocation of external collaborators
///
/// Every collaborator shares one argument contract: `--name=value` options, booleans as the
/// literal strings `true`/`false`, a positional source path and a trailing `--`. Success is
/// exit code 0; products land at fixed, pre-agreed workspace-relative paths.
use crate::config::loader::locate_program;
use crate::config::types::{PipelineError, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Runs one external program to completion and reports its exit code.
///
/// There is no timeout: a hung collaborator hangs the pipeline.
pub trait ToolInvoker {
    fn invoke(&self, program: &Path, argv: &[String], cwd: &Path) -> Result<i32>;
}

/// Spawns local processes, inheriting stdout/stderr so tool progress stays visible
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, program: &Path, argv: &[String], cwd: &Path) -> Result<i32> {
        if locate_program(program, cwd).is_none() {
            // Known behavior: still attempted, the spawn error is what fails the stage
            warn!("{} was not found, attempting to run it anyway", program.display());
        }

        info!("Executing '{}'...", program.display());
        debug!("argv: {:?} (cwd {})", argv, cwd.display());

        let status = Command::new(program)
            .args(argv)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| {
                PipelineError::Tool(format!("Failed to start {}: {}", program.display(), e))
            })?;

        let code = exit_code(status);
        info!("Execution done ({} exited with {}).", program.display(), code);
        Ok(code)
    }
}

/// Exit code, or 128 + signal number for signal-terminated processes
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Builder for one collaborator invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    loc_line: Option<u32>,
    error_message: Option<String>,
    arguments: Option<String>,
    options: Vec<(String, String)>,
    flags: Vec<(String, bool)>,
    output: Option<String>,
    source: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            loc_line: None,
            error_message: None,
            arguments: None,
            options: Vec::new(),
            flags: Vec::new(),
            output: None,
            source: None,
        }
    }

    pub fn loc_line(mut self, line: u32) -> Self {
        self.loc_line = Some(line);
        self
    }

    pub fn error_message(mut self, message: &str) -> Self {
        self.error_message = Some(message.to_string());
        self
    }

    pub fn arguments(mut self, arguments: &str) -> Self {
        self.arguments = Some(arguments.to_string());
        self
    }

    /// Extra `--name=value` option
    pub fn option(mut self, name: &str, value: impl ToString) -> Self {
        self.options.push((name.to_string(), value.to_string()));
        self
    }

    /// Boolean option rendered as `--name=true` / `--name=false`
    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.flags.push((name.to_string(), value));
        self
    }

    /// Product location, rendered as `-o=<name>`
    pub fn output(mut self, name: &str) -> Self {
        self.output = Some(name.to_string());
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Short display name of the program
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(line) = self.loc_line {
            argv.push(format!("--loc-line={}", line));
        }
        if let Some(message) = &self.error_message {
            argv.push(format!("--error-message={}", message));
        }
        if let Some(arguments) = &self.arguments {
            argv.push(format!("--arguments={}", arguments));
        }
        for (name, value) in &self.options {
            argv.push(format!("--{}={}", name, value));
        }
        for (name, value) in &self.flags {
            argv.push(format!("--{}={}", name, value));
        }
        if let Some(output) = &self.output {
            argv.push(format!("-o={}", output));
        }
        if let Some(source) = &self.source {
            argv.push(source.display().to_string());
        }
        argv.push("--".to_string());
        argv
    }

    pub fn run(&self, invoker: &dyn ToolInvoker, cwd: &Path) -> Result<i32> {
        invoker.invoke(&self.program, &self.argv(), cwd)
    }

    /// Run and turn a nonzero exit into `ToolFailed`
    pub fn run_checked(&self, invoker: &dyn ToolInvoker, cwd: &Path) -> Result<()> {
        match self.run(invoker, cwd)? {
            0 => Ok(()),
            code => Err(PipelineError::ToolFailed {
                tool: self.tool_name(),
                code,
            }),
        }
    }
}
