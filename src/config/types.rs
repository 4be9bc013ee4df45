/// Core types and structures for the reduction pipeline
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source language of the program under reduction.
/// Derived once from the input extension and never changed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "cpp")]
    Cpp,
}

impl Language {
    /// Map a file extension to a language. `C` (upper case) is the classic C++ suffix.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "c" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "c++" | "C" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Extension the collaborators use for files they produce.
    pub fn extension(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    /// Header that declares the process termination call.
    pub fn termination_header(self) -> &'static str {
        match self {
            Language::C => "#include <stdlib.h>",
            Language::Cpp => "#include <cstdlib>",
        }
    }

    /// Unconditional, normal program termination.
    pub fn termination_call(self) -> &'static str {
        match self {
            Language::C => "exit(0);",
            Language::Cpp => "std::exit(0);",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::C => write!(f, "C"),
            Language::Cpp => write!(f, "C++"),
        }
    }
}

/// Which engine hosts the slicers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceBackend {
    /// Local binaries following the shared tool contract
    #[serde(rename = "local")]
    Local,
    /// Slicers packaged in container images
    #[serde(rename = "container")]
    Container,
}

impl std::str::FromStr for SliceBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(SliceBackend::Local),
            "container" | "docker" => Ok(SliceBackend::Container),
            other => Err(format!("unknown slicer backend: {other} (expected local or container)")),
        }
    }
}

/// Container-hosted slicer description.
///
/// The command template is run through `/bin/bash -c` inside the image. Placeholders:
/// `{file}` input file name, `{stem}` file name without extension, `{criterion}` as
/// `line:variable`, `{criterion_line}`, `{arguments}` and `{output}` (result file name).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    /// Directory (relative to the workspace) bound into the container
    pub mount_dir: String,
    /// Mount point inside the container
    pub mount_point: String,
    pub command_template: String,
}

impl ContainerSpec {
    /// dg: compile to bitcode, slice, map the slice back to source lines.
    pub fn dg_static() -> Self {
        Self {
            image: "mchalupa/dg".to_string(),
            mount_dir: "dg-data".to_string(),
            mount_point: "/data-mapped".to_string(),
            command_template: "clang -emit-llvm -c -g /data-mapped/{file} -o _code.bc \
                && /opt/dg/tools/llvm-slicer -c {criterion} _code.bc \
                && /opt/dg/tools/llvm-to-source _code.sliced > /data-mapped/{output}"
                .to_string(),
        }
    }

    /// giri: build a traced binary through its makefile, run it, export the slice locations.
    pub fn giri_dynamic() -> Self {
        let dir = "/giri/test/UnitTests/temp/";
        Self {
            image: "liuml07/giri".to_string(),
            mount_dir: "giri-data".to_string(),
            mount_point: "/data-mapped".to_string(),
            command_template: format!(
                "mkdir {dir} \
                && echo {{file}} {{criterion_line}} > {dir}criterion-loc.txt \
                && cp /data-mapped/{{file}} {dir} \
                && printf '%s\\n' 'NAME = {{stem}}' 'LDFLAGS = -lm' 'INPUT ?= {{arguments}}' \
                    'CRITERION ?= -criterion-loc=criterion-loc.txt' \
                    'MAPPING ?= -mapping-function=main' \
                    'include ../../Makefile.common' > {dir}Makefile \
                && make -C {dir} \
                && cat {dir}{{stem}}.slice.loc > /data-mapped/{{output}}"
            ),
        }
    }
}

/// Locations of the external collaborators.
/// Loaded from an optional JSON file; any missing field keeps its default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub variable_extractor: PathBuf,
    pub slice_extractor: PathBuf,
    pub static_slicer: PathBuf,
    pub dynamic_slicer: PathBuf,
    pub graph_reducer: PathBuf,
    pub statement_reducer: PathBuf,
    /// Container runtime CLI (docker compatible)
    pub container_runtime: PathBuf,
    pub static_container: ContainerSpec,
    pub dynamic_container: ContainerSpec,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            variable_extractor: PathBuf::from("VariableExtractor"),
            slice_extractor: PathBuf::from("SliceExtractor"),
            static_slicer: PathBuf::from("StaticSlicer"),
            dynamic_slicer: PathBuf::from("DynamicSlicer"),
            graph_reducer: PathBuf::from("DeltaReduction"),
            statement_reducer: PathBuf::from("NaiveReduction"),
            container_runtime: PathBuf::from("docker"),
            static_container: ContainerSpec::dg_static(),
            dynamic_container: ContainerSpec::giri_dynamic(),
        }
    }
}

/// Resolved run configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Failing input program
    pub source_file: PathBuf,
    /// Line on which the failure occurs
    pub line_number: u32,
    /// Substring of the failure message the reducers must preserve
    pub error_message: String,
    /// Program arguments reproducing the failure
    pub arguments: String,
    /// Acceptance ratio for the statement-removal reducer, within [0, 1]
    pub reduction_ratio: f64,
    pub dump_dot: bool,
    pub verbose: bool,
    pub log: bool,
    pub static_slice: bool,
    pub dynamic_slice: bool,
    /// Run the graph-minimizing reducer before statement removal
    pub delta: bool,
    /// Hard-code program arguments into the static slicing input
    pub inject: bool,
    pub slicer_backend: SliceBackend,
    /// Pipeline workspace holding every intermediate artifact
    pub work_dir: PathBuf,
    /// Where the final variant is saved
    pub output_file: Option<PathBuf>,
    pub tools: ToolPaths,
}

impl PipelineConfig {
    /// Configuration with the driver's defaults for the given failure location.
    pub fn new(source_file: impl Into<PathBuf>, line_number: u32) -> Self {
        Self {
            source_file: source_file.into(),
            line_number,
            error_message: String::new(),
            arguments: String::new(),
            reduction_ratio: 1.0,
            dump_dot: false,
            verbose: false,
            log: false,
            static_slice: true,
            dynamic_slice: true,
            delta: true,
            inject: false,
            slicer_backend: SliceBackend::Container,
            work_dir: PathBuf::from(".autopie"),
            output_file: None,
            tools: ToolPaths::default(),
        }
    }

    /// True when any slicing pass (and therefore criterion extraction) is enabled
    pub fn slicing_enabled(&self) -> bool {
        self.static_slice || self.dynamic_slice
    }

    /// Output location: explicit, or `<stem>_reduced.<ext>` in the current directory.
    pub fn resolved_output_file(&self) -> PathBuf {
        if let Some(path) = &self.output_file {
            return path.clone();
        }
        let stem = self
            .source_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "autopie".to_string());
        match self.source_file.extension() {
            Some(ext) => PathBuf::from(format!("{}_reduced.{}", stem, ext.to_string_lossy())),
            None => PathBuf::from(format!("{}_reduced", stem)),
        }
    }
}

/// Custom error types for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed:\n{0}")]
    Validation(String),

    #[error("Unsupported language for source file: {0}")]
    UnsupportedLanguage(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("{tool} exited with code {code}")]
    ToolFailed { tool: String, code: i32 },

    #[error("Container error: {0}")]
    Container(String),

    #[error("Entry point error: {0}")]
    EntryPoint(String),

    #[error("Unification error: {0}")]
    Unification(String),

    #[error("Workspace {0} is in use by another pipeline")]
    WorkspaceBusy(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Failed to save result: {0}")]
    Save(String),
}

impl PipelineError {
    /// Process exit code for errors that end the run
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Save(_) => 1,
            PipelineError::WorkspaceBusy(_) => 3,
            _ => 2,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
