// Startup validation
// VALIDATE is a hard gate: every problem is collected, then the run fails fast
// before any workspace or artifact exists.

use crate::config::loader::locate_program;
use crate::config::types::{Language, PipelineConfig, PipelineError, Result, SliceBackend};
use std::fs;
use std::path::{Path, PathBuf};

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate the configuration and return the input language.
///
/// Warnings are logged; any error turns into `PipelineError::Validation`.
pub fn validate_config(config: &PipelineConfig, base_dir: &Path) -> Result<Language> {
    let mut result = ValidationResult::new();

    let language = validate_source(config, &mut result);
    validate_options(config, &mut result);
    validate_output(config, base_dir, &mut result);
    validate_tools(config, base_dir, &mut result);

    for warning in &result.warnings {
        log::warn!("{}", warning);
    }

    if !result.is_valid() {
        return Err(PipelineError::Validation(result.errors.join("\n")));
    }

    // A valid result always carries a language.
    language.ok_or_else(|| {
        PipelineError::UnsupportedLanguage(config.source_file.display().to_string())
    })
}

/// Check the input file, its language and the failure location
fn validate_source(config: &PipelineConfig, result: &mut ValidationResult) -> Option<Language> {
    let source = &config.source_file;

    if !source.is_file() {
        result.add_error(format!("source file not found: {}", source.display()));
        return None;
    }

    let language = Language::from_path(source);
    if language.is_none() {
        result.add_error(format!(
            "unsupported language extension for {} (expected .c, .cpp, .cc, .cxx)",
            source.display()
        ));
    }

    match fs::read_to_string(source) {
        Ok(content) => {
            let line_count = content.lines().count();
            if config.line_number == 0 || config.line_number as usize > line_count {
                result.add_error(format!(
                    "line {} is outside of {} ({} lines)",
                    config.line_number,
                    source.display(),
                    line_count
                ));
            }
        }
        Err(e) => result.add_error(format!("cannot read {}: {}", source.display(), e)),
    }

    language
}

fn validate_options(config: &PipelineConfig, result: &mut ValidationResult) {
    if !(0.0..=1.0).contains(&config.reduction_ratio) {
        result.add_error(format!(
            "reduction_ratio {} must be between 0 and 1",
            config.reduction_ratio
        ));
    }

    if config.error_message.trim().is_empty() {
        result.add_warning(
            "error_message is empty; any failure will be accepted by the reducers".to_string(),
        );
    }

    if config.inject && config.arguments.trim().is_empty() {
        result.add_warning("inject is enabled but no arguments were given".to_string());
    }
}

/// The saved result must survive workspace cleanup
fn validate_output(config: &PipelineConfig, base_dir: &Path, result: &mut ValidationResult) {
    let output = resolve(&base_dir.join(config.resolved_output_file()));
    let work_dir = resolve(&base_dir.join(&config.work_dir));

    if output.starts_with(&work_dir) {
        result.add_error(format!(
            "output file {} lies inside the work directory {}, which is removed after the run",
            output.display(),
            work_dir.display()
        ));
    }
}

/// Canonical form of the longest existing prefix, with the rest appended
fn resolve(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = current.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Every collaborator needed by an enabled stage must exist
fn validate_tools(config: &PipelineConfig, base_dir: &Path, result: &mut ValidationResult) {
    let tools = &config.tools;
    let mut required = vec![("statement reducer", tools.statement_reducer.as_path())];

    if config.delta {
        required.push(("graph reducer", tools.graph_reducer.as_path()));
    }

    if config.slicing_enabled() {
        required.push(("variable extractor", tools.variable_extractor.as_path()));
        required.push(("slice extractor", tools.slice_extractor.as_path()));

        match config.slicer_backend {
            SliceBackend::Local => {
                if config.static_slice {
                    required.push(("static slicer", tools.static_slicer.as_path()));
                }
                if config.dynamic_slice {
                    required.push(("dynamic slicer", tools.dynamic_slicer.as_path()));
                }
            }
            SliceBackend::Container => {
                required.push(("container runtime", tools.container_runtime.as_path()));
            }
        }
    }

    for (role, program) in required {
        if locate_program(program, base_dir).is_none() {
            result.add_error(format!("{} not found: {}", role, program.display()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(dir: &Path, name: &str, lines: usize) -> PathBuf {
        let path = dir.join(name);
        let body: String = (0..lines).map(|i| format!("// line {}\n", i + 1)).collect();
        fs::write(&path, body).unwrap();
        path
    }

    fn tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    fn base_config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::new(write_source(dir, "example.c", 10), 4);
        config.error_message = "segmentation fault".to_string();
        config.static_slice = false;
        config.dynamic_slice = false;
        config.delta = false;
        config.tools.statement_reducer = tool(dir, "NaiveReduction");
        config
    }

    #[test]
    fn test_valid_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        assert_eq!(validate_config(&config, dir.path()).unwrap(), Language::C);
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.source_file = dir.path().join("nope.c");
        let err = validate_config(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.source_file = write_source(dir.path(), "main.rs", 10);
        assert!(validate_config(&config, dir.path()).is_err());
    }

    #[test]
    fn test_line_outside_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.line_number = 11;
        assert!(validate_config(&config, dir.path()).is_err());
        config.line_number = 0;
        assert!(validate_config(&config, dir.path()).is_err());
        config.line_number = 10;
        assert!(validate_config(&config, dir.path()).is_ok());
    }

    #[test]
    fn test_ratio_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.reduction_ratio = 1.5;
        assert!(validate_config(&config, dir.path()).is_err());
    }

    #[test]
    fn test_enabled_stages_require_their_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.delta = true;
        config.tools.graph_reducer = dir.path().join("missing-delta");

        let err = validate_config(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("graph reducer")));

        config.delta = false;
        assert!(validate_config(&config, dir.path()).is_ok());
    }

    #[test]
    fn test_local_backend_checks_slicers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.static_slice = true;
        config.slicer_backend = SliceBackend::Local;
        config.tools.variable_extractor = tool(dir.path(), "VariableExtractor");
        config.tools.slice_extractor = tool(dir.path(), "SliceExtractor");
        config.tools.static_slicer = dir.path().join("absent-slicer");

        let err = validate_config(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("static slicer")));

        config.tools.static_slicer = tool(dir.path(), "StaticSlicer");
        assert!(validate_config(&config, dir.path()).is_ok());
    }

    #[test]
    fn test_output_inside_work_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.work_dir = PathBuf::from("out");
        config.output_file = Some(PathBuf::from("out/example_reduced.c"));

        let err = validate_config(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("work directory")));

        // Same through an existing directory and a `..` detour
        fs::create_dir_all(dir.path().join("out/sub")).unwrap();
        config.output_file = Some(dir.path().join("out/sub/../example_reduced.c"));
        assert!(validate_config(&config, dir.path()).is_err());

        config.output_file = Some(PathBuf::from("output/example_reduced.c"));
        assert!(validate_config(&config, dir.path()).is_ok());
    }
}
