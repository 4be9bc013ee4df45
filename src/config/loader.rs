/// Tool location loading from an optional JSON file
use crate::config::types::{PipelineError, Result, ToolPaths};
use std::fs;
use std::path::{Path, PathBuf};

/// Load tool locations, starting from defaults and overriding with the JSON file if given.
pub fn load_tool_paths(config_file: Option<&Path>) -> Result<ToolPaths> {
    let Some(path) = config_file else {
        return Ok(ToolPaths::default());
    };

    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("Failed to read tools config {}: {}", path.display(), e))
    })?;
    let tools: ToolPaths = serde_json::from_str(&content).map_err(|e| {
        PipelineError::Config(format!("Invalid tools config {}: {}", path.display(), e))
    })?;

    log::debug!("Loaded tool locations from {}", path.display());
    Ok(tools)
}

/// Locate an executable.
///
/// Absolute paths are taken as-is, paths with a separator are joined onto `base_dir`,
/// bare names are searched in `PATH`. Returns `None` when nothing exists at the location.
pub fn locate_program(program: &Path, base_dir: &Path) -> Option<PathBuf> {
    if program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }

    if program.components().count() > 1 {
        let joined = base_dir.join(program);
        return joined.is_file().then_some(joined);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

impl ToolPaths {
    /// Rewrite every locatable program to an absolute path.
    ///
    /// Collaborators are spawned inside the workspace, so relative locations must be
    /// fixed against the invocation directory first. Unlocatable entries are left
    /// untouched for the validator to report.
    pub fn resolve(&mut self, base_dir: &Path) {
        for program in [
            &mut self.variable_extractor,
            &mut self.slice_extractor,
            &mut self.static_slicer,
            &mut self.dynamic_slicer,
            &mut self.graph_reducer,
            &mut self.statement_reducer,
            &mut self.container_runtime,
        ] {
            if let Some(found) = locate_program(program, base_dir) {
                *program = found;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let tools = load_tool_paths(None).unwrap();
        assert_eq!(tools.variable_extractor, PathBuf::from("VariableExtractor"));
    }

    #[test]
    fn test_load_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "graph_reducer": "bin/DeltaReduction", "container_runtime": "podman" }}"#
        )
        .unwrap();

        let tools = load_tool_paths(Some(file.path())).unwrap();
        assert_eq!(tools.graph_reducer, PathBuf::from("bin/DeltaReduction"));
        assert_eq!(tools.container_runtime, PathBuf::from("podman"));
        assert_eq!(tools.slice_extractor, PathBuf::from("SliceExtractor"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_tool_paths(Some(file.path())).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_locate_relative_program() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/tool"), b"").unwrap();

        let found = locate_program(Path::new("bin/tool"), dir.path());
        assert_eq!(found, Some(dir.path().join("bin/tool")));
        assert_eq!(locate_program(Path::new("bin/missing"), dir.path()), None);
    }

    #[test]
    fn test_resolve_keeps_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut tools = ToolPaths::default();
        tools.statement_reducer = PathBuf::from("definitely-not-installed-reducer");
        tools.resolve(dir.path());
        assert_eq!(
            tools.statement_reducer,
            PathBuf::from("definitely-not-installed-reducer")
        );
    }
}
