//! Integration tests for the reduction pipeline
//!
//! The collaborators are replaced by small shell scripts that follow the tool contract,
//! so these tests drive the real orchestrator, workspace and process invoker end to end.
#![cfg(unix)]

use autopie::exec::invoker::{ProcessInvoker, ToolInvoker};
use autopie::pipeline::{Orchestrator, Stage, StageOutcome};
use autopie::safety::workspace::Workspace;
use autopie::{PipelineConfig, PipelineError, SliceBackend};
use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const PROGRAM: &str = "#include <stdio.h>

int divide(int a, int b) {
    return a / b;
}

int main(int argc, char** argv) {
    int unused = 7;
    int zero = argc - 1;
    printf(\"%d\\n\", unused);
    return divide(10, zero);
}
";

/// Collects the flags every fake tool understands. Like the real tools, products go to
/// the `-o=` path, `output.txt` when none is given.
const PRELUDE: &str = r#"line=""; keep=""; src=""; out="output.txt"
for a in "$@"; do
  case "$a" in
    --loc-line=*) line="${a#--loc-line=}" ;;
    --slice-file=*) keep="${a#--slice-file=}" ;;
    -o=*) out="${a#-o=}" ;;
    --|--*) ;;
    *) src="$a" ;;
  esac
done
"#;

/// Keeps listed, blank and #include lines; adjusts the failure line like the real extractor
const SLICE_EXTRACTOR: &str = r#"awk -v keep="$keep" -v line="$line" '
BEGIN { while ((getline l < keep) > 0) k[l] = 1; adj = line }
{ if (k[NR] || $0 ~ /^[ \t]*$/ || $0 ~ /^#include/) print; else if (NR <= line) adj-- }
END { print adj > "adjustedLineNumber.txt" }' "$src" > "$out.${src##*.}"
"#;

struct Fixture {
    dir: tempfile::TempDir,
    calls: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        fs::write(dir.path().join("example.c"), PROGRAM).unwrap();
        let calls = dir.path().join("calls.log");
        Self { dir, calls }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable fake tool that logs its name, then runs `body`
    fn tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join("tools").join(name);
        let script = format!(
            "#!/bin/sh\n{}echo {} >> '{}'\n{}",
            PRELUDE,
            name,
            self.calls.display(),
            body
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn output(&self) -> PathBuf {
        self.path().join("out").join("example_reduced.c")
    }

    /// Local backend with well-behaved fakes for every stage
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new("example.c", 4);
        config.error_message = "Floating point exception".to_string();
        config.slicer_backend = SliceBackend::Local;
        config.work_dir = PathBuf::from("work");
        config.output_file = Some(self.output());

        config.tools.variable_extractor =
            self.tool("VariableExtractor", "printf '4:a\\n4:b\\n' > \"$out\"\n");
        config.tools.static_slicer = self.tool(
            "StaticSlicer",
            "printf '1\\n3\\n4\\n5\\n7\\n9\\n11\\n12\\n' > \"$out\"\n",
        );
        // Everything the traced run reached
        config.tools.dynamic_slicer =
            self.tool("DynamicSlicer", "seq 1 $(wc -l < \"$src\") > \"$out\"\n");
        config.tools.slice_extractor = self.tool("SliceExtractor", SLICE_EXTRACTOR);
        config.tools.graph_reducer = self.tool(
            "DeltaReduction",
            "mkdir -p temp && cp \"$src\" temp/autoPieOut.c\n",
        );
        config.tools.statement_reducer = self.tool(
            "NaiveReduction",
            "mkdir -p temp && grep -v '^[[:space:]]*$' \"$src\" > temp/autoPieOut.c\n\
             echo 3 > adjustedLineNumber.txt\n",
        );
        config
    }

    fn run(&self, config: PipelineConfig) -> autopie::Result<autopie::RunSummary> {
        Orchestrator::new(config, self.path(), Box::new(ProcessInvoker)).run()
    }
}

#[test]
fn test_full_pipeline_adopts_every_stage() {
    let fixture = Fixture::new();
    let summary = fixture.run(fixture.config()).unwrap();

    for stage in [
        Stage::StaticSlice,
        Stage::DynamicSlice,
        Stage::GraphReduce,
        Stage::StatementReduce,
    ] {
        assert_eq!(summary.outcome_of(stage), Some(StageOutcome::Adopted), "{:?}", stage);
    }
    assert_eq!(
        fixture.calls(),
        vec![
            "VariableExtractor",
            "StaticSlicer",
            "StaticSlicer",
            "SliceExtractor",
            "DynamicSlicer",
            "DynamicSlicer",
            "SliceExtractor",
            "DeltaReduction",
            "NaiveReduction",
        ]
    );

    let expected = "#include <stdio.h>
int divide(int a, int b) {
    return a / b;
}
int main(int argc, char** argv) {
    int zero = argc - 1;
    return divide(10, zero);
}
";
    assert_eq!(summary.output_path, Some(fixture.output()));
    assert_eq!(fs::read_to_string(fixture.output()).unwrap(), expected);

    let state = summary.final_state.unwrap();
    assert_eq!(state.failure_line, 3);
    assert_eq!(state.source_path.extension().unwrap(), "c");
}

#[test]
fn test_no_artifacts_remain() {
    let fixture = Fixture::new();
    let summary = fixture.run(fixture.config()).unwrap();

    assert!(!fixture.path().join("work").exists());
    let cleanup = summary.cleanup.unwrap();
    assert!(cleanup.failed.is_empty());
    assert!(cleanup.removed > 0);

    let mut left: Vec<String> = fs::read_dir(fixture.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    left.sort();
    assert_eq!(left, vec!["calls.log", "example.c", "out", "tools"]);
}

#[test]
fn test_existing_work_dir_is_left_clean() {
    let fixture = Fixture::new();
    let work = fixture.path().join("work");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("notes.txt"), "mine").unwrap();
    // Stale product from an earlier run must not be picked up
    fs::write(work.join("criteria.txt"), "99:stale\n").unwrap();

    let mut config = fixture.config();
    config.tools.variable_extractor = fixture.tool("VariableExtractor", "exit 0\n");
    let summary = fixture.run(config).unwrap();

    assert_eq!(summary.outcome_of(Stage::StaticSlice), Some(StageOutcome::KeptPrevious));
    let mut left: Vec<String> = fs::read_dir(&work)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    left.sort();
    assert_eq!(left, vec!["notes.txt"]);
}

#[test]
fn test_extractor_writes_where_it_is_told() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.dynamic_slice = false;
    let told = fixture.path().join("told.txt");
    config.tools.variable_extractor = fixture.tool(
        "VariableExtractor",
        &format!(
            "echo \"$out\" > '{}'\nprintf '4:a\\n' > \"$out\"\n",
            told.display()
        ),
    );

    let summary = fixture.run(config).unwrap();
    assert_eq!(fs::read_to_string(told).unwrap().trim(), "criteria.txt");
    assert_eq!(summary.outcome_of(Stage::StaticSlice), Some(StageOutcome::Adopted));
    assert_eq!(
        fixture.calls().iter().filter(|c| *c == "StaticSlicer").count(),
        1
    );
}

#[test]
fn test_failed_extraction_skips_slicing() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.tools.variable_extractor = fixture.tool("VariableExtractor", "exit 1\n");

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.outcome_of(Stage::StaticSlice), Some(StageOutcome::KeptPrevious));
    assert_eq!(summary.outcome_of(Stage::DynamicSlice), Some(StageOutcome::KeptPrevious));
    assert_eq!(summary.outcome_of(Stage::StatementReduce), Some(StageOutcome::Adopted));
    assert!(!fixture.calls().iter().any(|c| c.ends_with("Slicer")));
}

#[test]
fn test_reducer_without_output_keeps_state() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.static_slice = false;
    config.dynamic_slice = false;
    config.delta = false;
    config.tools.statement_reducer = fixture.tool("NaiveReduction", "exit 0\n");

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.outcome_of(Stage::ExtractCriteria), Some(StageOutcome::Skipped));
    assert_eq!(summary.outcome_of(Stage::StatementReduce), Some(StageOutcome::KeptPrevious));

    let state = summary.final_state.unwrap();
    assert_eq!(state.source_path, fixture.path().join("example.c").canonicalize().unwrap());
    assert_eq!(state.failure_line, 4);
    // Original input saved as the fallback
    assert_eq!(fs::read_to_string(fixture.output()).unwrap(), PROGRAM);
    assert_eq!(fixture.calls(), vec!["NaiveReduction"]);
}

#[test]
fn test_failing_reducer_falls_back_to_previous_stage() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.dynamic_slice = false;
    config.tools.statement_reducer = fixture.tool(
        "NaiveReduction",
        "mkdir -p temp && echo garbage > temp/autoPieOut.c\nexit 2\n",
    );

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.outcome_of(Stage::StatementReduce), Some(StageOutcome::KeptPrevious));

    // The graph-reduced copy of the static slice is what got saved
    let saved = fs::read_to_string(fixture.output()).unwrap();
    assert!(!saved.contains("unused"));
    assert!(saved.contains("return divide(10, zero);"));
}

#[test]
fn test_injection_round_trips_criterion() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.inject = true;
    config.arguments = "x y".to_string();
    config.dynamic_slice = false;
    config.delta = false;
    // Criterion after main: record what the slicer saw, then keep every line it saw
    let seen = fixture.path().join("seen.txt");
    config.tools.variable_extractor =
        fixture.tool("VariableExtractor", "printf '9:zero\\n' > \"$out\"\n");
    config.tools.static_slicer = fixture.tool(
        "StaticSlicer",
        &format!(
            "echo \"$line\" >> '{}'\n\
             sed -n 8,9p \"$src\" >> '{}'\n\
             seq 1 $(wc -l < \"$src\") > \"$out\"\n",
            seen.display(),
            seen.display()
        ),
    );

    let summary = fixture.run(config).unwrap();
    let seen = fs::read_to_string(seen).unwrap();
    let mut lines = seen.lines();
    // main's `{` is on line 7, so line 9 moved to 11
    assert_eq!(lines.next(), Some("11"));
    assert_eq!(
        lines.next(),
        Some("char* autopie_argv[] = { argv[0], (char*)\"x\", (char*)\"y\", 0 };")
    );
    assert_eq!(lines.next(), Some("argc = 3; argv = autopie_argv;"));

    // Injected lines never reach the sliced source
    assert_eq!(summary.outcome_of(Stage::StaticSlice), Some(StageOutcome::Adopted));
    let saved = fs::read_to_string(fixture.output()).unwrap();
    assert!(!saved.contains("autopie_argv"));
}

#[test]
fn test_validation_is_a_hard_gate() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.tools.graph_reducer = fixture.path().join("tools/missing-delta");

    let err = fixture.run(config).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(!fixture.path().join("work").exists());
    assert!(fixture.calls().is_empty());
}

#[test]
fn test_output_inside_work_dir_is_rejected() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.output_file = Some(PathBuf::from("work/example_reduced.c"));

    let err = fixture.run(config).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(!fixture.path().join("work").exists());
    assert!(fixture.calls().is_empty());
}

#[test]
fn test_busy_workspace_is_rejected() {
    let fixture = Fixture::new();
    let _held = Workspace::acquire(&fixture.path().join("work")).unwrap();

    let err = fixture.run(fixture.config()).unwrap_err();
    assert!(matches!(err, PipelineError::WorkspaceBusy(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(fixture.calls().is_empty());
}

#[test]
fn test_save_failure_is_reported() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.static_slice = false;
    config.dynamic_slice = false;
    config.delta = false;
    // Destroys the input and leaves an empty product
    config.tools.statement_reducer = fixture.tool(
        "NaiveReduction",
        "rm -f \"$src\"\nmkdir -p temp && : > temp/autoPieOut.c\n",
    );

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.outcome_of(Stage::StatementReduce), Some(StageOutcome::KeptPrevious));
    assert_eq!(summary.outcome_of(Stage::Save), Some(StageOutcome::Failed));
    assert!(summary.output_path.is_none());
    assert!(!fixture.output().exists());
    assert!(!fixture.path().join("work").exists());
}

#[test]
fn test_container_backend_removes_containers() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.slicer_backend = SliceBackend::Container;
    config.dynamic_slice = false;
    config.tools.container_runtime = fixture.tool(
        "docker",
        "echo \"$*\" >> \"$(dirname \"$0\")/docker.log\"\n\
         if [ \"$1\" = run ]; then\n\
           host=$(echo \"$5\" | cut -d: -f1)\n\
           printf '1\\n3\\n4\\n5\\n7\\n9\\n11\\n12\\n' > \"$host/slice_lines.txt\"\n\
         fi\n",
    );

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.outcome_of(Stage::StaticSlice), Some(StageOutcome::Adopted));

    let log = fs::read_to_string(fixture.path().join("tools/docker.log")).unwrap();
    let runs: Vec<&str> = log.lines().filter(|l| l.starts_with("run ")).collect();
    let removals: Vec<&str> = log.lines().filter(|l| l.starts_with("rm -f autopie-")).collect();
    assert_eq!(runs.len(), 2);
    assert_eq!(removals.len(), 2);
    assert!(runs[0].contains("mchalupa/dg"));
    assert!(runs[0].contains(":/data-mapped:rw"));
    assert!(!fixture.path().join("work").exists());
}

/// Records invocations and fails every tool
struct Refusing {
    calls: Rc<RefCell<Vec<String>>>,
}

impl ToolInvoker for Refusing {
    fn invoke(&self, program: &Path, argv: &[String], cwd: &Path) -> autopie::Result<i32> {
        assert!(cwd.ends_with("work"));
        assert_eq!(argv.last().map(String::as_str), Some("--"));
        let name = program.file_name().unwrap().to_string_lossy().to_string();
        self.calls.borrow_mut().push(name);
        Ok(1)
    }
}

#[test]
fn test_every_stage_failing_saves_original() {
    let fixture = Fixture::new();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let invoker = Refusing {
        calls: Rc::clone(&calls),
    };

    let summary = Orchestrator::new(fixture.config(), fixture.path(), Box::new(invoker))
        .run()
        .unwrap();

    assert_eq!(
        *calls.borrow(),
        vec!["VariableExtractor", "DeltaReduction", "NaiveReduction"]
    );
    assert_eq!(fs::read_to_string(fixture.output()).unwrap(), PROGRAM);
    assert_eq!(summary.final_state.unwrap().failure_line, 4);
}

/// Runs the real statement-removal reducer on the recursion example:
/// `AUTOPIE_NAIVE_REDUCTION=/path/to/NaiveReduction cargo test -- --ignored`
#[test]
#[ignore]
fn test_naive_reduction_end_to_end() {
    let reducer = match std::env::var_os("AUTOPIE_NAIVE_REDUCTION") {
        Some(path) => PathBuf::from(path),
        None => return,
    };

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("example1.c");
    fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/example1.c"),
        &source,
    )
    .unwrap();

    let mut config = PipelineConfig::new(&source, 4);
    config.error_message = "segmentation fault".to_string();
    config.reduction_ratio = 0.5;
    config.dump_dot = true;
    config.verbose = true;
    config.static_slice = false;
    config.dynamic_slice = false;
    config.delta = false;
    config.work_dir = dir.path().join("work");
    config.tools.statement_reducer = reducer;

    let summary = Orchestrator::new(config, dir.path(), Box::new(ProcessInvoker))
        .run()
        .unwrap();
    let output = summary.output_path.unwrap();
    assert_eq!(output.extension().unwrap(), "c");

    let expected = "void print(const char* str, int x)
{
\tx += 3;
\tprint(str, x);
}

int
main (int argc, char** argv) {
\tint i = 0;
\t
\t

\t

\tprint(\"Result: %d\\n\", i);
}
";
    let normalize = |text: &str| -> Vec<String> {
        let mut lines: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
        while lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }
        lines
    };
    assert_eq!(normalize(&fs::read_to_string(output).unwrap()), normalize(expected));
}
