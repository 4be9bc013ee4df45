/// Source rewriting ahead of slicing, with the line bookkeeping needed to undo it.
///
/// Argument injection hard-codes program arguments at the entry point so a static slicer
/// sees live values. Dynamic instrumentation makes the traced run terminate normally just
/// before the failure while keeping the failure-site variables live.
use crate::config::types::{Language, PipelineError, Result};
use crate::slicing::criteria::Criterion;
use crate::slicing::entry::locate_entry_point;
use crate::slicing::shift::{compensate, compensate_line};
use std::fs;
use std::path::Path;

/// Lines added by argument injection
pub const INJECTED_LINES: u32 = 2;

/// Replacement argument vector name
const INJECTED_ARGV: &str = "autopie_argv";

/// Split a command line on whitespace
pub fn split_arguments(arguments: &str) -> Vec<String> {
    arguments.split_whitespace().map(str::to_string).collect()
}

fn c_string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Where the two argument lines went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Injection {
    /// Physical line of the first injected line
    pub insertion_line: u32,
}

impl Injection {
    /// Move a criterion into injected coordinates
    pub fn shift_criterion(&self, criterion: &Criterion) -> Criterion {
        let line = compensate_line(criterion.line, self.insertion_line, INJECTED_LINES as i32)
            .unwrap_or(criterion.line);
        criterion.at_line(line)
    }

    /// Map slicer output back to the original numbering. The injected lines have no
    /// original counterpart and are dropped.
    pub fn restore(&self, lines: &[u32]) -> Vec<u32> {
        let injected = self.insertion_line..self.insertion_line + INJECTED_LINES;
        let kept: Vec<u32> = lines.iter().copied().filter(|l| !injected.contains(l)).collect();
        compensate(&kept, self.insertion_line, -(INJECTED_LINES as i32))
    }
}

pub struct ArgumentInjector {
    arguments: Vec<String>,
}

impl ArgumentInjector {
    pub fn new(arguments: &str) -> Self {
        Self {
            arguments: split_arguments(arguments),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// The two statements placed at the top of the entry-point body
    pub fn injected_lines(&self, argc: &str, argv: &str) -> [String; 2] {
        let mut values = vec![format!("{}[0]", argv)];
        values.extend(
            self.arguments
                .iter()
                .map(|a| format!("(char*){}", c_string_literal(a))),
        );
        values.push("0".to_string());

        [
            format!("char* {}[] = {{ {} }};", INJECTED_ARGV, values.join(", ")),
            format!(
                "{} = {}; {} = {};",
                argc,
                self.arguments.len() + 1,
                argv,
                INJECTED_ARGV
            ),
        ]
    }

    /// Insert the argument lines right after the line holding the entry point's `{`.
    pub fn inject_text(&self, source: &str, language: Language) -> Result<(String, Injection)> {
        let entry = locate_entry_point(source, language)?;
        let (argc, argv) = entry.argc_argv().ok_or_else(|| {
            PipelineError::EntryPoint("entry point does not name argc/argv parameters".to_string())
        })?;
        if entry.body_close_line == entry.body_open_line {
            return Err(PipelineError::EntryPoint(
                "entry point body opens and closes on one line".to_string(),
            ));
        }

        let anchor = entry.body_open_line as usize;
        let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
        let [declare, assign] = self.injected_lines(argc, argv);
        lines.insert(anchor, assign);
        lines.insert(anchor, declare);

        let mut text = lines.join("\n");
        text.push('\n');
        Ok((
            text,
            Injection {
                insertion_line: entry.body_open_line + 1,
            },
        ))
    }

    /// Rewrite a scratch copy in place
    pub fn inject_file(&self, path: &Path, language: Language) -> Result<Injection> {
        let source = fs::read_to_string(path)?;
        let (text, injection) = self.inject_text(&source, language)?;
        fs::write(path, text)?;
        Ok(injection)
    }
}

/// Guard placement in a dynamically instrumented copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrumentation {
    /// Failure line in the original numbering
    pub failure_line: u32,
}

impl Instrumentation {
    /// Line the guard occupies, used as the reached criterion line
    pub fn guard_line(&self) -> u32 {
        self.failure_line + 1
    }

    /// Criteria for the instrumented copy: every variable at the guard line
    pub fn criteria(&self, criteria: &[Criterion]) -> Vec<Criterion> {
        criteria.iter().map(|c| c.at_line(self.guard_line())).collect()
    }

    /// Map slicer output back to the original numbering: drop the header and guard,
    /// shift lines after the guard by -2 and lines between header and guard by -1.
    pub fn restore(&self, lines: &[u32]) -> Vec<u32> {
        let kept: Vec<u32> = lines
            .iter()
            .copied()
            .filter(|&l| l != 1 && l != self.guard_line())
            .collect();
        let after_guard = compensate(&kept, self.guard_line() + 1, -1);
        compensate(&after_guard, 2, -1)
    }
}

/// Distinct variable names, first occurrence order
fn distinct_variables(criteria: &[Criterion]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for criterion in criteria {
        if !names.contains(&criterion.variable.as_str()) {
            names.push(&criterion.variable);
        }
    }
    names
}

/// Build the instrumented text: termination header on line 1, and a guard that void-casts
/// every criterion variable and exits, placed right before the failure line.
pub fn instrument_text(
    source: &str,
    language: Language,
    failure_line: u32,
    criteria: &[Criterion],
) -> Result<(String, Instrumentation)> {
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    if failure_line == 0 || failure_line as usize > lines.len() {
        return Err(PipelineError::Tool(format!(
            "failure line {} outside of source ({} lines)",
            failure_line,
            lines.len()
        )));
    }

    let mut guard: Vec<String> = distinct_variables(criteria)
        .into_iter()
        .map(|v| format!("(void)({});", v))
        .collect();
    guard.push(language.termination_call().to_string());

    lines.insert(failure_line as usize - 1, guard.join(" "));
    lines.insert(0, language.termination_header().to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    Ok((text, Instrumentation { failure_line }))
}
