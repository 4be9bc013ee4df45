//! Structural location of the program entry point in C/C++ source.
//!
//! The source is parsed with tree-sitter, so `main` inside strings, comments, member
//! functions, namespaces or prototypes never matches.

use crate::config::types::{Language, PipelineError, Result};
use tree_sitter::{Node, Parser, Tree};

/// Designated start-of-execution function
pub const ENTRY_FUNCTION: &str = "main";

/// Scopes whose functions cannot be the program entry point
const NESTED_SCOPES: &[&str] = &[
    "compound_statement",
    "field_declaration_list",
    "namespace_definition",
    "class_specifier",
    "struct_specifier",
    "union_specifier",
    "template_declaration",
];

/// Entry-point definition found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Physical line of the body's opening `{`
    pub body_open_line: u32,
    /// Physical line of the body's closing `}`
    pub body_close_line: u32,
    /// Declared parameter names; `None` for unnamed parameters
    pub parameters: Vec<Option<String>>,
}

impl EntryPoint {
    /// Names of the first two parameters, if both are named
    pub fn argc_argv(&self) -> Option<(&str, &str)> {
        match self.parameters.as_slice() {
            [Some(argc), Some(argv), ..] => Some((argc.as_str(), argv.as_str())),
            _ => None,
        }
    }
}

fn parse(source: &str, language: Language) -> Result<Tree> {
    let grammar = match language {
        Language::C => tree_sitter_c::language(),
        Language::Cpp => tree_sitter_cpp::language(),
    };

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| PipelineError::EntryPoint(format!("Failed to set language: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| PipelineError::EntryPoint("Failed to parse source".to_string()))
}

fn text<'s>(node: &Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Follow `declarator` fields (pointers, arrays, references, parentheses) down to a node
/// of one of `kinds`.
fn innermost<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node;
    loop {
        if kinds.contains(&current.kind()) {
            return Some(current);
        }
        // Reference declarators carry their inner declarator without a field name
        let inner = current.child_by_field_name("declarator").or_else(|| {
            let count = current.named_child_count();
            (count > 0)
                .then(|| current.named_child(count - 1))
                .flatten()
        })?;
        current = inner;
    }
}

/// Parameter name, or `None` for an unnamed (abstract) parameter
fn parameter_name(parameter: &Node, source: &str) -> Option<String> {
    let declarator = parameter.child_by_field_name("declarator")?;
    innermost(declarator, &["identifier"]).map(|id| text(&id, source).to_string())
}

fn parameter_names(parameters: &Node, source: &str) -> Vec<Option<String>> {
    let mut cursor = parameters.walk();
    let declared: Vec<Node> = parameters
        .named_children(&mut cursor)
        .filter(|p| p.kind().ends_with("parameter_declaration"))
        .collect();

    // `main(void)` has no parameters
    if let [only] = declared.as_slice() {
        let is_void = only.child_by_field_name("declarator").is_none()
            && only
                .child_by_field_name("type")
                .map_or(false, |t| text(&t, source) == "void");
        if is_void {
            return Vec::new();
        }
    }

    declared.iter().map(|p| parameter_name(p, source)).collect()
}

/// `Some` if `node` is a definition of the entry function
fn entry_definition(node: Node, source: &str) -> Option<EntryPoint> {
    let body = node.child_by_field_name("body")?;
    let declarator = node.child_by_field_name("declarator")?;
    let function = innermost(declarator, &["function_declarator"])?;
    let name = function.child_by_field_name("declarator")?;
    if name.kind() != "identifier" || text(&name, source) != ENTRY_FUNCTION {
        return None;
    }

    let parameters = function
        .child_by_field_name("parameters")
        .map(|p| parameter_names(&p, source))
        .unwrap_or_default();

    Some(EntryPoint {
        body_open_line: body.start_position().row as u32 + 1,
        body_close_line: body.end_position().row as u32 + 1,
        parameters,
    })
}

/// Depth-first search in source order, skipping scopes that cannot hold the entry point
fn find_entry(node: Node, source: &str) -> Option<EntryPoint> {
    if node.kind() == "function_definition" {
        return entry_definition(node, source);
    }
    if NESTED_SCOPES.contains(&node.kind()) {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(|child| find_entry(child, source))
}

/// Find the first file-scope definition of the entry function.
pub fn locate_entry_point(source: &str, language: Language) -> Result<EntryPoint> {
    let tree = parse(source, language)?;
    find_entry(tree.root_node(), source).ok_or_else(|| {
        PipelineError::EntryPoint(format!("no definition of {}() found", ENTRY_FUNCTION))
    })
}
