use std::collections::BTreeSet;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{ReqsmithError, Result};
use super::LanguageAnalyzer;
use super::super::{resolve_callee, CallSite, Callee, FileUsage, SourceLocation, SymbolTable};

/// Node kinds the analysis dispatches on. Everything else is `Other` and is
/// only descended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyntaxKind {
    Import,
    ImportFrom,
    FutureImport,
    Call,
    Other,
}

impl SyntaxKind {
    fn of(node: Node<'_>) -> Self {
        match node.kind() {
            "import_statement" => SyntaxKind::Import,
            "import_from_statement" => SyntaxKind::ImportFrom,
            "future_import_statement" => SyntaxKind::FutureImport,
            "call" => SyntaxKind::Call,
            _ => SyntaxKind::Other,
        }
    }
}

/// Python analyzer using Tree-sitter
pub struct PythonAnalyzer {
    parser: Parser,
}

impl PythonAnalyzer {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser.set_language(&python_language)
            .map_err(|e| ReqsmithError::Parser(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }

    /// Parse a source unit, rejecting it if the tree contains syntax errors
    fn parse(&mut self, content: &str, path: &Path) -> Result<Tree> {
        let tree = self.parser.parse(content, None)
            .ok_or_else(|| ReqsmithError::Parser(format!("Failed to parse {}", path.display())))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ReqsmithError::Syntax {
                path: path.display().to_string(),
                line: first_error_line(root).unwrap_or(1),
            });
        }

        Ok(tree)
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn analyze(&mut self, content: &str, file_path: &Path) -> Result<FileUsage> {
        let tree = self.parse(content, file_path)?;
        let root = tree.root_node();

        let symbols = build_symbol_table(root, content);
        let call_sites = extract_call_sites(root, content, &symbols, file_path);

        Ok(FileUsage {
            path: file_path.to_path_buf(),
            call_sites,
            imported_modules: symbols.imported_modules().to_vec(),
        })
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyw"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

/// Collect every import binding in the file. Imports nested in functions or
/// conditionals are file-scoped like top-level ones.
fn build_symbol_table(root: Node<'_>, source: &str) -> SymbolTable {
    let mut symbols = SymbolTable::new();

    for_each_node(root, |node| match SyntaxKind::of(node) {
        SyntaxKind::Import => bind_import(node, source, &mut symbols),
        SyntaxKind::ImportFrom => bind_import_from(node, source, &mut symbols),
        SyntaxKind::FutureImport | SyntaxKind::Call | SyntaxKind::Other => {}
    });

    symbols
}

/// Resolve every call expression in the file against its import table
fn extract_call_sites(root: Node<'_>, source: &str, symbols: &SymbolTable, path: &Path) -> Vec<CallSite> {
    let mut call_sites = Vec::new();

    for_each_node(root, |node| match SyntaxKind::of(node) {
        SyntaxKind::Call => {
            if let Some(call_site) = resolve_call(node, source, symbols, path) {
                call_sites.push(call_site);
            }
        }
        SyntaxKind::Import | SyntaxKind::ImportFrom | SyntaxKind::FutureImport | SyntaxKind::Other => {}
    });

    call_sites
}

/// `import a`, `import a.b`, `import a.b as c`
fn bind_import(node: Node<'_>, source: &str, symbols: &mut SymbolTable) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        match name.kind() {
            "dotted_name" => {
                let module = dotted_path(name, source);
                // `import a.b` binds only `a`
                let local = module.split('.').next().unwrap_or_default().to_string();
                symbols.bind_module(&local, &local);
                symbols.record_import(&module);
            }
            "aliased_import" => {
                let (Some(path), Some(alias)) = (name.child_by_field_name("name"), name.child_by_field_name("alias")) else {
                    continue;
                };
                let module = dotted_path(path, source);
                symbols.bind_module(node_text(alias, source), &module);
                symbols.record_import(&module);
            }
            _ => {}
        }
    }
}

/// `from m import x`, `from m import x as y`, `from m import *`, `from . import x`
fn bind_import_from(node: Node<'_>, source: &str, symbols: &mut SymbolTable) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = match module_node.kind() {
        "dotted_name" => dotted_path(module_node, source),
        "relative_import" => relative_path(module_node, source),
        _ => return,
    };
    symbols.record_import(&module);

    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        match name.kind() {
            "dotted_name" => {
                let member = dotted_path(name, source);
                symbols.bind_member(&member, &module, &member);
            }
            "aliased_import" => {
                let (Some(member), Some(alias)) = (name.child_by_field_name("name"), name.child_by_field_name("alias")) else {
                    continue;
                };
                symbols.bind_member(node_text(alias, source), &module, &dotted_path(member, source));
            }
            _ => {}
        }
    }
}

fn resolve_call(node: Node<'_>, source: &str, symbols: &SymbolTable, path: &Path) -> Option<CallSite> {
    let function = node.child_by_field_name("function")?;
    let (function, module) = resolve_callee(callee_shape(function, source), symbols)?;

    let arguments = node
        .child_by_field_name("arguments")
        .map(|arguments| keyword_arguments(arguments, source))
        .unwrap_or_default();

    Some(CallSite {
        function,
        module,
        arguments,
        location: SourceLocation {
            path: path.to_path_buf(),
            line: node.start_position().row + 1,
        },
    })
}

fn callee_shape<'s>(node: Node<'_>, source: &'s str) -> Callee<'s> {
    match node.kind() {
        "identifier" => Callee::Name(node_text(node, source)),
        "attribute" => {
            let (Some(object), Some(attribute)) = (node.child_by_field_name("object"), node.child_by_field_name("attribute")) else {
                return Callee::Unsupported;
            };
            if object.kind() != "identifier" {
                return Callee::Unsupported;
            }
            Callee::Attribute {
                base: node_text(object, source),
                attribute: node_text(attribute, source),
            }
        }
        _ => Callee::Unsupported,
    }
}

/// Names passed as `name=value`. Positional arguments and `**splats` are skipped.
fn keyword_arguments(arguments: Node<'_>, source: &str) -> BTreeSet<String> {
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|argument| argument.kind() == "keyword_argument")
        .filter_map(|argument| argument.child_by_field_name("name"))
        .map(|name| node_text(name, source).to_string())
        .collect()
}

/// Pre-order walk with an explicit stack
fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        visit(node);
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn first_error_line(root: Node<'_>) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

fn dotted_path(node: Node<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    let parts: Vec<&str> = node
        .named_children(&mut cursor)
        .map(|part| node_text(part, source))
        .collect();
    if parts.is_empty() {
        node_text(node, source).to_string()
    } else {
        parts.join(".")
    }
}

fn relative_path(node: Node<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    let mut path = String::new();
    for part in node.children(&mut cursor) {
        match part.kind() {
            "import_prefix" => path.push_str(node_text(part, source).trim()),
            "dotted_name" => path.push_str(&dotted_path(part, source)),
            _ => {}
        }
    }
    path
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}
