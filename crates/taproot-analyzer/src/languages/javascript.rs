//! JavaScript scope rules, shared by TypeScript and TSX

use super::{ScopeKind, ScopeRules, field_text};
use tree_sitter::Node;

fn js_scope_kind(node: &Node) -> Option<ScopeKind> {
    match node.kind() {
        "class_declaration" => Some(ScopeKind::Class),
        "function_declaration"
        | "generator_function_declaration"
        | "arrow_function"
        | "method_definition" => Some(ScopeKind::Function),
        "statement_block" => Some(ScopeKind::BlockStatement),
        _ => None,
    }
}

/// Named declarations carry their own name; an arrow function picks up the
/// variable it is bound to, and stays anonymous otherwise.
fn js_scope_name(node: &Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "class_declaration"
        | "function_declaration"
        | "generator_function_declaration"
        | "method_definition" => field_text(node, "name", source),
        "arrow_function" => {
            let parent = node.parent()?;
            if parent.kind() == "variable_declarator" {
                field_text(&parent, "name", source)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub struct JavaScript;

impl ScopeRules for JavaScript {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        js_scope_kind(node)
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        js_scope_name(node, source)
    }
}

pub struct TypeScript;

impl ScopeRules for TypeScript {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        js_scope_kind(node)
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        js_scope_name(node, source)
    }
}

pub struct Tsx;

impl ScopeRules for Tsx {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        js_scope_kind(node)
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        js_scope_name(node, source)
    }
}
