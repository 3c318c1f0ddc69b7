//! PHP scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Php;

impl ScopeRules for Php {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_php::LANGUAGE_PHP.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "class_declaration" => Some(ScopeKind::Class),
            "function_definition" | "method_declaration" => Some(ScopeKind::Function),
            _ => None,
        }
    }
}
