//! Go scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Go;

impl ScopeRules for Go {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "function_declaration" | "method_declaration" => Some(ScopeKind::Function),
            "type_spec" => Some(ScopeKind::Class),
            _ => None,
        }
    }
}
