//! C# scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct CSharp;

impl ScopeRules for CSharp {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_c_sharp::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "namespace_declaration" => Some(ScopeKind::Namespace),
            "class_declaration" => Some(ScopeKind::Class),
            "method_declaration" | "constructor_declaration" => Some(ScopeKind::Function),
            _ => None,
        }
    }
}
