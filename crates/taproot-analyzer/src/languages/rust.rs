//! Rust scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Rust;

impl ScopeRules for Rust {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "function_item" => Some(ScopeKind::Function),
            "struct_item" | "enum_item" => Some(ScopeKind::Class),
            "mod_item" => Some(ScopeKind::Namespace),
            _ => None,
        }
    }

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "block_comment"]
    }
}
