//! Java scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Java;

impl ScopeRules for Java {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "class_declaration" => Some(ScopeKind::Class),
            "method_declaration"
            | "constructor_declaration"
            | "compact_constructor_declaration" => Some(ScopeKind::Function),
            _ => None,
        }
    }

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "block_comment"]
    }
}
