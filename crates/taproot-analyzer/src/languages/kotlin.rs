//! Kotlin scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Kotlin;

impl ScopeRules for Kotlin {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_kotlin_ng::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "class_declaration" | "object_declaration" => Some(ScopeKind::Class),
            "function_declaration" => Some(ScopeKind::Function),
            _ => None,
        }
    }

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "multiline_comment"]
    }

    // The Kotlin grammar does not expose a `name` field; scan the direct
    // children for the identifier instead.
    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if matches!(child.kind(), "simple_identifier" | "type_identifier" | "identifier") {
                return child.utf8_text(source).ok().map(|s| s.to_string());
            }
        }
        None
    }
}
