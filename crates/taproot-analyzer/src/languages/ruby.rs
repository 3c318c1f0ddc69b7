//! Ruby scope rules

use super::{ScopeKind, ScopeRules};
use tree_sitter::Node;

pub struct Ruby;

impl ScopeRules for Ruby {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_ruby::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            // The grammar reuses `class` for the keyword token; a real class
            // body spans more bytes than the keyword itself.
            "class" if node.end_byte() - node.start_byte() != "class".len() => {
                Some(ScopeKind::Class)
            }
            "method" | "singleton_method" => Some(ScopeKind::Function),
            _ => None,
        }
    }
}
