//! Python scope rules

use super::{ScopeKind, ScopeRules, TextRange};
use tree_sitter::Node;

const COMPOUND_STATEMENTS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "decorated_definition",
    "match_statement",
];

const SPAN_TYPES: &[&str] = &[
    "list",
    "list_comprehension",
    "dictionary",
    "dictionary_comprehension",
    "generator_expression",
];

pub struct Python;

impl ScopeRules for Python {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "class_definition" => Some(ScopeKind::Class),
            "function_definition" => Some(ScopeKind::Function),
            kind if COMPOUND_STATEMENTS.contains(&kind) => Some(ScopeKind::BlockStatement),
            kind if SPAN_TYPES.contains(&kind) => Some(ScopeKind::Span),
            _ => None,
        }
    }

    // Docstrings live after the def/class line: the first statement of the
    // body when it is a bare string. The range covers the text between the
    // quote tokens.
    fn doc_comment_range(&self, node: &Node, _source: &[u8]) -> Option<TextRange> {
        let body = self.body_node(node)?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.child(0)?;
        if string.kind() != "string" || string.child_count() < 2 {
            return None;
        }
        let open = string.child(0)?;
        let close = string.child(string.child_count() - 1)?;
        Some(TextRange {
            start_row: open.end_position().row,
            start_col: open.end_position().column,
            end_row: close.start_position().row,
            end_col: close.start_position().column,
        })
    }
}
