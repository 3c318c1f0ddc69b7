//! Scope-tree extraction from a parse tree
//!
//! A scope is a contiguous region classified by the language rules. The tree
//! keeps every scope kind; the indexer decides which ones become graph nodes.

use crate::languages::{ScopeKind, ScopeRules, TextRange};
use crate::source_file::{AnalyzerError, SourceFile};
use tree_sitter::{Node, Tree};

/// One extracted scope with its nested children.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Option<String>,
    /// 0-indexed row where the scope starts.
    pub start_row: usize,
    /// 0-indexed row where the scope ends (inclusive of content on it).
    pub end_row: usize,
    /// Column of the end position; 0 means the scope closed at a line start.
    pub end_col: usize,
    /// Where the scope's docstring or doc comment lives, if it has one.
    pub doc_range: Option<TextRange>,
    /// Start of the scope's body, when the grammar exposes one.
    pub body_start: Option<(usize, usize)>,
    pub children: Vec<Scope>,
}

impl Scope {
    /// 0-indexed exclusive end line. A scope ending at column 0 does not own
    /// that line.
    pub fn end_line_exclusive(&self) -> usize {
        if self.end_col == 0 { self.end_row } else { self.end_row + 1 }
    }
}

/// Build the nested scope forest of a file. Empty for languages without a
/// grammar.
pub fn nested_scopes(sf: &SourceFile) -> Result<Vec<Scope>, AnalyzerError> {
    let Some(tree) = sf.parse()? else {
        return Ok(Vec::new());
    };
    let Some(rules) = sf.lang.rules() else {
        return Ok(Vec::new());
    };
    Ok(scopes_from_tree(&tree, rules, sf.contents.as_bytes()))
}

/// Same extraction for a tree that was parsed elsewhere (e.g. by the pool).
pub fn scopes_from_tree(tree: &Tree, rules: &dyn ScopeRules, source: &[u8]) -> Vec<Scope> {
    let mut out = Vec::new();
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        collect(child, rules, source, &mut out);
    }
    out
}

fn collect(node: Node, rules: &dyn ScopeRules, source: &[u8], out: &mut Vec<Scope>) {
    if let Some(kind) = rules.scope_kind(&node) {
        let mut scope = Scope {
            kind,
            name: rules.scope_name(&node, source).filter(|n| !n.is_empty()),
            start_row: node.start_position().row,
            end_row: node.end_position().row,
            end_col: node.end_position().column,
            doc_range: rules.doc_comment_range(&node, source),
            body_start: rules
                .body_node(&node)
                .map(|body| (body.start_position().row, body.start_position().column)),
            children: Vec::new(),
        };
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            collect(child, rules, source, &mut scope.children);
        }
        out.push(scope);
    } else {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            collect(child, rules, source, out);
        }
    }
}
