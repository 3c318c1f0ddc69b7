//! Core data structures for the code knowledge graph

use serde::{Deserialize, Serialize};

/// Dense identifier for a node, assigned by the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub usize);

/// What kind of code span a node represents.
///
/// `Namespace` exists so loaded graphs can carry it, but the indexer never
/// emits namespace nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KGNodeKind {
    File,
    Namespace,
    Class,
    Function,
}

impl KGNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KGNodeKind::File => "FILE",
            KGNodeKind::Namespace => "NAMESPACE",
            KGNodeKind::Class => "CLASS",
            KGNodeKind::Function => "FUNCTION",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FILE" => Some(KGNodeKind::File),
            "NAMESPACE" => Some(KGNodeKind::Namespace),
            "CLASS" => Some(KGNodeKind::Class),
            "FUNCTION" => Some(KGNodeKind::Function),
            _ => None,
        }
    }
}

/// A single indexed span of code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KGNode {
    pub id: NodeId,
    pub kind: KGNodeKind,
    /// Dotted path built from nested scope names, e.g. `pkg.module.Cls.method`.
    pub symbol: String,
    /// Repo-relative path.
    pub file_name: String,
    /// 0-indexed start line.
    pub line: u32,
    /// 0-indexed, exclusive. For classes, clipped to where the first child
    /// scope begins.
    pub end_line: Option<u32>,
    /// Row id in the search index, when known.
    pub db_id: Option<i64>,
}

impl KGNode {
    /// A node not yet inserted into a graph. The arena assigns the real id.
    pub fn draft(kind: KGNodeKind, symbol: String, file_name: String, line: u32, end_line: Option<u32>) -> Self {
        KGNode {
            id: NodeId(0),
            kind,
            symbol,
            file_name,
            line,
            end_line,
            db_id: None,
        }
    }
}

/// Relationship kinds carried by graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    FunctionDef,
    ClassDef,
    Call,
    ClassRef,
    TestCoverage,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::FunctionDef => "function_def",
            EdgeKind::ClassDef => "class_def",
            EdgeKind::Call => "call",
            EdgeKind::ClassRef => "class_ref",
            EdgeKind::TestCoverage => "test_coverage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function_def" => Some(EdgeKind::FunctionDef),
            "class_def" => Some(EdgeKind::ClassDef),
            "call" => Some(EdgeKind::Call),
            "class_ref" => Some(EdgeKind::ClassRef),
            "test_coverage" => Some(EdgeKind::TestCoverage),
            _ => None,
        }
    }

    /// Edge kinds that carry rank in the direction-sensitive traversal.
    pub fn propagates(&self) -> bool {
        matches!(self, EdgeKind::Call | EdgeKind::ClassRef | EdgeKind::TestCoverage)
    }
}

/// Attributes of a directed edge.
///
/// Every forward edge has a mirrored twin with `reverse = true` and the file
/// attributes swapped; both live in the same multigraph so a single weight
/// function can drive traversal in either direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KGEdge {
    pub kind: EdgeKind,
    pub src_file: String,
    pub target_file: String,
    pub reverse: bool,
}

impl KGEdge {
    pub fn forward(kind: EdgeKind, src_file: impl Into<String>, target_file: impl Into<String>) -> Self {
        KGEdge {
            kind,
            src_file: src_file.into(),
            target_file: target_file.into(),
            reverse: false,
        }
    }

    /// The mirror twin: swapped files, flipped `reverse`.
    pub fn mirrored(&self) -> Self {
        KGEdge {
            kind: self.kind,
            src_file: self.target_file.clone(),
            target_file: self.src_file.clone(),
            reverse: !self.reverse,
        }
    }
}
