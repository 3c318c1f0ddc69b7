//! Language registry: extension table, grammars, and per-language scope rules

pub mod c;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod kotlin;
pub mod php;
pub mod python;
pub mod ruby;
pub mod rust;

use tree_sitter::Node;

/// Scope classification produced by the per-language rules.
///
/// Only `Class` and `Function` become graph nodes; `Namespace`,
/// `BlockStatement`, and `Span` are traversed without being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    File,
    Namespace,
    Class,
    Function,
    BlockStatement,
    Span,
}

/// A contiguous region of the source. Rows and columns are 0-indexed; the
/// end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl TextRange {
    pub fn of(node: &Node) -> Self {
        TextRange {
            start_row: node.start_position().row,
            start_col: node.start_position().column,
            end_row: node.end_position().row,
            end_col: node.end_position().column,
        }
    }
}

/// Per-language classification of parse-tree nodes into scopes.
pub trait ScopeRules: Send + Sync {
    fn grammar(&self) -> tree_sitter::Language;

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind>;

    /// Name of a scope, when the language gives it one. Anonymous scopes
    /// return `None` and are numbered by the indexer.
    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        field_text(node, "name", source)
    }

    /// Node kinds the grammar uses for comments.
    fn comment_kinds(&self) -> &'static [&'static str] {
        &["comment"]
    }

    /// The scope's body, when the grammar exposes one.
    fn body_node<'a>(&self, node: &Node<'a>) -> Option<Node<'a>> {
        node.child_by_field_name("body")
    }

    /// Range of the documentation attached to a scope. For most languages
    /// that is the unbroken run of comment siblings directly above it;
    /// comment recognition is not guaranteed by every grammar, and a doc
    /// block may span several nodes, so this is a range rather than a node.
    fn doc_comment_range(&self, node: &Node, source: &[u8]) -> Option<TextRange> {
        let _ = source;
        let mut range: Option<TextRange> = None;
        let mut prev = node.prev_sibling();
        while let Some(comment) = prev {
            if !self.comment_kinds().contains(&comment.kind()) {
                break;
            }
            let head = TextRange::of(&comment);
            range = Some(match range {
                Some(existing) => TextRange {
                    start_row: head.start_row,
                    start_col: head.start_col,
                    ..existing
                },
                None => head,
            });
            prev = comment.prev_sibling();
        }
        range
    }
}

pub(crate) fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.to_string())
}

/// A language the analyzer recognizes.
///
/// `Unparsed` covers the long tail of text formats that skip scope
/// extraction and fall through to line chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageKind {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    C,
    Cpp,
    CSharp,
    Go,
    Java,
    Kotlin,
    Php,
    Ruby,
    Rust,
    Unparsed,
}

impl LanguageKind {
    /// Look up the language for a repo-relative file name. `None` means the
    /// file type is unknown and should be skipped entirely.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let base = file_name.rsplit('/').next().unwrap_or(file_name);
        if matches!(base, "Dockerfile" | "Makefile" | "CMakeLists.txt" | "go.mod" | "go.sum") {
            return Some(LanguageKind::Unparsed);
        }
        let ext = base.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "py" | "pyi" => Some(LanguageKind::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
            "ts" => Some(LanguageKind::TypeScript),
            "tsx" => Some(LanguageKind::Tsx),
            "c" | "h" => Some(LanguageKind::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(LanguageKind::Cpp),
            "cs" => Some(LanguageKind::CSharp),
            "go" => Some(LanguageKind::Go),
            "java" => Some(LanguageKind::Java),
            "kt" | "kts" => Some(LanguageKind::Kotlin),
            "php" => Some(LanguageKind::Php),
            "rb" => Some(LanguageKind::Ruby),
            "rs" => Some(LanguageKind::Rust),
            // Recognized but unparsed: these index through the chunking path.
            "md" | "mdx" | "rst" | "txt" | "org"
            | "json" | "jsonc" | "yaml" | "yml" | "toml" | "xml" | "svg" | "plist"
            | "html" | "htm" | "css" | "scss" | "sass" | "less" | "vue" | "svelte" | "astro"
            | "sh" | "bash" | "zsh" | "fish" | "ps1"
            | "sql" | "graphql" | "gql" | "proto" | "thrift"
            | "ex" | "exs" | "erl" | "hrl" | "hs" | "ml" | "mli" | "clj" | "cljs" | "scala"
            | "swift" | "dart" | "lua" | "pl" | "pm" | "r" | "jl" | "zig" | "nim" | "elm"
            | "tf" | "hcl" | "nix" | "cmake" | "gradle" | "groovy" | "bat" | "cfg" | "ini"
            | "properties" | "env" | "lock" | "csv" | "tsv" => Some(LanguageKind::Unparsed),
            _ => None,
        }
    }

    /// Scope rules for first-class languages; `None` for the unparsed tail.
    pub fn rules(&self) -> Option<&'static dyn ScopeRules> {
        match self {
            LanguageKind::Python => Some(&python::Python),
            LanguageKind::JavaScript => Some(&javascript::JavaScript),
            LanguageKind::TypeScript => Some(&javascript::TypeScript),
            LanguageKind::Tsx => Some(&javascript::Tsx),
            LanguageKind::C => Some(&c::C),
            LanguageKind::Cpp => Some(&c::Cpp),
            LanguageKind::CSharp => Some(&csharp::CSharp),
            LanguageKind::Go => Some(&go::Go),
            LanguageKind::Java => Some(&java::Java),
            LanguageKind::Kotlin => Some(&kotlin::Kotlin),
            LanguageKind::Php => Some(&php::Php),
            LanguageKind::Ruby => Some(&ruby::Ruby),
            LanguageKind::Rust => Some(&rust::Rust),
            LanguageKind::Unparsed => None,
        }
    }
}
