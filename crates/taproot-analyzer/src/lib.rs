//! Taproot Analyzer — tree-sitter scope extraction and AST indexing

pub mod indexing;
pub mod languages;
pub mod parser_pool;
pub mod scopes;
pub mod source_file;


pub use indexing::{Analysis, Analyzer, DeferredEdge, analyze_files};
pub use languages::{LanguageKind, ScopeKind, ScopeRules, TextRange};
pub use parser_pool::{ParseRequest, ParseResult, ParserPool, create_parser_pool};
pub use scopes::{Scope, nested_scopes};
pub use source_file::{AnalyzerError, IndentChar, LineEnding, SourceFile, WhitespaceProfile};
