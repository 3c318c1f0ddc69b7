//! AST-based indexing: files in, graph nodes + snippet contents + deferred
//! edges out
//!
//! Each class/function scope becomes a draft node whose symbol is the dotted
//! chain of its enclosing scope names. Files without extractable scopes are
//! chunked every 50 lines instead. Edges to parent scopes are deferred as
//! `(symbol, parent symbol, kind)` until the graph has assigned real ids.

use crate::languages::{LanguageKind, ScopeKind};
use crate::parser_pool::{ParseRequest, ParserPool};
use crate::scopes::{Scope, nested_scopes, scopes_from_tree};
use crate::source_file::{AnalyzerError, SourceFile};
use anyhow::Result;
use std::collections::BTreeMap;
use taproot_core::{EdgeKind, KGNode, KGNodeKind};

const CHUNK_LINES: usize = 50;

/// An edge recorded by symbol, resolved to node ids after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredEdge {
    pub symbol: String,
    pub parent_symbol: String,
    pub kind: EdgeKind,
}

/// Output of one indexing pass. `nodes[i]` pairs with `contents[i]`.
#[derive(Debug, Default)]
pub struct Analysis {
    pub nodes: Vec<KGNode>,
    pub contents: Vec<String>,
    pub deferred_edges: Vec<DeferredEdge>,
}

struct IndexState {
    analysis: Analysis,
    unknown_ctr: usize,
}

impl IndexState {
    fn new() -> Self {
        IndexState {
            analysis: Analysis::default(),
            unknown_ctr: 0,
        }
    }

    fn next_unknown(&mut self) -> String {
        self.unknown_ctr += 1;
        format!("unknown_{}", self.unknown_ctr)
    }
}

/// Index a file set synchronously, parsing inline. Suits small sets like
/// overlay edits; bulk ingestion goes through [`Analyzer`].
pub fn analyze_files(files: &BTreeMap<String, String>) -> Analysis {
    let mut state = IndexState::new();

    for (file_name, contents) in files {
        let sf = match SourceFile::new(file_name.clone(), contents.clone()) {
            Ok(sf) => sf,
            Err(AnalyzerError::UnknownExtension(_)) => {
                tracing::debug!("skipping {}: unknown extension", file_name);
                continue;
            }
            Err(e) => {
                tracing::info!("error reading {}: {}", file_name, e);
                continue;
            }
        };

        let scopes = match nested_scopes(&sf) {
            Ok(scopes) => scopes,
            Err(e) => {
                tracing::warn!("error parsing {}: {}", file_name, e);
                continue;
            }
        };

        index_file(&mut state, file_name, contents, &scopes, sf.lang);
    }

    state.analysis
}

/// Pool-backed analyzer for bulk ingestion: all parse jobs are dispatched up
/// front and drained in file order, so the workers run in parallel while the
/// output stays deterministic.
#[derive(Clone)]
pub struct Analyzer {
    pool: ParserPool,
}

impl Analyzer {
    pub fn new(pool: ParserPool) -> Self {
        Self { pool }
    }

    pub async fn analyze(&self, files: BTreeMap<String, String>) -> Result<Analysis> {
        enum Pending {
            Parsed(std::sync::mpsc::Receiver<Result<crate::parser_pool::ParseResult>>),
            Chunked,
        }

        let mut jobs: Vec<(String, String, LanguageKind, Pending)> = Vec::new();
        for (file_name, contents) in files {
            let Some(lang) = LanguageKind::from_file_name(&file_name) else {
                tracing::debug!("skipping {}: unknown extension", file_name);
                continue;
            };
            let pending = if lang.rules().is_some() {
                Pending::Parsed(self.pool.submit(ParseRequest {
                    lang,
                    content: contents.clone(),
                    file_name: file_name.clone(),
                })?)
            } else {
                Pending::Chunked
            };
            jobs.push((file_name, contents, lang, pending));
        }

        tokio::task::spawn_blocking(move || {
            let mut state = IndexState::new();
            for (file_name, contents, lang, pending) in jobs {
                let scopes = match pending {
                    Pending::Chunked => Vec::new(),
                    Pending::Parsed(receiver) => {
                        let parsed = receiver
                            .recv()
                            .map_err(|_| anyhow::anyhow!("parser worker died"))?;
                        match parsed {
                            Ok(result) => {
                                let rules = lang.rules().expect("submitted with rules");
                                scopes_from_tree(&result.tree, rules, result.content.as_bytes())
                            }
                            Err(e) => {
                                tracing::warn!("error parsing {}: {}", file_name, e);
                                continue;
                            }
                        }
                    }
                };
                index_file(&mut state, &file_name, &contents, &scopes, lang);
            }
            Ok(state.analysis)
        })
        .await
        .map_err(|e| anyhow::anyhow!("task join error: {}", e))?
    }
}

/// Dotted symbol for a file: extension stripped, slashes become dots.
fn file_symbol(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
        .replace('/', ".")
}

fn index_file(
    state: &mut IndexState,
    file_name: &str,
    contents: &str,
    scopes: &[Scope],
    lang: LanguageKind,
) {
    let file_lines: Vec<&str> = contents.lines().collect();

    if scopes.is_empty() {
        tracing::debug!("no scopes in {}, indexing by chunking", file_name);
        let mut start = 0;
        while start < file_lines.len() {
            let end = (start + CHUNK_LINES).min(file_lines.len());
            state.analysis.nodes.push(KGNode::draft(
                KGNodeKind::File,
                file_symbol(file_name),
                file_name.to_string(),
                start as u32,
                Some(end as u32),
            ));
            state.analysis.contents.push(format!(
                "# {}\n{}",
                file_name,
                file_lines[start..end].join("\n").trim()
            ));
            start += CHUNK_LINES;
        }
        return;
    }

    let file_node = KGNode::draft(
        KGNodeKind::File,
        file_symbol(file_name),
        file_name.to_string(),
        0,
        None,
    );
    let file_sym = file_node.symbol.clone();
    state.analysis.nodes.push(file_node);
    state.analysis.contents.push(String::new());

    recurse_scopes(state, scopes, &file_sym, file_name, &file_lines, lang);
}

fn recurse_scopes(
    state: &mut IndexState,
    scopes: &[Scope],
    parent_symbol: &str,
    file_name: &str,
    file_lines: &[&str],
    lang: LanguageKind,
) {
    for scope in scopes {
        let (node_kind, edge_kind) = match scope.kind {
            ScopeKind::Class => (KGNodeKind::Class, EdgeKind::ClassDef),
            ScopeKind::Function => (KGNodeKind::Function, EdgeKind::FunctionDef),
            // Namespaces, block statements, and spans are transparent: their
            // children attach to the current parent.
            _ => {
                recurse_scopes(state, &scope.children, parent_symbol, file_name, file_lines, lang);
                continue;
            }
        };

        let mut start_line = scope.start_row;
        let mut end_line = scope.end_line_exclusive();

        if node_kind == KGNodeKind::Class {
            // The class node's span stops where its first child scope starts.
            for child in &scope.children {
                end_line = end_line.min(child.start_row);
            }
        }

        if lang == LanguageKind::Python {
            while start_line > 0
                && file_lines
                    .get(start_line - 1)
                    .map(|l| l.trim_start().starts_with('@'))
                    .unwrap_or(false)
            {
                start_line -= 1;
            }
        }

        let name = scope
            .name
            .clone()
            .unwrap_or_else(|| state.next_unknown());
        let symbol = format!("{parent_symbol}.{name}");

        state.analysis.nodes.push(KGNode::draft(
            node_kind,
            symbol.clone(),
            file_name.to_string(),
            start_line as u32,
            Some(end_line as u32),
        ));
        state.analysis.deferred_edges.push(DeferredEdge {
            symbol: symbol.clone(),
            parent_symbol: parent_symbol.to_string(),
            kind: edge_kind,
        });

        let hi = end_line.min(file_lines.len());
        let lo = start_line.min(hi);
        state.analysis.contents.push(format!(
            "# {}\n# {}\n{}",
            file_name,
            symbol,
            file_lines[lo..hi].join("\n")
        ));

        recurse_scopes(state, &scope.children, &symbol, file_name, file_lines, lang);
    }
}
