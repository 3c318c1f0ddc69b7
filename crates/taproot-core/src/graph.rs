//! Directed multigraph arena with dense node ids and node-link persistence
//!
//! Nodes live in a slot vector so ids stay dense and stable; removing a node
//! leaves a hole that `load` reproduces, which keeps persisted ids valid
//! across save/load cycles. Edges are plain `(source, target, attrs)` entries
//! with per-node adjacency lists; parallel edges are allowed.

use crate::model::{EdgeKind, KGEdge, KGNode, KGNodeKind, NodeId};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone)]
struct EdgeEntry {
    source: NodeId,
    target: NodeId,
    attrs: KGEdge,
}

/// The code knowledge graph for one feature.
pub struct KnowledgeGraph {
    nodes: Vec<Option<KGNode>>,
    free_nodes: Vec<usize>,
    edges: Vec<Option<EdgeEntry>>,
    /// Outgoing edge indices per node slot.
    outgoing: Vec<Vec<usize>>,
    /// Incoming edge indices per node slot.
    incoming: Vec<Vec<usize>>,
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("node_count", &self.node_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        KnowledgeGraph {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// Add a node, assigning the next free id. Returns the stored node with
    /// its id filled in.
    pub fn add_node(
        &mut self,
        kind: KGNodeKind,
        symbol: String,
        file_name: String,
        line: u32,
        end_line: Option<u32>,
    ) -> KGNode {
        let idx = match self.free_nodes.pop() {
            Some(idx) => idx,
            None => {
                self.nodes.push(None);
                self.outgoing.push(Vec::new());
                self.incoming.push(Vec::new());
                self.nodes.len() - 1
            }
        };
        let node = KGNode {
            id: NodeId(idx),
            kind,
            symbol,
            file_name,
            line,
            end_line,
            db_id: None,
        };
        self.nodes[idx] = Some(node.clone());
        node
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&KGNode> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Get a mutable node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut KGNode> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Ordered lookup of several nodes. Ids that no longer exist are skipped.
    pub fn get_nodes(&self, ids: &[NodeId]) -> Vec<KGNode> {
        ids.iter().filter_map(|id| self.node(*id).cloned()).collect()
    }

    /// Bulk edge insert. Endpoints must exist.
    pub fn add_edges(&mut self, additions: Vec<(NodeId, NodeId, KGEdge)>) {
        for (source, target, attrs) in additions {
            self.add_edge(source, target, attrs);
        }
    }

    /// Insert one directed edge. Parallel edges are allowed.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, attrs: KGEdge) {
        debug_assert!(self.node(source).is_some(), "edge source {source:?} missing");
        debug_assert!(self.node(target).is_some(), "edge target {target:?} missing");
        let idx = self.edges.len();
        self.edges.push(Some(EdgeEntry { source, target, attrs }));
        self.outgoing[source.0].push(idx);
        self.incoming[target.0].push(idx);
    }

    /// Remove a node and every incident edge.
    pub fn remove_node(&mut self, id: NodeId) -> Option<KGNode> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        let incident: Vec<usize> = self.outgoing[id.0]
            .iter()
            .chain(self.incoming[id.0].iter())
            .copied()
            .collect();
        for edge_idx in incident {
            if let Some(entry) = self.edges[edge_idx].take() {
                self.outgoing[entry.source.0].retain(|&e| e != edge_idx);
                self.incoming[entry.target.0].retain(|&e| e != edge_idx);
            }
        }
        self.outgoing[id.0].clear();
        self.incoming[id.0].clear();
        self.free_nodes.push(id.0);
        Some(node)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &KGNode> {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    /// Ids of all live nodes.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|_| NodeId(idx)))
    }

    /// Iterate over all live edges as `(source, target, attrs)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &KGEdge)> {
        self.edges
            .iter()
            .filter_map(|slot| slot.as_ref().map(|e| (e.source, e.target, &e.attrs)))
    }

    /// Outgoing edges from one node as `(target, attrs)`.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = (NodeId, &KGEdge)> {
        self.outgoing
            .get(source.0)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.edges[idx].as_ref().map(|e| (e.target, &e.attrs)))
    }

    /// Whether an edge of the given kind exists between two nodes.
    pub fn has_edge_between(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.edges_from(source)
            .any(|(t, attrs)| t == target && attrs.kind == kind)
    }

    /// Persist as node-link JSON. All attribute values are strings so the
    /// on-disk format stays language-agnostic.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let doc = NodeLinkDoc {
            nodes: self
                .nodes()
                .map(|n| NodeLinkNode {
                    id: n.id.0.to_string(),
                    kind: n.kind.as_str().to_string(),
                    symbol: n.symbol.clone(),
                    file_name: n.file_name.clone(),
                    line: n.line.to_string(),
                    end_line: n
                        .end_line
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "None".to_string()),
                    db_id: n
                        .db_id
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "None".to_string()),
                })
                .collect(),
            links: self
                .edges()
                .map(|(source, target, attrs)| NodeLinkEdge {
                    source: source.0,
                    target: target.0,
                    kind: attrs.kind.as_str().to_string(),
                    reverse: if attrs.reverse { "1" } else { "0" }.to_string(),
                })
                .collect(),
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(file, &doc).context("serializing graph")?;
        Ok(())
    }

    /// Load from node-link JSON. Node ids are restored exactly, including the
    /// holes left by removed nodes; edge `src_file`/`target_file` attributes
    /// are reconstituted from the endpoint nodes.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let doc: NodeLinkDoc = serde_json::from_reader(file).context("parsing graph")?;

        let mut graph = KnowledgeGraph::new();
        let max_id = doc
            .nodes
            .iter()
            .map(|n| n.id.parse::<usize>().unwrap_or(0))
            .max();
        if let Some(max_id) = max_id {
            graph.nodes.resize_with(max_id + 1, || None);
            graph.outgoing.resize_with(max_id + 1, Vec::new);
            graph.incoming.resize_with(max_id + 1, Vec::new);
        }

        for raw in &doc.nodes {
            let id: usize = raw.id.parse().with_context(|| format!("node id {:?}", raw.id))?;
            let kind = KGNodeKind::from_str(&raw.kind)
                .with_context(|| format!("node type {:?}", raw.kind))?;
            graph.nodes[id] = Some(KGNode {
                id: NodeId(id),
                kind,
                symbol: raw.symbol.clone(),
                file_name: raw.file_name.clone(),
                line: raw.line.parse().unwrap_or(0),
                end_line: parse_opt(&raw.end_line),
                db_id: parse_opt(&raw.db_id),
            });
        }
        // Holes become the free list, smallest id first on reuse.
        graph.free_nodes = (0..graph.nodes.len())
            .rev()
            .filter(|&idx| graph.nodes[idx].is_none())
            .collect();

        for raw in &doc.links {
            let kind = EdgeKind::from_str(&raw.kind)
                .with_context(|| format!("edge type {:?}", raw.kind))?;
            let (Some(src), Some(dst)) = (graph.node(NodeId(raw.source)), graph.node(NodeId(raw.target)))
            else {
                bail!("edge {} -> {} references a missing node", raw.source, raw.target);
            };
            let attrs = KGEdge {
                kind,
                src_file: src.file_name.clone(),
                target_file: dst.file_name.clone(),
                reverse: raw.reverse == "1",
            };
            graph.add_edge(NodeId(raw.source), NodeId(raw.target), attrs);
        }

        Ok(graph)
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_opt<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s == "None" { None } else { s.parse().ok() }
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeLinkDoc {
    nodes: Vec<NodeLinkNode>,
    links: Vec<NodeLinkEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeLinkNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    symbol: String,
    file_name: String,
    line: String,
    end_line: String,
    db_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeLinkEdge {
    source: usize,
    target: usize,
    #[serde(rename = "type")]
    kind: String,
    reverse: String,
}
