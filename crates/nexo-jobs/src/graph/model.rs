//! In-memory property graph: a directed multigraph with typed, attributed
//! nodes and edges, owned exclusively by one build until serialized.

use std::collections::{BTreeMap, HashMap};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Directed;
use serde_json::{Map, Value as JsonValue};

/// A typed attribute value, chosen to map onto the exchange format's
/// declared attribute types.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    /// GraphML `attr.type` for this value.
    pub fn graphml_type(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "string",
            AttrValue::Int(_) => "long",
            AttrValue::Float(_) => "double",
            AttrValue::Bool(_) => "boolean",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&JsonValue> for AttrValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => AttrValue::Str("None".to_string()),
            JsonValue::Bool(b) => AttrValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => AttrValue::Str(s.clone()),
            JsonValue::Array(items) => AttrValue::Str(join_list(items)),
            JsonValue::Object(_) => AttrValue::Str(value.to_string()),
        }
    }
}

fn join_list(items: &[JsonValue]) -> String {
    items
        .iter()
        .map(|v| match v {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Attribute record attached to a node or edge.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Flatten a stored attribute document for serialization to a flat format:
/// nested maps become underscore-joined keys, list values become a
/// delimited scalar string, nulls become `"None"`.
pub fn flatten(attrs: &Map<String, JsonValue>) -> AttrMap {
    let mut out = AttrMap::new();
    flatten_into(attrs, "", &mut out);
    out
}

fn flatten_into(attrs: &Map<String, JsonValue>, prefix: &str, out: &mut AttrMap) {
    for (key, value) in attrs {
        let flat_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}_{key}")
        };
        match value {
            JsonValue::Object(nested) => flatten_into(nested, &flat_key, out),
            other => {
                out.insert(flat_key, AttrValue::from(other));
            }
        }
    }
}

/// An attributed node.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub attrs: AttrMap,
}

/// An attributed edge.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub attrs: AttrMap,
}

/// Directed multigraph with attributed nodes and edges, indexed by node
/// identifier.
#[derive(Debug, Default)]
pub struct PropertyGraph {
    graph: StableGraph<GraphNode, GraphEdge, Directed>,
    index: HashMap<String, NodeIndex>,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up or create the node with the given identifier.
    pub fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            id: id.to_string(),
            attrs: AttrMap::new(),
        });
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Add an edge, creating missing endpoint nodes. Parallel edges are
    /// kept: this is a multigraph.
    pub fn add_edge(&mut self, source: &str, target: &str, attrs: AttrMap) {
        let s = self.ensure_node(source);
        let t = self.ensure_node(target);
        self.graph.add_edge(s, t, GraphEdge { attrs });
    }

    /// Merge attributes into a node, overwriting existing keys.
    pub fn merge_node_attrs(&mut self, id: &str, attrs: AttrMap) {
        let idx = self.ensure_node(id);
        let node = self
            .graph
            .node_weight_mut(idx)
            .expect("indexed node has a weight");
        node.attrs.extend(attrs);
    }

    pub fn node_attrs(&self, id: &str) -> Option<&AttrMap> {
        let idx = self.index.get(id)?;
        self.graph.node_weight(*idx).map(|n| &n.attrs)
    }

    /// Remove a node and its incident edges. Returns whether it existed.
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.index.remove(id) {
            Some(idx) => {
                self.graph.remove_node(idx);
                true
            }
            None => false,
        }
    }

    /// Whether the node participates in at least one edge, in either
    /// direction.
    pub fn has_incident_edges(&self, id: &str) -> bool {
        match self.index.get(id) {
            Some(&idx) => self.graph.neighbors_undirected(idx).next().is_some(),
            None => false,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// All node identifiers, sorted for deterministic comparison.
    pub fn node_ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Edges as `(source id, target id, edge)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &GraphEdge)> {
        self.graph.edge_references().map(|e| {
            let source = &self.graph[e.source()];
            let target = &self.graph[e.target()];
            (source.id.as_str(), target.id.as_str(), e.weight())
        })
    }

    /// Edge endpoint pairs, sorted for deterministic comparison.
    pub fn edge_pairs_sorted(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .edges()
            .map(|(s, t, _)| (s.to_string(), t.to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs_of(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_flatten_nested_and_lists() {
        let flat = flatten(&attrs_of(json!({
            "primaryDomainId": "mondo.0005",
            "refs": {"omim": "omim.1", "count": 2},
            "synonyms": ["a", "b"],
            "missing": null,
        })));

        assert_eq!(
            flat.get("primaryDomainId"),
            Some(&AttrValue::Str("mondo.0005".into()))
        );
        assert_eq!(flat.get("refs_omim"), Some(&AttrValue::Str("omim.1".into())));
        assert_eq!(flat.get("refs_count"), Some(&AttrValue::Int(2)));
        assert_eq!(flat.get("synonyms"), Some(&AttrValue::Str("a, b".into())));
        assert_eq!(flat.get("missing"), Some(&AttrValue::Str("None".into())));
    }

    #[test]
    fn test_attr_value_types() {
        assert_eq!(AttrValue::from(&json!(true)).graphml_type(), "boolean");
        assert_eq!(AttrValue::from(&json!(7)).graphml_type(), "long");
        assert_eq!(AttrValue::from(&json!(0.5)).graphml_type(), "double");
        assert_eq!(AttrValue::from(&json!("x")).graphml_type(), "string");
    }

    #[test]
    fn test_multigraph_keeps_parallel_edges() {
        let mut g = PropertyGraph::new();
        g.add_edge("a", "b", AttrMap::new());
        g.add_edge("a", "b", AttrMap::new());
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut g = PropertyGraph::new();
        g.add_edge("a", "b", AttrMap::new());
        g.add_edge("b", "c", AttrMap::new());
        assert!(g.has_incident_edges("b"));

        assert!(g.remove_node("b"));
        assert_eq!(g.edge_count(), 0);
        assert!(!g.contains_node("b"));
        // Dangling endpoints stay as nodes.
        assert!(g.contains_node("a"));
        assert!(!g.has_incident_edges("a"));
    }

    #[test]
    fn test_merge_node_attrs_overwrites() {
        let mut g = PropertyGraph::new();
        g.ensure_node("a");
        g.merge_node_attrs(
            "a",
            AttrMap::from([("type".to_string(), AttrValue::Str("Gene".into()))]),
        );
        g.merge_node_attrs(
            "a",
            AttrMap::from([("type".to_string(), AttrValue::Str("Drug".into()))]),
        );
        assert_eq!(
            g.node_attrs("a").unwrap().get("type"),
            Some(&AttrValue::Str("Drug".into()))
        );
    }

    #[test]
    fn test_sorted_views() {
        let mut g = PropertyGraph::new();
        g.add_edge("b", "a", AttrMap::new());
        g.add_edge("a", "c", AttrMap::new());
        assert_eq!(g.node_ids_sorted(), vec!["a", "b", "c"]);
        assert_eq!(
            g.edge_pairs_sorted(),
            vec![
                ("a".to_string(), "c".to_string()),
                ("b".to_string(), "a".to_string())
            ]
        );
    }
}
