//! Identifier relabeling as a pure graph-to-graph transformation.
//!
//! Disorder nodes with exactly one unambiguous alternate-scheme identifier
//! are relabeled to it. The transformation is all-or-nothing per node:
//! every edge attribute that duplicates an endpoint identifier is rewritten
//! in lockstep with the endpoints themselves, so the graph never holds a
//! stale identifier.

use std::collections::{BTreeMap, HashMap};

use nexo_core::{
    defaults, EntityStore, NodeFilter, Result, ATTR_MEMBER_ONE, ATTR_MEMBER_TWO, ATTR_PRIMARY_ID,
    ATTR_SOURCE_ID, ATTR_TARGET_ID,
};

use super::model::{AttrMap, AttrValue, PropertyGraph};

/// Compute the rename map: disorder primary id → alternate-scheme id, for
/// disorders whose alternate mapping is unambiguous in both directions
/// (one alternate id on the node, one node per alternate id) and that are
/// present in the graph.
pub async fn unambiguous_alternate_ids(
    store: &dyn EntityStore,
    graph: &PropertyGraph,
) -> Result<BTreeMap<String, String>> {
    let disorders = store
        .nodes(defaults::COLL_DISORDER, &NodeFilter::All)
        .await?;

    let mut owners_of_alternate: HashMap<String, Vec<String>> = HashMap::new();
    for doc in &disorders {
        let Some(primary) = doc.primary_id() else {
            continue;
        };
        let alternates: Vec<String> = doc
            .str_list("domainIds")
            .into_iter()
            .filter(|id| id.starts_with(defaults::OMIM_PREFIX))
            .collect();
        if let [alternate] = alternates.as_slice() {
            owners_of_alternate
                .entry(alternate.clone())
                .or_default()
                .push(primary.to_string());
        }
    }

    let mut rename = BTreeMap::new();
    for (alternate, owners) in owners_of_alternate {
        if let [owner] = owners.as_slice() {
            if graph.contains_node(owner) {
                rename.insert(owner.clone(), alternate);
            }
        }
    }
    Ok(rename)
}

/// Rebuild the graph with renamed node identifiers.
///
/// Returns a new graph: node ids and their `primaryDomainId` attribute are
/// replaced, and every endpoint-duplicating edge attribute (`memberOne`,
/// `memberTwo`, `sourceDomainId`, `targetDomainId`) is rewritten to the
/// endpoint it mirrors.
pub fn relabel(graph: PropertyGraph, rename: &BTreeMap<String, String>) -> PropertyGraph {
    if rename.is_empty() {
        return graph;
    }

    let renamed = |id: &str| -> String {
        rename.get(id).cloned().unwrap_or_else(|| id.to_string())
    };

    let mut out = PropertyGraph::new();

    for node in graph.nodes() {
        let new_id = renamed(&node.id);
        let mut attrs = node.attrs.clone();
        if rename.contains_key(node.id.as_str()) {
            attrs.insert(ATTR_PRIMARY_ID.to_string(), AttrValue::Str(new_id.clone()));
        }
        out.merge_node_attrs(&new_id, attrs);
    }

    for (source, target, edge) in graph.edges() {
        let new_source = renamed(source);
        let new_target = renamed(target);
        let mut attrs: AttrMap = edge.attrs.clone();
        for (key, endpoint) in [
            (ATTR_MEMBER_ONE, &new_source),
            (ATTR_SOURCE_ID, &new_source),
            (ATTR_MEMBER_TWO, &new_target),
            (ATTR_TARGET_ID, &new_target),
        ] {
            if attrs.contains_key(key) {
                attrs.insert(key.to_string(), AttrValue::Str(endpoint.clone()));
            }
        }
        out.add_edge(&new_source, &new_target, attrs);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_store::MemoryEntityStore;
    use serde_json::json;

    fn graph_with_edge() -> PropertyGraph {
        let mut g = PropertyGraph::new();
        g.merge_node_attrs(
            "mondo.1",
            AttrMap::from([(
                ATTR_PRIMARY_ID.to_string(),
                AttrValue::Str("mondo.1".into()),
            )]),
        );
        g.add_edge(
            "mondo.1",
            "mondo.2",
            AttrMap::from([
                (ATTR_SOURCE_ID.to_string(), AttrValue::Str("mondo.1".into())),
                (ATTR_TARGET_ID.to_string(), AttrValue::Str("mondo.2".into())),
            ]),
        );
        g
    }

    #[test]
    fn test_relabel_rewrites_endpoints_and_copies() {
        let rename = BTreeMap::from([("mondo.1".to_string(), "omim.100".to_string())]);
        let out = relabel(graph_with_edge(), &rename);

        assert!(out.contains_node("omim.100"));
        assert!(!out.contains_node("mondo.1"));
        assert_eq!(
            out.node_attrs("omim.100").unwrap().get(ATTR_PRIMARY_ID),
            Some(&AttrValue::Str("omim.100".into()))
        );

        let (s, t, edge) = out.edges().next().unwrap();
        assert_eq!((s, t), ("omim.100", "mondo.2"));
        // No stale identifier anywhere.
        assert_eq!(
            edge.attrs.get(ATTR_SOURCE_ID),
            Some(&AttrValue::Str("omim.100".into()))
        );
        assert_eq!(
            edge.attrs.get(ATTR_TARGET_ID),
            Some(&AttrValue::Str("mondo.2".into()))
        );
    }

    #[test]
    fn test_relabel_empty_map_is_identity() {
        let g = graph_with_edge();
        let nodes_before = g.node_ids_sorted();
        let out = relabel(g, &BTreeMap::new());
        assert_eq!(out.node_ids_sorted(), nodes_before);
    }

    #[tokio::test]
    async fn test_ambiguous_alternates_are_skipped() {
        let mut store = MemoryEntityStore::new();
        // Two alternate ids on one node: ambiguous, no rename.
        store.insert_node(
            defaults::COLL_DISORDER,
            json!({
                "primaryDomainId": "mondo.1",
                "domainIds": ["mondo.1", "omim.100", "omim.200"],
            }),
        );
        // One alternate id, but shared by two nodes: ambiguous too.
        store.insert_node(
            defaults::COLL_DISORDER,
            json!({"primaryDomainId": "mondo.2", "domainIds": ["omim.300"]}),
        );
        store.insert_node(
            defaults::COLL_DISORDER,
            json!({"primaryDomainId": "mondo.3", "domainIds": ["omim.300"]}),
        );
        // Clean mapping.
        store.insert_node(
            defaults::COLL_DISORDER,
            json!({"primaryDomainId": "mondo.4", "domainIds": ["omim.400"]}),
        );

        let mut graph = PropertyGraph::new();
        for id in ["mondo.1", "mondo.2", "mondo.3", "mondo.4"] {
            graph.ensure_node(id);
        }

        let rename = unambiguous_alternate_ids(&store, &graph).await.unwrap();
        assert_eq!(
            rename,
            BTreeMap::from([("mondo.4".to_string(), "omim.400".to_string())])
        );
    }

    #[tokio::test]
    async fn test_rename_restricted_to_graph_members() {
        let mut store = MemoryEntityStore::new();
        store.insert_node(
            defaults::COLL_DISORDER,
            json!({"primaryDomainId": "mondo.5", "domainIds": ["omim.500"]}),
        );

        let graph = PropertyGraph::new();
        let rename = unambiguous_alternate_ids(&store, &graph).await.unwrap();
        assert!(rename.is_empty());
    }
}
