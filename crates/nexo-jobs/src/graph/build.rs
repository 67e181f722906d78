//! Graph construction engine: reads a filtered, typed subgraph from the
//! entity store and assembles an attributed property graph.
//!
//! Pass order matters and is part of the contract: edges first, then nodes,
//! then retroactive node filtering, attribute decoration, isolated-node
//! pruning, and finally the optional identifier relabeling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use nexo_core::{
    defaults, EdgeFilter, Entity, EntityStore, Error, NodeFilter, Result, ATTR_MEMBER_ONE,
    ATTR_MEMBER_TWO, ATTR_PRIMARY_ID, ATTR_SOURCE_ID, ATTR_TARGET_ID, ATTR_TYPE,
};

use super::model::{flatten, AttrMap, AttrValue, PropertyGraph};
use super::relabel;

/// Graph build request as submitted by a client; every field optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphBuildRequest {
    pub nodes: Option<Vec<String>>,
    pub edges: Option<Vec<String>>,
    pub iid_evidence: Option<Vec<String>>,
    pub ppi_self_loops: Option<bool>,
    pub taxid: Option<Vec<i64>>,
    pub drug_groups: Option<Vec<String>>,
    pub concise: Option<bool>,
    pub include_omim: Option<bool>,
    pub disgenet_threshold: Option<f64>,
    pub use_omim_ids: Option<bool>,
    pub split_drug_types: Option<bool>,
}

/// Normalized graph build spec: defaults filled, lists sorted and
/// de-duplicated, values validated. This is what gets fingerprinted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphBuildSpec {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub iid_evidence: Vec<String>,
    pub ppi_self_loops: bool,
    pub taxid: Vec<i64>,
    pub drug_groups: Vec<String>,
    pub concise: bool,
    pub include_omim: bool,
    pub disgenet_threshold: f64,
    pub use_omim_ids: bool,
    pub split_drug_types: bool,
    /// Store version the build ran against; part of the dedup key so a new
    /// store release never aliases artifacts built from the previous one.
    pub version: String,
}

fn check_values<T: PartialEq + std::fmt::Debug>(
    supplied: &[T],
    valid: &[T],
    property: &str,
) -> Result<()> {
    let invalid: Vec<&T> = supplied.iter().filter(|v| !valid.contains(v)).collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Invalid value(s) for {property}: {invalid:?}"
        )))
    }
}

fn sorted_dedup<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values.dedup();
    values
}

impl GraphBuildRequest {
    /// Validate and normalize against the store's collection lists.
    pub fn normalize(
        self,
        valid_nodes: &[String],
        valid_edges: &[String],
        version: &str,
    ) -> Result<GraphBuildSpec> {
        let nodes = sorted_dedup(self.nodes.unwrap_or_else(|| {
            defaults::DEFAULT_GRAPH_NODES.iter().map(|s| s.to_string()).collect()
        }));
        check_values(&nodes, valid_nodes, "nodes")?;

        let edges = sorted_dedup(self.edges.unwrap_or_else(|| {
            defaults::DEFAULT_GRAPH_EDGES.iter().map(|s| s.to_string()).collect()
        }));
        check_values(&edges, valid_edges, "edges")?;

        let iid_evidence = sorted_dedup(self.iid_evidence.unwrap_or_else(|| {
            defaults::DEFAULT_IID_EVIDENCE.iter().map(|s| s.to_string()).collect()
        }));
        let valid_evidence: Vec<String> = defaults::VALID_IID_EVIDENCE
            .iter()
            .map(|s| s.to_string())
            .collect();
        check_values(&iid_evidence, &valid_evidence, "iid_evidence")?;

        let taxid = sorted_dedup(self.taxid.unwrap_or_else(|| defaults::DEFAULT_TAXIDS.to_vec()));
        check_values(&taxid, &defaults::VALID_TAXIDS, "taxid")?;

        let drug_groups = sorted_dedup(self.drug_groups.unwrap_or_else(|| {
            defaults::DEFAULT_DRUG_GROUPS.iter().map(|s| s.to_string()).collect()
        }));
        let valid_groups: Vec<String> = defaults::VALID_DRUG_GROUPS
            .iter()
            .map(|s| s.to_string())
            .collect();
        check_values(&drug_groups, &valid_groups, "drug_groups")?;

        // Out-of-range thresholds are clamped to sentinel values that keep
        // everything (-1) or nothing (2.0) rather than rejected.
        let disgenet_threshold = match self.disgenet_threshold {
            None => defaults::DEFAULT_ASSOCIATION_THRESHOLD,
            Some(t) if t < 0.0 => -1.0,
            Some(t) if t > 1.0 => 2.0,
            Some(t) => t,
        };

        Ok(GraphBuildSpec {
            nodes,
            edges,
            iid_evidence,
            ppi_self_loops: self.ppi_self_loops.unwrap_or(false),
            taxid,
            drug_groups,
            concise: self.concise.unwrap_or(true),
            include_omim: self.include_omim.unwrap_or(true),
            disgenet_threshold,
            use_omim_ids: self.use_omim_ids.unwrap_or(false),
            split_drug_types: self.split_drug_types.unwrap_or(false),
            version: version.to_string(),
        })
    }
}

/// Concise attribute allow-list per resolved node type.
fn concise_node_attrs(node_type: &str) -> Result<&'static [&'static str]> {
    match node_type {
        "Pathway" => Ok(&["primaryDomainId", "displayName", "type"]),
        "Drug" | "BiotechDrug" | "SmallMoleculeDrug" => Ok(&[
            "primaryDomainId",
            "domainIds",
            "displayName",
            "synonyms",
            "type",
            "drugGroups",
            "indication",
        ]),
        "Disorder" => Ok(&[
            "primaryDomainId",
            "domainIds",
            "displayName",
            "synonyms",
            "icd10",
            "type",
        ]),
        "Gene" => Ok(&[
            "primaryDomainId",
            "displayName",
            "synonyms",
            "approvedSymbol",
            "symbols",
            "type",
        ]),
        "Protein" => Ok(&["primaryDomainId", "displayName", "geneName", "taxid", "type"]),
        "Signature" => Ok(&["primaryDomainId"]),
        other => Err(Error::GraphBuild(format!(
            "No concise attribute set for node type {other:?}"
        ))),
    }
}

/// Build the property graph described by the spec.
pub async fn build(store: &dyn EntityStore, spec: &GraphBuildSpec) -> Result<PropertyGraph> {
    let mut graph = PropertyGraph::new();

    add_edges(store, spec, &mut graph).await?;
    add_nodes(store, spec, &mut graph).await?;
    remove_filtered_endpoints(store, spec, &mut graph).await?;
    decorate_nodes(store, spec, &mut graph).await?;
    prune_isolated(spec, &mut graph);

    if spec.use_omim_ids {
        let rename = relabel::unambiguous_alternate_ids(store, &graph).await?;
        graph = relabel::relabel(graph, &rename);
    }

    debug!(
        subsystem = "jobs",
        component = "builder",
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Finished building graph"
    );
    Ok(graph)
}

/// Edge pass: stream each selected edge collection through its
/// type-specific filter.
async fn add_edges(
    store: &dyn EntityStore,
    spec: &GraphBuildSpec,
    graph: &mut PropertyGraph,
) -> Result<()> {
    for collection in &spec.edges {
        debug!(collection = %collection, "Adding edge collection");

        match collection.as_str() {
            defaults::COLL_PPI => {
                let filter = EdgeFilter::EvidenceAny(spec.iid_evidence.clone());
                for doc in store.edges(collection, &filter).await? {
                    let (m1, m2) = member_endpoints(&doc)?;
                    if !spec.ppi_self_loops && m1 == m2 {
                        continue;
                    }
                    let attrs = if spec.concise {
                        AttrMap::from([
                            (ATTR_MEMBER_ONE.into(), AttrValue::Str(m1.clone())),
                            (ATTR_MEMBER_TWO.into(), AttrValue::Str(m2.clone())),
                            ("reversible".into(), AttrValue::Bool(true)),
                            (ATTR_TYPE.into(), str_attr(&doc, ATTR_TYPE)),
                            (
                                "evidenceTypes".into(),
                                AttrValue::Str(doc.str_list("evidenceTypes").join(", ")),
                            ),
                        ])
                    } else {
                        full_edge_attrs(&doc, true)
                    };
                    graph.add_edge(&m1, &m2, attrs);
                }
            }
            defaults::COLL_GENE_DISORDER => {
                // Curated-or-scored union: one OR predicate per edge, so a
                // multigraph gains no duplicate association edges.
                let filter = EdgeFilter::CuratedOrScored {
                    source: spec
                        .include_omim
                        .then(|| defaults::CURATED_GENE_DISORDER_SOURCE.to_string()),
                    min_score: spec.disgenet_threshold,
                };
                for doc in store.edges(collection, &filter).await? {
                    let (s, t) = directed_endpoints(&doc)?;
                    // Concise and full projections are identical here.
                    graph.add_edge(&s, &t, full_edge_attrs(&doc, false));
                }
            }
            _ => {
                for doc in store.edges(collection, &EdgeFilter::All).await? {
                    if let Some((m1, m2)) = doc.member_pair() {
                        let (m1, m2) = (m1.to_string(), m2.to_string());
                        let attrs = if spec.concise {
                            AttrMap::from([
                                ("reversible".into(), AttrValue::Bool(true)),
                                (ATTR_TYPE.into(), str_attr(&doc, ATTR_TYPE)),
                                (ATTR_MEMBER_ONE.into(), AttrValue::Str(m1.clone())),
                                (ATTR_MEMBER_TWO.into(), AttrValue::Str(m2.clone())),
                            ])
                        } else {
                            full_edge_attrs(&doc, true)
                        };
                        graph.add_edge(&m1, &m2, attrs);
                    } else if let Some((s, t)) = doc.source_target() {
                        let (s, t) = (s.to_string(), t.to_string());
                        let attrs = if spec.concise {
                            AttrMap::from([
                                ("reversible".into(), AttrValue::Bool(false)),
                                (ATTR_TYPE.into(), str_attr(&doc, ATTR_TYPE)),
                                (ATTR_SOURCE_ID.into(), AttrValue::Str(s.clone())),
                                (ATTR_TARGET_ID.into(), AttrValue::Str(t.clone())),
                            ])
                        } else {
                            full_edge_attrs(&doc, false)
                        };
                        graph.add_edge(&s, &t, attrs);
                    } else {
                        return Err(Error::GraphBuild(format!(
                            "Edge in {collection} has neither member nor source/target endpoints"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Node pass: add selected collections through their inclusion filters.
async fn add_nodes(
    store: &dyn EntityStore,
    spec: &GraphBuildSpec,
    graph: &mut PropertyGraph,
) -> Result<()> {
    for collection in &spec.nodes {
        let filter = match collection.as_str() {
            defaults::COLL_PROTEIN => NodeFilter::TaxidIn(spec.taxid.clone()),
            defaults::COLL_DRUG => NodeFilter::GroupAny(spec.drug_groups.clone()),
            _ => NodeFilter::All,
        };
        for doc in store.nodes(collection, &filter).await? {
            let id = primary_id(&doc, collection)?;
            graph.merge_node_attrs(
                &id,
                AttrMap::from([(ATTR_PRIMARY_ID.into(), AttrValue::Str(id.clone()))]),
            );
        }
    }
    Ok(())
}

/// Post-filter pass: node-type filters apply retroactively to edge
/// endpoints, even if that leaves a dangling edge reference.
async fn remove_filtered_endpoints(
    store: &dyn EntityStore,
    spec: &GraphBuildSpec,
    graph: &mut PropertyGraph,
) -> Result<()> {
    let excluded_proteins = store
        .nodes(
            defaults::COLL_PROTEIN,
            &NodeFilter::TaxidNotIn(spec.taxid.clone()),
        )
        .await?;
    for doc in &excluded_proteins {
        if let Some(id) = doc.primary_id() {
            graph.remove_node(id);
        }
    }

    let excluded_drugs = store
        .nodes(
            defaults::COLL_DRUG,
            &NodeFilter::GroupNone(spec.drug_groups.clone()),
        )
        .await?;
    for doc in &excluded_drugs {
        if let Some(id) = doc.primary_id() {
            graph.remove_node(id);
        }
    }
    Ok(())
}

/// Attribute decoration pass: every node in the graph receives its
/// type-appropriate record, looked up across all node collections.
async fn decorate_nodes(
    store: &dyn EntityStore,
    spec: &GraphBuildSpec,
    graph: &mut PropertyGraph,
) -> Result<()> {
    let mut updates: std::collections::HashMap<String, AttrMap> = Default::default();

    for collection in store.node_collections().await? {
        for doc in store.nodes(&collection, &NodeFilter::All).await? {
            let Some(id) = doc.primary_id().map(str::to_string) else {
                continue;
            };
            if !graph.contains_node(&id) {
                continue;
            }

            let mut attrs: Map<String, JsonValue> = doc.attrs().clone();
            if collection == defaults::COLL_DRUG {
                translate_drug_class(&mut attrs, spec.split_drug_types);
            }

            // No identifier may be decorated twice with conflicting
            // type-specific attribute sets.
            if updates.contains_key(&id) {
                return Err(Error::GraphBuild(format!(
                    "Node {id} present in more than one node collection"
                )));
            }

            let record = if spec.concise {
                let node_type = attrs
                    .get(ATTR_TYPE)
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| {
                        Error::GraphBuild(format!("Node {id} has no declared type"))
                    })?;
                let keys = concise_node_attrs(node_type)?;
                let projected: Map<String, JsonValue> = keys
                    .iter()
                    .map(|k| {
                        let v = attrs.get(*k).cloned().unwrap_or(JsonValue::String(String::new()));
                        (k.to_string(), v)
                    })
                    .collect();
                flatten(&projected)
            } else {
                flatten(&attrs)
            };
            updates.insert(id, record);
        }
    }

    for (id, attrs) in updates {
        graph.merge_node_attrs(&id, attrs);
    }
    Ok(())
}

/// Translate the stored internal class discriminator into the public
/// `type` value: `Drug`, or the concrete subtype when splitting.
fn translate_drug_class(attrs: &mut Map<String, JsonValue>, split_drug_types: bool) {
    let drug_class = attrs
        .remove("_cls")
        .as_ref()
        .and_then(JsonValue::as_str)
        .and_then(|cls| cls.split('.').nth(1).map(str::to_string))
        .unwrap_or_else(|| "Drug".to_string());
    attrs.insert("drugClass".to_string(), JsonValue::String(drug_class.clone()));

    let public_type = if split_drug_types {
        drug_class
    } else {
        "Drug".to_string()
    };
    attrs.insert(ATTR_TYPE.to_string(), JsonValue::String(public_type));
}

/// Isolated-node pruning: nodes whose resolved type was not requested and
/// that participate in no edge are removed.
fn prune_isolated(spec: &GraphBuildSpec, graph: &mut PropertyGraph) {
    let requested: std::collections::HashSet<&str> = spec
        .nodes
        .iter()
        .flat_map(|c| defaults::node_types_for_collection(c).iter().copied())
        .collect();

    let to_remove: Vec<String> = graph
        .nodes()
        .filter(|node| {
            let node_type = node.attrs.get(ATTR_TYPE).and_then(AttrValue::as_str);
            let type_requested = node_type.is_some_and(|t| requested.contains(t));
            !type_requested && !graph.has_incident_edges(&node.id)
        })
        .map(|node| node.id.clone())
        .collect();

    for id in to_remove {
        graph.remove_node(&id);
    }
}

fn member_endpoints(doc: &Entity) -> Result<(String, String)> {
    doc.member_pair()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| {
            Error::GraphBuild("Interaction edge is missing member endpoints".to_string())
        })
}

fn directed_endpoints(doc: &Entity) -> Result<(String, String)> {
    doc.source_target()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| {
            Error::GraphBuild("Association edge is missing source/target endpoints".to_string())
        })
}

fn primary_id(doc: &Entity, collection: &str) -> Result<String> {
    doc.primary_id().map(str::to_string).ok_or_else(|| {
        Error::GraphBuild(format!("Node in {collection} has no primary identifier"))
    })
}

fn str_attr(doc: &Entity, key: &str) -> AttrValue {
    AttrValue::Str(doc.get_str(key).unwrap_or_default().to_string())
}

fn full_edge_attrs(doc: &Entity, reversible: bool) -> AttrMap {
    let mut attrs = flatten(doc.attrs());
    attrs.insert("reversible".to_string(), AttrValue::Bool(reversible));
    attrs
}
