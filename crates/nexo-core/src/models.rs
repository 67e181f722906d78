//! Core data model: job lifecycle types and typed-entity views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;

// =============================================================================
// JOB LIFECYCLE
// =============================================================================

/// Status of a job record.
///
/// Transitions are strictly forward: `Submitted → Running → {Completed, Failed}`.
/// Terminal records are never re-entered; a fingerprint hit on a terminal
/// record returns it as-is, including `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::Internal(format!("Unknown job status: {other}"))),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of computation a job record represents.
///
/// The first five invoke external executables; `GraphBuild` runs the
/// in-process graph construction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Drug ranking via damped network propagation from protein seeds
    TrustRank,
    /// Drug ranking via closeness centrality from protein seeds
    Closeness,
    /// Disease-module detection (seed expansion)
    Diamond,
    /// Multi-Steiner-tree disease-module detection
    Must,
    /// Network-constrained biclustering of patients and omics data
    Bicon,
    /// Property-graph extraction from the typed entity store
    #[serde(rename = "graph")]
    GraphBuild,
}

impl JobKind {
    /// All job kinds, in route order.
    pub const ALL: [JobKind; 6] = [
        JobKind::TrustRank,
        JobKind::Closeness,
        JobKind::Diamond,
        JobKind::Must,
        JobKind::Bicon,
        JobKind::GraphBuild,
    ];

    /// Stable identifier used in routes, artifact paths, and the job table.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TrustRank => "trustrank",
            JobKind::Closeness => "closeness",
            JobKind::Diamond => "diamond",
            JobKind::Must => "must",
            JobKind::Bicon => "bicon",
            JobKind::GraphBuild => "graph",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trustrank" => Ok(JobKind::TrustRank),
            "closeness" => Ok(JobKind::Closeness),
            "diamond" => Ok(JobKind::Diamond),
            "must" => Ok(JobKind::Must),
            "bicon" => Ok(JobKind::Bicon),
            "graph" => Ok(JobKind::GraphBuild),
            other => Err(Error::NotFound(format!("Unknown job kind: {other}"))),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted job record: the lifecycle object for one computation.
///
/// Exactly one record exists per fingerprint at any time. The submit path
/// creates records (`Submitted`); only the worker mutates them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Globally unique, client-facing identifier (independent of fingerprint).
    pub uid: Uuid,
    /// Content-derived dedup key; computed once at submit, never recomputed.
    pub fingerprint: String,
    pub kind: JobKind,
    /// The normalized spec the fingerprint was derived from.
    pub spec: JsonValue,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A job waiting to be created: normalized spec plus its fingerprint.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub fingerprint: String,
    pub kind: JobKind,
    pub spec: JsonValue,
}

impl NewJob {
    /// Build a `NewJob` from a normalized, typed spec.
    ///
    /// The spec must already be normalized (lists sorted, defaults filled,
    /// scheme prefixes stripped); the fingerprint is derived from it as-is.
    pub fn from_spec<T: Serialize>(kind: JobKind, spec: &T) -> Result<Self> {
        let spec = serde_json::to_value(spec)?;
        let fingerprint = fingerprint(kind, &spec);
        Ok(Self {
            fingerprint,
            kind,
            spec,
        })
    }
}

// =============================================================================
// TYPED ENTITIES
// =============================================================================

/// Attribute key for a node's primary identifier.
pub const ATTR_PRIMARY_ID: &str = "primaryDomainId";
/// Attribute key for an entity's declared type.
pub const ATTR_TYPE: &str = "type";
/// Attribute keys for the endpoints of an unordered (undirected) edge.
pub const ATTR_MEMBER_ONE: &str = "memberOne";
pub const ATTR_MEMBER_TWO: &str = "memberTwo";
/// Attribute keys for the endpoints of a directed edge.
pub const ATTR_SOURCE_ID: &str = "sourceDomainId";
pub const ATTR_TARGET_ID: &str = "targetDomainId";

/// A node or edge read from the external typed-entity store.
///
/// Entities are schemaless JSON attribute maps owned by the store; this
/// system only reads them. Conventional keys (`primaryDomainId`, `type`,
/// endpoint pairs) get typed accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(pub Map<String, JsonValue>);

impl Entity {
    pub fn new(attrs: Map<String, JsonValue>) -> Self {
        Self(attrs)
    }

    pub fn attrs(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(JsonValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(JsonValue::as_i64)
    }

    /// String-list attribute, empty if absent or not a list.
    pub fn str_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn primary_id(&self) -> Option<&str> {
        self.get_str(ATTR_PRIMARY_ID)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.get_str(ATTR_TYPE)
    }

    /// Endpoints of an unordered edge, if this entity uses member syntax.
    pub fn member_pair(&self) -> Option<(&str, &str)> {
        Some((self.get_str(ATTR_MEMBER_ONE)?, self.get_str(ATTR_MEMBER_TWO)?))
    }

    /// Endpoints of a directed edge, if this entity uses source/target syntax.
    pub fn source_target(&self) -> Option<(&str, &str)> {
        Some((self.get_str(ATTR_SOURCE_ID)?, self.get_str(ATTR_TARGET_ID)?))
    }
}

impl From<JsonValue> for Entity {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Entity(map),
            _ => Entity(Map::new()),
        }
    }
}

/// Type-specific inclusion filter applied while streaming nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeFilter {
    #[default]
    All,
    /// Keep nodes whose `taxid` is in the set (protein nodes).
    TaxidIn(Vec<i64>),
    /// Keep nodes whose `taxid` is NOT in the set (post-filter pass).
    TaxidNotIn(Vec<i64>),
    /// Keep nodes with at least one `drugGroups` member in the set.
    GroupAny(Vec<String>),
    /// Keep nodes with no `drugGroups` member in the set (post-filter pass).
    GroupNone(Vec<String>),
}

impl NodeFilter {
    /// Evaluate the filter against one entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::TaxidIn(taxids) => entity
                .get_i64("taxid")
                .map(|t| taxids.contains(&t))
                .unwrap_or(false),
            NodeFilter::TaxidNotIn(taxids) => entity
                .get_i64("taxid")
                .map(|t| !taxids.contains(&t))
                .unwrap_or(true),
            NodeFilter::GroupAny(groups) => entity
                .str_list("drugGroups")
                .iter()
                .any(|g| groups.contains(g)),
            NodeFilter::GroupNone(groups) => !entity
                .str_list("drugGroups")
                .iter()
                .any(|g| groups.contains(g)),
        }
    }
}

/// Type-specific inclusion filter applied while streaming edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EdgeFilter {
    #[default]
    All,
    /// Keep edges with at least one `evidenceTypes` member in the set
    /// (protein-interaction edges).
    EvidenceAny(Vec<String>),
    /// Keep edges asserted by the curated source OR scoring at least
    /// `min_score`. The two criteria are unioned: a single qualifying
    /// criterion is sufficient (gene–disorder association edges).
    CuratedOrScored {
        source: Option<String>,
        min_score: f64,
    },
}

impl EdgeFilter {
    /// Evaluate the filter against one entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            EdgeFilter::All => true,
            EdgeFilter::EvidenceAny(evidence) => entity
                .str_list("evidenceTypes")
                .iter()
                .any(|e| evidence.contains(e)),
            EdgeFilter::CuratedOrScored { source, min_score } => {
                let curated = source.as_deref().is_some_and(|s| {
                    entity.get_str("assertedBy") == Some(s)
                        || entity.str_list("assertedBy").iter().any(|a| a == s)
                });
                let scored = entity.get_f64("score").is_some_and(|v| v >= *min_score);
                curated || scored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: JsonValue) -> Entity {
        Entity::from(value)
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Submitted,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let parsed: JobStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_kind_roundtrip() {
        for kind in JobKind::ALL {
            let parsed: JobKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_job_kind_unknown() {
        assert!("ranking".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_new_job_fingerprint_is_stable() {
        #[derive(Serialize)]
        struct Spec {
            seeds: Vec<String>,
        }

        let a = NewJob::from_spec(
            JobKind::TrustRank,
            &Spec {
                seeds: vec!["P1".into(), "P2".into()],
            },
        )
        .unwrap();
        let b = NewJob::from_spec(
            JobKind::TrustRank,
            &Spec {
                seeds: vec!["P1".into(), "P2".into()],
            },
        )
        .unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_entity_accessors() {
        let e = entity(json!({
            "primaryDomainId": "uniprot.P12345",
            "type": "Protein",
            "taxid": 9606,
            "score": 0.7,
            "evidenceTypes": ["exp", "pred"],
        }));
        assert_eq!(e.primary_id(), Some("uniprot.P12345"));
        assert_eq!(e.entity_type(), Some("Protein"));
        assert_eq!(e.get_i64("taxid"), Some(9606));
        assert_eq!(e.get_f64("score"), Some(0.7));
        assert_eq!(e.str_list("evidenceTypes"), vec!["exp", "pred"]);
        assert!(e.member_pair().is_none());
    }

    #[test]
    fn test_entity_edge_endpoints() {
        let undirected = entity(json!({
            "memberOne": "uniprot.A", "memberTwo": "uniprot.B"
        }));
        assert_eq!(undirected.member_pair(), Some(("uniprot.A", "uniprot.B")));

        let directed = entity(json!({
            "sourceDomainId": "entrez.1", "targetDomainId": "mondo.2"
        }));
        assert_eq!(directed.source_target(), Some(("entrez.1", "mondo.2")));
    }

    #[test]
    fn test_node_filter_taxid() {
        let human = entity(json!({"taxid": 9606}));
        let mouse = entity(json!({"taxid": 10090}));
        let filter = NodeFilter::TaxidIn(vec![9606]);
        assert!(filter.matches(&human));
        assert!(!filter.matches(&mouse));

        let inverse = NodeFilter::TaxidNotIn(vec![9606]);
        assert!(!inverse.matches(&human));
        assert!(inverse.matches(&mouse));
    }

    #[test]
    fn test_node_filter_drug_groups() {
        let approved = entity(json!({"drugGroups": ["approved", "investigational"]}));
        let withdrawn = entity(json!({"drugGroups": ["withdrawn"]}));
        let filter = NodeFilter::GroupAny(vec!["approved".into()]);
        assert!(filter.matches(&approved));
        assert!(!filter.matches(&withdrawn));

        let inverse = NodeFilter::GroupNone(vec!["approved".into()]);
        assert!(!inverse.matches(&approved));
        assert!(inverse.matches(&withdrawn));
    }

    #[test]
    fn test_edge_filter_evidence() {
        let exp = entity(json!({"evidenceTypes": ["exp"]}));
        let pred = entity(json!({"evidenceTypes": ["pred"]}));
        let filter = EdgeFilter::EvidenceAny(vec!["exp".into()]);
        assert!(filter.matches(&exp));
        assert!(!filter.matches(&pred));
    }

    #[test]
    fn test_edge_filter_curated_or_scored_is_a_union() {
        let filter = EdgeFilter::CuratedOrScored {
            source: Some("omim".into()),
            min_score: 0.5,
        };

        // Curated but low-scoring: included.
        assert!(filter.matches(&entity(json!({"assertedBy": "omim", "score": 0.1}))));
        // Uncurated but high-scoring: included.
        assert!(filter.matches(&entity(json!({"assertedBy": "disgenet", "score": 0.9}))));
        // Neither criterion: excluded.
        assert!(!filter.matches(&entity(json!({"assertedBy": "disgenet", "score": 0.1}))));
        // List-valued assertedBy also counts as curated.
        assert!(filter.matches(&entity(json!({"assertedBy": ["disgenet", "omim"]}))));
    }

    #[test]
    fn test_edge_filter_curated_disabled() {
        let filter = EdgeFilter::CuratedOrScored {
            source: None,
            min_score: 0.5,
        };
        assert!(!filter.matches(&entity(json!({"assertedBy": "omim", "score": 0.1}))));
        assert!(filter.matches(&entity(json!({"assertedBy": "omim", "score": 0.8}))));
    }
}
