//! Centralized default constants for the nexograph system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Maximum request body size in bytes (256 MB, for expression matrix uploads).
pub const MAX_BODY_SIZE_BYTES: usize = 256 * 1024 * 1024;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default polling interval for the job worker when the queue is empty
/// (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default timeout for external tool invocations (seconds). On expiry the
/// process is killed and the job fails with a timeout-specific error.
pub const TOOL_TIMEOUT_SECS: u64 = 3600;

// =============================================================================
// RANKING (trustrank / closeness)
// =============================================================================

/// Default damping factor for trustrank propagation.
pub const TRUSTRANK_DAMPING: f64 = 0.85;

// =============================================================================
// MODULE DETECTION (diamond)
// =============================================================================

/// Default seed weight for diamond.
pub const DIAMOND_ALPHA: i64 = 1;

// =============================================================================
// BICLUSTERING (bicon)
// =============================================================================

/// Default minimum bicluster gene-set size.
pub const BICON_LG_MIN: i64 = 10;

/// Default maximum bicluster gene-set size.
pub const BICON_LG_MAX: i64 = 15;

// =============================================================================
// IDENTIFIER SCHEMES
// =============================================================================

/// Scheme prefix for UniProt protein accessions.
pub const UNIPROT_PREFIX: &str = "uniprot.";

/// Scheme prefix for Entrez gene identifiers.
pub const ENTREZ_PREFIX: &str = "entrez.";

/// Scheme prefix for OMIM disorder identifiers (alternate disorder scheme).
pub const OMIM_PREFIX: &str = "omim.";

// =============================================================================
// ENTITY STORE COLLECTIONS
// =============================================================================

pub const COLL_DISORDER: &str = "disorder";
pub const COLL_DRUG: &str = "drug";
pub const COLL_GENE: &str = "gene";
pub const COLL_PATHWAY: &str = "pathway";
pub const COLL_PROTEIN: &str = "protein";
pub const COLL_SIGNATURE: &str = "signature";

pub const COLL_PPI: &str = "protein_interacts_with_protein";
pub const COLL_GENE_DISORDER: &str = "gene_associated_with_disorder";
pub const COLL_ENCODED_BY: &str = "protein_encoded_by";
pub const COLL_DRUG_TARGET: &str = "drug_has_target";

/// Curated source whose gene–disorder assertions bypass the score threshold.
pub const CURATED_GENE_DISORDER_SOURCE: &str = "omim";

// =============================================================================
// GRAPH BUILD
// =============================================================================

/// Node collections included when a build request omits `nodes`.
pub const DEFAULT_GRAPH_NODES: [&str; 4] = ["disorder", "drug", "gene", "protein"];

/// Edge collections included when a build request omits `edges`.
pub const DEFAULT_GRAPH_EDGES: [&str; 7] = [
    "disorder_comorbid_with_disorder",
    "disorder_is_subtype_of_disorder",
    "drug_has_indication",
    "drug_has_target",
    "gene_associated_with_disorder",
    "protein_encoded_by",
    "protein_interacts_with_protein",
];

/// Default interaction evidence filter.
pub const DEFAULT_IID_EVIDENCE: [&str; 1] = ["exp"];

/// Valid interaction evidence types (exp = experimental, ortho = orthology,
/// pred = predicted).
pub const VALID_IID_EVIDENCE: [&str; 3] = ["exp", "ortho", "pred"];

/// Default protein taxonomy filter (9606 = Homo sapiens).
pub const DEFAULT_TAXIDS: [i64; 1] = [9606];

/// Valid taxonomy ids (-1 = not recorded in the store).
pub const VALID_TAXIDS: [i64; 2] = [-1, 9606];

/// Default drug-group filter.
pub const DEFAULT_DRUG_GROUPS: [&str; 1] = ["approved"];

/// Valid drug groups.
pub const VALID_DRUG_GROUPS: [&str; 7] = [
    "approved",
    "experimental",
    "illicit",
    "investigational",
    "nutraceutical",
    "vet_approved",
    "withdrawn",
];

/// Default gene–disorder association score threshold (0 = all associations).
pub const DEFAULT_ASSOCIATION_THRESHOLD: f64 = 0.0;

/// Public node types each node collection can resolve to.
pub fn node_types_for_collection(collection: &str) -> &'static [&'static str] {
    match collection {
        "disorder" => &["Disorder"],
        "drug" => &["Drug", "BiotechDrug", "SmallMoleculeDrug"],
        "gene" => &["Gene"],
        "pathway" => &["Pathway"],
        "protein" => &["Protein"],
        "signature" => &["Signature"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_evidence_is_valid() {
        for e in DEFAULT_IID_EVIDENCE {
            assert!(VALID_IID_EVIDENCE.contains(&e));
        }
    }

    #[test]
    fn default_taxids_are_valid() {
        for t in DEFAULT_TAXIDS {
            assert!(VALID_TAXIDS.contains(&t));
        }
    }

    #[test]
    fn default_drug_groups_are_valid() {
        for g in DEFAULT_DRUG_GROUPS {
            assert!(VALID_DRUG_GROUPS.contains(&g));
        }
    }

    #[test]
    fn bicon_bounds_ordered() {
        const {
            assert!(BICON_LG_MIN < BICON_LG_MAX);
        }
    }

    #[test]
    fn drug_collection_covers_subtypes() {
        let types = node_types_for_collection(COLL_DRUG);
        assert!(types.contains(&"Drug"));
        assert!(types.contains(&"BiotechDrug"));
        assert!(types.contains(&"SmallMoleculeDrug"));
        assert!(node_types_for_collection("tissue").is_empty());
    }
}
