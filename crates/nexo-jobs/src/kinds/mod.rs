//! One module per job kind: typed request structs, normalization into
//! fingerprintable specs, and the job handlers that execute them.

pub mod bicon;
pub mod closeness;
pub mod diamond;
pub mod graph_build;
pub mod must;
pub mod trustrank;

pub use bicon::{BiconHandler, BiconSpec, BiconSubmission};
pub use closeness::{ClosenessHandler, ClosenessRequest, ClosenessSpec};
pub use diamond::{DiamondHandler, DiamondRequest, DiamondSpec, EdgeScope};
pub use graph_build::GraphBuildHandler;
pub use must::{MustHandler, MustRequest, MustSpec};
pub use trustrank::{TrustRankHandler, TrustRankRequest, TrustRankSpec};

use crate::network::SeedKind;

/// Classify seed identifiers and strip their scheme prefix.
///
/// Uppercased prefixes or all-numeric identifiers mark gene seeds;
/// everything else is assumed to be protein accessions.
pub(crate) fn classify_seeds(seeds: Vec<String>) -> (Vec<String>, SeedKind) {
    let seeds: Vec<String> = seeds.into_iter().map(|s| s.to_uppercase()).collect();

    let strip = |seeds: &[String], prefix: &str| -> Vec<String> {
        seeds
            .iter()
            .map(|s| s.strip_prefix(prefix).unwrap_or(s).to_string())
            .collect()
    };

    if seeds.iter().all(|s| s.starts_with("ENTREZ.")) {
        (strip(&seeds, "ENTREZ."), SeedKind::Gene)
    } else if seeds.iter().all(|s| s.chars().all(|c| c.is_ascii_digit())) {
        (seeds, SeedKind::Gene)
    } else if seeds.iter().all(|s| s.starts_with("UNIPROT.")) {
        (strip(&seeds, "UNIPROT."), SeedKind::Protein)
    } else {
        (seeds, SeedKind::Protein)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_entrez_prefix_marks_genes() {
        let (stripped, kind) = classify_seeds(seeds(&["entrez.2717", "ENTREZ.5836"]));
        assert_eq!(kind, SeedKind::Gene);
        assert_eq!(stripped, vec!["2717", "5836"]);
    }

    #[test]
    fn test_numeric_seeds_are_genes() {
        let (stripped, kind) = classify_seeds(seeds(&["2717", "5836"]));
        assert_eq!(kind, SeedKind::Gene);
        assert_eq!(stripped, vec!["2717", "5836"]);
    }

    #[test]
    fn test_uniprot_prefix_marks_proteins() {
        let (stripped, kind) = classify_seeds(seeds(&["uniprot.P12345"]));
        assert_eq!(kind, SeedKind::Protein);
        assert_eq!(stripped, vec!["P12345"]);
    }

    #[test]
    fn test_mixed_seeds_fall_back_to_proteins() {
        let (stripped, kind) = classify_seeds(seeds(&["P12345", "2717"]));
        assert_eq!(kind, SeedKind::Protein);
        assert_eq!(stripped, vec!["P12345", "2717"]);
    }
}
