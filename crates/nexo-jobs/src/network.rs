//! Seed-network extraction from the typed entity store.
//!
//! The module-detection and biclustering tools consume a two-column edge
//! list derived from the store: gene–gene or protein–protein pairs. The
//! derivation is expensive (full scans of the interaction collections), so
//! edge lists are cached per (seed kind, network choice) for the process
//! lifetime; the store is read-only from this side, so the cache is safe.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use nexo_core::{defaults, EdgeFilter, EntityStore, Error, Result};

/// What the seeds identify, and therefore which network is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    Gene,
    Protein,
}

impl SeedKind {
    /// Scheme prefix carried by store identifiers of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            SeedKind::Gene => defaults::ENTREZ_PREFIX,
            SeedKind::Protein => defaults::UNIPROT_PREFIX,
        }
    }
}

/// Which store-derived network backs the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkChoice {
    Default,
    SharedDisorder,
}

impl NetworkChoice {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "DEFAULT" => Ok(NetworkChoice::Default),
            "SHARED_DISORDER" => Ok(NetworkChoice::SharedDisorder),
            other => Err(Error::InvalidInput(format!(
                "Invalid network: {other:?} (expected DEFAULT or SHARED_DISORDER)"
            ))),
        }
    }
}

fn strip_prefix(id: &str, prefix: &str) -> String {
    id.strip_prefix(prefix).unwrap_or(id).to_string()
}

/// Store-backed seed-network derivation with per-process caching.
pub struct NetworkService {
    store: Arc<dyn EntityStore>,
    cache: Mutex<HashMap<(SeedKind, NetworkChoice), Arc<Vec<(String, String)>>>>,
}

impl NetworkService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Edge list for the given seed kind and network choice.
    ///
    /// Pairs are scheme-prefix-stripped and de-duplicated as unordered
    /// pairs. Concurrent first calls may compute twice; the cache keeps the
    /// last result either way.
    pub async fn edge_list(
        &self,
        seeds: SeedKind,
        network: NetworkChoice,
    ) -> Result<Arc<Vec<(String, String)>>> {
        if let Some(cached) = self.cache.lock().expect("network cache poisoned").get(&(seeds, network)) {
            return Ok(cached.clone());
        }

        let pairs = match (seeds, network) {
            (SeedKind::Protein, NetworkChoice::Default) => self.protein_interactions().await?,
            (SeedKind::Gene, NetworkChoice::Default) => self.gene_interactions().await?,
            (SeedKind::Gene, NetworkChoice::SharedDisorder) => self.shared_disorder_pairs().await?,
            (SeedKind::Protein, NetworkChoice::SharedDisorder) => {
                return Err(Error::InvalidInput(
                    "SHARED_DISORDER networks are only defined for gene seeds".to_string(),
                ))
            }
        };

        info!(
            subsystem = "jobs",
            component = "network",
            seed_kind = ?seeds,
            network = ?network,
            result_count = pairs.len(),
            "Derived seed network"
        );

        let pairs = Arc::new(pairs);
        self.cache
            .lock()
            .expect("network cache poisoned")
            .insert((seeds, network), pairs.clone());
        Ok(pairs)
    }

    /// Write the edge list as a two-column TSV.
    pub async fn write_tsv(
        &self,
        seeds: SeedKind,
        network: NetworkChoice,
        path: &Path,
    ) -> Result<()> {
        let pairs = self.edge_list(seeds, network).await?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for (a, b) in pairs.iter() {
            writeln!(file, "{a}\t{b}")?;
        }
        file.flush()?;
        Ok(())
    }

    /// Experimentally-evidenced protein–protein interaction pairs.
    async fn protein_interactions(&self) -> Result<Vec<(String, String)>> {
        let evidence = EdgeFilter::EvidenceAny(vec!["exp".to_string()]);
        let interactions = self.store.edges(defaults::COLL_PPI, &evidence).await?;

        let mut pairs = BTreeSet::new();
        for edge in &interactions {
            let Some((m1, m2)) = edge.member_pair() else {
                continue;
            };
            let a = strip_prefix(m1, defaults::UNIPROT_PREFIX);
            let b = strip_prefix(m2, defaults::UNIPROT_PREFIX);
            pairs.insert(order_pair(a, b));
        }
        Ok(pairs.into_iter().collect())
    }

    /// Gene–gene pairs: interacting proteins joined through the genes that
    /// encode them.
    async fn gene_interactions(&self) -> Result<Vec<(String, String)>> {
        let encoded_by = self
            .store
            .edges(defaults::COLL_ENCODED_BY, &EdgeFilter::All)
            .await?;

        let mut genes_of: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &encoded_by {
            let Some((protein, gene)) = edge.source_target() else {
                continue;
            };
            genes_of
                .entry(protein.to_string())
                .or_default()
                .push(strip_prefix(gene, defaults::ENTREZ_PREFIX));
        }

        let evidence = EdgeFilter::EvidenceAny(vec!["exp".to_string()]);
        let interactions = self.store.edges(defaults::COLL_PPI, &evidence).await?;

        let mut pairs = BTreeSet::new();
        for edge in &interactions {
            let Some((m1, m2)) = edge.member_pair() else {
                continue;
            };
            let (Some(genes1), Some(genes2)) = (genes_of.get(m1), genes_of.get(m2)) else {
                continue;
            };
            for g1 in genes1 {
                for g2 in genes2 {
                    pairs.insert(order_pair(g1.clone(), g2.clone()));
                }
            }
        }
        debug!(result_count = pairs.len(), "Joined interactions to gene pairs");
        Ok(pairs.into_iter().collect())
    }

    /// Gene pairs associated with a common disorder.
    async fn shared_disorder_pairs(&self) -> Result<Vec<(String, String)>> {
        let associations = self
            .store
            .edges(defaults::COLL_GENE_DISORDER, &EdgeFilter::All)
            .await?;

        let mut genes_by_disorder: HashMap<String, BTreeSet<String>> = HashMap::new();
        for edge in &associations {
            let Some((gene, disorder)) = edge.source_target() else {
                continue;
            };
            genes_by_disorder
                .entry(disorder.to_string())
                .or_default()
                .insert(strip_prefix(gene, defaults::ENTREZ_PREFIX));
        }

        let mut pairs = BTreeSet::new();
        for genes in genes_by_disorder.values() {
            let genes: Vec<&String> = genes.iter().collect();
            for (i, g1) in genes.iter().enumerate() {
                for g2 in genes.iter().skip(i + 1) {
                    pairs.insert(order_pair((*g1).clone(), (*g2).clone()));
                }
            }
        }
        Ok(pairs.into_iter().collect())
    }

    /// All node identifiers occurring in an edge list.
    pub fn network_nodes(pairs: &[(String, String)]) -> BTreeSet<String> {
        pairs
            .iter()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .collect()
    }
}

fn order_pair(a: String, b: String) -> (String, String) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_store::MemoryEntityStore;
    use serde_json::json;

    fn fixture_store() -> Arc<MemoryEntityStore> {
        let mut store = MemoryEntityStore::new();
        // Proteins P1–P2 interact experimentally, P2–P3 only by prediction.
        store.insert_edge(
            defaults::COLL_PPI,
            json!({
                "memberOne": "uniprot.P1", "memberTwo": "uniprot.P2",
                "evidenceTypes": ["exp"], "type": "ProteinInteractsWithProtein"
            }),
        );
        store.insert_edge(
            defaults::COLL_PPI,
            json!({
                "memberOne": "uniprot.P2", "memberTwo": "uniprot.P3",
                "evidenceTypes": ["pred"], "type": "ProteinInteractsWithProtein"
            }),
        );
        store.insert_edge(
            defaults::COLL_ENCODED_BY,
            json!({"sourceDomainId": "uniprot.P1", "targetDomainId": "entrez.101"}),
        );
        store.insert_edge(
            defaults::COLL_ENCODED_BY,
            json!({"sourceDomainId": "uniprot.P2", "targetDomainId": "entrez.102"}),
        );
        // Genes 101 and 103 share a disorder.
        store.insert_edge(
            defaults::COLL_GENE_DISORDER,
            json!({"sourceDomainId": "entrez.101", "targetDomainId": "mondo.0005"}),
        );
        store.insert_edge(
            defaults::COLL_GENE_DISORDER,
            json!({"sourceDomainId": "entrez.103", "targetDomainId": "mondo.0005"}),
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_protein_network_filters_evidence_and_strips_prefix() {
        let service = NetworkService::new(fixture_store());
        let pairs = service
            .edge_list(SeedKind::Protein, NetworkChoice::Default)
            .await
            .unwrap();
        assert_eq!(pairs.as_slice(), &[("P1".to_string(), "P2".to_string())]);
    }

    #[tokio::test]
    async fn test_gene_network_joins_through_encoding() {
        let service = NetworkService::new(fixture_store());
        let pairs = service
            .edge_list(SeedKind::Gene, NetworkChoice::Default)
            .await
            .unwrap();
        assert_eq!(pairs.as_slice(), &[("101".to_string(), "102".to_string())]);
    }

    #[tokio::test]
    async fn test_shared_disorder_pairs() {
        let service = NetworkService::new(fixture_store());
        let pairs = service
            .edge_list(SeedKind::Gene, NetworkChoice::SharedDisorder)
            .await
            .unwrap();
        assert_eq!(pairs.as_slice(), &[("101".to_string(), "103".to_string())]);
    }

    #[tokio::test]
    async fn test_protein_shared_disorder_rejected() {
        let service = NetworkService::new(fixture_store());
        let err = service
            .edge_list(SeedKind::Protein, NetworkChoice::SharedDisorder)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_edge_list_is_cached() {
        let service = NetworkService::new(fixture_store());
        let first = service
            .edge_list(SeedKind::Protein, NetworkChoice::Default)
            .await
            .unwrap();
        let second = service
            .edge_list(SeedKind::Protein, NetworkChoice::Default)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_write_tsv() {
        let service = NetworkService::new(fixture_store());
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("network.tsv");
        service
            .write_tsv(SeedKind::Protein, NetworkChoice::Default, &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "P1\tP2\n");
    }

    #[test]
    fn test_network_choice_parse() {
        assert_eq!(
            NetworkChoice::parse("DEFAULT").unwrap(),
            NetworkChoice::Default
        );
        assert_eq!(
            NetworkChoice::parse("SHARED_DISORDER").unwrap(),
            NetworkChoice::SharedDisorder
        );
        assert!(NetworkChoice::parse("default").is_err());
    }
}
