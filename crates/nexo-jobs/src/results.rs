//! Result materialization helpers: parsing tool output files into result
//! payloads and bundling multi-file artifacts.
//!
//! All bulk artifacts are written to the job-scoped directory before the
//! record flips to `completed`, so a completed status is a reliable signal
//! that the artifact is readable.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

use nexo_core::{defaults, EdgeFilter, EntityStore, Error, Result};

/// One row of a tab-separated file, keyed by header column.
pub type TsvRow = BTreeMap<String, String>;

/// Read a whole header-led TSV file into rows.
pub fn read_tsv(path: &Path) -> Result<Vec<TsvRow>> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = header.split('\t').collect();

    let mut rows = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let row: TsvRow = columns
            .iter()
            .zip(line.split('\t'))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Keep the top `n` ranked candidates from a score-ordered TSV, extending
/// through ties on the n-th score.
///
/// Candidates with a score of zero terminate the scan: the tools order
/// descending, so everything after the first zero is noise.
pub fn top_candidates(path: &Path, n: usize) -> Result<Vec<TsvRow>> {
    let rows = read_tsv(path)?;
    let mut keep: Vec<TsvRow> = Vec::new();

    let score_of = |row: &TsvRow| -> Result<f64> {
        let raw = row
            .get("score")
            .ok_or_else(|| Error::Tool("Ranked output is missing a score column".to_string()))?;
        raw.parse::<f64>()
            .map_err(|_| Error::Tool(format!("Unparseable score in ranked output: {raw:?}")))
    };

    let mut rows = rows.into_iter();
    for row in rows.by_ref().take(n) {
        if score_of(&row)? == 0.0 {
            return Ok(keep);
        }
        keep.push(row);
    }

    // Tie extension: candidates scoring exactly like the n-th are kept too,
    // compared on the raw string the way the score file spells it.
    if let Some(lowest) = keep.last().and_then(|row| row.get("score")).cloned() {
        for row in rows {
            if row.get("score") != Some(&lowest) {
                break;
            }
            keep.push(row);
        }
    }
    Ok(keep)
}

/// Recover drug→seed edges from the store's drug-target relation.
///
/// `drugs` are store-prefixed drug identifiers as reported by the ranking
/// tools; `seeds` are store-prefixed protein identifiers.
pub async fn drug_target_edges(
    store: &Arc<dyn EntityStore>,
    drugs: &BTreeSet<String>,
    seeds: &BTreeSet<String>,
) -> Result<Vec<(String, String)>> {
    let targets = store
        .edges(defaults::COLL_DRUG_TARGET, &EdgeFilter::All)
        .await?;

    let mut edges = BTreeSet::new();
    for edge in &targets {
        let Some((drug, protein)) = edge.source_target() else {
            continue;
        };
        if drugs.contains(drug) && seeds.contains(protein) {
            edges.insert((drug.to_string(), protein.to_string()));
        }
    }
    Ok(edges.into_iter().collect())
}

/// Bundle named files into a gzipped tarball.
pub fn bundle_files(files: &[(&Path, &str)], dest: &Path) -> Result<()> {
    let file = std::fs::File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    for (path, name) in files {
        archive.append_path_with_name(path, name)?;
    }
    let encoder = archive.into_inner()?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Bundle a whole directory (recursively, under `root_name/`) into a
/// gzipped tarball.
pub fn bundle_dir(dir: &Path, root_name: &str, dest: &Path) -> Result<()> {
    let file = std::fs::File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.append_dir_all(root_name, dir)?;
    let encoder = archive.into_inner()?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Write one identifier per line (seed files for the external tools).
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for line in lines {
        writeln!(file, "{}", line.as_ref())?;
    }
    file.flush()?;
    Ok(())
}
