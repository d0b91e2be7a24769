use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Serialize;
use starmap_router::catalog::StarCatalog;
use starmap_router::data::write_catalog_to_file;
use starmap_router::store::SqliteStore;

#[derive(Debug, Serialize)]
struct DatasetMetadata {
    source: String,
    systems: usize,
    duplicate_names: usize,
    bounds_min: [f64; 3],
    bounds_max: [f64; 3],
    generated_at_epoch: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let source = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: build_dataset <systems.db> [output-dir]"))?;
    let output_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));

    info!("Reading systems from {}", source.display());
    let store = SqliteStore::open(&source)
        .with_context(|| format!("failed to open SQLite database at {}", source.display()))?;
    let catalog = store
        .load_catalog()
        .context("failed to read systems table")?;
    if catalog.is_empty() {
        return Err(anyhow!("{} contains no systems", source.display()));
    }

    let duplicate_names = count_duplicate_names(&catalog);
    if duplicate_names > 0 {
        warn!("{duplicate_names} system names occur more than once; lookups resolve to the last");
    }

    fs::create_dir_all(&output_dir).context("failed to create data output directory")?;
    let dataset_path = output_dir.join("starmap.bin");
    write_catalog_to_file(&catalog, &dataset_path)
        .with_context(|| format!("failed to write dataset to {}", dataset_path.display()))?;

    let (bounds_min, bounds_max) = bounds(&catalog);
    let metadata = DatasetMetadata {
        source: source.display().to_string(),
        systems: catalog.len(),
        duplicate_names,
        bounds_min,
        bounds_max,
        generated_at_epoch: current_epoch_seconds(),
    };

    let metadata_path = output_dir.join("starmap.meta.json");
    let metadata_json = serde_json::to_vec_pretty(&metadata)?;
    fs::write(&metadata_path, metadata_json)
        .with_context(|| format!("failed to write metadata to {}", metadata_path.display()))?;

    info!(
        "Wrote compact dataset to {} ({} systems)",
        dataset_path.display(),
        metadata.systems
    );

    Ok(())
}

fn count_duplicate_names(catalog: &StarCatalog) -> usize {
    let mut seen = HashSet::with_capacity(catalog.len());
    catalog
        .systems
        .iter()
        .filter(|s| !seen.insert(s.name.as_str()))
        .count()
}

fn bounds(catalog: &StarCatalog) -> ([f64; 3], [f64; 3]) {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for system in &catalog.systems {
        for (axis, v) in system.pos.to_array().into_iter().enumerate() {
            lo[axis] = lo[axis].min(v);
            hi[axis] = hi[axis].max(v);
        }
    }
    (lo, hi)
}

fn current_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
