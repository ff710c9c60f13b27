use crate::cache::{SchemaCache, SchemaSnapshot};
use std::{collections::BTreeMap, path::Path};
use tracing::{info, warn};

/// Distinct union of two snapshots.
///
/// Keyed entries present in both keep `a`'s value. Procedures are matched
/// by the name derived from their nesting. The result is offline if either
/// input was.
#[must_use]
pub fn merge_snapshots(a: SchemaSnapshot, b: SchemaSnapshot) -> SchemaSnapshot {
    let mut sprocs = a.sprocs;
    for sproc in b.sprocs {
        let name = sproc.name();
        if !sprocs.iter().any(|existing| existing.name() == name) {
            sprocs.push(sproc);
        }
    }

    let mut individuals = a.individuals;
    for individual in b.individuals {
        if !individuals.contains(&individual) {
            individuals.push(individual);
        }
    }

    SchemaSnapshot {
        primary_keys: union(a.primary_keys, b.primary_keys),
        tables: union(a.tables, b.tables),
        columns: union(a.columns, b.columns),
        relationships: union(a.relationships, b.relationships),
        sprocs,
        sprocs_params: union(a.sprocs_params, b.sprocs_params),
        packages: union(a.packages, b.packages),
        individuals,
        is_offline: a.is_offline || b.is_offline,
    }
}

fn union<V>(mut a: BTreeMap<String, V>, b: BTreeMap<String, V>) -> BTreeMap<String, V> {
    for (key, value) in b {
        a.entry(key).or_insert(value);
    }
    a
}

/// Merge two cache files into `out`.
///
/// Batch utility: the outcome is reported as a message, never raised.
pub fn merge_cache_files(a: impl AsRef<Path>, b: impl AsRef<Path>, out: impl AsRef<Path>) -> String {
    let (a, b, out) = (a.as_ref(), b.as_ref(), out.as_ref());

    for path in [a, b] {
        if !path.exists() {
            warn!(path = %path.display(), "schema cache merge source missing");
            return format!("schema cache file not found: {}", path.display());
        }
    }

    let merged = SchemaCache::read_snapshot(a)
        .and_then(|first| SchemaCache::read_snapshot(b).map(|second| merge_snapshots(first, second)))
        .and_then(|merged| SchemaCache::write_snapshot(out, &merged).map(|()| merged));

    match merged {
        Ok(merged) => {
            info!(
                out = %out.display(),
                tables = merged.tables.len(),
                "merged schema cache files"
            );
            format!(
                "merged {} and {} into {} ({} tables)",
                a.display(),
                b.display(),
                out.display(),
                merged.tables.len()
            )
        }
        Err(err) => {
            warn!(error = %err, "schema cache merge failed");
            format!("schema cache merge failed: {err}")
        }
    }
}
