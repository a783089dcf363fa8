//! Project dependency graph maintained across runs.
//!
//! Entries come from two tiers: sets recorded by this run's fresh parses,
//! and sets loaded from the hash store for projects that were skipped.
//! A fresh entry always wins over a loaded one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::store::HashStore;

type DepMap = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

#[derive(Debug, Default)]
struct Tiers {
    fresh: DepMap,
    loaded: DepMap,
}

/// Project script to dependency scripts.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    tiers: Mutex<Tiers>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the dependency set produced by a fresh parse of `script`.
    pub fn record(&self, script: &Path, dependencies: BTreeSet<PathBuf>) {
        let mut tiers = self.lock();
        tiers.loaded.remove(script);
        tiers.fresh.insert(script.to_path_buf(), dependencies);
    }

    /// Dependencies of `script`: this run's set if there is one, otherwise
    /// the set persisted by the last run that generated it.
    pub fn lookup_or_fallback(&self, script: &Path, store: &HashStore) -> BTreeSet<PathBuf> {
        {
            let tiers = self.lock();
            if let Some(deps) = tiers.fresh.get(script).or_else(|| tiers.loaded.get(script)) {
                return deps.clone();
            }
        }

        let deps = match store.read_dependencies(script) {
            Ok(Some(deps)) => deps,
            Ok(None) => {
                tracing::debug!("no recorded dependencies for {}", script.display());
                BTreeSet::new()
            }
            Err(e) => {
                tracing::warn!(
                    "failed to read recorded dependencies for {}: {:#}",
                    script.display(),
                    e
                );
                BTreeSet::new()
            }
        };

        let mut tiers = self.lock();
        tiers
            .loaded
            .entry(script.to_path_buf())
            .or_insert(deps)
            .clone()
    }

    /// Dependencies already known for `script`, without touching the store.
    pub fn get(&self, script: &Path) -> Option<BTreeSet<PathBuf>> {
        let tiers = self.lock();
        tiers
            .fresh
            .get(script)
            .or_else(|| tiers.loaded.get(script))
            .cloned()
    }

    /// Check if this run parsed `script`.
    pub fn is_fresh(&self, script: &Path) -> bool {
        self.lock().fresh.contains_key(script)
    }

    /// Merged view of both tiers.
    pub fn snapshot(&self) -> DepMap {
        let tiers = self.lock();
        let mut merged = tiers.loaded.clone();
        merged.extend(tiers.fresh.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        let tiers = self.lock();
        tiers.fresh.is_empty() && tiers.loaded.is_empty()
    }

    /// Known projects ordered so that dependencies come before dependents.
    ///
    /// Dependencies that are not themselves known projects are ignored.
    /// The order is deterministic for a given set of entries.
    pub fn build_order(&self) -> Result<Vec<PathBuf>> {
        let map = self.snapshot();
        let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
        let mut nodes: HashMap<&Path, NodeIndex> = HashMap::new();

        for script in map.keys() {
            nodes.insert(script.as_path(), graph.add_node(script.clone()));
        }
        for (script, deps) in &map {
            for dep in deps {
                if let Some(&dep_idx) = nodes.get(dep.as_path()) {
                    graph.add_edge(dep_idx, nodes[script.as_path()], ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| graph[idx].clone()).collect()),
            Err(cycle) => bail!(
                "dependency cycle detected involving {}",
                graph[cycle.node_id()].display()
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tiers> {
        self.tiers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_fallback_reads_persisted_dependencies() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.qpc"), "a").unwrap();
        let store = HashStore::open(tmp.path(), tmp.path().join(".qpc/hashes")).unwrap();
        store
            .write_project_hash(
                Path::new("a.qpc"),
                Path::new("build"),
                &[],
                &BTreeMap::new(),
                &set(&["b.qpc", "c.qpc"]),
                &Default::default(),
            )
            .unwrap();

        let graph = DependencyGraph::new();
        let deps = graph.lookup_or_fallback(Path::new("a.qpc"), &store);
        assert_eq!(deps, set(&["b.qpc", "c.qpc"]));
        assert!(!graph.is_fresh(Path::new("a.qpc")));

        // Fresh entries take precedence over loaded ones
        graph.record(Path::new("a.qpc"), set(&["d.qpc"]));
        assert_eq!(graph.lookup_or_fallback(Path::new("a.qpc"), &store), set(&["d.qpc"]));
        assert!(graph.is_fresh(Path::new("a.qpc")));
    }

    #[test]
    fn test_fallback_without_record_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = HashStore::open(tmp.path(), tmp.path().join("hashes")).unwrap();
        let graph = DependencyGraph::new();

        assert!(graph.lookup_or_fallback(Path::new("x.qpc"), &store).is_empty());
        assert_eq!(graph.get(Path::new("x.qpc")), Some(BTreeSet::new()));
    }

    #[test]
    fn test_build_order() {
        let graph = DependencyGraph::new();
        graph.record(Path::new("app.qpc"), set(&["lib.qpc", "external.qpc"]));
        graph.record(Path::new("lib.qpc"), set(&["core.qpc"]));
        graph.record(Path::new("core.qpc"), set(&[]));

        let order = graph.build_order().unwrap();
        let pos = |p: &str| order.iter().position(|o| o == Path::new(p)).unwrap();
        assert_eq!(order.len(), 3);
        assert!(pos("core.qpc") < pos("lib.qpc"));
        assert!(pos("lib.qpc") < pos("app.qpc"));
    }

    #[test]
    fn test_build_order_detects_cycles() {
        let graph = DependencyGraph::new();
        graph.record(Path::new("a.qpc"), set(&["b.qpc"]));
        graph.record(Path::new("b.qpc"), set(&["a.qpc"]));

        let err = graph.build_order().unwrap_err();
        assert!(err.to_string().contains("dependency cycle"));
    }
}
