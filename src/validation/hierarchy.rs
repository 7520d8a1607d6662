//! Hierarchy resolution
//!
//! Turns flat parent references into ordered levels so every parent is
//! committed before its children. Rows whose parent is neither in the batch
//! nor already stored are orphans; rows that never join a level are reported
//! together with the parent cycles found among them.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::import::options::DEFAULT_MAX_LEVELS;
use crate::models::ManifestRow;

/// Import ids sharing the same resolved depth, in manifest order
pub type HierarchyLevel = Vec<String>;

/// A row whose parent reference points nowhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanRow {
    pub import_id: String,
    pub parent_import_id: String,
    pub line: usize,
}

impl std::fmt::Display for OrphanRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}) -> missing parent {}",
            self.import_id, self.line, self.parent_import_id
        )
    }
}

/// Outcome of hierarchy resolution
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the orchestrator must branch on the resolution outcome"]
pub enum HierarchyResolution {
    /// Every row placed; levels are in commit order
    Resolved(Vec<HierarchyLevel>),
    /// No row can start the hierarchy
    NoRoots,
    /// Some parent references exist neither in the batch nor in the store
    OrphanDetected(Vec<OrphanRow>),
    /// Some rows never reached a root: parent cycles, descendants of cycles,
    /// or chains deeper than the level bound
    CycleOrUnresolved {
        levels: Vec<HierarchyLevel>,
        unresolved: Vec<String>,
        cycles: Vec<Vec<String>>,
    },
}

/// Level-ordering of manifest rows
#[derive(Debug, Clone, Copy)]
pub struct HierarchyResolver {
    max_levels: usize,
}

impl Default for HierarchyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEVELS)
    }
}

impl HierarchyResolver {
    /// Create a resolver that places at most `max_levels` levels below the
    /// first one
    pub fn new(max_levels: usize) -> Self {
        Self { max_levels }
    }

    /// Resolve rows into levels
    ///
    /// `exists` reports whether an import id already belongs to a stored
    /// division of the tenant. A row whose parent is not in the batch but
    /// exists is anchored: it joins the first level next to the roots.
    pub fn resolve(&self, rows: &[ManifestRow], exists: impl Fn(&str) -> bool) -> HierarchyResolution {
        let in_batch: HashSet<&str> = rows.iter().map(|r| r.import_id.as_str()).collect();

        let first: Vec<&ManifestRow> = rows
            .iter()
            .filter(|r| match r.parent() {
                None => true,
                Some(parent) => !in_batch.contains(parent) && exists(parent),
            })
            .collect();

        if first.is_empty() {
            return HierarchyResolution::NoRoots;
        }

        let mut processed: HashSet<&str> = HashSet::with_capacity(rows.len());
        processed.extend(first.iter().map(|r| r.import_id.as_str()));
        let mut levels: Vec<HierarchyLevel> =
            vec![first.into_iter().map(|r| r.import_id.clone()).collect()];

        // The first level plus at most `max_levels` levels below it
        while levels.len() <= self.max_levels {
            let next: Vec<&ManifestRow> = rows
                .iter()
                .filter(|r| !processed.contains(r.import_id.as_str()))
                .filter(|r| r.parent().is_some_and(|p| processed.contains(p)))
                .collect();
            if next.is_empty() {
                break;
            }
            processed.extend(next.iter().map(|r| r.import_id.as_str()));
            levels.push(next.into_iter().map(|r| r.import_id.clone()).collect());
        }

        let remaining: Vec<&ManifestRow> = rows
            .iter()
            .filter(|r| !processed.contains(r.import_id.as_str()))
            .collect();

        if remaining.is_empty() {
            return HierarchyResolution::Resolved(levels);
        }

        let orphans: Vec<OrphanRow> = remaining
            .iter()
            .filter_map(|r| {
                let parent = r.parent()?;
                (!in_batch.contains(parent)).then(|| OrphanRow {
                    import_id: r.import_id.clone(),
                    parent_import_id: parent.to_string(),
                    line: r.line,
                })
            })
            .collect();

        if !orphans.is_empty() {
            tracing::error!(
                "Orphaned divisions found ({}): {}",
                orphans.len(),
                orphans
                    .iter()
                    .take(5)
                    .map(|o| o.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
            return HierarchyResolution::OrphanDetected(orphans);
        }

        let cycles = Self::find_cycles(&remaining);
        let unresolved: Vec<String> = remaining.iter().map(|r| r.import_id.clone()).collect();
        tracing::error!(
            "{} divisions could not be placed in the hierarchy ({} cycles)",
            unresolved.len(),
            cycles.len()
        );

        HierarchyResolution::CycleOrUnresolved {
            levels,
            unresolved,
            cycles,
        }
    }

    /// Parent cycles among unplaced rows, each listed in manifest order
    fn find_cycles(rows: &[&ManifestRow]) -> Vec<Vec<String>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: HashMap<&str, NodeIndex> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.import_id.as_str(), graph.add_node(i)))
            .collect();

        for row in rows {
            if let (Some(&child), Some(&parent)) = (
                nodes.get(row.import_id.as_str()),
                row.parent().and_then(|p| nodes.get(p)),
            ) {
                graph.add_edge(child, parent, ());
            }
        }

        let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
                members.sort_unstable();
                members
            })
            .collect();
        cycles.sort();

        cycles
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .map(|i| rows[i].import_id.clone())
                    .collect()
            })
            .collect()
    }
}
