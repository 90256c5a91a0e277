//! Dependency ordering for manifest entries.

use std::collections::{HashMap, HashSet};

use super::entry::ManifestEntry;

/// Errors raised while ordering entries by dependency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// An entry was reached again while its own dependencies were being resolved.
    #[error("circular dependency detected at '{name}': {}", .chain.join(" -> "))]
    CircularDependency { name: String, chain: Vec<String> },

    /// A dependency names an entry that is not in the manifest.
    #[error("entry '{name}' depends on unknown entry '{dependency}'")]
    UnknownDependency { name: String, dependency: String },
}

/// Orders entries so every entry comes after all of its dependencies.
///
/// Depth-first: each unvisited entry first visits its dependencies in declared
/// order, then appends itself. Independent entries keep their input order, so
/// the result is deterministic and applying it twice yields the same sequence.
///
/// # Example
/// ```
/// use pgharness_model::manifest::{resolve_dependency_order, ManifestEntry};
///
/// let entries = vec![
///     ManifestEntry::extension("b").depends_on("a"),
///     ManifestEntry::extension("a"),
/// ];
/// let order: Vec<&str> = resolve_dependency_order(&entries)
///     .unwrap()
///     .iter()
///     .map(|e| e.name.as_str())
///     .collect();
/// assert_eq!(order, vec!["a", "b"]);
/// ```
pub fn resolve_dependency_order(
    entries: &[ManifestEntry],
) -> Result<Vec<&ManifestEntry>, ResolveError> {
    let mut walk = Walk::new(entries);
    for idx in 0..entries.len() {
        walk.visit(idx)?;
    }
    Ok(walk.order.into_iter().map(|idx| &entries[idx]).collect())
}

/// Finds every distinct dependency cycle.
///
/// Unknown dependencies are skipped; they are reported separately by
/// validation. Each cycle is listed starting from its lexically smallest
/// member so the same cycle found from different roots is reported once.
pub fn find_cycles(entries: &[ManifestEntry]) -> Vec<Vec<String>> {
    let index = name_index(entries);
    let mut state = vec![Mark::Unvisited; entries.len()];
    let mut stack = Vec::new();
    let mut seen = HashSet::new();
    let mut cycles = Vec::new();

    for idx in 0..entries.len() {
        collect_cycles(
            idx,
            entries,
            &index,
            &mut state,
            &mut stack,
            &mut seen,
            &mut cycles,
        );
    }
    cycles
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn name_index(entries: &[ManifestEntry]) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        index.entry(entry.name.as_str()).or_insert(idx);
    }
    index
}

struct Walk<'a> {
    entries: &'a [ManifestEntry],
    index: HashMap<&'a str, usize>,
    state: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl<'a> Walk<'a> {
    fn new(entries: &'a [ManifestEntry]) -> Self {
        Self {
            entries,
            index: name_index(entries),
            state: vec![Mark::Unvisited; entries.len()],
            stack: Vec::new(),
            order: Vec::with_capacity(entries.len()),
        }
    }

    fn visit(&mut self, idx: usize) -> Result<(), ResolveError> {
        match self.state[idx] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = self.stack.iter().position(|&i| i == idx).unwrap_or(0);
                let mut chain: Vec<String> = self.stack[start..]
                    .iter()
                    .map(|&i| self.entries[i].name.clone())
                    .collect();
                chain.push(self.entries[idx].name.clone());
                return Err(ResolveError::CircularDependency {
                    name: self.entries[idx].name.clone(),
                    chain,
                });
            }
            Mark::Unvisited => {}
        }

        self.state[idx] = Mark::InProgress;
        self.stack.push(idx);

        let entry = &self.entries[idx];
        for dependency in &entry.dependencies {
            let dep_idx = *self.index.get(dependency.as_str()).ok_or_else(|| {
                ResolveError::UnknownDependency {
                    name: entry.name.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            self.visit(dep_idx)?;
        }

        self.stack.pop();
        self.state[idx] = Mark::Done;
        self.order.push(idx);
        Ok(())
    }
}

fn collect_cycles(
    idx: usize,
    entries: &[ManifestEntry],
    index: &HashMap<&str, usize>,
    state: &mut Vec<Mark>,
    stack: &mut Vec<usize>,
    seen: &mut HashSet<Vec<String>>,
    cycles: &mut Vec<Vec<String>>,
) {
    match state[idx] {
        Mark::Done => return,
        Mark::InProgress => {
            let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
            let members: Vec<String> = stack[start..]
                .iter()
                .map(|&i| entries[i].name.clone())
                .collect();
            let canonical = rotate_to_smallest(members);
            if seen.insert(canonical.clone()) {
                let mut chain = canonical;
                chain.push(chain[0].clone());
                cycles.push(chain);
            }
            return;
        }
        Mark::Unvisited => {}
    }

    state[idx] = Mark::InProgress;
    stack.push(idx);
    for dependency in &entries[idx].dependencies {
        if let Some(&dep_idx) = index.get(dependency.as_str()) {
            collect_cycles(dep_idx, entries, index, state, stack, seen, cycles);
        }
    }
    stack.pop();
    state[idx] = Mark::Done;
}

fn rotate_to_smallest(mut members: Vec<String>) -> Vec<String> {
    if let Some(min_pos) = members
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(pos, _)| pos)
    {
        members.rotate_left(min_pos);
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names<'a>(entries: &[&'a ManifestEntry]) -> Vec<&'a str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_dependency_before_dependent() {
        let entries = vec![
            ManifestEntry::extension("a"),
            ManifestEntry::extension("b").depends_on("a"),
        ];
        let order = resolve_dependency_order(&entries).unwrap();
        assert_eq!(names(&order), vec!["a", "b"]);
    }

    #[test]
    fn test_siblings_keep_input_order() {
        let entries = vec![
            ManifestEntry::extension("vector"),
            ManifestEntry::extension("postgis_topology").depends_on("postgis"),
            ManifestEntry::extension("pg_trgm"),
            ManifestEntry::extension("postgis"),
        ];
        let order = resolve_dependency_order(&entries).unwrap();
        assert_eq!(
            names(&order),
            vec!["vector", "postgis", "postgis_topology", "pg_trgm"]
        );
    }

    #[test]
    fn test_cycle_is_reported_with_chain() {
        let entries = vec![
            ManifestEntry::extension("a").depends_on("b"),
            ManifestEntry::extension("b").depends_on("c"),
            ManifestEntry::extension("c").depends_on("a"),
        ];
        let err = resolve_dependency_order(&entries).unwrap_err();
        match err {
            ResolveError::CircularDependency { name, chain } => {
                assert_eq!(name, "a");
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let entries = vec![ManifestEntry::extension("loop").depends_on("loop")];
        assert!(matches!(
            resolve_dependency_order(&entries),
            Err(ResolveError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let entries = vec![ManifestEntry::extension("postgis_raster").depends_on("postgis")];
        let err = resolve_dependency_order(&entries).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownDependency {
                name: "postgis_raster".to_string(),
                dependency: "postgis".to_string(),
            }
        );
    }

    #[test]
    fn test_find_cycles_reports_each_cycle_once() {
        let entries = vec![
            ManifestEntry::extension("x").depends_on("y"),
            ManifestEntry::extension("y").depends_on("x"),
            ManifestEntry::extension("p").depends_on("q"),
            ManifestEntry::extension("q").depends_on("p"),
            ManifestEntry::extension("free"),
        ];
        let cycles = find_cycles(&entries);
        assert_eq!(
            cycles,
            vec![
                vec!["x".to_string(), "y".to_string(), "x".to_string()],
                vec!["p".to_string(), "q".to_string(), "p".to_string()],
            ]
        );
    }

    #[test]
    fn test_find_cycles_empty_for_dag() {
        let entries = vec![
            ManifestEntry::extension("a"),
            ManifestEntry::extension("b").depends_on("a"),
            ManifestEntry::extension("c").depends_on("missing"),
        ];
        assert!(find_cycles(&entries).is_empty());
    }
}
