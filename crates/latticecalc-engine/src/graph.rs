//! The dependency graph between cell positions.
//!
//! Tracks, for every position with a formula, the set of positions it
//! references (out-edges) and the reverse index (in-edges). Detects cycles
//! before committing new edges, drives lazy cache invalidation, and keeps
//! placeholder vertices for positions that are referenced but hold no cell.

use std::collections::{HashMap, HashSet};

use crate::position::Position;

#[derive(Default)]
struct Vertex {
    /// Positions this vertex's cell references.
    out_edges: HashSet<Position>,
    /// Positions that reference this vertex.
    in_edges: HashSet<Position>,
    /// Whether this vertex exists only because something references it,
    /// not because it holds a cell of its own.
    placeholder: bool,
    /// Whether this vertex's cached value must be recomputed.
    stale: bool,
}

/// Directed acyclic graph over cell positions, used for cycle detection and
/// cache invalidation.
#[derive(Default)]
pub struct DependencyGraph {
    vertices: HashMap<Position, Vertex>,
}

/// Returned by `try_install` when the proposed edge set would close a cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CycleDetected;

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        DependencyGraph::default()
    }

    /// Mark `pos` as holding a real cell (not just a placeholder), creating
    /// its vertex if absent.
    pub fn ensure_real(&mut self, pos: Position) {
        let v = self.vertices.entry(pos).or_default();
        v.placeholder = false;
    }

    /// Attempt to install `pos`'s out-edges as `new_refs`. Runs cycle
    /// detection against a combined view of the existing graph plus the
    /// proposed edges *before* mutating anything; only commits on success.
    pub fn try_install(
        &mut self,
        pos: Position,
        new_refs: &[Position],
    ) -> Result<(), CycleDetected> {
        if self.would_cycle(pos, new_refs) {
            return Err(CycleDetected);
        }

        self.ensure_real(pos);

        let old_refs: Vec<Position> = self
            .vertices
            .get(&pos)
            .map(|v| v.out_edges.iter().copied().collect())
            .unwrap_or_default();
        for old in &old_refs {
            self.retire_in_edge(*old, pos);
        }

        for &r in new_refs {
            self.vertices.entry(r).or_insert_with(|| Vertex {
                placeholder: true,
                ..Vertex::default()
            });
            self.vertices.get_mut(&r).unwrap().in_edges.insert(pos);
        }
        self.vertices.get_mut(&pos).unwrap().out_edges = new_refs.iter().copied().collect();

        Ok(())
    }

    /// Whether installing `new_refs` as `pos`'s out-edges would create a
    /// cycle, without mutating any state.
    fn would_cycle(&self, pos: Position, new_refs: &[Position]) -> bool {
        enum Color {
            White,
            Grey,
            Black,
        }
        let mut colors: HashMap<Position, Color> = HashMap::new();

        fn visit(
            graph: &DependencyGraph,
            start: Position,
            node: Position,
            hypothetical_out: &[Position],
            colors: &mut HashMap<Position, Color>,
        ) -> bool {
            match colors.get(&node) {
                Some(Color::Grey) => return true,
                Some(Color::Black) => return false,
                _ => {}
            }
            colors.insert(node, Color::Grey);

            let out_edges: Vec<Position> = if node == start {
                hypothetical_out.to_vec()
            } else {
                graph
                    .vertices
                    .get(&node)
                    .map(|v| v.out_edges.iter().copied().collect())
                    .unwrap_or_default()
            };

            for next in out_edges {
                if visit(graph, start, next, hypothetical_out, colors) {
                    return true;
                }
            }
            colors.insert(node, Color::Black);
            false
        }

        visit(self, pos, pos, new_refs, &mut colors)
    }

    /// Remove `dependent` from `target`'s in-edges; delete `target`'s
    /// vertex if it is now an unreferenced placeholder.
    fn retire_in_edge(&mut self, target: Position, dependent: Position) {
        if let Some(v) = self.vertices.get_mut(&target) {
            v.in_edges.remove(&dependent);
            if v.placeholder && v.in_edges.is_empty() {
                self.vertices.remove(&target);
            }
        }
    }

    /// Remove the vertex at `pos` entirely. Dependents keep a placeholder
    /// vertex so their in-edge bookkeeping stays valid.
    pub fn remove(&mut self, pos: Position) {
        let Some(v) = self.vertices.remove(&pos) else { return };
        for out in &v.out_edges {
            self.retire_in_edge(*out, pos);
        }
        if !v.in_edges.is_empty() {
            let placeholder = self.vertices.entry(pos).or_insert_with(Vertex::default);
            placeholder.placeholder = true;
            placeholder.in_edges = v.in_edges;
        }
    }

    /// Mark `pos` and everything transitively depending on it as stale.
    /// Stops descending at vertices already stale.
    pub fn invalidate_dependents(&mut self, pos: Position) {
        let mut stack = vec![pos];
        while let Some(current) = stack.pop() {
            let Some(v) = self.vertices.get_mut(&current) else { continue };
            if v.stale {
                continue;
            }
            v.stale = true;
            stack.extend(v.in_edges.iter().copied());
        }
    }

    /// Every vertex currently tracked, real or placeholder. Used by the
    /// sheet to bounds-check an insertion against the whole referenced
    /// extent, not just its own cell store.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.vertices.keys().copied()
    }

    pub fn is_stale(&self, pos: Position) -> bool {
        self.vertices.get(&pos).map(|v| v.stale).unwrap_or(false)
    }

    pub fn clear_stale(&mut self, pos: Position) {
        if let Some(v) = self.vertices.get_mut(&pos) {
            v.stale = false;
        }
    }

    /// Rename every vertex key via `f`; vertices whose key becomes invalid
    /// are dropped (their in-edges move to a placeholder at the same dead
    /// key only transiently, and are expected to be annihilated themselves
    /// by a concurrent AST rewrite of the referencing formulas).
    fn rename_keys(&mut self, f: impl Fn(Position) -> Position) {
        let old = std::mem::take(&mut self.vertices);
        let mut renamed: HashMap<Position, Vertex> = HashMap::with_capacity(old.len());
        for (pos, mut v) in old {
            let new_pos = f(pos);
            if !new_pos.is_valid() {
                continue;
            }
            v.out_edges = v.out_edges.into_iter().map(&f).filter(|p| p.is_valid()).collect();
            v.in_edges = v.in_edges.into_iter().map(&f).filter(|p| p.is_valid()).collect();
            renamed.insert(new_pos, v);
        }
        self.vertices = renamed;
    }

    pub fn shift_rows(&mut self, before: usize, count: usize) {
        self.rename_keys(|mut p| {
            if p.row >= before {
                p.row += count;
            }
            p
        });
    }

    pub fn shift_cols(&mut self, before: usize, count: usize) {
        self.rename_keys(|mut p| {
            if p.col >= before {
                p.col += count;
            }
            p
        });
    }

    pub fn delete_row_range(&mut self, first: usize, count: usize) {
        self.rename_keys(|mut p| {
            if p.row >= first && p.row < first + count {
                p.row = usize::MAX;
            } else if p.row >= first + count {
                p.row -= count;
            }
            p
        });
    }

    pub fn delete_col_range(&mut self, first: usize, count: usize) {
        self.rename_keys(|mut p| {
            if p.col >= first && p.col < first + count {
                p.col = usize::MAX;
            } else if p.col >= first + count {
                p.col -= count;
            }
            p
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_simple_chain() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        assert!(g.try_install(a, &[b]).is_ok());
    }

    #[test]
    fn rejects_direct_cycle() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        g.try_install(a, &[b]).unwrap();
        assert!(g.try_install(b, &[a]).is_err());
    }

    #[test]
    fn rejects_self_reference() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        assert!(g.try_install(a, &[a]).is_err());
    }

    #[test]
    fn failed_install_leaves_graph_unchanged() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        g.try_install(a, &[b]).unwrap();
        assert!(g.try_install(b, &[a]).is_err());
        // b's out-edges should still be empty, not rolled-back garbage.
        g.invalidate_dependents(b);
        assert!(g.is_stale(b));
        assert!(!g.is_stale(a));
    }

    #[test]
    fn invalidate_dependents_stops_at_stale_vertex() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        let c = Position::new(2, 0);
        g.try_install(b, &[a]).unwrap();
        g.try_install(c, &[b]).unwrap();
        g.invalidate_dependents(a);
        assert!(g.is_stale(a));
        assert!(g.is_stale(b));
        assert!(g.is_stale(c));
    }

    #[test]
    fn placeholder_created_and_removed_with_last_reference() {
        let mut g = DependencyGraph::new();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        g.try_install(a, &[b]).unwrap();
        assert!(g.vertices.contains_key(&b));
        g.remove(a);
        assert!(!g.vertices.contains_key(&b));
    }
}
