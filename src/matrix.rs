//! Square boolean matrices over region indices.
//!
//! Adjacency, transition and candidate-pair relations are all stored as a
//! [`BoolMatrix`]. The matrix is an append-only arena: [`BoolMatrix::grow`]
//! adds empty rows and columns at the end, and never renumbers existing ones.
//!
//! Transition-like relations use the `m[target][source]` orientation: entry
//! `(j, i)` set means "region `j` is reachable from region `i`".

use std::fmt::{Display, Formatter};

use crate::bitset::BitSet;

/// A square boolean matrix with growable dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoolMatrix {
    rows: Vec<BitSet>,
}

impl BoolMatrix {
    /// Creates an `n × n` matrix with all entries cleared.
    pub fn new(n: usize) -> Self {
        Self {
            rows: (0..n).map(|_| BitSet::new(n)).collect(),
        }
    }

    /// Creates the `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n);
        for i in 0..n {
            m.set(i, i, true);
        }
        m
    }

    /// Creates an `n × n` matrix with the given entries set.
    pub fn from_entries(n: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut m = Self::new(n);
        for (r, c) in entries {
            m.set(r, c, true);
        }
        m
    }

    /// Dimension of the matrix.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    fn check(&self, r: usize, c: usize) {
        assert!(
            r < self.size() && c < self.size(),
            "Index ({}, {}) out of bounds for {}x{} matrix",
            r,
            c,
            self.size(),
            self.size()
        );
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> bool {
        self.check(r, c);
        self.rows[r].contains(c)
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: bool) {
        self.check(r, c);
        self.rows[r].set(c, value);
    }

    /// Sets both `(r, c)` and `(c, r)`.
    pub fn set_symmetric(&mut self, r: usize, c: usize, value: bool) {
        self.set(r, c, value);
        self.set(c, r, value);
    }

    pub fn row(&self, r: usize) -> &BitSet {
        &self.rows[r]
    }

    pub fn column(&self, c: usize) -> BitSet {
        (0..self.size()).filter(|&r| self.rows[r].contains(c)).collect()
    }

    /// Appends `extra` empty rows and columns. Existing entries keep their indices.
    pub fn grow(&mut self, extra: usize) {
        let n = self.size() + extra;
        for row in &mut self.rows {
            row.reserve(n);
        }
        self.rows.extend((0..extra).map(|_| BitSet::new(n)));
    }

    pub fn clear_row(&mut self, r: usize) {
        self.rows[r].clear();
    }

    pub fn clear_column(&mut self, c: usize) {
        for row in &mut self.rows {
            row.remove(c);
        }
    }

    /// Returns `true` if at least one entry is set.
    pub fn any(&self) -> bool {
        self.rows.iter().any(|row| !row.is_empty())
    }

    /// Number of set entries.
    pub fn count(&self) -> usize {
        self.rows.iter().map(BitSet::len).sum()
    }

    /// First set entry in row-major order.
    pub fn first(&self) -> Option<(usize, usize)> {
        self.rows
            .iter()
            .enumerate()
            .find_map(|(r, row)| row.first().map(|c| (r, c)))
    }

    /// All set entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().map(move |c| (r, c)))
    }

    /// Boolean matrix product `self · other`, thresholded to {0, 1}.
    pub fn multiply(&self, other: &BoolMatrix) -> BoolMatrix {
        assert_eq!(self.size(), other.size(), "Dimension mismatch");
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut acc = BitSet::new(self.size());
                for k in row.iter() {
                    acc.union_with(&other.rows[k]);
                }
                acc
            })
            .collect();
        BoolMatrix { rows }
    }

    pub fn is_symmetric(&self) -> bool {
        self.iter().all(|(r, c)| self.get(c, r))
    }

    /// Returns `true` if every diagonal entry is set.
    pub fn is_reflexive(&self) -> bool {
        (0..self.size()).all(|i| self.get(i, i))
    }
}

impl Display for BoolMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for row in &self.rows {
            let line: String = (0..self.size())
                .map(|c| if row.contains(c) { '1' } else { '0' })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Cells reachable within `trans_length` hops.
///
/// Multiplies `adj_k` by `adj` repeatedly (`trans_length - 1` times).
/// For `trans_length <= 1` returns `adj_k` unchanged.
pub fn reachable_within(trans_length: usize, adj_k: &BoolMatrix, adj: &BoolMatrix) -> BoolMatrix {
    let mut result = adj_k.clone();
    for _ in 1..trans_length {
        result = result.multiply(adj);
    }
    result
}

/// Re-marks row and column `i` of the candidate matrix as
/// "reachable within `trans_length` hops but not yet a known transition".
///
/// The column assignment is applied last, so it decides the diagonal entry.
pub(crate) fn refresh_candidates(
    candidates: &mut BoolMatrix,
    adj_k: &BoolMatrix,
    transitions: &BoolMatrix,
    i: usize,
) {
    let horizontal = adj_k.row(i).difference(transitions.row(i));
    candidates.clear_row(i);
    for c in horizontal.iter() {
        candidates.set(i, c, true);
    }
    for r in 0..candidates.size() {
        candidates.set(r, i, adj_k.get(r, i) && !transitions.get(r, i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn path_graph(n: usize) -> BoolMatrix {
        let mut adj = BoolMatrix::identity(n);
        for i in 1..n {
            adj.set_symmetric(i - 1, i, true);
        }
        adj
    }

    #[test]
    fn test_grow_keeps_entries() {
        let mut m = BoolMatrix::from_entries(2, [(0, 1), (1, 1)]);
        m.grow(3);
        assert_eq!(m.size(), 5);
        assert!(m.get(0, 1));
        assert!(m.get(1, 1));
        assert!(!m.get(4, 4));
        m.set(4, 0, true);
        assert_eq!(m.count(), 3);
    }

    #[test]
    fn test_first_is_row_major() {
        let m = BoolMatrix::from_entries(4, [(2, 0), (1, 3), (3, 1)]);
        assert_eq!(m.first(), Some((1, 3)));
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(1, 3), (2, 0), (3, 1)]);
        assert_eq!(BoolMatrix::new(3).first(), None);
    }

    #[test]
    fn test_clear_row_and_column() {
        let mut m = path_graph(3);
        m.clear_row(1);
        m.clear_column(1);
        println!("m =\n{}", m);
        assert!(!m.get(0, 1));
        assert!(!m.get(1, 2));
        assert!(m.get(0, 0));
        assert_eq!(m.count(), 2);
        assert!(m.column(1).is_empty());
        assert_eq!(m.column(2).iter().collect::<Vec<_>>(), vec![2]);

        m.clear_row(0);
        m.clear_row(2);
        assert!(!m.any());
        assert!(!BoolMatrix::new(0).any());
    }

    #[test]
    fn test_reachable_within() {
        let adj = path_graph(5);

        let one = reachable_within(1, &adj, &adj);
        assert_eq!(one, adj);

        let two = reachable_within(2, &adj, &adj);
        println!("two hops =\n{}", two);
        assert!(two.get(0, 2));
        assert!(!two.get(0, 3));
        assert!(two.is_symmetric());

        // Beyond the diameter, the closure is complete.
        let all = reachable_within(10, &adj, &adj);
        assert_eq!(all.count(), 25);
    }

    #[test]
    fn test_refresh_candidates() {
        let adj = path_graph(3);
        let transitions = BoolMatrix::from_entries(3, [(1, 0), (1, 1)]);
        let mut candidates = BoolMatrix::new(3);

        refresh_candidates(&mut candidates, &adj, &transitions, 1);

        // row 1: adjacency {0, 1, 2} minus transitions {0, 1}
        assert!(!candidates.get(1, 0));
        assert!(candidates.get(1, 2));
        // column 1: adjacency {0, 1, 2}, no transitions into column 1 except (1, 1)
        assert!(candidates.get(0, 1));
        assert!(candidates.get(2, 1));
        assert!(!candidates.get(1, 1));
    }

    #[test]
    fn test_symmetry_and_reflexivity() {
        let adj = path_graph(4);
        assert!(adj.is_symmetric());
        assert!(adj.is_reflexive());

        let mut broken = adj.clone();
        broken.set(0, 3, true);
        assert!(!broken.is_symmetric());
        broken.set(2, 2, false);
        assert!(!broken.is_reflexive());
    }
}
