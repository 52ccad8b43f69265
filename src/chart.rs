use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::theory::{Derivation, Theory, TheoryArena, TheoryIdx};

/// Candidates at or below this are never worth keeping
pub const SCORE_FLOOR: f64 = -10000.0;

/// A triangular CYK table over lattice columns.
///
/// Cell `(start, end)` holds theories covering `start..end`, in discovery
/// order. Every theory in a cell lives in the chart's arena, so indices stay
/// valid for as long as the chart does.
#[derive(Debug, Clone)]
pub struct Chart {
  columns: usize,
  capacity: usize,
  cells: Vec<Vec<TheoryIdx>>,
  arena: TheoryArena,
}

impl Chart {
  pub fn new(columns: usize, capacity: usize) -> Self {
    Self {
      columns,
      capacity,
      cells: vec![Vec::new(); columns * (columns + 1) / 2],
      arena: TheoryArena::new(),
    }
  }

  pub fn columns(&self) -> usize {
    self.columns
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  fn offset(&self, start: usize, end: usize) -> usize {
    assert!(start < end && end <= self.columns, "bad span {}..{}", start, end);
    // rows before `start` hold columns, columns - 1, ... cells
    start * self.columns - start * start.saturating_sub(1) / 2 + (end - start - 1)
  }

  pub fn cell(&self, start: usize, end: usize) -> &[TheoryIdx] {
    &self.cells[self.offset(start, end)]
  }

  pub fn theory(&self, idx: TheoryIdx) -> &Theory {
    self.arena.get(idx)
  }

  pub fn theories(&self, start: usize, end: usize) -> impl Iterator<Item = &Theory> + '_ {
    self.cell(start, end).iter().map(move |&idx| self.arena.get(idx))
  }

  /// Indices in a cell, best first; ties keep discovery order
  pub fn ranked(&self, start: usize, end: usize) -> Vec<TheoryIdx> {
    let mut ranked = self.cell(start, end).to_vec();
    ranked.sort_by(|a, b| self.theory(*b).score.total_cmp(&self.theory(*a).score));
    ranked
  }

  pub fn best(&self, start: usize, end: usize) -> Option<TheoryIdx> {
    self.ranked(start, end).into_iter().next()
  }

  /// Total number of theories held across all cells
  pub fn len(&self) -> usize {
    self.cells.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Adds a lexical theory to its cell. A full cell only takes it in place of
  /// a lower-scoring theory; returns whether it was kept.
  pub fn insert_preterminal(&mut self, theory: Theory) -> bool {
    let offset = self.offset(theory.start, theory.end);
    if self.cells[offset].len() < self.capacity {
      let idx = self.arena.alloc(theory);
      self.cells[offset].push(idx);
      return true;
    }

    let lowest = self.cells[offset]
      .iter()
      .copied()
      .min_by(|a, b| self.arena.get(*a).score.total_cmp(&self.arena.get(*b).score));
    match lowest {
      Some(idx) if self.arena.get(idx).score < theory.score => {
        // nothing can point at a preterminal before the chart is filled
        *self.arena.get_mut(idx) = theory;
        true
      }
      _ => false,
    }
  }

  /// Merges freshly combined theories into a cell that may already hold
  /// preterminals, and returns how many of them were kept.
  ///
  /// Lowest-scoring candidates are dropped until the cell fits its
  /// capacity, then every candidate that isn't strictly better than
  /// `best + lambda` is dropped too. Preterminals are never removed.
  pub fn prune_and_insert(
    &mut self,
    start: usize,
    end: usize,
    candidates: Vec<Theory>,
    lambda: f64,
  ) -> usize {
    let offset = self.offset(start, end);

    let mut pending: Vec<Theory> = Vec::with_capacity(candidates.len());
    let mut seen: HashMap<(String, Derivation), usize> = HashMap::with_capacity(candidates.len());
    for candidate in candidates {
      if !candidate.score.is_finite() || candidate.score <= SCORE_FLOOR {
        continue;
      }
      // same constituent built the same way: keep the better score
      match seen.entry((candidate.category.clone(), candidate.derivation.clone())) {
        Entry::Occupied(slot) => {
          let existing = &mut pending[*slot.get()];
          if candidate.score > existing.score {
            *existing = candidate;
          }
        }
        Entry::Vacant(slot) => {
          slot.insert(pending.len());
          pending.push(candidate);
        }
      }
    }

    let room = self.capacity.saturating_sub(self.cells[offset].len());
    if pending.len() > room {
      // stable, so among equal scores the earliest found survive
      let mut order = (0..pending.len()).collect::<Vec<_>>();
      order.sort_by(|&a, &b| pending[b].score.total_cmp(&pending[a].score));
      let mut keep = vec![false; pending.len()];
      for &i in &order[..room] {
        keep[i] = true;
      }
      let mut keep = keep.into_iter();
      pending.retain(|_| keep.next().unwrap_or(false));
    }

    let best = self.cells[offset]
      .iter()
      .map(|&idx| self.arena.get(idx).score)
      .chain(pending.iter().map(|t| t.score))
      .fold(f64::NEG_INFINITY, f64::max);
    let threshold = best + lambda;

    let mut kept = 0;
    for theory in pending {
      if theory.score > threshold {
        let idx = self.arena.alloc(theory);
        self.cells[offset].push(idx);
        kept += 1;
      }
    }
    tracing::trace!(start, end, kept, total = self.cells[offset].len(), "filled cell");
    kept
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for span in 1..=self.columns {
      for start in 0..=(self.columns - span) {
        let end = start + span;
        if self.cell(start, end).is_empty() {
          continue;
        }
        writeln!(f, "Cell {}..{}:", start, end)?;
        for idx in self.ranked(start, end) {
          writeln!(f, "  {}", self.theory(idx))?;
        }
      }
    }
    Ok(())
  }
}
