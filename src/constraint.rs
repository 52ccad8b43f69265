//! Named-entity span constraints and their chart entries.

use std::fmt;

use crate::grammar::Grammar;
use crate::lattice::{lookup_tags, Token};
use crate::lexicon::{Lexicon, WordFeatures};
use crate::theory::{Derivation, Evidence, Theory};
use crate::Err;

/// Asserts that tokens `left..=right` form one name of `entity_type`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityConstraint {
  pub left: usize,
  pub right: usize,
  pub entity_type: String,
  pub relation_type: Option<String>,
}

impl EntityConstraint {
  pub fn new(left: usize, right: usize, entity_type: impl Into<String>) -> Self {
    Self {
      left,
      right,
      entity_type: entity_type.into(),
      relation_type: None,
    }
  }

  pub fn with_relation(mut self, relation_type: impl Into<String>) -> Self {
    self.relation_type = Some(relation_type.into());
    self
  }

  pub fn token_count(&self) -> usize {
    self.right + 1 - self.left
  }
}

impl fmt::Display for EntityConstraint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}[{}..={}]", self.entity_type, self.left, self.right)?;
    if let Some(relation) = &self.relation_type {
      write!(f, " ({})", relation)?;
    }
    Ok(())
  }
}

fn check(
  constraint: &EntityConstraint,
  previous: Option<&EntityConstraint>,
  n_tokens: usize,
) -> Result<(), Err> {
  if constraint.left > constraint.right {
    return Err(format!("constraint {} ends before it starts", constraint).into());
  }
  if constraint.right >= n_tokens {
    return Err(format!("constraint {} is past the last of {} tokens", constraint, n_tokens).into());
  }
  if let Some(previous) = previous {
    if constraint.left <= previous.right {
      return Err(format!("constraint {} overlaps or precedes {}", constraint, previous).into());
    }
  }
  Ok(())
}

/// Checks that constraints are in range, sorted by `left` and non-overlapping
pub fn validate(constraints: &[EntityConstraint], n_tokens: usize) -> Result<(), Err> {
  let mut previous = None;
  for constraint in constraints.iter() {
    check(constraint, previous, n_tokens)?;
    previous = Some(constraint);
  }
  Ok(())
}

/// Keeps the constraints that `validate` would accept, in order, dropping the
/// rest with a warning
pub fn sanitize(constraints: &[EntityConstraint], n_tokens: usize) -> Vec<EntityConstraint> {
  let mut kept: Vec<EntityConstraint> = Vec::with_capacity(constraints.len());
  for constraint in constraints.iter() {
    match check(constraint, kept.last(), n_tokens) {
      Ok(()) => kept.push(constraint.clone()),
      Err(e) => tracing::warn!("dropping entity constraint: {}", e),
    }
  }
  kept
}

/// Whether `start..end` partially overlaps one of the column spans
pub fn crosses(start: usize, end: usize, spans: &[(usize, usize)]) -> bool {
  spans.iter().any(|&(left, right)| {
    (start < left && left < end && end < right) || (left < start && start < right && right < end)
  })
}

/// Builds the chart entries standing in for an entity constraint
pub struct ConstraintIntegrator<'a> {
  grammar: &'a dyn Grammar,
  lexicon: &'a dyn Lexicon,
  features: &'a dyn WordFeatures,
  capacity: usize,
}

impl<'a> ConstraintIntegrator<'a> {
  pub fn new(
    grammar: &'a dyn Grammar,
    lexicon: &'a dyn Lexicon,
    features: &'a dyn WordFeatures,
    capacity: usize,
  ) -> Self {
    Self {
      grammar,
      lexicon,
      features,
      capacity,
    }
  }

  /// Name theories over columns `start..start + token_count`, tagged from
  /// the span's last token. Always returns at least one theory.
  pub fn materialize(
    &self,
    index: usize,
    constraint: &EntityConstraint,
    tokens: &[Token],
    start: usize,
  ) -> Vec<Theory> {
    let word = &tokens[constraint.right].text;
    let span = (start, start + constraint.token_count());
    let entity_type = constraint.entity_type.as_str();
    let first_word = constraint.right == 0;
    let (tags, evidence) = lookup_tags(self.lexicon, self.features, word, word, first_word);

    let name = |tag: &str, score: f64, evidence: Evidence| Theory {
      category: tag.to_string(),
      start: span.0,
      end: span.1,
      score,
      head_word: word.clone(),
      head_tag: tag.to_string(),
      name_type: Some(constraint.entity_type.clone()),
      derivation: Derivation::Name {
        constraint: index,
        evidence,
      },
    };

    let mut theories = tags
      .iter()
      .filter(|t| self.grammar.is_primary_name_tag(entity_type, &t.tag))
      .take(self.capacity)
      .map(|t| name(&t.tag, t.score, evidence))
      .collect::<Vec<_>>();
    let found_primary = !theories.is_empty();

    if !found_primary {
      let tag = self.grammar.default_name_tag(entity_type);
      theories.push(name(tag, 0.0, Evidence::Placeholder));
    }

    // an unknown word is only trusted on its primary reading
    if !(found_primary && !evidence.is_known_word()) {
      for t in tags.iter() {
        if theories.len() >= self.capacity {
          break;
        }
        let secondary = self.grammar.is_secondary_name_tag(entity_type, &t.tag);
        if secondary && !theories.iter().any(|th| th.category == t.tag) {
          theories.push(name(&t.tag, t.score, evidence));
        }
      }
    }

    tracing::debug!(%constraint, entries = theories.len(), "materialized constraint");
    theories
  }
}
