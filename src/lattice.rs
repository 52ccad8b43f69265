//! Sentence-level lattice layout and chart initialization.

use std::collections::HashSet;
use std::fmt;

use crate::chart::Chart;
use crate::constraint::{ConstraintIntegrator, EntityConstraint};
use crate::grammar::Grammar;
use crate::lexicon::{Lexicon, PosTag, WordFeatures};
use crate::segment::{self, MorphemeClass, WordLattice};
use crate::theory::{Evidence, Theory};

/// One whitespace-delimited input word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub text: String,
  /// Position in the input sentence
  pub index: usize,
  /// Segmentations supplied by an outside analyzer, each a list of pieces
  pub analyses: Vec<Vec<String>>,
}

impl Token {
  pub fn new(index: usize, text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      index,
      analyses: Vec::new(),
    }
  }

  pub fn with_analyses(mut self, analyses: Vec<Vec<String>>) -> Self {
    self.analyses = analyses;
    self
  }

  /// Splits a sentence on whitespace
  pub fn sentence(s: &str) -> Vec<Self> {
    s.split_whitespace()
      .enumerate()
      .map(|(index, text)| Self::new(index, text))
      .collect()
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.text)
  }
}

/// Tags for `form`: from the lexicon if it knows the form, otherwise from
/// the feature classes of the whole token
pub(crate) fn lookup_tags<'a>(
  lexicon: &'a dyn Lexicon,
  features: &dyn WordFeatures,
  form: &str,
  token: &str,
  first_word: bool,
) -> (&'a [PosTag], Evidence) {
  if lexicon.contains(form) {
    return (lexicon.lookup_tags(form), Evidence::Lexicon);
  }
  let tags = lexicon.lookup_tags(&features.features(token, first_word));
  if !tags.is_empty() {
    return (tags, Evidence::Features);
  }
  (
    lexicon.lookup_tags(&features.reduced_features(token, first_word)),
    Evidence::ReducedFeatures,
  )
}

/// A stretch of the sentence that occupies its own chart columns
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
  Word { token: usize, lattice: WordLattice },
  /// Tokens covered by the constraint at this index
  Name { constraint: usize, left: usize, right: usize },
}

impl Unit {
  pub fn width(&self) -> usize {
    match self {
      Self::Word { lattice, .. } => lattice.width(),
      Self::Name { left, right, .. } => right + 1 - left,
    }
  }
}

/// Every token's lattice, in sentence order
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceLattice {
  pub units: Vec<Unit>,
}

impl SentenceLattice {
  /// Number of chart columns the sentence needs
  pub fn width(&self) -> usize {
    self.units.iter().map(Unit::width).sum()
  }
}

/// What the chart engine needs to know about the columns besides the chart
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartLayout {
  pub columns: usize,
  /// Text of the piece starting at each column
  pub column_text: Vec<String>,
  /// Columns where a punctuation or conjunction preterminal starts
  pub punct_or_conj: Vec<bool>,
  /// Column spans of materialized constraints
  pub constraint_spans: Vec<(usize, usize)>,
  /// The sentence ends in a one-column sentence-ending punctuation token
  pub last_is_punct: bool,
}

pub struct LatticeBuilder<'a> {
  grammar: &'a dyn Grammar,
  lexicon: &'a dyn Lexicon,
  features: &'a dyn WordFeatures,
  capacity: usize,
}

impl<'a> LatticeBuilder<'a> {
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

  /// Segments every token not covered by a constraint. `constraints` must
  /// already be validated.
  pub fn segment_sentence(&self, tokens: &[Token], constraints: &[EntityConstraint]) -> SentenceLattice {
    let mut units = Vec::with_capacity(tokens.len());
    let mut pending = constraints.iter().enumerate().peekable();
    let mut i = 0;
    while i < tokens.len() {
      if let Some((idx, c)) = pending.next_if(|(_, c)| c.left == i) {
        units.push(Unit::Name {
          constraint: idx,
          left: c.left,
          right: c.right,
        });
        i = c.right + 1;
        continue;
      }
      let token = &tokens[i];
      units.push(Unit::Word {
        token: i,
        lattice: segment::reconcile(&token.text, &token.analyses),
      });
      i += 1;
    }
    SentenceLattice { units }
  }

  /// Preterminals of one segment
  fn segment_theories(&self, seg: &segment::Segment, token: &Token, column: usize) -> Vec<Theory> {
    let span = (column + seg.start, column + seg.end);
    let first_word = token.index == 0;
    let (tags, evidence) = lookup_tags(self.lexicon, self.features, &seg.text, &token.text, first_word);

    let theories = tags
      .iter()
      .filter(|t| self.grammar.admits(seg.class, &t.tag))
      .map(|t| Theory::preterminal(&t.tag, &seg.text, span, t.score, evidence))
      .collect::<Vec<_>>();
    if !theories.is_empty() || !seg.class.is_closed() {
      return theories;
    }

    let closed = self.grammar.closed_class_tags(seg.class);
    if closed.is_empty() {
      return theories;
    }
    tracing::warn!(
      segment = %seg.text,
      token = %token.text,
      class = %seg.class,
      "no tags for closed-class segment, substituting its whole tag set"
    );
    let score = (1.0 / closed.len() as f64).ln();
    closed
      .iter()
      .map(|tag| Theory::preterminal(tag, &seg.text, span, score, Evidence::Substituted))
      .collect()
  }

  /// Lays the sentence out on a fresh chart and fills in its preterminals
  /// and constraint entries.
  pub fn build_chart(
    &self,
    tokens: &[Token],
    constraints: &[EntityConstraint],
    sentence: &SentenceLattice,
  ) -> (Chart, ChartLayout) {
    let columns = sentence.width();
    let mut chart = Chart::new(columns, self.capacity);
    let mut layout = ChartLayout {
      columns,
      column_text: Vec::with_capacity(columns),
      punct_or_conj: vec![false; columns],
      constraint_spans: Vec::new(),
      last_is_punct: false,
    };
    let integrator = ConstraintIntegrator::new(self.grammar, self.lexicon, self.features, self.capacity);

    let mut column = 0;
    for (unit_idx, unit) in sentence.units.iter().enumerate() {
      match unit {
        Unit::Name { constraint, left, right } => {
          let c = &constraints[*constraint];
          for theory in integrator.materialize(*constraint, c, tokens, column) {
            chart.insert_preterminal(theory);
          }
          layout.column_text.extend(tokens[*left..=*right].iter().map(|t| t.text.clone()));
          layout.constraint_spans.push((column, column + unit.width()));
        }
        Unit::Word { token, lattice } => {
          let token = &tokens[*token];
          // a segment shared by several segmentations only needs its tags once
          let mut seen: HashSet<(usize, usize, MorphemeClass)> = HashSet::new();
          let mut sentence_end = false;
          for seg in lattice.segmentations.iter().flat_map(|s| s.segments.iter()) {
            if !seen.insert((seg.start, seg.end, seg.class)) {
              continue;
            }
            for theory in self.segment_theories(seg, token, column) {
              if self.grammar.is_basic_punctuation_or_conjunction(&theory.head_tag) {
                layout.punct_or_conj[theory.start] = true;
              }
              sentence_end |= self.grammar.is_sentence_ending_punctuation(&theory.head_tag);
              chart.insert_preterminal(theory);
            }
          }
          layout.column_text.extend(lattice.pieces.iter().cloned());
          if unit_idx + 1 == sentence.units.len() {
            layout.last_is_punct = sentence_end && lattice.width() == 1;
          }
        }
      }
      column += unit.width();
    }

    tracing::debug!(columns, preterminals = chart.len(), "built lattice chart");
    (chart, layout)
  }
}
