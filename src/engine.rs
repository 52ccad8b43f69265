//! The CYK fill over lattice columns.

use crate::chart::Chart;
use crate::constraint;
use crate::grammar::{Grammar, Side};
use crate::lattice::ChartLayout;
use crate::theory::{Derivation, Theory};

/// For each column, the first later column holding no-cross punctuation
#[derive(Debug, Clone, PartialEq)]
struct PunctuationBounds {
  upper: Vec<usize>,
  punct_or_conj: Vec<bool>,
}

impl PunctuationBounds {
  fn new(no_cross: &[bool], punct_or_conj: &[bool]) -> Self {
    let n = no_cross.len();
    let mut upper = vec![n; n];
    for i in (0..n.saturating_sub(1)).rev() {
      upper[i] = if no_cross[i + 1] { i + 1 } else { upper[i + 1] };
    }
    Self {
      upper,
      punct_or_conj: punct_or_conj.to_vec(),
    }
  }

  /// A span may run up to and over a no-cross punctuation mark only if it
  /// ends right after it, reaches the end of the sentence, or ends next to
  /// punctuation or a conjunction
  fn crosses(&self, start: usize, end: usize) -> bool {
    let n = self.upper.len();
    let bound = self.upper[start];
    if bound == n || bound >= end - 1 {
      return false;
    }
    !(end == n || self.punct_or_conj[end] || self.punct_or_conj[end - 1])
  }
}

pub struct ChartEngine<'a> {
  grammar: &'a dyn Grammar,
  lambda: f64,
}

impl<'a> ChartEngine<'a> {
  pub fn new(grammar: &'a dyn Grammar, lambda: f64) -> Self {
    Self { grammar, lambda }
  }

  fn combine(
    &self,
    chart: &Chart,
    start: usize,
    mid: usize,
    end: usize,
    spans: &[(usize, usize)],
    out: &mut Vec<Theory>,
  ) {
    let left_closable = !constraint::crosses(start, mid, spans);
    let right_closable = !constraint::crosses(mid, end, spans);

    for &l in chart.cell(start, mid) {
      let left = chart.theory(l);
      for &r in chart.cell(mid, end) {
        let right = chart.theory(r);
        let candidates = self
          .grammar
          .combine_binary(left, right, left_closable, right_closable)
          .into_iter()
          .chain(self.grammar.combine_extension(left, right, left_closable, right_closable));
        for c in candidates {
          let head = match c.head {
            Side::Left => left,
            Side::Right => right,
          };
          out.push(Theory {
            category: c.category,
            start,
            end,
            score: c.score,
            head_word: head.head_word.clone(),
            head_tag: head.head_tag.clone(),
            name_type: None,
            derivation: Derivation::Binary {
              kind: c.kind,
              head: c.head,
              left: l,
              right: r,
            },
          });
        }
      }
    }
  }

  /// Fills every multi-column cell bottom-up, shortest spans first
  pub fn fill(&self, chart: &mut Chart, layout: &ChartLayout) {
    let n = layout.columns;
    let no_cross = layout
      .column_text
      .iter()
      .map(|w| self.grammar.is_no_cross_punctuation(w))
      .collect::<Vec<_>>();
    let bounds = PunctuationBounds::new(&no_cross, &layout.punct_or_conj);

    for span in 2..=n {
      for start in 0..=(n - span) {
        let end = start + span;
        let mut theories = Vec::new();
        if !bounds.crosses(start, end) {
          for mid in (start + 1)..end {
            // final punctuation only attaches to the whole rest of the sentence
            if end == n && layout.last_is_punct && !(mid == n - 1 && start == 0) {
              continue;
            }
            self.combine(chart, start, mid, end, &layout.constraint_spans, &mut theories);
          }
        }
        chart.prune_and_insert(start, end, theories, self.lambda);
      }
    }
    tracing::debug!(columns = n, theories = chart.len(), "filled chart");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constraint::EntityConstraint;
  use crate::lattice::{LatticeBuilder, Token};
  use crate::lexicon::{ShapeFeatures, TextLexicon};
  use crate::rules::RuleGrammar;

  const GRAMMAR: &str = r#"
    S -> V* NP : -0.5;
    S -> V* NOUN_PROP : -0.6;
    S -> S* PUNC : -0.1;
    NP -> NP* NP : -2.0;
    NP -> N* ADJ : -0.7;
    NP -> N* COMMA : -0.3;
    NP -> NOUN_PROP NOUN_PROP* : -0.2;
    %sentence-end PUNC;
    %punct-conj PUNC;
    %no-cross ",";
    %name PERSON default NOUN_PROP primary NOUN_PROP;
  "#;

  const LEXICON: &str = r#"
    qAl V
    ktAb N
    kbyr ADJ
    jwrj NOUN_PROP
    bwsh NOUN_PROP
    dAwd NOUN_PROP
    . PUNC
    , COMMA
  "#;

  fn fill(sentence: &str, constraints: &[EntityConstraint]) -> Chart {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let lexicon: TextLexicon = LEXICON.parse().unwrap();
    let builder = LatticeBuilder::new(&grammar, &lexicon, &ShapeFeatures, 10);
    let tokens = Token::sentence(sentence);
    let lattice = builder.segment_sentence(&tokens, constraints);
    let (mut chart, layout) = builder.build_chart(&tokens, constraints, &lattice);
    ChartEngine::new(&grammar, -5.0).fill(&mut chart, &layout);
    chart
  }

  fn categories(chart: &Chart, start: usize, end: usize) -> Vec<String> {
    chart.theories(start, end).map(|t| t.category.clone()).collect()
  }

  #[test]
  fn test_punctuation_bounds() {
    // a b , c d
    let bounds = PunctuationBounds::new(&[false, false, true, false, false], &[false; 5]);
    assert_eq!(bounds.upper, vec![2, 2, 5, 5, 5]);
    assert!(!bounds.crosses(0, 2));
    assert!(!bounds.crosses(0, 3));
    assert!(bounds.crosses(0, 4));
    assert!(bounds.crosses(1, 4));
    assert!(!bounds.crosses(0, 5));
    assert!(!bounds.crosses(2, 4));
    assert!(!bounds.crosses(3, 5));

    let bounds = PunctuationBounds::new(
      &[false, false, true, false, false],
      &[false, false, false, true, false],
    );
    assert!(!bounds.crosses(0, 4));
  }

  #[test]
  fn test_fill_simple_sentence() {
    let chart = fill("qAl ktAb kbyr .", &[]);
    assert_eq!(categories(&chart, 1, 3), vec!["NP"]);
    assert_eq!(categories(&chart, 0, 3), vec!["S"]);
    assert_eq!(categories(&chart, 0, 4), vec!["S"]);
    let top = chart.theory(chart.best(0, 4).unwrap());
    assert_eq!(top.head_word, "qAl");
    assert!((top.score - (-0.5 - 0.7 - 0.1)).abs() < 1e-9);
  }

  #[test]
  fn test_final_punctuation_attaches_last() {
    // "ktAb kbyr ." can't form a constituent on its own
    let chart = fill("qAl ktAb kbyr .", &[]);
    assert!(chart.cell(1, 4).is_empty());
    assert!(chart.cell(2, 4).is_empty());
  }

  #[test]
  fn test_no_crossing_comma() {
    let chart = fill("ktAb , jwrj dAwd", &[]);
    assert_eq!(categories(&chart, 0, 2), vec!["NP"]);
    assert_eq!(categories(&chart, 2, 4), vec!["NP"]);
    // ktAb , jwrj would cross the comma without ending next to it
    assert!(chart.cell(0, 3).is_empty());
    assert_eq!(categories(&chart, 0, 4), vec!["NP"]);
  }

  #[test]
  fn test_constraint_is_never_crossed() {
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON")];
    let chart = fill("qAl jwrj bwsh .", &constraints);
    for span in 1..=4 {
      for start in 0..=(4 - span) {
        let end = start + span;
        if !chart.cell(start, end).is_empty() {
          assert!(!constraint::crosses(start, end, &[(1, 3)]), "{}..{}", start, end);
        }
      }
    }
    let name = chart.theories(1, 3).next().unwrap();
    assert_eq!(name.name_type.as_deref(), Some("PERSON"));
    assert_eq!(categories(&chart, 0, 3), vec!["S"]);
  }

  #[test]
  fn test_capacity_holds_everywhere() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let lexicon: TextLexicon = "jwrj NOUN_PROP:-0.1 NP:-0.2 N:-0.3".parse().unwrap();
    let builder = LatticeBuilder::new(&grammar, &lexicon, &ShapeFeatures, 3);
    let tokens = Token::sentence("jwrj jwrj jwrj jwrj jwrj");
    let lattice = builder.segment_sentence(&tokens, &[]);
    let (mut chart, layout) = builder.build_chart(&tokens, &[], &lattice);
    ChartEngine::new(&grammar, -5.0).fill(&mut chart, &layout);
    for span in 1..=5 {
      for start in 0..=(5 - span) {
        assert!(chart.cell(start, start + span).len() <= 3);
      }
    }
    assert!(!chart.cell(0, 5).is_empty());
  }
}
