#[macro_use]
extern crate lazy_static;

pub mod buckwalter;
pub mod chart;
pub mod constraint;
pub mod derivation;
pub mod engine;
pub mod grammar;
pub mod lattice;
pub mod lexicon;
pub mod options;
pub mod parse_grammar;
pub mod rules;
pub mod segment;
pub mod syntree;
pub mod theory;
pub mod utils;

use crate::chart::Chart;
use crate::derivation::DerivationExtractor;
use crate::engine::ChartEngine;
use crate::lattice::{ChartLayout, LatticeBuilder};
pub use crate::constraint::EntityConstraint;
pub use crate::grammar::Grammar;
pub use crate::lattice::Token;
pub use crate::lexicon::{Lexicon, ShapeFeatures, TextLexicon, WordFeatures};
pub use crate::options::ParserOptions;
pub use crate::rules::RuleGrammar;
pub use crate::syntree::{ParseNode, ParseTree};
pub use crate::utils::Err;

/// Parses tokenized sentences against a grammar and lexicon.
///
/// A `Parser` holds no per-sentence state: every call builds its own chart,
/// so one parser can be shared between threads.
pub struct Parser<'a> {
  grammar: &'a dyn Grammar,
  lexicon: &'a dyn Lexicon,
  features: &'a dyn WordFeatures,
  options: ParserOptions,
}

impl<'a> Parser<'a> {
  pub fn new(
    grammar: &'a dyn Grammar,
    lexicon: &'a dyn Lexicon,
    features: &'a dyn WordFeatures,
  ) -> Self {
    Self {
      grammar,
      lexicon,
      features,
      options: ParserOptions::default(),
    }
  }

  pub fn with_options(mut self, options: ParserOptions) -> Result<Self, Err> {
    options.validate()?;
    self.options = options;
    Ok(self)
  }

  pub fn options(&self) -> &ParserOptions {
    &self.options
  }

  fn extractor(&self) -> DerivationExtractor<'a> {
    DerivationExtractor::new(self.grammar, self.options.max_parses, self.options.diversity_margin)
  }

  /// Lays out and fills the chart, or `None` when the sentence is empty or
  /// too wide for it
  fn fill_chart(
    &self,
    tokens: &[Token],
    constraints: &[EntityConstraint],
  ) -> Option<(Chart, ChartLayout)> {
    let capacity = self.options.max_entries_per_cell;
    let builder = LatticeBuilder::new(self.grammar, self.lexicon, self.features, capacity);
    let lattice = builder.segment_sentence(tokens, constraints);
    let width = lattice.width();
    if width == 0 {
      return None;
    }
    if width > self.options.max_columns {
      tracing::warn!(
        width,
        max = self.options.max_columns,
        "lattice too wide for the chart, using a flat parse"
      );
      return None;
    }
    tracing::debug!(tokens = tokens.len(), width, "segmented sentence");

    let (mut chart, layout) = builder.build_chart(tokens, constraints, &lattice);
    ChartEngine::new(self.grammar, self.options.lambda).fill(&mut chart, &layout);
    Some((chart, layout))
  }

  /// The filled chart for a sentence, if it fits
  pub fn chart(&self, tokens: &[Token], constraints: &[EntityConstraint]) -> Option<Chart> {
    let constraints = constraint::sanitize(constraints, tokens.len());
    self.fill_chart(tokens, &constraints).map(|(chart, _)| chart)
  }

  /// Up to `max_parses` trees, best first. Never empty: a sentence without a
  /// full derivation gets a single flat parse.
  pub fn parse_all(
    &self,
    tokens: &[Token],
    constraints: &[EntityConstraint],
    collapse_np: bool,
  ) -> Vec<ParseTree> {
    let constraints = constraint::sanitize(constraints, tokens.len());
    let extractor = self.extractor();

    let trees = match self.fill_chart(tokens, &constraints) {
      Some((chart, _)) => extractor.extract(&chart, tokens, &constraints, collapse_np),
      None => Vec::new(),
    };
    if !trees.is_empty() {
      return trees;
    }
    if !tokens.is_empty() {
      tracing::warn!(sentence = %sentence_text(tokens), "no full parse, using a flat parse");
    }
    vec![extractor.flat_parse(tokens, &constraints, collapse_np)]
  }

  /// The best tree for a sentence
  pub fn parse(
    &self,
    tokens: &[Token],
    constraints: &[EntityConstraint],
    collapse_np: bool,
  ) -> ParseTree {
    let mut trees = self.parse_all(tokens, constraints, collapse_np);
    // parse_all always returns at least one tree
    trees.swap_remove(0)
  }
}

fn sentence_text(tokens: &[Token]) -> String {
  tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntree::Constituent;
  use proptest::prelude::*;

  fn parts(grammar: &str, lexicon: &str) -> (RuleGrammar, TextLexicon) {
    (grammar.parse().unwrap(), lexicon.parse().unwrap())
  }

  fn demo_parts() -> (RuleGrammar, TextLexicon) {
    parts(include_str!("../demos/toy.grammar"), include_str!("../demos/toy.lex"))
  }

  /// Every entity node in the tree with the words under it, in tree order
  fn entity_nodes(node: &ParseNode, out: &mut Vec<(EntityConstraint, Vec<String>)>) {
    if let ParseNode::Branch(c) = node {
      if let Some(entity) = &c.entity {
        out.push((entity.clone(), node.leaves().iter().map(|w| w.to_string()).collect()));
      }
      for child in c.children() {
        entity_nodes(child, out);
      }
    }
  }

  /// Lays out non-overlapping constraints from (gap, length) pairs, left to
  /// right, stopping at the first one that runs off the sentence
  fn lay_out_constraints(words: usize, spans: &[(usize, usize)]) -> Vec<EntityConstraint> {
    let types = ["PERSON", "GPE", "ORG"];
    let mut constraints = Vec::new();
    let mut next = 0;
    for (i, &(gap, len)) in spans.iter().enumerate() {
      let left = next + gap;
      let right = left + len - 1;
      if right >= words {
        break;
      }
      constraints.push(EntityConstraint::new(left, right, types[i % types.len()]));
      next = right + 1;
    }
    constraints
  }

  #[test]
  fn test_article_noun() {
    let (g, lex) = parts("NP -> DET N;", "Al DET\nktAb N");
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tokens = Token::sentence("Al ktAb");

    let chart = parser.chart(&tokens, &[]).unwrap();
    assert_eq!(chart.columns(), 2);
    assert_eq!(chart.theories(0, 1).next().unwrap().category, "DET");
    assert_eq!(chart.theories(1, 2).next().unwrap().category, "N");

    let tree = parser.parse(&tokens, &[], false);
    assert_eq!(tree.to_string(), "(NP (DET Al) (N ktAb))");
    assert!(!tree.flat);
  }

  #[test]
  fn test_named_entity_is_one_constituent() {
    let (g, lex) = parts(
      r#"
        S -> V* NOUN_PROP : -0.5;
        S -> V* N : -0.5;
        %name PERSON default NOUN_PROP primary NOUN_PROP;
      "#,
      "qAl V\nbwsh N",
    );
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tokens = Token::sentence("qAl bwsh");
    let constraints = vec![EntityConstraint::new(1, 1, "PERSON")];

    let chart = parser.chart(&tokens, &constraints).unwrap();
    assert_eq!(chart.columns(), 2);
    let name = chart.theories(1, 2).collect::<Vec<_>>();
    assert_eq!(name.len(), 1);
    assert_eq!(name[0].category, "NOUN_PROP");

    let tree = parser.parse(&tokens, &constraints, false);
    assert_eq!(tree.to_string(), "(S (V qAl) (NOUN_PROP bwsh))");
    let node = tree.root.get_branch().unwrap().postmods[0].get_branch().unwrap();
    assert_eq!(node.entity, Some(constraints[0].clone()));

    // without the constraint "bwsh" is split into b+ws+h
    assert_eq!(parser.chart(&tokens, &[]).unwrap().columns(), 4);
  }

  #[test]
  fn test_fallback_without_lexicon() {
    let (g, lex) = parts("NP -> DET N;", "");
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tokens = Token::sentence("qAl jwrj bwsh");
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON")];
    let tree = parser.parse(&tokens, &constraints, false);
    assert!(tree.flat);
    assert_eq!(
      tree.to_string(),
      "(FRAG (UNKNOWN qAl) (NPP (NOUN_PROP jwrj) (NOUN_PROP bwsh)))"
    );
    assert_eq!(tree.surface(), "qAljwrjbwsh");
  }

  #[test]
  fn test_fallback_when_too_wide() {
    let (g, lex) = parts("NP -> DET N;", "Al DET\nktAb N");
    let options = ParserOptions {
      max_columns: 1,
      ..Default::default()
    };
    let parser = Parser::new(&g, &lex, &ShapeFeatures).with_options(options).unwrap();
    let tokens = Token::sentence("Al ktAb");
    assert!(parser.chart(&tokens, &[]).is_none());
    let tree = parser.parse(&tokens, &[], false);
    assert!(tree.flat);
    assert_eq!(tree.to_string(), "(FRAG (UNKNOWN Al) (UNKNOWN ktAb))");
  }

  #[test]
  fn test_empty_sentence() {
    let (g, lex) = parts("NP -> DET N;", "");
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tree = parser.parse(&[], &[], false);
    assert_eq!(tree.root, ParseNode::Branch(Constituent::new("FRAG", ParseNode::leaf(""))));
  }

  #[test]
  fn test_bad_options_rejected() {
    let (g, lex) = parts("NP -> DET N;", "");
    let options = ParserOptions {
      lambda: 1.0,
      ..Default::default()
    };
    assert!(Parser::new(&g, &lex, &ShapeFeatures).with_options(options).is_err());
  }

  #[test]
  fn test_invalid_constraints_are_dropped() {
    let (g, lex) = parts("NP -> DET N;", "Al DET\nktAb N");
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tokens = Token::sentence("Al ktAb");
    let constraints = vec![EntityConstraint::new(1, 5, "PERSON")];
    assert_eq!(parser.parse(&tokens, &constraints, false).to_string(), "(NP (DET Al) (N ktAb))");
  }

  #[test]
  fn test_demo_sentences() {
    let g: RuleGrammar = include_str!("../demos/toy.grammar").parse().unwrap();
    let lex: TextLexicon = include_str!("../demos/toy.lex").parse().unwrap();
    let options = ParserOptions {
      max_parses: 3,
      ..Default::default()
    };
    let parser = Parser::new(&g, &lex, &ShapeFeatures).with_options(options).unwrap();

    let tokens = Token::sentence("qrA Alwld ktAbh .");
    let trees = parser.parse_all(&tokens, &[], true);
    assert!(!trees[0].flat, "{}", trees[0]);
    assert!(trees.len() <= 3);
    for tree in trees.iter() {
      assert_eq!(tree.surface(), "qrAAlwldktAbh.");
    }
    assert!(trees.windows(2).all(|w| w[0].score >= w[1].score));

    let tokens = Token::sentence("qAl jwrj bwsh .");
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON")];
    let tree = parser.parse(&tokens, &constraints, false);
    assert!(!tree.flat, "{}", tree);
    assert_eq!(tree.surface(), "qAljwrjbwsh.");
  }

  #[test]
  fn test_lone_colon_is_a_lexicon_word() {
    let (g, lex) = parts("S -> N* PUNC;", "ktAb N\n: PUNC\n:unk N");
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tree = parser.parse(&Token::sentence("ktAb :"), &[], false);
    assert!(!tree.flat, "{}", tree);
    assert_eq!(tree.to_string(), "(S (N ktAb) (PUNC :))");
  }

  #[test]
  fn test_several_entities_keep_their_words() {
    let (g, lex) = demo_parts();
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let tokens = Token::sentence("qAl jwrj bwsh fy AlqAhrp ktAbhmA .");
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON"), EntityConstraint::new(4, 4, "GPE")];

    let (chart, layout) = parser.fill_chart(&tokens, &constraints).unwrap();
    assert_eq!(layout.constraint_spans.len(), 2);
    for start in 0..chart.columns() {
      for end in (start + 1)..=chart.columns() {
        if !chart.cell(start, end).is_empty() {
          assert!(!constraint::crosses(start, end, &layout.constraint_spans), "{}..{}", start, end);
        }
      }
    }

    for tree in parser.parse_all(&tokens, &constraints, false) {
      assert_eq!(tree.surface(), "qAljwrjbwshfyAlqAhrpktAbhmA.");
      let mut entities = Vec::new();
      entity_nodes(&tree.root, &mut entities);
      let words = entities.iter().map(|(_, w)| w.join(" ")).collect::<Vec<_>>();
      assert_eq!(words, vec!["jwrj bwsh", "AlqAhrp"], "{}", tree);
    }
  }

  #[test]
  fn test_concurrent_parses() {
    let g: RuleGrammar = include_str!("../demos/toy.grammar").parse().unwrap();
    let lex: TextLexicon = include_str!("../demos/toy.lex").parse().unwrap();
    let parser = Parser::new(&g, &lex, &ShapeFeatures);
    let sentences = ["qrA Alwld ktAbh .", "qAl Alwld .", "wktb Alwld ktAbA ."];
    let expected = sentences
      .iter()
      .map(|s| parser.parse(&Token::sentence(s), &[], false))
      .collect::<Vec<_>>();

    let parser = &parser;
    std::thread::scope(|scope| {
      let handles = sentences
        .iter()
        .map(|s| scope.spawn(move || parser.parse(&Token::sentence(s), &[], false)))
        .collect::<Vec<_>>();
      for (handle, expected) in handles.into_iter().zip(expected.iter()) {
        assert_eq!(&handle.join().unwrap(), expected);
      }
    });
  }

  proptest! {
    #[test]
    fn test_leaves_spell_the_input(words in prop::collection::vec("[wfblktAbnyhmsrq.]{1,7}", 0..6)) {
      let g: RuleGrammar = include_str!("../demos/toy.grammar").parse().unwrap();
      let lex: TextLexicon = include_str!("../demos/toy.lex").parse().unwrap();
      let parser = Parser::new(&g, &lex, &ShapeFeatures);
      let sentence = words.join(" ");
      let tokens = Token::sentence(&sentence);
      for tree in parser.parse_all(&tokens, &[], false) {
        prop_assert_eq!(tree.surface(), words.concat());
      }
    }

    #[test]
    fn test_entity_spans_survive_parsing(
      words in prop::collection::vec("[wfblktAbnyhmsrq.]{1,7}", 1..7),
      spans in prop::collection::vec((0usize..3, 1usize..3), 0..4),
    ) {
      let (g, lex) = demo_parts();
      let parser = Parser::new(&g, &lex, &ShapeFeatures);
      let tokens = Token::sentence(&words.join(" "));
      let constraints = lay_out_constraints(words.len(), &spans);

      if let Some((chart, layout)) = parser.fill_chart(&tokens, &constraints) {
        prop_assert_eq!(layout.constraint_spans.len(), constraints.len());
        for start in 0..chart.columns() {
          for end in (start + 1)..=chart.columns() {
            if !chart.cell(start, end).is_empty() {
              prop_assert!(!constraint::crosses(start, end, &layout.constraint_spans));
            }
          }
        }
      }

      for tree in parser.parse_all(&tokens, &constraints, false) {
        prop_assert_eq!(tree.surface(), words.concat());
        let mut entities = Vec::new();
        entity_nodes(&tree.root, &mut entities);
        prop_assert_eq!(entities.len(), constraints.len());
        for (entity, leaves) in entities {
          prop_assert_eq!(&leaves[..], &words[entity.left..=entity.right]);
        }
      }
    }

    #[test]
    fn test_chart_respects_capacity_and_beam(
      words in prop::collection::vec("[wfblktAbnyhmsrq]{1,6}", 1..6),
    ) {
      let g: RuleGrammar = include_str!("../demos/toy.grammar").parse().unwrap();
      let lex: TextLexicon = include_str!("../demos/toy.lex").parse().unwrap();
      let options = ParserOptions {
        max_entries_per_cell: 4,
        ..Default::default()
      };
      let parser = Parser::new(&g, &lex, &ShapeFeatures).with_options(options).unwrap();
      let chart = parser.chart(&Token::sentence(&words.join(" ")), &[]).unwrap();
      for start in 0..chart.columns() {
        for end in (start + 1)..=chart.columns() {
          prop_assert!(chart.cell(start, end).len() <= 4);
          let best = chart.theories(start, end).map(|t| t.score).fold(f64::NEG_INFINITY, f64::max);
          for t in chart.theories(start, end).filter(|t| !t.is_preterminal()) {
            prop_assert!(t.score > best - 5.0);
          }
        }
      }
    }
  }
}
