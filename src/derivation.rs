//! Turning chart theories into output trees.

use crate::chart::Chart;
use crate::constraint::EntityConstraint;
use crate::grammar::{Grammar, RuleKind, Side};
use crate::lattice::Token;
use crate::syntree::{Constituent, ParseNode, ParseTree};
use crate::theory::{Derivation, TheoryIdx};

pub struct DerivationExtractor<'a> {
  grammar: &'a dyn Grammar,
  max_parses: usize,
  diversity_margin: f64,
}

impl<'a> DerivationExtractor<'a> {
  pub fn new(grammar: &'a dyn Grammar, max_parses: usize, diversity_margin: f64) -> Self {
    Self {
      grammar,
      max_parses,
      diversity_margin,
    }
  }

  fn build(&self, chart: &Chart, idx: TheoryIdx, constraints: &[EntityConstraint]) -> ParseNode {
    let theory = chart.theory(idx);
    match &theory.derivation {
      Derivation::Lexical { .. } => {
        ParseNode::preterminal(self.grammar.leaf_label(&theory.category), &theory.head_word)
      }
      Derivation::Name { constraint, .. } => {
        let label = self.grammar.leaf_label(&theory.category);
        let Some(c) = constraints.get(*constraint) else {
          return ParseNode::preterminal(label, &theory.head_word);
        };
        // leaves are filled with the span's words once the tree is complete
        let mut node = Constituent::new(label, ParseNode::leaf(""));
        node.premods = vec![ParseNode::leaf(""); c.token_count() - 1];
        node.entity = Some(c.clone());
        ParseNode::Branch(node)
      }
      Derivation::Binary { kind, head, left, right } => {
        let left = self.build(chart, *left, constraints);
        let right = self.build(chart, *right, constraints);
        let (head_node, modifier) = match head {
          Side::Left => (left, right),
          Side::Right => (right, left),
        };

        let mut node = match (kind, head_node) {
          (RuleKind::Extension, ParseNode::Branch(c)) if c.entity.is_none() && !c.is_preterminal() => c,
          (_, head_node) => Constituent::new(theory.category.as_str(), head_node),
        };
        match head {
          Side::Left => node.postmods.push(modifier),
          Side::Right => node.premods.insert(0, modifier),
        }
        ParseNode::Branch(node)
      }
    }
  }

  fn postprocess(&self, root: &mut ParseNode, collapse_np: bool) {
    root.for_each_branch_mut(&mut |c| {
      self.grammar.postprocess(c);
      if collapse_np {
        if let Some(label) = self.grammar.np_label(&c.label) {
          c.label = label.to_string();
        }
      }
    });
  }

  /// Writes the words of every entity span over the placeholder leaves of
  /// the name nodes, in tree order
  fn repair_names(&self, root: &mut ParseNode, tokens: &[Token], constraints: &[EntityConstraint]) {
    let mut words = constraints
      .iter()
      .flat_map(|c| tokens[c.left..=c.right].iter().map(|t| t.text.as_str()))
      .collect::<Vec<_>>()
      .into_iter();
    let mut underflow = false;
    repair_node(root, &mut words, &mut underflow);
    if underflow {
      tracing::error!(tree = %root, "ran out of entity words while filling name leaves");
    }
    let left = words.count();
    if left > 0 {
      tracing::error!(tree = %root, left, "entity words left over after filling name leaves");
    }
  }

  fn check_leaves(&self, tree: &ParseTree, tokens: &[Token]) {
    let expected = tokens.iter().map(|t| t.text.as_str()).collect::<String>();
    let found = tree.surface();
    if found != expected {
      tracing::error!(%expected, %found, "parse leaves don't spell the input");
    }
  }

  /// Trees for the best top-cell theories of a filled chart, best first.
  /// Empty if the top cell is.
  pub fn extract(
    &self,
    chart: &Chart,
    tokens: &[Token],
    constraints: &[EntityConstraint],
    collapse_np: bool,
  ) -> Vec<ParseTree> {
    let columns = chart.columns();
    if columns == 0 {
      return Vec::new();
    }
    let ranked = chart.ranked(0, columns);
    let Some(&best) = ranked.first() else {
      return Vec::new();
    };
    let floor = chart.theory(best).score - self.diversity_margin;

    let mut trees: Vec<ParseTree> = Vec::new();
    for idx in ranked {
      if trees.len() >= self.max_parses {
        break;
      }
      let score = chart.theory(idx).score;
      if score < floor {
        break;
      }
      let mut root = self.build(chart, idx, constraints);
      self.repair_names(&mut root, tokens, constraints);
      self.postprocess(&mut root, collapse_np);
      if trees.iter().any(|t| t.root == root) {
        continue;
      }
      let tree = ParseTree { root, score, flat: false };
      self.check_leaves(&tree, tokens);
      trees.push(tree);
    }
    tracing::debug!(trees = trees.len(), "extracted parses");
    trees
  }

  /// A single fragment node over the sentence, with each entity span as
  /// one name node. Never fails.
  pub fn flat_parse(
    &self,
    tokens: &[Token],
    constraints: &[EntityConstraint],
    collapse_np: bool,
  ) -> ParseTree {
    let mut children = Vec::with_capacity(tokens.len());
    let mut pending = constraints.iter().peekable();
    let mut i = 0;
    while i < tokens.len() {
      if let Some(c) = pending.next_if(|c| c.left == i) {
        let tag = self.grammar.default_name_tag(&c.entity_type);
        let mut words = tokens[c.left..=c.right]
          .iter()
          .map(|t| ParseNode::preterminal(tag, &t.text))
          .collect::<Vec<_>>();
        let head = words.pop().unwrap_or_else(|| ParseNode::leaf(""));
        let mut node = Constituent::new(self.grammar.name_label(), head);
        node.premods = words;
        node.entity = Some(c.clone());
        children.push(ParseNode::Branch(node));
        i = c.right + 1;
        continue;
      }
      children.push(ParseNode::preterminal(self.grammar.unknown_label(), &tokens[i].text));
      i += 1;
    }

    let mut children = children.into_iter();
    let head = children.next().unwrap_or_else(|| ParseNode::leaf(""));
    let mut frag = Constituent::new(self.grammar.fragment_label(), head);
    frag.postmods = children.collect();
    let mut root = ParseNode::Branch(frag);
    self.postprocess(&mut root, collapse_np);

    let tree = ParseTree {
      root,
      score: 0.0,
      flat: true,
    };
    self.check_leaves(&tree, tokens);
    tree
  }
}

fn repair_node<'w>(
  node: &mut ParseNode,
  words: &mut impl Iterator<Item = &'w str>,
  underflow: &mut bool,
) {
  let ParseNode::Branch(c) = node else {
    return;
  };
  if c.entity.is_some() {
    for child in c.children_mut() {
      child.for_each_leaf_mut(&mut |leaf| match words.next() {
        Some(w) => *leaf = w.to_string(),
        None => *underflow = true,
      });
    }
    return;
  }
  for child in c.children_mut() {
    repair_node(child, words, underflow);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::ChartEngine;
  use crate::lattice::LatticeBuilder;
  use crate::lexicon::{ShapeFeatures, TextLexicon};
  use crate::rules::RuleGrammar;

  const GRAMMAR: &str = r#"
    S -> V* NP : -0.5;
    S -> V* NOUN_PROP : -0.6;
    NP -> DET N* : -0.2;
    NP -> NP* ADJ : -0.7;
    NP -> N* PRON : -0.3;
    %np NP NPP => NP;
    %name PERSON default NOUN_PROP primary NOUN_PROP;
    %clitic pronoun PRON;
  "#;

  const LEXICON: &str = r#"
    qAl V
    ktAb N
    Al DET
    kbyr ADJ
    h PRON
    bwsh NOUN_PROP
    jwrj NOUN_PROP
  "#;

  fn run(
    grammar: &RuleGrammar,
    sentence: &str,
    constraints: &[EntityConstraint],
    max_parses: usize,
  ) -> Vec<ParseTree> {
    let lexicon: TextLexicon = LEXICON.parse().unwrap();
    let builder = LatticeBuilder::new(grammar, &lexicon, &ShapeFeatures, 10);
    let tokens = Token::sentence(sentence);
    let lattice = builder.segment_sentence(&tokens, constraints);
    let (mut chart, layout) = builder.build_chart(&tokens, constraints, &lattice);
    ChartEngine::new(grammar, -5.0).fill(&mut chart, &layout);
    DerivationExtractor::new(grammar, max_parses, 10.0).extract(&chart, &tokens, constraints, false)
  }

  #[test]
  fn test_kernel_and_extension_shapes() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let trees = run(&grammar, "qAl Al ktAb kbyr", &[], 1);
    assert_eq!(trees.len(), 1);
    assert_eq!(
      trees[0].to_string(),
      "(S (V qAl) (NP (DET Al) (N ktAb) (ADJ kbyr)))"
    );
    assert!(!trees[0].flat);
  }

  #[test]
  fn test_clitic_pieces_are_leaves() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let trees = run(&grammar, "qAl ktAbh", &[], 1);
    assert_eq!(trees[0].to_string(), "(S (V qAl) (NP (N ktAb) (PRON h)))");
    assert_eq!(trees[0].surface(), "qAlktAbh");
  }

  #[test]
  fn test_name_leaves_are_repaired() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON")];
    let trees = run(&grammar, "qAl jwrj bwsh", &constraints, 1);
    assert_eq!(trees[0].to_string(), "(S (V qAl) (NOUN_PROP jwrj bwsh))");
    let name = trees[0].root.get_branch().unwrap().postmods[0].get_branch().unwrap();
    assert_eq!(name.entity, Some(constraints[0].clone()));
  }

  #[test]
  fn test_diversity() {
    let grammar: RuleGrammar = r#"
      S -> A* B : -1.0;
      T -> A* B : -2.0;
      U -> A* B : -20.0;
    "#
    .parse()
    .unwrap();
    let lexicon: TextLexicon = "x A\nz B".parse().unwrap();
    let builder = LatticeBuilder::new(&grammar, &lexicon, &ShapeFeatures, 10);
    let tokens = Token::sentence("x z");
    let lattice = builder.segment_sentence(&tokens, &[]);
    let (mut chart, layout) = builder.build_chart(&tokens, &[], &lattice);
    // a wide beam so the weak reading stays in the chart
    ChartEngine::new(&grammar, -50.0).fill(&mut chart, &layout);
    assert_eq!(chart.cell(0, 2).len(), 3);

    let trees = DerivationExtractor::new(&grammar, 5, 10.0).extract(&chart, &tokens, &[], false);
    let labels = trees.iter().map(|t| t.root.label().unwrap()).collect::<Vec<_>>();
    assert_eq!(labels, vec!["S", "T"]);
    assert!(trees[0].score > trees[1].score);
  }

  #[test]
  fn test_flat_parse() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let extractor = DerivationExtractor::new(&grammar, 1, 10.0);
    let tokens = Token::sentence("qAl jwrj bwsh ktAb");
    let constraints = vec![EntityConstraint::new(1, 2, "PERSON")];
    let tree = extractor.flat_parse(&tokens, &constraints, false);
    assert!(tree.flat);
    assert_eq!(
      tree.to_string(),
      "(FRAG (UNKNOWN qAl) (NPP (NOUN_PROP jwrj) (NOUN_PROP bwsh)) (UNKNOWN ktAb))"
    );
    assert_eq!(tree.surface(), "qAljwrjbwshktAb");

    let collapsed = extractor.flat_parse(&tokens, &constraints, true);
    assert_eq!(
      collapsed.to_string(),
      "(FRAG (UNKNOWN qAl) (NP (NOUN_PROP jwrj) (NOUN_PROP bwsh)) (UNKNOWN ktAb))"
    );
  }

  #[test]
  fn test_flat_parse_of_nothing() {
    let grammar: RuleGrammar = GRAMMAR.parse().unwrap();
    let tree = DerivationExtractor::new(&grammar, 1, 10.0).flat_parse(&[], &[], false);
    assert_eq!(tree.root, ParseNode::Branch(Constituent::new("FRAG", ParseNode::leaf(""))));
  }
}
