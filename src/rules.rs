use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::grammar::{Candidate, Grammar, RuleKind, Side};
use crate::segment::MorphemeClass;
use crate::theory::Theory;
use crate::Err;

/// A binary rule `parent -> left right` with one child marked as head
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
  pub parent: String,
  pub left: String,
  pub right: String,
  pub head: Side,
  /// Log-probability of the rule
  pub score: f64,
}

impl Rule {
  pub fn head_category(&self) -> &str {
    match self.head {
      Side::Left => &self.left,
      Side::Right => &self.right,
    }
  }

  /// A rule whose parent is its own head child extends that constituent
  pub fn kind(&self) -> RuleKind {
    if self.parent == self.head_category() {
      RuleKind::Extension
    } else {
      RuleKind::Kernel
    }
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let star = |side| if self.head == side { "*" } else { "" };
    write!(
      f,
      "{} -> {}{} {}{} : {};",
      self.parent,
      self.left,
      star(Side::Left),
      self.right,
      star(Side::Right),
      self.score
    )
  }
}

/// Tags an entity type may be realized with
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameTags {
  pub default: String,
  pub primary: HashSet<String>,
  pub secondary: HashSet<String>,
}

/// A grammar given as a table of scored binary rules plus the language hooks,
/// usually read from a grammar file (see `parse_grammar`).
#[derive(Debug, Clone)]
pub struct RuleGrammar {
  rules: HashMap<(String, String), Vec<Rule>>,
  pub names: HashMap<String, NameTags>,
  /// Tags for entity types without their own entry
  pub fallback_name: Option<NameTags>,
  pub sentence_end: HashSet<String>,
  pub punct_or_conj: HashSet<String>,
  pub no_cross: HashSet<String>,
  pub np_labels: HashSet<String>,
  pub np_canonical: Option<String>,
  pub closed_classes: HashMap<MorphemeClass, Vec<String>>,
  pub name_label: String,
  pub fragment_label: String,
  pub unknown_label: String,
}

/// Tag used for names of types the grammar knows nothing about
pub const DEFAULT_NAME_TAG: &str = "NOUN_PROP";

impl RuleGrammar {
  pub fn new(rules: Vec<Rule>) -> Self {
    let mut grammar = Self {
      rules: HashMap::new(),
      names: HashMap::new(),
      fallback_name: None,
      sentence_end: HashSet::new(),
      punct_or_conj: HashSet::new(),
      no_cross: HashSet::new(),
      np_labels: HashSet::new(),
      np_canonical: None,
      closed_classes: default_closed_classes(),
      name_label: "NPP".to_string(),
      fragment_label: "FRAG".to_string(),
      unknown_label: "UNKNOWN".to_string(),
    };
    for rule in rules {
      grammar.add_rule(rule);
    }
    grammar
  }

  pub fn add_rule(&mut self, rule: Rule) {
    self
      .rules
      .entry((rule.left.clone(), rule.right.clone()))
      .or_default()
      .push(rule);
  }

  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.rules.values().flatten()
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("reading grammar {}: {}", path.display(), e).into() })?;
    src.parse()
  }

  fn name_tags(&self, entity_type: &str) -> Option<&NameTags> {
    self.names.get(entity_type).or(self.fallback_name.as_ref())
  }

  fn candidates(
    &self,
    left: &Theory,
    right: &Theory,
    kind: RuleKind,
    allowed: impl Fn(&Rule) -> bool,
  ) -> Vec<Candidate> {
    let Some(rules) = self.rules.get(&(left.category.clone(), right.category.clone())) else {
      return Vec::new();
    };
    rules
      .iter()
      .filter(|r| r.kind() == kind && allowed(r))
      .map(|r| Candidate {
        category: r.parent.clone(),
        head: r.head,
        kind,
        score: r.score + left.score + right.score,
      })
      .collect()
  }
}

fn default_closed_classes() -> HashMap<MorphemeClass, Vec<String>> {
  let tags = |ts: &[&str]| ts.iter().map(|t| t.to_string()).collect::<Vec<_>>();
  HashMap::from([
    (MorphemeClass::PrefixConjunction, tags(&["CONJ"])),
    (MorphemeClass::PrefixPreposition, tags(&["PREP"])),
    (MorphemeClass::PrefixPrepositionOrParticle, tags(&["PREP", "PART"])),
    (MorphemeClass::SuffixPronoun, tags(&["POSS_PRON", "PRON"])),
  ])
}

impl Grammar for RuleGrammar {
  fn combine_binary(
    &self,
    left: &Theory,
    right: &Theory,
    left_closable: bool,
    right_closable: bool,
  ) -> Vec<Candidate> {
    if !(left_closable && right_closable) {
      return Vec::new();
    }
    self.candidates(left, right, RuleKind::Kernel, |_| true)
  }

  fn combine_extension(
    &self,
    left: &Theory,
    right: &Theory,
    left_closable: bool,
    right_closable: bool,
  ) -> Vec<Candidate> {
    // the modifier side has to be closed off
    self.candidates(left, right, RuleKind::Extension, |r| match r.head {
      Side::Left => right_closable,
      Side::Right => left_closable,
    })
  }

  fn is_primary_name_tag(&self, entity_type: &str, tag: &str) -> bool {
    match self.name_tags(entity_type) {
      Some(tags) => tags.primary.contains(tag),
      // nothing known about the type, so any tag will do
      None => true,
    }
  }

  fn is_secondary_name_tag(&self, entity_type: &str, tag: &str) -> bool {
    self
      .name_tags(entity_type)
      .is_some_and(|tags| tags.secondary.contains(tag))
  }

  fn default_name_tag(&self, entity_type: &str) -> &str {
    self
      .name_tags(entity_type)
      .map(|tags| tags.default.as_str())
      .unwrap_or(DEFAULT_NAME_TAG)
  }

  fn is_sentence_ending_punctuation(&self, tag: &str) -> bool {
    self.sentence_end.contains(tag)
  }

  fn is_basic_punctuation_or_conjunction(&self, tag: &str) -> bool {
    self.punct_or_conj.contains(tag)
  }

  fn is_no_cross_punctuation(&self, word: &str) -> bool {
    self.no_cross.contains(word)
  }

  fn closed_class_tags(&self, class: MorphemeClass) -> &[String] {
    self.closed_classes.get(&class).map(Vec::as_slice).unwrap_or(&[])
  }

  fn np_label(&self, label: &str) -> Option<&str> {
    if self.np_labels.contains(label) {
      self.np_canonical.as_deref()
    } else {
      None
    }
  }

  fn name_label(&self) -> &str {
    &self.name_label
  }

  fn fragment_label(&self) -> &str {
    &self.fragment_label
  }

  fn unknown_label(&self) -> &str {
    &self.unknown_label
  }
}

impl fmt::Display for RuleGrammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut rules = self.rules().map(|r| r.to_string()).collect::<Vec<_>>();
    rules.sort();
    for rule in rules {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}
