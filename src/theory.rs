use std::fmt;

use crate::grammar::{RuleKind, Side};

/// Index type for the theory arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TheoryIdx(pub u32);

/// Where a preterminal's tag came from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Evidence {
  /// Exact lexicon match on the segment
  Lexicon,
  /// Lexicon entry for the token's feature class
  Features,
  /// Lexicon entry for the token's reduced feature class
  ReducedFeatures,
  /// Whole closed-class tag set with a uniform score, nothing was looked up
  Substituted,
  /// Default name tag with a made-up score
  Placeholder,
}

impl Evidence {
  /// Whether the word itself was found, rather than its feature class
  pub fn is_known_word(self) -> bool {
    self == Self::Lexicon
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Derivation {
  /// A tag on one lattice segment
  Lexical { evidence: Evidence },
  /// A whole entity constraint, by its index in the constraint list
  Name { constraint: usize, evidence: Evidence },
  Binary {
    kind: RuleKind,
    head: Side,
    left: TheoryIdx,
    right: TheoryIdx,
  },
}

/// A scored constituent over lattice columns `start..end`
#[derive(Debug, Clone, PartialEq)]
pub struct Theory {
  pub category: String,
  pub start: usize,
  pub end: usize,
  pub score: f64,
  pub head_word: String,
  pub head_tag: String,
  /// Entity type, only set on theories built from entity constraints
  pub name_type: Option<String>,
  pub derivation: Derivation,
}

impl Theory {
  pub fn preterminal(
    tag: &str,
    word: &str,
    span: (usize, usize),
    score: f64,
    evidence: Evidence,
  ) -> Self {
    Self {
      category: tag.to_string(),
      start: span.0,
      end: span.1,
      score,
      head_word: word.to_string(),
      head_tag: tag.to_string(),
      name_type: None,
      derivation: Derivation::Lexical { evidence },
    }
  }

  pub fn is_preterminal(&self) -> bool {
    !matches!(self.derivation, Derivation::Binary { .. })
  }
}

impl fmt::Display for Theory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}..{}: {} ({:.3}) {}/{}",
      self.start, self.end, self.category, self.score, self.head_word, self.head_tag
    )?;
    match &self.derivation {
      Derivation::Lexical { evidence } => write!(f, " [{:?}]", evidence),
      Derivation::Name { evidence, .. } => write!(
        f,
        " [name {} {:?}]",
        self.name_type.as_deref().unwrap_or("?"),
        evidence
      ),
      Derivation::Binary { kind, head, .. } => write!(f, " [{:?} {:?}]", kind, head),
    }
  }
}

/// Owns every theory that made it into a chart
#[derive(Debug, Default, Clone)]
pub struct TheoryArena {
  theories: Vec<Theory>,
}

impl TheoryArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(&mut self, theory: Theory) -> TheoryIdx {
    let idx = TheoryIdx(self.theories.len() as u32);
    self.theories.push(theory);
    idx
  }

  pub fn get(&self, idx: TheoryIdx) -> &Theory {
    &self.theories[idx.0 as usize]
  }

  pub fn get_mut(&mut self, idx: TheoryIdx) -> &mut Theory {
    &mut self.theories[idx.0 as usize]
  }

  pub fn len(&self) -> usize {
    self.theories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.theories.is_empty()
  }
}

#[test]
fn test_arena_handles() {
  let mut arena = TheoryArena::new();
  let det = arena.alloc(Theory::preterminal("DET", "Al", (0, 1), -0.5, Evidence::Lexicon));
  let n = arena.alloc(Theory::preterminal("N", "ktAb", (1, 2), -1.0, Evidence::Features));
  assert_eq!(arena.len(), 2);
  assert_eq!(arena.get(n).head_word, "ktAb");
  assert!(arena.get(det).is_preterminal());

  let np = Theory {
    category: "NP".to_string(),
    start: 0,
    end: 2,
    score: -1.5,
    head_word: "ktAb".to_string(),
    head_tag: "N".to_string(),
    name_type: None,
    derivation: Derivation::Binary {
      kind: RuleKind::Kernel,
      head: Side::Right,
      left: det,
      right: n,
    },
  };
  assert!(!np.is_preterminal());
  assert_eq!(np.to_string(), "0..2: NP (-1.500) ktAb/N [Kernel Right]");
  assert!(!Evidence::Features.is_known_word());
}
