use std::fmt;

use crate::constraint::EntityConstraint;

/// A labelled node with its head child and the modifiers on either side
#[derive(Debug, PartialEq, Clone)]
pub struct Constituent {
  pub label: String,
  /// The entity constraint this node realizes, if any
  pub entity: Option<EntityConstraint>,
  pub premods: Vec<ParseNode>,
  pub head: Box<ParseNode>,
  pub postmods: Vec<ParseNode>,
}

impl Constituent {
  pub fn new(label: impl Into<String>, head: ParseNode) -> Self {
    Self {
      label: label.into(),
      entity: None,
      premods: Vec::new(),
      head: Box::new(head),
      postmods: Vec::new(),
    }
  }

  /// Children in surface order
  pub fn children(&self) -> impl Iterator<Item = &ParseNode> {
    self
      .premods
      .iter()
      .chain(std::iter::once(&*self.head))
      .chain(self.postmods.iter())
  }

  pub fn children_mut(&mut self) -> impl Iterator<Item = &mut ParseNode> {
    self
      .premods
      .iter_mut()
      .chain(std::iter::once(&mut *self.head))
      .chain(self.postmods.iter_mut())
  }

  /// A node directly over a single word
  pub fn is_preterminal(&self) -> bool {
    self.premods.is_empty() && self.postmods.is_empty() && self.head.is_leaf()
  }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ParseNode {
  Branch(Constituent),
  Leaf(String),
}

impl ParseNode {
  pub fn leaf(word: impl Into<String>) -> Self {
    Self::Leaf(word.into())
  }

  /// `label` directly over `word`
  pub fn preterminal(label: impl Into<String>, word: impl Into<String>) -> Self {
    Self::Branch(Constituent::new(label, Self::leaf(word)))
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn get_branch(&self) -> Option<&Constituent> {
    match self {
      Self::Branch(c) => Some(c),
      _ => None,
    }
  }

  pub fn label(&self) -> Option<&str> {
    self.get_branch().map(|c| c.label.as_str())
  }

  /// Leaf words, left to right
  pub fn leaves(&self) -> Vec<&str> {
    let mut leaves = Vec::new();
    self.collect_leaves(&mut leaves);
    leaves
  }

  fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Self::Leaf(w) => out.push(w),
      Self::Branch(c) => {
        for child in c.children() {
          child.collect_leaves(out);
        }
      }
    }
  }

  /// Visits every leaf left to right
  pub fn for_each_leaf_mut(&mut self, f: &mut impl FnMut(&mut String)) {
    match self {
      Self::Leaf(w) => f(w),
      Self::Branch(c) => {
        for child in c.children_mut() {
          child.for_each_leaf_mut(f);
        }
      }
    }
  }

  /// Visits every branch bottom-up
  pub fn for_each_branch_mut(&mut self, f: &mut impl FnMut(&mut Constituent)) {
    if let Self::Branch(c) = self {
      for child in c.children_mut() {
        child.for_each_branch_mut(f);
      }
      f(c);
    }
  }
}

impl fmt::Display for ParseNode {
  /// `(NP (DET Al) (N ktAb))` on one line, or indented one child per line
  /// with `{:#}`
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(w) => write!(f, "{}", w),
      Self::Branch(c) => {
        write!(f, "({}", c.label)?;
        if !f.alternate() || c.is_preterminal() {
          for child in c.children() {
            write!(f, " {}", child)?;
          }
        } else {
          for child in c.children() {
            let fmt = format!("{:#}", child);
            for line in fmt.lines() {
              write!(f, "\n  {}", line)?;
            }
          }
        }
        write!(f, ")")
      }
    }
  }
}

/// One full-sentence result
#[derive(Debug, PartialEq, Clone)]
pub struct ParseTree {
  pub root: ParseNode,
  pub score: f64,
  /// Whether this is the flat fallback rather than a chart derivation
  pub flat: bool,
}

impl ParseTree {
  pub fn leaves(&self) -> Vec<&str> {
    self.root.leaves()
  }

  /// Leaf words concatenated without separators
  pub fn surface(&self) -> String {
    self.leaves().concat()
  }
}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.alternate() {
      write!(f, "{:#}", self.root)
    } else {
      write!(f, "{}", self.root)
    }
  }
}
