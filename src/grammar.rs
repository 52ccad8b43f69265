use crate::segment::MorphemeClass;
use crate::syntree::Constituent;
use crate::theory::Theory;

/// Which child of a binary combination carries the head
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
  Left,
  Right,
}

/// Kernel rules build a new constituent out of two closed ones. Extension
/// rules attach a modifier to an existing constituent, which keeps its
/// category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
  Kernel,
  Extension,
}

/// A constituent the grammar is willing to build over two adjacent theories
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub category: String,
  pub head: Side,
  pub kind: RuleKind,
  /// Full ranking score of the new constituent, children included
  pub score: f64,
}

/// Everything the chart parser asks of a language and its grammar.
///
/// Implementations are read-only once built and are shared between
/// concurrent parses.
pub trait Grammar: Send + Sync {
  /// Kernel combinations of `left` and `right`
  fn combine_binary(
    &self,
    left: &Theory,
    right: &Theory,
    left_closable: bool,
    right_closable: bool,
  ) -> Vec<Candidate>;

  /// Extension combinations, where one side is the existing constituent
  fn combine_extension(
    &self,
    left: &Theory,
    right: &Theory,
    left_closable: bool,
    right_closable: bool,
  ) -> Vec<Candidate>;

  fn is_primary_name_tag(&self, entity_type: &str, tag: &str) -> bool;
  fn is_secondary_name_tag(&self, entity_type: &str, tag: &str) -> bool;
  fn default_name_tag(&self, entity_type: &str) -> &str;

  fn is_sentence_ending_punctuation(&self, tag: &str) -> bool;
  fn is_basic_punctuation_or_conjunction(&self, tag: &str) -> bool;

  /// Words that a constituent may not span over unless it closes right after them
  fn is_no_cross_punctuation(&self, word: &str) -> bool;

  /// The fixed tag set of a closed morpheme class
  fn closed_class_tags(&self, class: MorphemeClass) -> &[String];

  fn admits(&self, class: MorphemeClass, tag: &str) -> bool {
    !class.is_closed() || self.closed_class_tags(class).iter().any(|t| t == tag)
  }

  /// Label of the node a preterminal with `tag` turns into
  fn leaf_label(&self, tag: &str) -> String {
    tag.to_string()
  }

  /// Tree-shape normalization applied to every non-leaf node of an output tree
  fn postprocess(&self, _node: &mut Constituent) {}

  /// The canonical noun-phrase label, if `label` is a noun-phrase label
  fn np_label(&self, label: &str) -> Option<&str>;

  fn name_label(&self) -> &str {
    "NPP"
  }

  fn fragment_label(&self) -> &str {
    "FRAG"
  }

  fn unknown_label(&self) -> &str {
    "UNKNOWN"
  }
}
