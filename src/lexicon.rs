//! Part-of-speech lookup and unknown-word feature classes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;

use crate::buckwalter;
use crate::Err;

/// Lexicon keys starting with this and a letter are feature classes, not
/// words. A bare `:` or `::` is still an ordinary punctuation word.
pub const FEATURE_PREFIX: char = ':';

/// Whether a lexicon key names a feature class like `:unk-Al`
pub fn is_feature_class(key: &str) -> bool {
  key
    .strip_prefix(FEATURE_PREFIX)
    .and_then(|rest| rest.chars().next())
    .is_some_and(char::is_alphabetic)
}

/// A part-of-speech tag with its log-probability
#[derive(Debug, Clone, PartialEq)]
pub struct PosTag {
  pub tag: String,
  pub score: f64,
}

impl PosTag {
  pub fn new(tag: impl Into<String>, score: f64) -> Self {
    Self {
      tag: tag.into(),
      score,
    }
  }
}

/// Read-only tag lookup, shared between parses
pub trait Lexicon: Send + Sync {
  /// Whether `form` is a known word (feature classes don't count)
  fn contains(&self, form: &str) -> bool;

  /// Tags for a word or feature class, empty if there are none
  fn lookup_tags(&self, form: &str) -> &[PosTag];
}

/// Maps unknown words onto feature classes the lexicon has tags for
pub trait WordFeatures: Send + Sync {
  fn features(&self, word: &str, first_word: bool) -> String;

  /// Coarser fallback for when `features` has no tags either
  fn reduced_features(&self, word: &str, first_word: bool) -> String;
}

/// A lexicon read from lines of `form TAG[:logprob] TAG[:logprob] ...`.
///
/// Tags without a score share the probability mass left on their line
/// uniformly. Lines starting with `//` are comments. Feature-class lines
/// are kept apart from the words, so `contains` never sees them.
#[derive(Debug, Default, Clone)]
pub struct TextLexicon {
  words: HashMap<String, Vec<PosTag>>,
  features: HashMap<String, Vec<PosTag>>,
}

impl TextLexicon {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("reading lexicon {}: {}", path.display(), e).into() })?;
    src.parse()
  }

  /// Adds a tag to `form`, replacing any earlier score for the same tag
  pub fn insert(&mut self, form: impl Into<String>, tag: PosTag) {
    let form = form.into();
    let table = if is_feature_class(&form) {
      &mut self.features
    } else {
      &mut self.words
    };
    let tags = table.entry(form).or_default();
    if let Some(existing) = tags.iter_mut().find(|t| t.tag == tag.tag) {
      existing.score = tag.score;
    } else {
      tags.push(tag);
    }
  }

  /// Number of distinct words and feature classes
  pub fn len(&self) -> usize {
    self.words.len() + self.features.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty() && self.features.is_empty()
  }
}

impl Lexicon for TextLexicon {
  fn contains(&self, form: &str) -> bool {
    self.words.contains_key(form)
  }

  fn lookup_tags(&self, form: &str) -> &[PosTag] {
    let table = if is_feature_class(form) {
      &self.features
    } else {
      &self.words
    };
    table.get(form).map(Vec::as_slice).unwrap_or(&[])
  }
}

fn parse_line(line: &str, lineno: usize) -> Result<Option<(String, Vec<PosTag>)>, Err> {
  let line = line.trim();
  if line.is_empty() || line.starts_with("//") {
    return Ok(None);
  }

  let mut fields = line.split_whitespace();
  let form = fields.next().unwrap_or_default().to_string();
  let mut tags = Vec::new();
  for field in fields {
    let (tag, score) = match field.split_once(':') {
      Some((tag, score)) => {
        let score = score
          .parse::<f64>()
          .map_err(|e| -> Err { format!("line {}: bad score {:?}: {}", lineno, score, e).into() })?;
        if !score.is_finite() || score > 0.0 {
          return Err(format!("line {}: score {} is not a log-probability", lineno, score).into());
        }
        (tag, Some(score))
      }
      None => (field, None),
    };
    if tag.is_empty() {
      return Err(format!("line {}: empty tag in {:?}", lineno, field).into());
    }
    tags.push((tag.to_string(), score));
  }
  if tags.is_empty() {
    return Err(format!("line {}: {:?} has no tags", lineno, form).into());
  }

  let unscored = tags.iter().filter(|(_, s)| s.is_none()).count();
  let scored_mass: f64 = tags.iter().filter_map(|(_, s)| s.map(f64::exp)).sum();
  let share = ((1.0 - scored_mass).max(f64::EPSILON) / unscored.max(1) as f64).ln();

  let tags = tags
    .into_iter()
    .map(|(tag, score)| PosTag::new(tag, score.unwrap_or(share)))
    .collect();
  Ok(Some((form, tags)))
}

impl FromStr for TextLexicon {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut lexicon = Self::new();
    for (idx, line) in s.lines().enumerate() {
      if let Some((form, tags)) = parse_line(line, idx + 1)? {
        for tag in tags {
          lexicon.insert(form.clone(), tag);
        }
      }
    }
    Ok(lexicon)
  }
}

/// Word-shape feature classes for transliterated or Arabic-script text.
///
/// Full features look like `:unk-Al` or `:unk-p-init`; the reduced feature
/// is always `:unk`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapeFeatures;

lazy_static! {
  static ref NUMBER: Regex =
    Regex::new(r"^[0-9\x{0660}-\x{0669}]+([.,][0-9\x{0660}-\x{0669}]+)*$").unwrap();
  static ref PUNCTUATION: Regex = Regex::new(r"^\p{P}+$").unwrap();
  static ref DEFINITE: Regex = Regex::new(r"^([wf]?[bl]?)Al..").unwrap();
  static ref FEMININE: Regex = Regex::new(r"..p$").unwrap();
  static ref PLURAL: Regex = Regex::new(r"..(At|wn|yn)$").unwrap();
}

impl ShapeFeatures {
  fn shape(word: &str) -> &'static str {
    if NUMBER.is_match(word) {
      return "num";
    }
    if PUNCTUATION.is_match(word) {
      return "punc";
    }
    let translit = buckwalter::encode(word);
    if DEFINITE.is_match(&translit) {
      "Al"
    } else if FEMININE.is_match(&translit) {
      "p"
    } else if PLURAL.is_match(&translit) {
      "pl"
    } else if translit.chars().count() <= 3 {
      "short"
    } else {
      "long"
    }
  }
}

impl WordFeatures for ShapeFeatures {
  fn features(&self, word: &str, first_word: bool) -> String {
    let mut features = format!("{}unk-{}", FEATURE_PREFIX, Self::shape(word));
    if first_word {
      features.push_str("-init");
    }
    features
  }

  fn reduced_features(&self, _word: &str, _first_word: bool) -> String {
    format!("{}unk", FEATURE_PREFIX)
  }
}
