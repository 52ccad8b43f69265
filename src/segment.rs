//! Clitic segmentation of single tokens into a local morpheme lattice.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use crate::buckwalter;
use crate::utils::combinations;

/// Upper bound on the segmentations kept for one token
pub const MAX_SEGMENTATIONS: usize = 20;

/// Longest segmentation accepted: conjunction, preposition, stem, suffix
pub const MAX_SEGMENTS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MorphemeClass {
  Stem,
  PrefixConjunction,
  PrefixPreposition,
  PrefixPrepositionOrParticle,
  SuffixPronoun,
}

impl MorphemeClass {
  /// Closed classes only admit a small fixed set of tags
  pub fn is_closed(self) -> bool {
    self != Self::Stem
  }
}

impl fmt::Display for MorphemeClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Stem => "stem",
      Self::PrefixConjunction => "conj+",
      Self::PrefixPreposition => "prep+",
      Self::PrefixPrepositionOrParticle => "prep/part+",
      Self::SuffixPronoun => "+pron",
    };
    write!(f, "{}", name)
  }
}

/// A piece of a token, positioned in the token's local lattice columns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
  pub text: String,
  pub class: MorphemeClass,
  pub start: usize,
  pub end: usize,
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {} ({})", self.start, self.end, self.text, self.class)
  }
}

/// One hypothesis for how a token decomposes, in surface order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
  pub segments: Vec<Segment>,
}

impl Segmentation {
  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// Concatenation of the segment texts
  pub fn surface(&self) -> String {
    self.segments.iter().map(|s| s.text.as_str()).collect()
  }
}

impl fmt::Display for Segmentation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let texts = self.segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>();
    write!(f, "{}", texts.join("+"))
  }
}

/// Every segmentation of one token, sharing one set of lattice columns.
///
/// `pieces` holds the text between consecutive canonical cut-points, so
/// column `i` of the token starts with `pieces[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordLattice {
  pub word: String,
  pub segmentations: Vec<Segmentation>,
  pub pieces: Vec<String>,
}

impl WordLattice {
  /// Number of lattice columns the token occupies
  pub fn width(&self) -> usize {
    self.pieces.len()
  }

  /// Length of the longest segmentation
  pub fn max_segments(&self) -> usize {
    self.segmentations.iter().map(Segmentation::len).max().unwrap_or(0)
  }
}

impl fmt::Display for WordLattice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.word, self.pieces.join("|"))?;
    for seg in self.segmentations.iter() {
      write!(f, "\n  {}", seg)?;
    }
    Ok(())
  }
}

/// A segmentation as half-open character ranges
type Split = Vec<(usize, usize, MorphemeClass)>;

fn prefix_class(c: char) -> Option<MorphemeClass> {
  match c {
    'w' | 'f' => Some(MorphemeClass::PrefixConjunction),
    'b' => Some(MorphemeClass::PrefixPreposition),
    'l' => Some(MorphemeClass::PrefixPrepositionOrParticle),
    _ => None,
  }
}

const SINGLE: &[usize] = &[1];
const DOUBLE: &[usize] = &[2];
const NY: &[usize] = &[1, 2];
const HMA: &[usize] = &[2, 3];

lazy_static! {
  /// (pattern, minimum token length, suffix readings); first match wins.
  /// Two-reading patterns are the ambiguous ones.
  static ref SUFFIXES: Vec<(Regex, usize, &'static [usize])> = vec![
    (Regex::new("[kh]$").unwrap(), 1, SINGLE),
    (Regex::new("ny$").unwrap(), 3, NY),
    (Regex::new("y$").unwrap(), 1, SINGLE),
    (Regex::new("[hk]mA$").unwrap(), 4, HMA),
    (Regex::new("[nhm]A$").unwrap(), 3, DOUBLE),
    (Regex::new("[hk][mn]$").unwrap(), 3, DOUBLE),
  ];
}

fn suffix_readings(translit: &str, len: usize) -> &'static [usize] {
  SUFFIXES
    .iter()
    .find(|(re, min_len, _)| len >= *min_len && re.is_match(translit))
    .map(|(_, _, readings)| *readings)
    .unwrap_or(&[])
}

/// Candidate splits computed from the token's own letters
fn local_splits(chars: &[char]) -> Vec<Split> {
  let len = chars.len();
  let mut splits = vec![vec![(0, len, MorphemeClass::Stem)]];
  if len < 2 {
    return splits;
  }

  let translit = chars.iter().map(|&c| buckwalter::encode_char(c)).collect::<String>();
  let letters = translit.chars().collect::<Vec<_>>();

  let mut prefixes = Vec::new();
  if let Some(first) = prefix_class(letters[0]) {
    prefixes.push(first);
    if first == MorphemeClass::PrefixConjunction && len > 2 {
      // a conjunction can't follow a conjunction
      if let Some(second) = prefix_class(letters[1]).filter(|c| *c != MorphemeClass::PrefixConjunction) {
        prefixes.push(second);
      }
    }
  }
  let readings = suffix_readings(&translit, len);

  let longest_suffix = readings.iter().copied().max().unwrap_or(0);
  let too_grainy = len <= prefixes.len() + longest_suffix;

  let prefix_counts = (0..=prefixes.len()).collect::<Vec<_>>();
  let mut suffix_lens = vec![0];
  suffix_lens.extend_from_slice(readings);

  for choice in combinations(&[prefix_counts, suffix_lens]) {
    let (n_prefixes, suffix_len) = (choice[0], choice[1]);
    if n_prefixes == 0 && suffix_len == 0 {
      continue;
    }
    if too_grainy && suffix_len > 0 && n_prefixes == prefixes.len() {
      continue;
    }
    let stem_end = len - suffix_len;
    if n_prefixes >= stem_end {
      continue;
    }

    let mut split: Split = prefixes[..n_prefixes]
      .iter()
      .enumerate()
      .map(|(i, class)| (i, i + 1, *class))
      .collect();
    split.push((n_prefixes, stem_end, MorphemeClass::Stem));
    if suffix_len > 0 {
      split.push((stem_end, len, MorphemeClass::SuffixPronoun));
    }
    if !splits.contains(&split) {
      splits.push(split);
    }
  }

  splits
}

/// Lays the splits out on the merged cut-points of all of them
fn build_lattice(word: &str, chars: &[char], mut splits: Vec<Split>) -> WordLattice {
  splits.truncate(MAX_SEGMENTATIONS);

  let mut cuts = BTreeSet::new();
  cuts.insert(0);
  cuts.insert(chars.len());
  for split in splits.iter() {
    for &(start, end, _) in split.iter() {
      cuts.insert(start);
      cuts.insert(end);
    }
  }
  let cuts = cuts.into_iter().collect::<Vec<_>>();
  let column = |offset: usize| cuts.partition_point(|&c| c < offset);
  let text = |start: usize, end: usize| chars[start..end].iter().collect::<String>();

  if chars.is_empty() {
    return WordLattice {
      word: word.to_string(),
      segmentations: vec![Segmentation {
        segments: vec![Segment {
          text: String::new(),
          class: MorphemeClass::Stem,
          start: 0,
          end: 1,
        }],
      }],
      pieces: vec![String::new()],
    };
  }

  let pieces = cuts.windows(2).map(|w| text(w[0], w[1])).collect();
  let segmentations = splits
    .into_iter()
    .map(|split| Segmentation {
      segments: split
        .into_iter()
        .map(|(start, end, class)| Segment {
          text: text(start, end),
          class,
          start: column(start),
          end: column(end),
        })
        .collect(),
    })
    .collect();

  WordLattice {
    word: word.to_string(),
    segmentations,
    pieces,
  }
}

/// Segments one surface token into its candidate clitic decompositions.
///
/// The whole token as a single stem is always the first segmentation.
/// Affixes are detected on the transliterated letters, so Arabic-script and
/// transliterated input segment the same way, while segment texts keep the
/// caller's characters.
pub fn segment(word: &str) -> WordLattice {
  let chars = word.chars().collect::<Vec<_>>();
  let splits = local_splits(&chars);
  build_lattice(word, &chars, splits)
}

/// Char ranges for an externally supplied analysis, if it covers `chars` exactly
fn external_split(chars: &[char], pieces: &[String], local: &[Split]) -> Option<Split> {
  if pieces.is_empty() || pieces.len() > MAX_SEGMENTS || pieces.iter().any(|p| p.is_empty()) {
    return None;
  }
  let mut split = Vec::with_capacity(pieces.len());
  let mut offset = 0;
  for piece in pieces.iter() {
    let piece = piece.chars().collect::<Vec<_>>();
    let end = offset + piece.len();
    if end > chars.len() || chars[offset..end] != piece[..] {
      return None;
    }
    // reuse the class a local hypothesis gave the same range
    let class = local
      .iter()
      .flatten()
      .find(|(s, e, _)| *s == offset && *e == end)
      .map(|(_, _, class)| *class)
      .unwrap_or(MorphemeClass::Stem);
    split.push((offset, end, class));
    offset = end;
  }
  if offset == chars.len() { Some(split) } else { None }
}

/// Segments a token and merges in analyses from an outside source.
///
/// Analyses that don't cover the token exactly are dropped. If none of
/// them survive, only the local segmentations are used.
pub fn reconcile(word: &str, analyses: &[Vec<String>]) -> WordLattice {
  let chars = word.chars().collect::<Vec<_>>();
  let mut splits = local_splits(&chars);
  if analyses.is_empty() {
    return build_lattice(word, &chars, splits);
  }

  let local = splits.clone();
  let mut matched = 0;
  for analysis in analyses.iter() {
    match external_split(&chars, analysis, &local) {
      Some(split) => {
        matched += 1;
        if !splits.contains(&split) {
          splits.push(split);
        }
      }
      None => tracing::warn!(word, analysis = %analysis.join("+"), "analysis doesn't match token"),
    }
  }
  if matched == 0 {
    tracing::warn!(word, "no analysis matched, using local segmentation only");
  }

  build_lattice(word, &chars, splits)
}
