//! Buckwalter transliteration between Arabic script and 7-bit ASCII.
//!
//! The mapping is one character to one character in both directions, so
//! character offsets computed on the transliterated form are valid offsets
//! into the original text. Characters outside the table pass through
//! unchanged, which makes `encode` the identity on text that is already
//! transliterated.

use std::collections::HashMap;

const TABLE: &[(char, char)] = &[
  ('\u{0621}', '\''),
  ('\u{0622}', '|'),
  ('\u{0623}', '>'),
  ('\u{0624}', '&'),
  ('\u{0625}', '<'),
  ('\u{0626}', '}'),
  ('\u{0627}', 'A'),
  ('\u{0628}', 'b'),
  ('\u{0629}', 'p'),
  ('\u{062A}', 't'),
  ('\u{062B}', 'v'),
  ('\u{062C}', 'j'),
  ('\u{062D}', 'H'),
  ('\u{062E}', 'x'),
  ('\u{062F}', 'd'),
  ('\u{0630}', '*'),
  ('\u{0631}', 'r'),
  ('\u{0632}', 'z'),
  ('\u{0633}', 's'),
  ('\u{0634}', '$'),
  ('\u{0635}', 'S'),
  ('\u{0636}', 'D'),
  ('\u{0637}', 'T'),
  ('\u{0638}', 'Z'),
  ('\u{0639}', 'E'),
  ('\u{063A}', 'g'),
  ('\u{0640}', '_'),
  ('\u{0641}', 'f'),
  ('\u{0642}', 'q'),
  ('\u{0643}', 'k'),
  ('\u{0644}', 'l'),
  ('\u{0645}', 'm'),
  ('\u{0646}', 'n'),
  ('\u{0647}', 'h'),
  ('\u{0648}', 'w'),
  ('\u{0649}', 'Y'),
  ('\u{064A}', 'y'),
  ('\u{064B}', 'F'),
  ('\u{064C}', 'N'),
  ('\u{064D}', 'K'),
  ('\u{064E}', 'a'),
  ('\u{064F}', 'u'),
  ('\u{0650}', 'i'),
  ('\u{0651}', '~'),
  ('\u{0652}', 'o'),
  ('\u{0670}', '`'),
  ('\u{0671}', '{'),
];

lazy_static! {
  static ref TO_ASCII: HashMap<char, char> = TABLE.iter().copied().collect();
  static ref TO_ARABIC: HashMap<char, char> = TABLE.iter().map(|&(a, b)| (b, a)).collect();
}

/// Transliterate one Arabic-script character, passing anything else through
pub fn encode_char(c: char) -> char {
  TO_ASCII.get(&c).copied().unwrap_or(c)
}

/// Inverse of `encode_char`
pub fn decode_char(c: char) -> char {
  TO_ARABIC.get(&c).copied().unwrap_or(c)
}

pub fn encode(s: &str) -> String {
  s.chars().map(encode_char).collect()
}

pub fn decode(s: &str) -> String {
  s.chars().map(decode_char).collect()
}
