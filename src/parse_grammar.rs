use regex::Regex;
/// Simple recursive-descent parsing of grammar files
use std::str::FromStr;

use crate::grammar::Side;
use crate::rules::{NameTags, Rule, RuleGrammar};
use crate::segment::MorphemeClass;
use crate::Err;

/// Parses a grammar file: scored binary rules and `%` directives, each
/// terminated by `;`
///
/// ```text
/// // rules, '*' marks the head child, the score defaults to 0
/// NP -> DET N* : -0.4;
/// NP -> NP* ADJ : -1.2;
///
/// %name PERSON default NOUN_PROP primary NOUN_PROP secondary NOUN;
/// %sentence-end PUNC;
/// %punct-conj PUNC CONJ;
/// %no-cross "," ":";
/// %np NP NPA NPP => NP;
/// %label fragment FRAG;
/// %clitic pronoun POSS_PRON PRON;
/// ```
impl FromStr for RuleGrammar {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut grammar = RuleGrammar::new(Vec::new());
    let mut rem = s;
    loop {
      rem = skip_whitespace(rem);
      if rem.is_empty() {
        break;
      }
      rem = if rem.starts_with('%') {
        parse_directive(rem, &mut grammar)?
      } else {
        let (rule, s) = parse_rule(rem)?;
        grammar.add_rule(rule);
        s
      };
    }

    if grammar.rules().next().is_none() {
      Err("empty ruleset".into())
    } else {
      Ok(grammar)
    }
  }
}

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, excerpt(s)).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", c, excerpt(s)).into())
  }
}

/// The start of the unparsed input, for error messages
fn excerpt(s: &str) -> &str {
  let line = s.lines().next().unwrap_or("");
  match line.char_indices().nth(40) {
    Some((idx, _)) => &line[..idx],
    None => line,
  }
}

/// Tries to skip \s characters and // comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(\s|//[^\n]*)*");
  optional_re(&*WHITESPACE_OR_COMMENT, s).1
}

/// Tries to parse a category or tag name
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r"^[a-zA-Z0-9\-_+$/.]+");
  needed_re(&*NAME, s).map_err(|err| format!("name: {}", err).into())
}

/// Parses a double-quoted string with \" and \\ escapes
fn parse_quoted(s: &str) -> ParseResult<'_, String> {
  regex_static!(QUOTED, r#"^"([^"\\]|\\.)*""#);
  let (quoted, s) = needed_re(&*QUOTED, s).map_err(|e| -> Err { format!("string: {}", e).into() })?;
  let mut out = String::new();
  let mut chars = quoted[1..quoted.len() - 1].chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      out.extend(chars.next());
    } else {
      out.push(c);
    }
  }
  Ok((out, s))
}

/// A bare word or a quoted string
fn parse_word(s: &str) -> ParseResult<'_, String> {
  regex_static!(WORD, r#"^[^\s;"]+"#);
  if s.starts_with('"') {
    parse_quoted(s)
  } else {
    let (word, s) = needed_re(&*WORD, s).map_err(|e| -> Err { format!("word: {}", e).into() })?;
    Ok((word.to_string(), s))
  }
}

/// Rule child: a name with an optional `*` head marker
fn parse_child(s: &str) -> ParseResult<'_, (String, bool)> {
  let (name, s) = parse_name(s)?;
  let s = skip_whitespace(s);
  let (star, s) = optional_char('*', s);
  Ok(((name.to_string(), star.is_some()), s))
}

fn parse_score(s: &str) -> ParseResult<'_, f64> {
  regex_static!(NUMBER, r"^[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?");
  let (num, s) = needed_re(&*NUMBER, s).map_err(|e| -> Err { format!("score: {}", e).into() })?;
  let score = num.parse::<f64>().map_err(|e| -> Err { format!("score {}: {}", num, e).into() })?;
  if score > 0.0 {
    return Err(format!("score {} is not a log-probability", num).into());
  }
  Ok((score, s))
}

/// `PARENT -> LEFT RIGHT [: score];`, one child starred as head. Without a
/// star the right child is the head.
fn parse_rule(s: &str) -> ParseResult<'_, Rule> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, "^->");

  let (parent, s) = parse_name(s).map_err(|e| -> Err { format!("rule symbol: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&*ARROW, s).map_err(|e| -> Err { format!("rule arrow: {}", e).into() })?;

  let mut children = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.starts_with(':') || rem.starts_with(';') || rem.is_empty() {
      break;
    }
    let (child, s) = parse_child(rem).map_err(|e| -> Err { format!("rule {}: {}", parent, e).into() })?;
    children.push(child);
    rem = s;
  }

  let (colon, s) = optional_char(':', rem);
  let (score, s) = if colon.is_some() {
    parse_score(skip_whitespace(s))?
  } else {
    (0.0, s)
  };
  let s = skip_whitespace(s);
  let (_, s) = needed_char(';', s).map_err(|e| -> Err { format!("rule {}: {}", parent, e).into() })?;

  let [(left, left_star), (right, right_star)]: [(String, bool); 2] = children
    .try_into()
    .map_err(|c: Vec<_>| -> Err {
      format!("rule {} needs 2 children, got {}", parent, c.len()).into()
    })?;
  let head = match (left_star, right_star) {
    (true, true) => return Err(format!("rule {} has two heads", parent).into()),
    (true, false) => Side::Left,
    _ => Side::Right,
  };

  Ok((
    Rule {
      parent: parent.to_string(),
      left,
      right,
      head,
      score,
    },
    s,
  ))
}

/// Words up to the terminating `;`
fn parse_words(s: &str) -> ParseResult<'_, Vec<String>> {
  let mut words = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(';', rem) {
      return Ok((words, s));
    }
    if rem.is_empty() {
      return Err("missing ; after directive".into());
    }
    let (word, s) = parse_word(rem)?;
    words.push(word);
    rem = s;
  }
}

/// `%name TYPE default TAG [primary TAG...] [secondary TAG...]`, where TYPE
/// `*` applies to entity types without their own entry
fn parse_name_directive(words: Vec<String>, grammar: &mut RuleGrammar) -> Result<(), Err> {
  let mut iter = words.into_iter();
  let entity_type = iter.next().ok_or("%name needs an entity type")?;
  let mut tags = NameTags::default();
  let mut section = None;
  for word in iter {
    match word.as_str() {
      "default" | "primary" | "secondary" => section = Some(word),
      _ => match section.as_deref() {
        Some("default") => tags.default = word,
        Some("primary") => {
          tags.primary.insert(word);
        }
        Some("secondary") => {
          tags.secondary.insert(word);
        }
        _ => return Err(format!("%name {}: {} outside of a section", entity_type, word).into()),
      },
    }
  }
  if tags.default.is_empty() {
    return Err(format!("%name {} has no default tag", entity_type).into());
  }
  if entity_type == "*" {
    grammar.fallback_name = Some(tags);
  } else {
    grammar.names.insert(entity_type, tags);
  }
  Ok(())
}

fn clitic_class(name: &str) -> Result<MorphemeClass, Err> {
  match name {
    "conjunction" => Ok(MorphemeClass::PrefixConjunction),
    "preposition" => Ok(MorphemeClass::PrefixPreposition),
    "particle" => Ok(MorphemeClass::PrefixPrepositionOrParticle),
    "pronoun" => Ok(MorphemeClass::SuffixPronoun),
    _ => Err(format!("unknown clitic class {}", name).into()),
  }
}

fn parse_directive<'a>(s: &'a str, grammar: &mut RuleGrammar) -> Result<&'a str, Err> {
  regex_static!(DIRECTIVE, r"^%[a-z\-]+");
  let (directive, s) = needed_re(&*DIRECTIVE, s)?;
  let (words, s) = parse_words(s).map_err(|e| -> Err { format!("{}: {}", directive, e).into() })?;

  match directive {
    "%name" => parse_name_directive(words, grammar)?,
    "%sentence-end" => grammar.sentence_end.extend(words),
    "%punct-conj" => grammar.punct_or_conj.extend(words),
    "%no-cross" => grammar.no_cross.extend(words),
    "%np" => match words.iter().position(|w| w == "=>") {
      Some(arrow) if arrow + 2 == words.len() => {
        grammar.np_canonical = Some(words[arrow + 1].clone());
        grammar.np_labels.extend(words[..arrow].iter().cloned());
      }
      _ => return Err("%np needs LABEL... => CANONICAL".into()),
    },
    "%label" => match words.as_slice() {
      [which, label] => match which.as_str() {
        "name" => grammar.name_label = label.clone(),
        "fragment" => grammar.fragment_label = label.clone(),
        "unknown" => grammar.unknown_label = label.clone(),
        _ => return Err(format!("%label: unknown label kind {}", which).into()),
      },
      _ => return Err("%label needs a kind and a label".into()),
    },
    "%clitic" => match words.split_first() {
      Some((class, tags)) if !tags.is_empty() => {
        grammar.closed_classes.insert(clitic_class(class)?, tags.to_vec());
      }
      _ => return Err("%clitic needs a class and at least one tag".into()),
    },
    _ => return Err(format!("unknown directive {}", directive).into()),
  }
  Ok(s)
}
