use crate::Err;

/// Knobs for one `Parser`
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
  /// Beam margin: a combined theory survives only if it scores strictly
  /// above the cell's best plus `lambda`
  pub lambda: f64,
  pub max_entries_per_cell: usize,
  /// Widest lattice the chart is built for; wider sentences get a flat parse
  pub max_columns: usize,
  /// Most trees `Parser::parse_all` returns
  pub max_parses: usize,
  /// How far below the best tree an alternative may score
  pub diversity_margin: f64,
}

impl Default for ParserOptions {
  fn default() -> Self {
    Self {
      lambda: -5.0,
      max_entries_per_cell: 10,
      max_columns: 200,
      max_parses: 1,
      diversity_margin: 10.0,
    }
  }
}

impl ParserOptions {
  pub fn validate(&self) -> Result<(), Err> {
    if !self.lambda.is_finite() || self.lambda >= 0.0 {
      return Err(format!("lambda must be a negative number, got {}", self.lambda).into());
    }
    if self.max_entries_per_cell == 0 {
      return Err("max_entries_per_cell must be at least 1".into());
    }
    if self.max_columns == 0 {
      return Err("max_columns must be at least 1".into());
    }
    if self.max_parses == 0 {
      return Err("max_parses must be at least 1".into());
    }
    if !self.diversity_margin.is_finite() || self.diversity_margin < 0.0 {
      return Err(format!("diversity_margin must be non-negative, got {}", self.diversity_margin).into());
    }
    Ok(())
  }
}

#[test]
fn test_default_options_are_valid() {
  assert!(ParserOptions::default().validate().is_ok());
}

#[test]
fn test_invalid_options() {
  let bad = [
    ParserOptions {
      lambda: 0.0,
      ..Default::default()
    },
    ParserOptions {
      lambda: f64::NAN,
      ..Default::default()
    },
    ParserOptions {
      max_entries_per_cell: 0,
      ..Default::default()
    },
    ParserOptions {
      max_parses: 0,
      ..Default::default()
    },
    ParserOptions {
      diversity_margin: -1.0,
      ..Default::default()
    },
  ];
  for options in bad.iter() {
    assert!(options.validate().is_err(), "{:?}", options);
  }
}
