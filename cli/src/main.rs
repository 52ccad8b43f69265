use std::env;
use std::io;
use std::io::Write;
use std::process;

use morphochart::{
  EntityConstraint, Err, Parser, ParserOptions, RuleGrammar, ShapeFeatures, TextLexicon, Token,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} GRAMMAR LEXICON [options]

Reads one tokenized sentence per line from stdin. Wrap a run of words in
[TYPE w1 w2 ...] to mark them as a single named entity of type TYPE.

Options:
  -h, --help             Print this message
  -c, --chart            Print the filled chart (defaults to not printing)
  -p, --pretty           Print trees indented, one node per line
  -k, --parses N         Print up to N alternative parses (default 1)
      --collapse-np      Relabel noun-phrase labels to the canonical one
      --lambda X         Beam margin, a negative log-probability (default -5)
      --cell-capacity N  Theories kept per chart cell (default 10)
      --max-columns N    Widest lattice parsed before falling back (default 200)

Set RUST_LOG (e.g. RUST_LOG=debug) to see what the parser is doing.",
    prog_name
  )
}

/// Splits a line into tokens and the entity constraints its brackets mark
fn read_sentence(line: &str) -> Result<(Vec<Token>, Vec<EntityConstraint>), Err> {
  let mut tokens = Vec::new();
  let mut constraints = Vec::new();
  let mut open: Option<(String, usize)> = None;

  for word in line.split_whitespace() {
    let mut word = word;
    if let Some(entity_type) = word.strip_prefix('[') {
      if open.is_some() {
        return Err(format!("nested entity bracket at {:?}", word).into());
      }
      if entity_type.is_empty() {
        return Err("entity bracket without a type".into());
      }
      open = Some((entity_type.to_string(), tokens.len()));
      continue;
    }
    let closes = word.ends_with(']');
    if closes {
      word = &word[..word.len() - 1];
    }
    if !word.is_empty() {
      tokens.push(Token::new(tokens.len(), word));
    }
    if closes {
      let (entity_type, left) = open.take().ok_or("] without an opening bracket")?;
      if tokens.len() == left {
        return Err(format!("empty {} bracket", entity_type).into());
      }
      constraints.push(EntityConstraint::new(left, tokens.len() - 1, entity_type));
    }
  }

  if let Some((entity_type, _)) = open {
    return Err(format!("unclosed {} bracket", entity_type).into());
  }
  Ok((tokens, constraints))
}

fn parse(parser: &Parser, line: &str, opts: &Args) -> Result<(), Err> {
  let (tokens, constraints) = read_sentence(line)?;

  if opts.print_chart {
    match parser.chart(&tokens, &constraints) {
      Some(chart) => println!("chart:\n{}", chart),
      None => println!("chart: (none)\n"),
    }
  }

  let trees = parser.parse_all(&tokens, &constraints, opts.collapse_np);
  println!(
    "Parsed {} tree{}",
    trees.len(),
    if trees.len() == 1 { "" } else { "s" }
  );
  for t in trees {
    let flat = if t.flat { " (flat)" } else { "" };
    println!("score {:.3}{}", t.score, flat);
    if opts.pretty {
      println!("{:#}", t);
    } else {
      println!("{}", t);
    }
    println!();
  }

  Ok(())
}

struct Args {
  grammar: String,
  lexicon: String,
  print_chart: bool,
  pretty: bool,
  collapse_np: bool,
  options: ParserOptions,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "morphochart"));
    };

    let mut files = Vec::new();
    let mut print_chart = false;
    let mut pretty = false;
    let mut collapse_np = false;
    let mut options = ParserOptions::default();

    while let Some(o) = iter.next() {
      let mut value = |name: &str| -> Result<String, String> {
        iter
          .next()
          .ok_or_else(|| Self::make_error_message(&format!("{} needs a value", name), &prog_name))
      };
      let bad = |name: &str| Self::make_error_message(&format!("bad value for {}", name), &prog_name);

      match o.as_str() {
        "-h" | "--help" => {
          println!("{}", usage(&prog_name));
          process::exit(0);
        }
        "-c" | "--chart" => print_chart = true,
        "-p" | "--pretty" => pretty = true,
        "--collapse-np" => collapse_np = true,
        "-k" | "--parses" => options.max_parses = value(&o)?.parse().map_err(|_| bad(&o))?,
        "--lambda" => options.lambda = value(&o)?.parse().map_err(|_| bad(&o))?,
        "--cell-capacity" => options.max_entries_per_cell = value(&o)?.parse().map_err(|_| bad(&o))?,
        "--max-columns" => options.max_columns = value(&o)?.parse().map_err(|_| bad(&o))?,
        _ if o.starts_with('-') => {
          return Err(Self::make_error_message(&format!("unknown option {}", o), &prog_name));
        }
        _ => files.push(o),
      }
    }

    let [grammar, lexicon]: [String; 2] = files
      .try_into()
      .map_err(|_| Self::make_error_message("expected a grammar file and a lexicon file", &prog_name))?;
    Ok(Self {
      grammar,
      lexicon,
      print_chart,
      pretty,
      collapse_np,
      options,
    })
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
    )
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let g = RuleGrammar::read_from_file(&opts.grammar)?;
  let lexicon = TextLexicon::read_from_file(&opts.lexicon)?;
  let parser = Parser::new(&g, &lexicon, &ShapeFeatures).with_options(opts.options.clone())?;
  tracing::info!(grammar = %opts.grammar, words = lexicon.len(), "loaded grammar and lexicon");

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        if let Err(e) = parse(&parser, input.trim(), &opts) {
          eprintln!("error: {}", e);
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
