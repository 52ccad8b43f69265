use criterion::{black_box, criterion_group, criterion_main, Criterion};

use morphochart::{EntityConstraint, Parser, RuleGrammar, ShapeFeatures, TextLexicon, Token};

const GRAMMAR_SRC: &str = include_str!("../demos/toy.grammar");
const LEXICON_SRC: &str = include_str!("../demos/toy.lex");

fn parse(p: &Parser, tokens: &[Token], constraints: &[EntityConstraint]) -> usize {
  p.parse_all(tokens, constraints, false).len()
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar = GRAMMAR_SRC.parse::<RuleGrammar>().unwrap();
  let lexicon = LEXICON_SRC.parse::<TextLexicon>().unwrap();
  let parser = Parser::new(&grammar, &lexicon, &ShapeFeatures);

  let simple_input = Token::sentence("qrA Alwld ktAbh .");
  let clitic_input = Token::sentence("wktb Alwld ktAbA lmdrsthm w qAl lhm bktAbh fy Albyt Alkbyr .");
  let named_input = Token::sentence("qAl jwrj bwsh fy AlqAhrp ktAbhmA .");
  let named_constraints = vec![
    EntityConstraint::new(1, 2, "PERSON"),
    EntityConstraint::new(4, 4, "GPE"),
  ];

  c.bench_function("parse simple", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&simple_input), &[]))
  });

  c.bench_function("parse clitic-heavy", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&clitic_input), &[]))
  });

  c.bench_function("parse with entities", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&named_input), black_box(&named_constraints)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
