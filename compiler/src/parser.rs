//! Combinator parser turning a pattern string into a [`Regexp`] tree.
//!
//! The grammar is classic POSIX-flavored: alternation over concatenation
//! over quantified singles, with grouping, character classes, escapes and
//! inline anchors. The whole pattern is wrapped in the whole-match group 0;
//! inner capture groups are numbered 1.. in source order once parsing
//! finishes.

use parcel::parsers::character::{digit, expect_character};
use parcel::prelude::v1::*;

use thiserror::Error;

use crate::ast::{self, Regexp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("provided regex is invalid")]
    InvalidRegex,
    #[error("unspecified parse error: {0}")]
    Undefined(String),
}

/// Parses `pattern` into its AST, failing on any malformed or unsupported
/// syntax.
pub fn parse(pattern: &str) -> Result<Regexp, ParseError> {
    let input: Vec<(usize, char)> = pattern.chars().enumerate().collect();

    let status = alternation()
        .parse(&input[..])
        .map_err(|err| ParseError::Undefined(format!("{}", err)))?;

    match status {
        MatchStatus::Match {
            remainder, inner, ..
        } if remainder.is_empty() => {
            let mut root = Regexp::paren(inner);
            let mut next_group = 0;
            number_groups(&mut root, &mut next_group);
            Ok(root)
        }
        _ => Err(ParseError::InvalidRegex),
    }
}

/// Assigns capture-group numbers in source order. The pre-order walk visits
/// the root wrapper first, which takes the whole-match number 0.
fn number_groups(r: &mut Regexp, next: &mut usize) {
    match r {
        Regexp::Paren { cg_num, child } => {
            *cg_num = *next;
            *next += 1;
            number_groups(child, next);
        }
        Regexp::Cat(left, right) | Regexp::Alt(left, right) => {
            number_groups(left, next);
            number_groups(right, next);
        }
        Regexp::Quest { child, .. }
        | Regexp::Star { child, .. }
        | Regexp::Plus { child, .. }
        | Regexp::Curly { child, .. }
        | Regexp::Lookahead(child) => number_groups(child, next),
        Regexp::AltList(children) => {
            for child in children.iter_mut() {
                number_groups(child, next);
            }
        }
        _ => {}
    }
}

// Expressions

fn alternation<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::join(
        concatenation(),
        parcel::zero_or_more(parcel::right(parcel::join(
            expect_character('|'),
            concatenation(),
        ))),
    )
    .map(|(head, tail)| tail.into_iter().fold(head, Regexp::alt))
}

fn concatenation<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::join(repetition(), parcel::zero_or_more(repetition()))
        .map(|(head, tail)| tail.into_iter().fold(head, Regexp::cat))
}

fn repetition<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::join(single(), parcel::optional(quantifier())).map(|(item, quantifier)| {
        match quantifier {
            Some(q) => q.apply(item),
            None => item,
        }
    })
}

fn single<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::or(group(), || {
        parcel::or(character_class(), || {
            parcel::or(any_character(), || {
                parcel::or(anchor(), || parcel::or(char_escape(), || literal()))
            })
        })
    })
}

// Groups

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Capturing,
    NonCapturing,
    Lookahead,
}

fn group_kind<'a>() -> impl Parser<'a, &'a [(usize, char)], GroupKind> {
    parcel::optional(parcel::right(parcel::join(
        expect_character('?'),
        parcel::or(
            expect_character(':').map(|_| GroupKind::NonCapturing),
            || expect_character('=').map(|_| GroupKind::Lookahead),
        ),
    )))
    .map(|kind| kind.unwrap_or(GroupKind::Capturing))
}

fn group<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::right(parcel::join(expect_character('('), group_kind())).and_then(|kind| {
        parcel::left(parcel::join(alternation(), expect_character(')'))).map(move |expr| {
            match kind {
                GroupKind::Capturing => Regexp::paren(expr),
                GroupKind::NonCapturing => expr,
                GroupKind::Lookahead => Regexp::Lookahead(Box::new(expr)),
            }
        })
    })
}

// Quantifiers

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuantifierKind {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
    Range { min: i32, max: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Quantifier {
    kind: QuantifierKind,
    non_greedy: bool,
}

impl Quantifier {
    fn apply(self, item: Regexp) -> Regexp {
        match self.kind {
            QuantifierKind::ZeroOrOne => Regexp::quest(item, self.non_greedy),
            QuantifierKind::ZeroOrMore => Regexp::star(item, self.non_greedy),
            QuantifierKind::OneOrMore => Regexp::plus(item, self.non_greedy),
            QuantifierKind::Range { min, max } => Regexp::curly(item, min, max),
        }
    }
}

fn quantifier<'a>() -> impl Parser<'a, &'a [(usize, char)], Quantifier> {
    parcel::or(
        parcel::join(
            parcel::or(
                expect_character('*').map(|_| QuantifierKind::ZeroOrMore),
                || {
                    parcel::or(
                        expect_character('+').map(|_| QuantifierKind::OneOrMore),
                        || expect_character('?').map(|_| QuantifierKind::ZeroOrOne),
                    )
                },
            ),
            parcel::optional(expect_character('?')),
        )
        .map(|(kind, lazy)| Quantifier {
            kind,
            non_greedy: lazy.is_some(),
        }),
        // Counted quantifiers take no non-greedy suffix.
        || {
            curly_quantifier().map(|kind| Quantifier {
                kind,
                non_greedy: false,
            })
        },
    )
}

/// `{m}`, `{m,}`, `{m,n}` or `{,n}`; `{,}` is rejected.
fn curly_quantifier<'a>() -> impl Parser<'a, &'a [(usize, char)], QuantifierKind> {
    parcel::left(parcel::join(
        parcel::right(parcel::join(
            expect_character('{'),
            parcel::or(
                parcel::join(
                    integer(),
                    parcel::optional(parcel::right(parcel::join(
                        expect_character(','),
                        parcel::optional(integer()),
                    ))),
                )
                .map(|(min, upper)| match upper {
                    None => QuantifierKind::Range { min, max: min },
                    Some(None) => QuantifierKind::Range { min, max: -1 },
                    Some(Some(max)) => QuantifierKind::Range { min, max },
                }),
                || {
                    parcel::right(parcel::join(expect_character(','), integer()))
                        .map(|max| QuantifierKind::Range { min: -1, max })
                },
            ),
        )),
        expect_character('}'),
    ))
}

// Singles

fn any_character<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    expect_character('.').map(|_| Regexp::Dot)
}

fn anchor<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::or(
        expect_character('^').map(|_| Regexp::InlineZwa(ast::ZwaKind::TextStart)),
        || {
            parcel::or(
                expect_character('$').map(|_| Regexp::InlineZwa(ast::ZwaKind::TextEnd)),
                || {
                    parcel::or(
                        parcel::join(expect_character('\\'), expect_character('b'))
                            .map(|_| Regexp::InlineZwa(ast::ZwaKind::WordBoundary)),
                        || {
                            parcel::join(expect_character('\\'), expect_character('B'))
                                .map(|_| Regexp::InlineZwa(ast::ZwaKind::NonWordBoundary))
                        },
                    )
                },
            )
        },
    )
}

fn char_escape<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    parcel::right(parcel::join(expect_character('\\'), any_char()))
        .map(Regexp::CharEscape)
}

const METACHARACTERS: &[char] = &['(', ')', '|', '*', '+', '?', '{', '[', '\\'];

fn literal<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    any_char()
        .predicate(|c| !METACHARACTERS.contains(c))
        .map(Regexp::Lit)
}

fn any_char<'a>() -> impl Parser<'a, &'a [(usize, char)], char> {
    move |input: &'a [(usize, char)]| match input.first() {
        Some(&(pos, c)) => Ok(MatchStatus::Match {
            span: pos..pos + 1,
            remainder: &input[1..],
            inner: c,
        }),
        None => Ok(MatchStatus::NoMatch(input)),
    }
}

fn integer<'a>() -> impl Parser<'a, &'a [(usize, char)], i32> {
    move |input: &'a [(usize, char)]| {
        let res = parcel::one_or_more(digit(10))
            .map(|digits| digits.into_iter().collect::<String>().parse::<i32>())
            .parse(input);

        match res {
            Ok(MatchStatus::Match {
                span,
                remainder,
                inner: Ok(value),
            }) => Ok(MatchStatus::Match {
                span,
                remainder,
                inner: value,
            }),
            Ok(MatchStatus::Match { inner: Err(_), .. }) => Ok(MatchStatus::NoMatch(input)),
            Ok(MatchStatus::NoMatch(remainder)) => Ok(MatchStatus::NoMatch(remainder)),
            Err(e) => Err(e),
        }
    }
}

// Character classes

/// Parses `[...]` into a chain of class items. A `-` at an item boundary
/// sets the class's `plus_dash` flag instead of forming a range.
fn character_class<'a>() -> impl Parser<'a, &'a [(usize, char)], Regexp> {
    move |input: &'a [(usize, char)]| {
        let mut cursor = 0;
        match input.first() {
            Some(&(_, '[')) => cursor += 1,
            _ => return Ok(MatchStatus::NoMatch(input)),
        }

        let invert = matches!(input.get(cursor), Some(&(_, '^')));
        if invert {
            cursor += 1;
        }

        let mut chain: Option<Box<Regexp>> = None;
        let mut plus_dash = false;
        let mut n_items = 0;
        loop {
            match input.get(cursor) {
                // unterminated class
                None => return Ok(MatchStatus::NoMatch(input)),
                Some(&(_, ']')) => {
                    cursor += 1;
                    break;
                }
                Some(&(_, '-')) => {
                    plus_dash = true;
                    cursor += 1;
                }
                Some(_) => {
                    let (low, consumed) = match class_atom(&input[cursor..]) {
                        Some(atom) => atom,
                        None => return Ok(MatchStatus::NoMatch(input)),
                    };
                    cursor += consumed;

                    let ranged = matches!(input.get(cursor), Some(&(_, '-')))
                        && !matches!(input.get(cursor + 1), Some(&(_, ']')) | None);
                    let high = if ranged {
                        cursor += 1;
                        let (high, consumed) = match class_atom(&input[cursor..]) {
                            Some(atom) => atom,
                            None => return Ok(MatchStatus::NoMatch(input)),
                        };
                        cursor += consumed;
                        high
                    } else {
                        low
                    };

                    // Ranges are between literals; an escape only pairs
                    // with itself.
                    let escape_endpoint = matches!(low, ast::ClassAtom::Escape(_))
                        || matches!(high, ast::ClassAtom::Escape(_));
                    if escape_endpoint && low != high {
                        return Ok(MatchStatus::NoMatch(input));
                    }

                    chain = Some(Box::new(Regexp::CharRange {
                        link: chain,
                        low,
                        high,
                    }));
                    n_items += 1;
                }
            }
        }

        if n_items == 0 && !plus_dash {
            return Ok(MatchStatus::NoMatch(input));
        }

        let start = input[0].0;
        Ok(MatchStatus::Match {
            span: start..start + cursor,
            remainder: &input[cursor..],
            inner: Regexp::CustomCharClass {
                chain,
                children: vec![],
                merged_ranges: false,
                invert,
                plus_dash,
            },
        })
    }
}

fn class_atom(input: &[(usize, char)]) -> Option<(ast::ClassAtom, usize)> {
    match input.first() {
        Some(&(_, '\\')) => input.get(1).map(|&(_, c)| (ast::ClassAtom::Escape(c), 2)),
        Some(&(_, ']')) | None => None,
        Some(&(_, c)) => Some((ast::ClassAtom::Lit(c), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassAtom, ZwaKind};

    fn wrapped(inner: Regexp) -> Regexp {
        Regexp::Paren {
            cg_num: 0,
            child: Box::new(inner),
        }
    }

    #[test]
    fn should_parse_literal_concatenation() {
        assert_eq!(
            Ok(wrapped(Regexp::cat(Regexp::Lit('a'), Regexp::Lit('b')))),
            parse("ab")
        );
    }

    #[test]
    fn should_parse_left_leaning_alternation_chains() {
        assert_eq!(
            Ok(wrapped(Regexp::alt(
                Regexp::alt(Regexp::Lit('a'), Regexp::Lit('b')),
                Regexp::Lit('c')
            ))),
            parse("a|b|c")
        );
    }

    #[test]
    fn should_parse_quantifiers_with_optional_laziness() {
        let input_output = vec![
            ("a?", Regexp::quest(Regexp::Lit('a'), false)),
            ("a??", Regexp::quest(Regexp::Lit('a'), true)),
            ("a*", Regexp::star(Regexp::Lit('a'), false)),
            ("a*?", Regexp::star(Regexp::Lit('a'), true)),
            ("a+", Regexp::plus(Regexp::Lit('a'), false)),
            ("a+?", Regexp::plus(Regexp::Lit('a'), true)),
        ];

        for (test_id, (input, expected)) in input_output.into_iter().enumerate() {
            assert_eq!((test_id, Ok(wrapped(expected))), (test_id, parse(input)));
        }
    }

    #[test]
    fn should_parse_counted_quantifier_forms() {
        let input_output = vec![
            ("a{2}", Regexp::curly(Regexp::Lit('a'), 2, 2)),
            ("a{2,}", Regexp::curly(Regexp::Lit('a'), 2, -1)),
            ("a{2,3}", Regexp::curly(Regexp::Lit('a'), 2, 3)),
            ("a{,3}", Regexp::curly(Regexp::Lit('a'), -1, 3)),
        ];

        for (test_id, (input, expected)) in input_output.into_iter().enumerate() {
            assert_eq!((test_id, Ok(wrapped(expected))), (test_id, parse(input)));
        }
    }

    #[test]
    fn should_reject_malformed_patterns() {
        let inputs = vec!["", "a{,}", "a)", "(a", "[abc", "a|", "*a", "a\\", "(?a)"];

        for (test_id, input) in inputs.into_iter().enumerate() {
            assert_eq!(
                (test_id, Err(ParseError::InvalidRegex)),
                (test_id, parse(input))
            );
        }
    }

    #[test]
    fn should_number_capture_groups_in_source_order() {
        let parsed = parse("(a)(b(c))").unwrap();

        let expected = wrapped(Regexp::cat(
            Regexp::Paren {
                cg_num: 1,
                child: Box::new(Regexp::Lit('a')),
            },
            Regexp::Paren {
                cg_num: 2,
                child: Box::new(Regexp::cat(
                    Regexp::Lit('b'),
                    Regexp::Paren {
                        cg_num: 3,
                        child: Box::new(Regexp::Lit('c')),
                    },
                )),
            },
        ));
        assert_eq!(expected, parsed);
    }

    #[test]
    fn should_parse_non_capturing_groups_and_lookaheads() {
        assert_eq!(
            Ok(wrapped(Regexp::cat(Regexp::Lit('a'), Regexp::Lit('b')))),
            parse("(?:ab)")
        );
        assert_eq!(
            Ok(wrapped(Regexp::cat(
                Regexp::Lookahead(Box::new(Regexp::Lit('a'))),
                Regexp::Dot
            ))),
            parse("(?=a).")
        );
    }

    #[test]
    fn should_parse_anchors_as_inline_assertions() {
        assert_eq!(
            Ok(wrapped(Regexp::cat(
                Regexp::cat(
                    Regexp::cat(Regexp::InlineZwa(ZwaKind::TextStart), Regexp::Lit('a')),
                    Regexp::InlineZwa(ZwaKind::WordBoundary)
                ),
                Regexp::InlineZwa(ZwaKind::TextEnd)
            ))),
            parse("^a\\b$")
        );
    }

    #[test]
    fn should_parse_escapes_as_char_escape_nodes() {
        assert_eq!(
            Ok(wrapped(Regexp::cat(
                Regexp::CharEscape('d'),
                Regexp::CharEscape('1')
            ))),
            parse("\\d\\1")
        );
    }

    #[test]
    fn should_parse_character_classes_into_item_chains() {
        // items chain leftmost-innermost
        let expected = Regexp::CustomCharClass {
            chain: Some(Box::new(Regexp::CharRange {
                link: Some(Box::new(Regexp::CharRange {
                    link: None,
                    low: ClassAtom::Lit('a'),
                    high: ClassAtom::Lit('z'),
                })),
                low: ClassAtom::Escape('d'),
                high: ClassAtom::Escape('d'),
            })),
            children: vec![],
            merged_ranges: false,
            invert: false,
            plus_dash: false,
        };
        assert_eq!(Ok(wrapped(expected)), parse("[a-z\\d]"));
    }

    #[test]
    fn should_flag_literal_dashes_and_negation() {
        let parsed = parse("[^a-]").unwrap();
        let expected = wrapped(Regexp::CustomCharClass {
            chain: Some(Box::new(Regexp::CharRange {
                link: None,
                low: ClassAtom::Lit('a'),
                high: ClassAtom::Lit('a'),
            })),
            children: vec![],
            merged_ranges: false,
            invert: true,
            plus_dash: true,
        });
        assert_eq!(expected, parsed);
    }
}
