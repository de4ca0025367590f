//! AST normalization passes applied between parsing and compilation.
//!
//! Four passes run in fixed order, each consuming and returning the tree:
//! counted repetitions are expanded away, left-leaning alternation chains
//! become flat lists, escaped digits become backreferences, and character
//! classes trade their item chains for flat children lists.

use crate::ast::Regexp;
use crate::CompileError;

pub fn transform(r: Regexp) -> Result<Regexp, CompileError> {
    log::info!("transforming regex ast");
    log::debug!("  curlies");
    let r = eliminate_curlies(r)?;
    log::debug!("  alternation lists");
    let r = flatten_alternations(r);
    log::debug!("  backrefs");
    let r = digit_escapes_to_backrefs(r);
    log::debug!("  character class ranges");
    Ok(merge_char_class_ranges(r))
}

/// `A·A·…·A`, n copies as a right-leaning chain.
fn repeat_with_cat(r: &Regexp, n: i32) -> Regexp {
    let mut ret = r.clone();
    for _ in 1..n {
        ret = Regexp::cat(r.clone(), ret);
    }
    ret
}

/// `(A (A (… (A)? …)?)?)`, nested to depth `max`. Every backjump out of the
/// nest lands on the same join point, which keeps the LOOP_DEST selection
/// down to a single vertex.
fn repeat_with_nested_quest(r: &Regexp, max: i32) -> Regexp {
    let mut ret = Regexp::quest(r.clone(), false);
    for _ in 1..max {
        ret = Regexp::quest(Regexp::cat(r.clone(), ret), false);
    }
    ret
}

/// Rewrites `X{m,n}` into concatenated copies plus a star or nested-quest
/// suffix:
///
/// ```text
/// A{2}   ->  AA
/// A{1,2} ->  A(A)?
/// A{,2}  ->  (A(A)?)?
/// A{2,}  ->  AAA*
/// ```
fn eliminate_curlies(r: Regexp) -> Result<Regexp, CompileError> {
    match r {
        Regexp::Curly { child, min, max } => {
            log::debug!("rewriting curly (min {}, max {})", min, max);
            let child = eliminate_curlies(*child)?;

            let prefix_len = min.max(0);
            let prefix = (min > 0).then(|| repeat_with_cat(&child, min));
            let suffix = if max == -1 {
                Some(Regexp::star(child.clone(), false))
            } else {
                let remainder = max - prefix_len;
                (remainder > 0).then(|| repeat_with_nested_quest(&child, remainder))
            };

            match (prefix, suffix) {
                (Some(prefix), Some(suffix)) => Ok(Regexp::cat(prefix, suffix)),
                (Some(prefix), None) => Ok(prefix),
                (None, Some(suffix)) => Ok(suffix),
                (None, None) => Err(CompileError::UnsupportedFeature(
                    "counted repetition with a zero bound".to_string(),
                )),
            }
        }
        Regexp::Cat(left, right) => Ok(Regexp::cat(
            eliminate_curlies(*left)?,
            eliminate_curlies(*right)?,
        )),
        Regexp::Alt(left, right) => Ok(Regexp::alt(
            eliminate_curlies(*left)?,
            eliminate_curlies(*right)?,
        )),
        Regexp::AltList(children) => Ok(Regexp::AltList(
            children
                .into_iter()
                .map(eliminate_curlies)
                .collect::<Result<_, _>>()?,
        )),
        Regexp::Paren { cg_num, child } => Ok(Regexp::Paren {
            cg_num,
            child: Box::new(eliminate_curlies(*child)?),
        }),
        Regexp::Quest { child, non_greedy } => {
            Ok(Regexp::quest(eliminate_curlies(*child)?, non_greedy))
        }
        Regexp::Star { child, non_greedy } => {
            Ok(Regexp::star(eliminate_curlies(*child)?, non_greedy))
        }
        Regexp::Plus { child, non_greedy } => {
            Ok(Regexp::plus(eliminate_curlies(*child)?, non_greedy))
        }
        Regexp::Lookahead(child) => Ok(Regexp::Lookahead(Box::new(eliminate_curlies(*child)?))),
        terminal => Ok(terminal),
    }
}

/// Collects the branches of a left-leaning `Alt` chain in left-to-right
/// order.
fn fill_alt_branches(r: Regexp, branches: &mut Vec<Regexp>) {
    match r {
        Regexp::Alt(left, right) => {
            fill_alt_branches(*left, branches);
            branches.push(*right);
        }
        other => branches.push(other),
    }
}

fn flatten_alternations(r: Regexp) -> Regexp {
    match r {
        Regexp::Alt(left, right) => {
            let mut branches = Vec::new();
            fill_alt_branches(Regexp::Alt(left, right), &mut branches);
            debug_assert!(branches.len() >= 2);
            log::debug!("flattening alternation of {} branches", branches.len());
            Regexp::AltList(branches.into_iter().map(flatten_alternations).collect())
        }
        Regexp::AltList(children) => {
            Regexp::AltList(children.into_iter().map(flatten_alternations).collect())
        }
        Regexp::Cat(left, right) => Regexp::cat(
            flatten_alternations(*left),
            flatten_alternations(*right),
        ),
        Regexp::Paren { cg_num, child } => Regexp::Paren {
            cg_num,
            child: Box::new(flatten_alternations(*child)),
        },
        Regexp::Quest { child, non_greedy } => {
            Regexp::quest(flatten_alternations(*child), non_greedy)
        }
        Regexp::Star { child, non_greedy } => {
            Regexp::star(flatten_alternations(*child), non_greedy)
        }
        Regexp::Plus { child, non_greedy } => {
            Regexp::plus(flatten_alternations(*child), non_greedy)
        }
        Regexp::Curly { child, min, max } => {
            Regexp::curly(flatten_alternations(*child), min, max)
        }
        Regexp::Lookahead(child) => Regexp::Lookahead(Box::new(flatten_alternations(*child))),
        terminal => terminal,
    }
}

fn digit_escapes_to_backrefs(r: Regexp) -> Regexp {
    match r {
        Regexp::CharEscape(c) if ('1'..='9').contains(&c) => {
            Regexp::Backref(c as usize - '0' as usize)
        }
        Regexp::Cat(left, right) => Regexp::cat(
            digit_escapes_to_backrefs(*left),
            digit_escapes_to_backrefs(*right),
        ),
        Regexp::Alt(left, right) => Regexp::alt(
            digit_escapes_to_backrefs(*left),
            digit_escapes_to_backrefs(*right),
        ),
        Regexp::AltList(children) => Regexp::AltList(
            children.into_iter().map(digit_escapes_to_backrefs).collect(),
        ),
        Regexp::Paren { cg_num, child } => Regexp::Paren {
            cg_num,
            child: Box::new(digit_escapes_to_backrefs(*child)),
        },
        Regexp::Quest { child, non_greedy } => {
            Regexp::quest(digit_escapes_to_backrefs(*child), non_greedy)
        }
        Regexp::Star { child, non_greedy } => {
            Regexp::star(digit_escapes_to_backrefs(*child), non_greedy)
        }
        Regexp::Plus { child, non_greedy } => {
            Regexp::plus(digit_escapes_to_backrefs(*child), non_greedy)
        }
        Regexp::Curly { child, min, max } => {
            Regexp::curly(digit_escapes_to_backrefs(*child), min, max)
        }
        Regexp::Lookahead(child) => {
            Regexp::Lookahead(Box::new(digit_escapes_to_backrefs(*child)))
        }
        // Escapes inside a character class are class items, not backrefs.
        terminal => terminal,
    }
}

/// Moves a class's item chain into its flat children list, leftmost item
/// first.
fn fill_class_children(node: Option<Box<Regexp>>, children: &mut Vec<Regexp>) {
    if let Some(node) = node {
        if let Regexp::CharRange { link, low, high } = *node {
            fill_class_children(link, children);
            children.push(Regexp::CharRange {
                link: None,
                low,
                high,
            });
        }
    }
}

fn merge_char_class_ranges(r: Regexp) -> Regexp {
    match r {
        Regexp::CustomCharClass {
            chain,
            invert,
            plus_dash,
            ..
        } => {
            let mut children = Vec::new();
            fill_class_children(chain, &mut children);
            log::debug!("flattened character class of {} items", children.len());
            Regexp::CustomCharClass {
                chain: None,
                children,
                merged_ranges: true,
                invert,
                plus_dash,
            }
        }
        Regexp::Cat(left, right) => Regexp::cat(
            merge_char_class_ranges(*left),
            merge_char_class_ranges(*right),
        ),
        Regexp::Alt(left, right) => Regexp::alt(
            merge_char_class_ranges(*left),
            merge_char_class_ranges(*right),
        ),
        Regexp::AltList(children) => Regexp::AltList(
            children.into_iter().map(merge_char_class_ranges).collect(),
        ),
        Regexp::Paren { cg_num, child } => Regexp::Paren {
            cg_num,
            child: Box::new(merge_char_class_ranges(*child)),
        },
        Regexp::Quest { child, non_greedy } => {
            Regexp::quest(merge_char_class_ranges(*child), non_greedy)
        }
        Regexp::Star { child, non_greedy } => {
            Regexp::star(merge_char_class_ranges(*child), non_greedy)
        }
        Regexp::Plus { child, non_greedy } => {
            Regexp::plus(merge_char_class_ranges(*child), non_greedy)
        }
        Regexp::Curly { child, min, max } => {
            Regexp::curly(merge_char_class_ranges(*child), min, max)
        }
        Regexp::Lookahead(child) => {
            Regexp::Lookahead(Box::new(merge_char_class_ranges(*child)))
        }
        terminal => terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassAtom;
    use crate::parser::parse;

    fn contains_curly(r: &Regexp) -> bool {
        match r {
            Regexp::Curly { .. } => true,
            Regexp::Cat(l, r2) | Regexp::Alt(l, r2) => contains_curly(l) || contains_curly(r2),
            Regexp::AltList(children) => children.iter().any(contains_curly),
            Regexp::Paren { child, .. }
            | Regexp::Quest { child, .. }
            | Regexp::Star { child, .. }
            | Regexp::Plus { child, .. }
            | Regexp::Lookahead(child) => contains_curly(child),
            _ => false,
        }
    }

    fn contains_alt(r: &Regexp) -> bool {
        match r {
            Regexp::Alt(..) => true,
            Regexp::Cat(l, r2) => contains_alt(l) || contains_alt(r2),
            Regexp::AltList(children) => children.iter().any(contains_alt),
            Regexp::Paren { child, .. }
            | Regexp::Quest { child, .. }
            | Regexp::Star { child, .. }
            | Regexp::Plus { child, .. }
            | Regexp::Lookahead(child) => contains_alt(child),
            _ => false,
        }
    }

    #[test]
    fn should_leave_no_curly_or_alt_nodes_behind() {
        let patterns = vec![
            "a{2,3}",
            "(ab){1,4}c",
            "a|b|c|d",
            "(a|b){2}(c|d){3,}",
            "x{,5}|y{4}",
        ];

        for pattern in patterns {
            let normalized = transform(parse(pattern).unwrap()).unwrap();
            assert!(!contains_curly(&normalized), "pattern {}", pattern);
            assert!(!contains_alt(&normalized), "pattern {}", pattern);
        }
    }

    #[test]
    fn should_expand_curlies_into_prefix_and_nested_quest_suffix() {
        let a = || Regexp::Lit('a');

        // a{2} -> aa
        let normalized = transform(parse("a{2}").unwrap()).unwrap();
        assert_eq!(Regexp::paren(Regexp::cat(a(), a())), normalized);

        // a{1,2} -> a(a)?
        let normalized = transform(parse("a{1,2}").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::cat(a(), Regexp::quest(a(), false))),
            normalized
        );

        // a{1,3} -> a(a(a)?)?
        let normalized = transform(parse("a{1,3}").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::cat(
                a(),
                Regexp::quest(Regexp::cat(a(), Regexp::quest(a(), false)), false)
            )),
            normalized
        );

        // a{,2} -> (a(a)?)?
        let normalized = transform(parse("a{,2}").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::quest(
                Regexp::cat(a(), Regexp::quest(a(), false)),
                false
            )),
            normalized
        );

        // a{2,} -> aaa*
        let normalized = transform(parse("a{2,}").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::cat(
                Regexp::cat(a(), a()),
                Regexp::star(a(), false)
            )),
            normalized
        );
    }

    #[test]
    fn should_reject_zero_width_curly_bounds() {
        assert_eq!(
            Err(CompileError::UnsupportedFeature(
                "counted repetition with a zero bound".to_string()
            )),
            transform(parse("a{0}").unwrap())
        );
    }

    #[test]
    fn should_flatten_alternations_preserving_order() {
        let normalized = transform(parse("a|b|c|d").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::AltList(vec![
                Regexp::Lit('a'),
                Regexp::Lit('b'),
                Regexp::Lit('c'),
                Regexp::Lit('d'),
            ])),
            normalized
        );
    }

    #[test]
    fn should_rewrite_digit_escapes_into_backrefs() {
        let normalized = transform(parse("(a)\\1\\0").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::cat(
                Regexp::cat(
                    Regexp::Paren {
                        cg_num: 1,
                        child: Box::new(Regexp::Lit('a')),
                    },
                    Regexp::Backref(1)
                ),
                // \0 is not a backref
                Regexp::CharEscape('0')
            )),
            normalized
        );
    }

    #[test]
    fn should_flatten_class_chains_into_children() {
        let normalized = transform(parse("[a-z\\d-]").unwrap()).unwrap();
        assert_eq!(
            Regexp::paren(Regexp::CustomCharClass {
                chain: None,
                children: vec![
                    Regexp::CharRange {
                        link: None,
                        low: ClassAtom::Lit('a'),
                        high: ClassAtom::Lit('z'),
                    },
                    Regexp::CharRange {
                        link: None,
                        low: ClassAtom::Escape('d'),
                        high: ClassAtom::Escape('d'),
                    },
                ],
                merged_ranges: true,
                invert: false,
                plus_dash: true,
            }),
            normalized
        );
    }
}
