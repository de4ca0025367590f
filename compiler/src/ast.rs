//! Abstract syntax tree for the supported regex surface syntax.
//!
//! The tree is built by the parser and rewritten in place by the
//! normalization passes in [`crate::transform`]; each pass consumes and
//! returns the tree. After normalization no [`Regexp::Curly`] or nested
//! [`Regexp::Alt`] nodes remain, and every character class carries its
//! items in a flat `children` list.

use std::fmt::{self, Display};

/// Endpoint of a character-class item: a literal or a `\x` escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassAtom {
    Lit(char),
    Escape(char),
}

impl Display for ClassAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassAtom::Lit(c) => write!(f, "{}", c),
            ClassAtom::Escape(c) => write!(f, "\\{}", c),
        }
    }
}

/// Zero-width assertions written inline: `^`, `$`, `\b`, `\B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZwaKind {
    TextStart,
    TextEnd,
    WordBoundary,
    NonWordBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regexp {
    Lit(char),
    Dot,
    /// Any `\x` escape. Digit escapes are rewritten into [`Regexp::Backref`]
    /// by normalization; class escapes receive their ranges at compile time.
    CharEscape(char),
    /// One item of a character class. The parser chains a class's items
    /// through `link`, leftmost first; range flattening moves the chain
    /// into the class's `children` list.
    CharRange {
        link: Option<Box<Regexp>>,
        low: ClassAtom,
        high: ClassAtom,
    },
    CustomCharClass {
        chain: Option<Box<Regexp>>,
        children: Vec<Regexp>,
        merged_ranges: bool,
        invert: bool,
        /// A literal `-` appeared at an item boundary.
        plus_dash: bool,
    },
    InlineZwa(ZwaKind),
    Backref(usize),
    Lookahead(Box<Regexp>),
    Paren {
        /// Capture group number; 0 is the whole-match group.
        cg_num: usize,
        child: Box<Regexp>,
    },
    Quest {
        child: Box<Regexp>,
        non_greedy: bool,
    },
    Star {
        child: Box<Regexp>,
        non_greedy: bool,
    },
    Plus {
        child: Box<Regexp>,
        non_greedy: bool,
    },
    /// Counted repetition; `-1` encodes an unspecified bound.
    Curly {
        child: Box<Regexp>,
        min: i32,
        max: i32,
    },
    Cat(Box<Regexp>, Box<Regexp>),
    Alt(Box<Regexp>, Box<Regexp>),
    /// A flattened alternation of two or more non-`Alt` branches.
    AltList(Vec<Regexp>),
}

impl Regexp {
    pub fn cat(left: Regexp, right: Regexp) -> Self {
        Regexp::Cat(Box::new(left), Box::new(right))
    }

    pub fn alt(left: Regexp, right: Regexp) -> Self {
        Regexp::Alt(Box::new(left), Box::new(right))
    }

    pub fn quest(child: Regexp, non_greedy: bool) -> Self {
        Regexp::Quest {
            child: Box::new(child),
            non_greedy,
        }
    }

    pub fn star(child: Regexp, non_greedy: bool) -> Self {
        Regexp::Star {
            child: Box::new(child),
            non_greedy,
        }
    }

    pub fn plus(child: Regexp, non_greedy: bool) -> Self {
        Regexp::Plus {
            child: Box::new(child),
            non_greedy,
        }
    }

    pub fn curly(child: Regexp, min: i32, max: i32) -> Self {
        Regexp::Curly {
            child: Box::new(child),
            min,
            max,
        }
    }

    /// An unnumbered capture group; the parser assigns numbers after the
    /// whole pattern is built.
    pub fn paren(child: Regexp) -> Self {
        Regexp::Paren {
            cg_num: 0,
            child: Box::new(child),
        }
    }
}

impl Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regexp::Lit(c) => write!(f, "Lit({})", c),
            Regexp::Dot => write!(f, "Dot"),
            Regexp::CharEscape(c) => write!(f, "Esc({})", c),
            Regexp::CharRange { low, high, .. } => write!(f, "Range({}, {})", low, high),
            Regexp::CustomCharClass {
                children, invert, ..
            } => {
                write!(f, "Class{}(", if *invert { "^" } else { "" })?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            Regexp::InlineZwa(kind) => write!(f, "Zwa({:?})", kind),
            Regexp::Backref(n) => write!(f, "Backref({})", n),
            Regexp::Lookahead(child) => write!(f, "Lookahead({})", child),
            Regexp::Paren { cg_num, child } => write!(f, "Paren({}, {})", cg_num, child),
            Regexp::Quest { child, non_greedy } => {
                write!(f, "{}Quest({})", if *non_greedy { "Ng" } else { "" }, child)
            }
            Regexp::Star { child, non_greedy } => {
                write!(f, "{}Star({})", if *non_greedy { "Ng" } else { "" }, child)
            }
            Regexp::Plus { child, non_greedy } => {
                write!(f, "{}Plus({})", if *non_greedy { "Ng" } else { "" }, child)
            }
            Regexp::Curly { child, min, max } => {
                write!(f, "Curly({}, {}, {})", child, min, max)
            }
            Regexp::Cat(left, right) => write!(f, "Cat({}, {})", left, right),
            Regexp::Alt(left, right) => write!(f, "Alt({}, {})", left, right),
            Regexp::AltList(children) => {
                write!(f, "AltList(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
