//! Two-pass compilation of a normalized AST into a flat instruction
//! program.
//!
//! The first pass counts the instructions each node needs so the program
//! can be emitted into a single pre-sized array; the second pass walks the
//! tree with a write cursor, patching split and jump edges as their targets
//! become known. The trailing sentinel is always [`Opcode::Match`].

use regex_memo_runtime::{
    AssertionKind, CharRangeSet, InstAssertion, InstChar, InstCharClass, InstIndex, InstJmp,
    InstSave, InstSplit, InstSplitMany, InstStringCompare, Opcode, Program, TableEncoding,
    VertexSelector, MAX_SUB,
};

use crate::analysis::assert_no_infinite_loops;
use crate::ast::{ClassAtom, Regexp, ZwaKind};
use crate::CompileError;

/// Compiles a normalized AST, verifies it is free of zero-width loops, and
/// assigns the memoized-vertex set for `memo_mode`. The encoding is forced
/// to [`TableEncoding::None`] when nothing is memoized.
pub fn compile(
    r: &Regexp,
    memo_mode: VertexSelector,
    memo_encoding: TableEncoding,
    rle_k: usize,
) -> Result<Program, CompileError> {
    let n = count(r)? + 1;
    let mut emitter = Emitter {
        opcodes: Vec::with_capacity(n),
    };
    emitter.emit(r)?;
    emitter.push(Opcode::Match);
    debug_assert_eq!(n, emitter.opcodes.len());

    let encoding = if memo_mode == VertexSelector::None {
        TableEncoding::None
    } else {
        memo_encoding
    };

    let mut prog = Program::new(emitter.opcodes)
        .with_encoding(encoding, rle_k)
        .with_eol_anchor(ends_with_eol_anchor(r));

    assert_no_infinite_loops(&prog)?;
    prog.determine_memo_nodes(memo_mode);
    log::info!(
        "compiled {} instructions, memoizing {}",
        prog.len(),
        prog.n_memoized_states
    );
    Ok(prog)
}

/// How many instructions does `r` need?
fn count(r: &Regexp) -> Result<usize, CompileError> {
    match r {
        Regexp::Alt(left, right) => Ok(2 + count(left)? + count(right)?),
        Regexp::AltList(children) => {
            // A SplitMany, plus one forwarding Jmp per branch.
            children
                .iter()
                .try_fold(1, |acc, child| Ok(acc + count(child)? + 1))
        }
        Regexp::Cat(left, right) => Ok(count(left)? + count(right)?),
        Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CustomCharClass { .. }
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_) => Ok(1),
        Regexp::Paren { child, .. } => Ok(2 + count(child)?),
        Regexp::Quest { child, .. } | Regexp::Plus { child, .. } => Ok(1 + count(child)?),
        Regexp::Star { child, .. } => Ok(2 + count(child)?),
        Regexp::Lookahead(child) => Ok(2 + count(child)?),
        Regexp::Curly { .. } => Err(CompileError::UnsupportedFeature(
            "counted repetition survived normalization".to_string(),
        )),
        Regexp::CharRange { .. } => Err(CompileError::UnsupportedFeature(
            "free-standing character class item".to_string(),
        )),
    }
}

struct Emitter {
    opcodes: Vec<Opcode>,
}

impl Emitter {
    fn pc(&self) -> InstIndex {
        InstIndex::from(self.opcodes.len())
    }

    fn push(&mut self, opcode: Opcode) -> usize {
        self.opcodes.push(opcode);
        self.opcodes.len() - 1
    }

    fn split_at_mut(&mut self, at: usize) -> &mut InstSplit {
        match &mut self.opcodes[at] {
            Opcode::Split(split) => split,
            _ => unreachable!("patched instruction is not a split"),
        }
    }

    fn jmp_at_mut(&mut self, at: usize) -> &mut InstJmp {
        match &mut self.opcodes[at] {
            Opcode::Jmp(jmp) => jmp,
            _ => unreachable!("patched instruction is not a jmp"),
        }
    }

    fn emit(&mut self, r: &Regexp) -> Result<(), CompileError> {
        match r {
            Regexp::Alt(left, right) => {
                let split = self.push(Opcode::Split(InstSplit::new(
                    InstIndex::from(0u32),
                    InstIndex::from(0u32),
                )));
                self.split_at_mut(split).x = InstIndex::from(split + 1);
                self.emit(left)?;
                let jmp = self.push(Opcode::Jmp(InstJmp::new(InstIndex::from(0u32))));
                let y = self.pc();
                self.split_at_mut(split).y = y;
                self.emit(right)?;
                let after = self.pc();
                self.jmp_at_mut(jmp).x = after;
            }

            Regexp::AltList(children) => {
                let split_many = self.push(Opcode::SplitMany(InstSplitMany::new(Vec::new())));
                let mut edges = Vec::with_capacity(children.len());
                let mut jmps = Vec::with_capacity(children.len());
                for child in children {
                    edges.push(self.pc());
                    self.emit(child)?;
                    jmps.push(self.push(Opcode::Jmp(InstJmp::new(InstIndex::from(0u32)))));
                }
                let after = self.pc();
                for jmp in jmps {
                    self.jmp_at_mut(jmp).x = after;
                }
                match &mut self.opcodes[split_many] {
                    Opcode::SplitMany(inst) => inst.edges = edges,
                    _ => unreachable!("patched instruction is not a splitmany"),
                }
            }

            Regexp::Cat(left, right) => {
                self.emit(left)?;
                self.emit(right)?;
            }

            Regexp::Lit(c) => {
                self.push(Opcode::Char(InstChar::new(*c)));
            }

            Regexp::Dot => {
                self.push(Opcode::Any);
            }

            Regexp::CharEscape(c) => {
                self.push(Opcode::CharClass(InstCharClass::new(
                    vec![escape_range_set(*c)],
                    false,
                )));
            }

            Regexp::CustomCharClass {
                children,
                merged_ranges,
                invert,
                plus_dash,
                ..
            } => {
                debug_assert!(*merged_ranges, "class compiled before range flattening");
                let mut sets = Vec::with_capacity(children.len() + 1);
                for child in children {
                    sets.push(class_item_range_set(child)?);
                }
                if *plus_dash {
                    sets.push(CharRangeSet::new(vec![('-', '-')]));
                }
                self.push(Opcode::CharClass(InstCharClass::new(sets, *invert)));
            }

            Regexp::Paren { cg_num, child } => {
                let open = 2 * cg_num;
                let close = open + 1;
                if close >= MAX_SUB {
                    return Err(CompileError::TooManyCaptureGroups(*cg_num));
                }
                self.push(Opcode::Save(InstSave::new(open)));
                self.emit(child)?;
                self.push(Opcode::Save(InstSave::new(close)));
            }

            Regexp::Quest { child, non_greedy } => {
                let split = self.push(Opcode::Split(InstSplit::new(
                    InstIndex::from(0u32),
                    InstIndex::from(0u32),
                )));
                self.split_at_mut(split).x = InstIndex::from(split + 1);
                self.emit(child)?;
                let y = self.pc();
                let inst = self.split_at_mut(split);
                inst.y = y;
                if *non_greedy {
                    std::mem::swap(&mut inst.x, &mut inst.y);
                }
            }

            Regexp::Star { child, non_greedy } => {
                let split = self.push(Opcode::Split(InstSplit::new(
                    InstIndex::from(0u32),
                    InstIndex::from(0u32),
                )));
                self.split_at_mut(split).x = InstIndex::from(split + 1);
                self.emit(child)?;
                // back-edge
                self.push(Opcode::Jmp(InstJmp::new(InstIndex::from(split))));
                let y = self.pc();
                let inst = self.split_at_mut(split);
                inst.y = y;
                if *non_greedy {
                    std::mem::swap(&mut inst.x, &mut inst.y);
                }
            }

            Regexp::Plus { child, non_greedy } => {
                let start = self.pc();
                self.emit(child)?;
                // trailing back-edge
                let split = self.push(Opcode::Split(InstSplit::new(
                    start,
                    InstIndex::from(0u32),
                )));
                let y = self.pc();
                let inst = self.split_at_mut(split);
                inst.y = y;
                if *non_greedy {
                    std::mem::swap(&mut inst.x, &mut inst.y);
                }
            }

            Regexp::Backref(cg_num) => {
                if 2 * cg_num + 1 >= MAX_SUB {
                    return Err(CompileError::TooManyCaptureGroups(*cg_num));
                }
                self.push(Opcode::StringCompare(InstStringCompare::new(*cg_num)));
            }

            Regexp::Lookahead(child) => {
                self.push(Opcode::RecursiveAssertion);
                self.emit(child)?;
                self.push(Opcode::RecursiveMatch);
            }

            Regexp::InlineZwa(kind) => {
                self.push(Opcode::InlineAssertion(InstAssertion::new(match kind {
                    ZwaKind::TextStart => AssertionKind::TextStart,
                    ZwaKind::TextEnd => AssertionKind::TextEnd,
                    ZwaKind::WordBoundary => AssertionKind::WordBoundary,
                    ZwaKind::NonWordBoundary => AssertionKind::NonWordBoundary,
                })));
            }

            Regexp::Curly { .. } => {
                return Err(CompileError::UnsupportedFeature(
                    "counted repetition survived normalization".to_string(),
                ))
            }

            Regexp::CharRange { .. } => {
                return Err(CompileError::UnsupportedFeature(
                    "free-standing character class item".to_string(),
                ))
            }
        }
        Ok(())
    }
}

fn class_item_range_set(item: &Regexp) -> Result<CharRangeSet, CompileError> {
    match item {
        Regexp::CharRange { low, high, .. } => match (low, high) {
            (ClassAtom::Lit(low), ClassAtom::Lit(high)) => {
                Ok(CharRangeSet::new(vec![(*low, *high)]))
            }
            (ClassAtom::Escape(low), ClassAtom::Escape(high)) if low == high => {
                Ok(escape_range_set(*low))
            }
            _ => Err(CompileError::UnsupportedFeature(
                "range between escapes in a character class".to_string(),
            )),
        },
        _ => Err(CompileError::UnsupportedFeature(
            "unexpected node in a character class".to_string(),
        )),
    }
}

/// Fixed ASCII ranges for the built-in class escapes; uppercased forms
/// invert. Any other `\x` behaves as a literal `x`.
fn escape_range_set(c: char) -> CharRangeSet {
    match c {
        's' | 'S' => {
            let set = CharRangeSet::new(vec![('\u{9}', '\u{d}'), ('\u{1c}', ' ')]);
            if c == 'S' {
                set.inverted()
            } else {
                set
            }
        }
        'w' | 'W' => {
            let set = CharRangeSet::new(vec![('a', 'z'), ('A', 'Z'), ('0', '9')]);
            if c == 'W' {
                set.inverted()
            } else {
                set
            }
        }
        'd' | 'D' => {
            let set = CharRangeSet::new(vec![('0', '9')]);
            if c == 'D' {
                set.inverted()
            } else {
                set
            }
        }
        // \r is folded into newline; the input convention is UNIX-style.
        'r' | 'n' => CharRangeSet::new(vec![('\n', '\n')]),
        't' => CharRangeSet::new(vec![('\t', '\t')]),
        'f' => CharRangeSet::new(vec![('\u{c}', '\u{c}')]),
        'v' => CharRangeSet::new(vec![('\u{b}', '\u{b}')]),
        other => CharRangeSet::new(vec![(other, other)]),
    }
}

/// True when the pattern's rightmost spine ends in `$`.
fn ends_with_eol_anchor(r: &Regexp) -> bool {
    match r {
        Regexp::InlineZwa(ZwaKind::TextEnd) => true,
        Regexp::Paren { child, .. } => ends_with_eol_anchor(child),
        Regexp::Cat(_, right) => ends_with_eol_anchor(right),
        _ => false,
    }
}
