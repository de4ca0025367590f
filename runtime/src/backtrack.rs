//! The memoized backtracking simulator.
//!
//! Threads are VM-level continuations `(pc, sp, sub)` queued on a bounded
//! LIFO ready stack; popping in stack order over left-to-right emitted
//! splits yields greedy-leftmost semantics. Before an instruction executes,
//! its search state `(vertex, offset)` is checked against the memo table:
//! because the simulator returns on the first match, a previously visited
//! search state is known to die, and the thread is cut short.

use std::rc::Rc;

use crate::memo::{MemoTable, VisitTable};
use crate::stats::RunReport;
use crate::{
    AssertionKind, InstAssertion, InstChar, InstIndex, InstJmp, InstSave, InstSplit,
    InstSplitMany, InstStringCompare, Opcode, Program, RuntimeError, VertexSelector, MAX_SUB,
    MAX_THREADS,
};

/// Capture-offset slots, shared between live threads. Threads forked at a
/// split share one allocation; a writer copies first when the record is
/// shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sub {
    pub slots: [Option<usize>; MAX_SUB],
}

impl Default for Sub {
    fn default() -> Self {
        Self {
            slots: [None; MAX_SUB],
        }
    }
}

/// A suspended simulation thread.
#[derive(Debug)]
struct Thread {
    pc: InstIndex,
    sp: usize,
    sub: Rc<Sub>,
}

/// Result of one match invocation: the capture slots when the input
/// matched, plus the cost report for the run. A failed match is not an
/// error and still carries a report.
#[derive(Debug)]
pub struct Outcome {
    pub matched: Option<[Option<usize>; MAX_SUB]>,
    pub report: RunReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimMode {
    /// Top-level simulation; succeeds at the [`Opcode::Match`] sentinel.
    Outer,
    /// Zero-width lookahead body; succeeds at [`Opcode::RecursiveMatch`].
    Lookahead,
}

/// Matches `input` against `prog` with the default thread-stack bound.
pub fn backtrack(prog: &Program, input: &str) -> Result<Outcome, RuntimeError> {
    backtrack_with_limit(prog, input, MAX_THREADS)
}

/// Matches `input` against `prog`, bounding the ready stack at
/// `max_threads`. Exceeding the bound is a deterministic
/// [`RuntimeError::StackOverflow`].
pub fn backtrack_with_limit(
    prog: &Program,
    input: &str,
    max_threads: usize,
) -> Result<Outcome, RuntimeError> {
    let w = input.as_bytes();
    let mut visits = VisitTable::new(prog.len(), w.len() + 1);
    let mut memo = if prog.memo_mode != VertexSelector::None {
        log::debug!("initializing memo table for {} states", prog.n_memoized_states);
        Some(MemoTable::new(prog, w.len())?)
    } else {
        None
    };

    let matched = simulate(
        prog,
        w,
        max_threads,
        &mut visits,
        &mut memo,
        InstIndex::from(0u32),
        0,
        Rc::new(Sub::default()),
        SimMode::Outer,
    )?;

    let report = RunReport::new(prog, w.len(), &visits, memo.as_ref());
    Ok(Outcome {
        matched: matched.map(|sub| sub.slots),
        report,
    })
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    prog: &Program,
    w: &[u8],
    max_threads: usize,
    visits: &mut VisitTable,
    memo: &mut Option<MemoTable>,
    start: InstIndex,
    start_sp: usize,
    seed: Rc<Sub>,
    mode: SimMode,
) -> Result<Option<Rc<Sub>>, RuntimeError> {
    let mut ready = vec![Thread {
        pc: start,
        sp: start_sp,
        sub: seed,
    }];

    // Run threads in stack order.
    while let Some(thread) = ready.pop() {
        let Thread {
            mut pc,
            mut sp,
            mut sub,
        } = thread;

        // Run the thread until it succeeds or dies; death drops its capture
        // reference and pops the next ready thread.
        'thread: loop {
            let inst = match prog.get(pc) {
                Some(inst) => inst,
                None => break 'thread,
            };

            if let Some(table) = memo.as_mut() {
                if inst.memo.should_memo {
                    if let Some(q) = inst.memo.memo_state_num {
                        if table.is_marked(q, sp) {
                            // The earlier visit failed to reach the match
                            // sentinel, so every continuation from this
                            // search state dies.
                            break 'thread;
                        }
                        table.mark(q, sp);
                    }
                }
            }

            let visit_count = visits.record(inst.id, sp);
            if memo.is_some() && inst.memo.should_memo {
                debug_assert_eq!(1, visit_count, "memoized search state revisited");
            }

            match &inst.opcode {
                Opcode::Char(InstChar { value }) => {
                    if sp < w.len() && w[sp] == *value as u8 {
                        pc = pc + 1;
                        sp += 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::CharClass(class) => {
                    if sp < w.len() && class.matches(w[sp] as char) {
                        pc = pc + 1;
                        sp += 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::Any => {
                    if sp < w.len() {
                        pc = pc + 1;
                        sp += 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::Match => match mode {
                    SimMode::Outer => return Ok(Some(sub)),
                    SimMode::Lookahead => break 'thread,
                },

                Opcode::Jmp(InstJmp { x }) => pc = *x,

                Opcode::Split(InstSplit { x, y }) => {
                    if ready.len() >= max_threads {
                        return Err(RuntimeError::StackOverflow { limit: max_threads });
                    }
                    ready.push(Thread {
                        pc: *y,
                        sp,
                        sub: Rc::clone(&sub),
                    });
                    pc = *x;
                }

                Opcode::SplitMany(InstSplitMany { edges }) => match edges.split_first() {
                    Some((&first, rest)) => {
                        for &edge in rest {
                            if ready.len() >= max_threads {
                                return Err(RuntimeError::StackOverflow { limit: max_threads });
                            }
                            ready.push(Thread {
                                pc: edge,
                                sp,
                                sub: Rc::clone(&sub),
                            });
                        }
                        pc = first;
                    }
                    None => break 'thread,
                },

                Opcode::Save(InstSave { slot }) => {
                    Rc::make_mut(&mut sub).slots[*slot] = Some(sp);
                    pc = pc + 1;
                }

                Opcode::StringCompare(InstStringCompare { cg_num }) => {
                    let needle = captured_text(&sub, w, *cg_num);
                    if w[sp..].starts_with(needle) {
                        sp += needle.len();
                        pc = pc + 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::InlineAssertion(InstAssertion { kind }) => {
                    if assertion_holds(*kind, w, sp) {
                        pc = pc + 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::RecursiveAssertion => {
                    let resume = match find_recursive_match(prog, pc) {
                        Some(resume) => resume,
                        None => break 'thread,
                    };
                    // The body runs as a zero-width sub-simulation. Its
                    // interior states stay out of the memo table: a
                    // lookahead's success does not imply overall success, so
                    // a stale mark could wrongly kill a viable thread.
                    // Capture writes inside the body do not escape it.
                    let mut no_memo = None;
                    let body = simulate(
                        prog,
                        w,
                        max_threads,
                        visits,
                        &mut no_memo,
                        pc + 1,
                        sp,
                        Rc::new((*sub).clone()),
                        SimMode::Lookahead,
                    )?;
                    if body.is_some() {
                        pc = resume + 1;
                    } else {
                        break 'thread;
                    }
                }

                Opcode::RecursiveMatch => match mode {
                    SimMode::Lookahead => return Ok(Some(sub)),
                    SimMode::Outer => break 'thread,
                },
            }
        }
    }

    Ok(None)
}

/// The text captured by group `cg_num`; an unset or still-open group
/// compares as the empty string.
fn captured_text<'a>(sub: &Sub, w: &'a [u8], cg_num: usize) -> &'a [u8] {
    match (sub.slots[2 * cg_num], sub.slots[2 * cg_num + 1]) {
        (Some(start), Some(end)) if start <= end => &w[start..end],
        _ => &[],
    }
}

/// `\w` for boundary purposes matches this engine's word class: ASCII
/// letters and digits.
fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

fn assertion_holds(kind: AssertionKind, w: &[u8], sp: usize) -> bool {
    match kind {
        AssertionKind::TextStart => sp == 0,
        AssertionKind::TextEnd => sp == w.len(),
        AssertionKind::WordBoundary | AssertionKind::NonWordBoundary => {
            let before = sp
                .checked_sub(1)
                .map(|i| is_word_byte(w[i]))
                .unwrap_or(false);
            let after = w.get(sp).map(|&b| is_word_byte(b)).unwrap_or(false);
            let boundary = before != after;
            (kind == AssertionKind::WordBoundary) == boundary
        }
    }
}

/// Locates the `RecursiveMatch` closing the lookahead opened at `zwa`.
/// Lookahead bodies do not nest their closers out of order, so the first
/// closer found is the right one.
fn find_recursive_match(prog: &Program, zwa: InstIndex) -> Option<InstIndex> {
    prog.instructions()
        .iter()
        .skip(zwa.as_usize() + 1)
        .find(|inst| inst.opcode == Opcode::RecursiveMatch)
        .map(|inst| InstIndex::from(inst.id))
}
