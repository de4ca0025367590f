//! Compile-time verification that no zero-width cycle threads through a
//! branch instruction.

use regex_memo_runtime::{InstIndex, Opcode, Program};

use crate::CompileError;

/// Rejects programs in which a `Jmp`, `Split` or `SplitMany` can reach
/// itself without consuming a character, as `(a*)*` or `(a?)*` compile to.
/// Only branches can introduce a back-edge, so only they seed the search.
/// The walk is an iterative DFS over an explicit work list; marks are
/// cleared before each starting vertex.
pub fn assert_no_infinite_loops(prog: &Program) -> Result<(), CompileError> {
    let len = prog.len();
    let mut visited = vec![false; len];

    for start in 0..len {
        if !could_start_loop(&prog[InstIndex::from(start)].opcode) {
            continue;
        }

        visited.iter_mut().for_each(|mark| *mark = false);
        log::debug!("checking for zero-width cycles from instruction {}", start);

        let mut work = zero_width_successors(prog, start);
        while let Some(state) = work.pop() {
            if state == start {
                log::debug!("zero-width cycle returns to instruction {}", start);
                return Err(CompileError::InfiniteLoop);
            }
            if visited[state] {
                continue;
            }
            visited[state] = true;
            work.extend(zero_width_successors(prog, state));
        }
    }

    log::debug!("no zero-width cycles found");
    Ok(())
}

fn could_start_loop(opcode: &Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Jmp(_) | Opcode::Split(_) | Opcode::SplitMany(_)
    )
}

/// Successors reachable without consuming input. `StringCompare` is
/// conservatively treated as consuming; a lookahead body is skipped to the
/// instruction after its closing `RecursiveMatch`.
fn zero_width_successors(prog: &Program, state: usize) -> Vec<usize> {
    let opcode = &prog[InstIndex::from(state)].opcode;
    match opcode {
        Opcode::Jmp(_) | Opcode::Split(_) | Opcode::SplitMany(_) => opcode
            .branch_targets()
            .into_iter()
            .map(|target| target.as_usize())
            .collect(),
        Opcode::Save(_) | Opcode::InlineAssertion(_) => vec![state + 1],
        Opcode::RecursiveAssertion => {
            let mut cursor = state + 1;
            while cursor < prog.len()
                && prog[InstIndex::from(cursor)].opcode != Opcode::RecursiveMatch
            {
                cursor += 1;
            }
            if cursor + 1 < prog.len() {
                vec![cursor + 1]
            } else {
                vec![]
            }
        }
        Opcode::Char(_)
        | Opcode::CharClass(_)
        | Opcode::Any
        | Opcode::Match
        | Opcode::StringCompare(_)
        | Opcode::RecursiveMatch => vec![],
    }
}
