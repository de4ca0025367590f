use pretty_assertions::assert_eq;

use regex_memo_compiler::{compile, parse, transform, CompileError};
use regex_memo_runtime::backtrack::backtrack;
use regex_memo_runtime::{Program, TableEncoding, VertexSelector};

const ALL_CONFIGS: &[(VertexSelector, TableEncoding, usize)] = &[
    (VertexSelector::None, TableEncoding::None, 1),
    (VertexSelector::Full, TableEncoding::None, 1),
    (VertexSelector::Full, TableEncoding::Negative, 1),
    (VertexSelector::Full, TableEncoding::Rle, 1),
    (VertexSelector::Full, TableEncoding::RleTuned, 2),
    (VertexSelector::InDegreeGt1, TableEncoding::None, 1),
    (VertexSelector::InDegreeGt1, TableEncoding::Rle, 1),
    (VertexSelector::InDegreeGt1, TableEncoding::RleTuned, 4),
    (VertexSelector::LoopDest, TableEncoding::Negative, 1),
    (VertexSelector::LoopDest, TableEncoding::Rle, 1),
];

fn compile_with(
    pattern: &str,
    selector: VertexSelector,
    encoding: TableEncoding,
    rle_k: usize,
) -> Program {
    let ast = transform(parse(pattern).unwrap()).unwrap();
    compile(&ast, selector, encoding, rle_k).unwrap()
}

/// Runs the unmemoized baseline and returns (start, end) pairs up to the
/// last populated capture slot.
fn captures(pattern: &str, input: &str) -> Option<Vec<(Option<usize>, Option<usize>)>> {
    let prog = compile_with(pattern, VertexSelector::None, TableEncoding::None, 1);
    let outcome = backtrack(&prog, input).unwrap();
    outcome.matched.map(|slots| {
        let populated = slots
            .iter()
            .rposition(|slot| slot.is_some())
            .map(|last| last + 1)
            .unwrap_or(0);
        (0..populated)
            .step_by(2)
            .map(|l| (slots[l], slots[l + 1]))
            .collect()
    })
}

fn pair(start: usize, end: usize) -> (Option<usize>, Option<usize>) {
    (Some(start), Some(end))
}

#[test]
fn matches_alternation_inside_a_group() {
    assert_eq!(Some(vec![pair(0, 3), pair(1, 2)]), captures("a(b|c)d", "acd"));
}

#[test]
fn matches_star_against_the_empty_input() {
    assert_eq!(Some(vec![pair(0, 0)]), captures("a*", ""));
}

#[test]
fn matches_counted_repetition_after_curly_elimination() {
    assert_eq!(Some(vec![pair(0, 3)]), captures("a{2,3}", "aaa"));
    assert_eq!(Some(vec![pair(0, 2)]), captures("a{2,3}", "aa"));
    assert_eq!(None, captures("a{2,3}", "a"));
}

#[test]
fn captures_the_last_iteration_of_a_repeated_group() {
    assert_eq!(
        Some(vec![pair(0, 6), pair(4, 5)]),
        captures("(a|b)+c", "ababac")
    );
}

#[test]
fn matches_classes_mixing_ranges_and_escapes() {
    assert_eq!(Some(vec![pair(0, 6)]), captures("[a-z\\d]+", "abc123"));
    assert_eq!(None, captures("[a-z\\d]+", "ABC"));
}

#[test]
fn bounds_visits_on_a_catastrophic_pattern() {
    let prog = compile_with(
        "(a+)+b",
        VertexSelector::InDegreeGt1,
        TableEncoding::Rle,
        1,
    );
    let input = "aaaaaaaaaaaaaaaaX";
    let outcome = backtrack(&prog, input).unwrap();

    assert!(outcome.matched.is_none());
    let ceiling = (prog.len() * (input.len() + 1)) as u64;
    assert!(
        outcome.report.simulation_info.n_total_visits <= ceiling,
        "visits {} exceeded nStates x (len+1) = {}",
        outcome.report.simulation_info.n_total_visits,
        ceiling
    );
}

#[test]
fn match_outcome_is_invariant_across_selectors_and_encodings() {
    let cases = [
        ("a(b|c)d", "acd"),
        ("a(b|c)d", "abd"),
        ("a(b|c)d", "axd"),
        ("(a|b)+c", "ababac"),
        ("(a|b)+c", "ababab"),
        ("a{2,3}", "aaa"),
        ("[a-z\\d]+", "abc123"),
        ("(ab)\\1", "abab"),
        ("(?=ab).b", "ab"),
        ("^a+$", "aaa"),
        ("a*", ""),
    ];

    for (pattern, input) in cases {
        let baseline = backtrack(
            &compile_with(pattern, VertexSelector::None, TableEncoding::None, 1),
            input,
        )
        .unwrap()
        .matched;

        for &(selector, encoding, rle_k) in ALL_CONFIGS {
            let prog = compile_with(pattern, selector, encoding, rle_k);
            let outcome = backtrack(&prog, input).unwrap();
            assert_eq!(
                baseline, outcome.matched,
                "pattern {:?}, input {:?}, selector {}, encoding {}",
                pattern, input, selector, encoding
            );
        }
    }
}

#[test]
fn full_and_indeg_selection_visit_each_search_state_at_most_once() {
    let cases = [
        ("(a+)+b", "aaaaaaaaaaX"),
        ("(a|b)+c", "ababab"),
        ("(a*)(b*)", "aabb"),
    ];

    for (pattern, input) in cases {
        for selector in [VertexSelector::Full, VertexSelector::InDegreeGt1] {
            let prog = compile_with(pattern, selector, TableEncoding::None, 1);
            let outcome = backtrack(&prog, input).unwrap();
            // Every unmemoized vertex has in-degree 1, so the bound carries
            // from its unique predecessor.
            assert!(
                outcome
                    .report
                    .simulation_info
                    .visits_to_most_visited_search_state
                    <= 1,
                "pattern {:?}, selector {}",
                pattern,
                selector
            );
        }
    }
}

#[test]
fn rejects_zero_width_quantifier_cycles_at_compile_time() {
    for pattern in ["(a*)*", "(a?)*", "(a*)+"] {
        let ast = transform(parse(pattern).unwrap()).unwrap();
        assert_eq!(
            Err(CompileError::InfiniteLoop),
            compile(&ast, VertexSelector::None, TableEncoding::None, 1),
            "pattern {}",
            pattern
        );
    }
}

#[test]
fn matches_backrefs_lookaheads_and_anchors() {
    assert_eq!(
        Some(vec![pair(0, 4), pair(0, 2)]),
        captures("(ab)\\1", "abab")
    );
    assert_eq!(None, captures("(ab)\\1", "abba"));

    assert_eq!(Some(vec![pair(0, 2)]), captures("(?=ab).b", "ab"));
    assert_eq!(None, captures("(?=ac).b", "ab"));

    assert_eq!(Some(vec![pair(0, 3)]), captures("^a+$", "aaa"));
    assert_eq!(None, captures("^a+$", "aab"));
    assert_eq!(Some(vec![pair(0, 2)]), captures("\\ba\\wc?", "ab"));
}

#[test]
fn reports_statistics_for_match_and_no_match_alike() {
    for input in ["acd", "zzz"] {
        let prog = compile_with("a(b|c)d", VertexSelector::Full, TableEncoding::Rle, 1);
        let outcome = backtrack(&prog, input).unwrap();
        let report = &outcome.report;

        assert_eq!(prog.len(), report.input_info.n_states);
        assert_eq!(input.len(), report.input_info.len_w);
        assert!(report.simulation_info.n_total_visits > 0);
        assert_eq!(
            prog.n_memoized_states,
            report
                .memoization_info
                .results
                .max_observed_cost_per_memoized_vertex
                .len()
        );
        assert_eq!("full", report.memoization_info.config.vertex_selection);
        assert_eq!("rle", report.memoization_info.config.encoding);
    }
}

#[test]
fn tuned_run_width_matches_the_visit_period() {
    // One memoized loop vertex revisited every 2 characters: a run width
    // of 2 keeps the steady-state run count low without changing the
    // outcome.
    let pattern = "(ab)+c";
    let input = "ababababababababababab";

    let baseline = backtrack(
        &compile_with(pattern, VertexSelector::None, TableEncoding::None, 1),
        input,
    )
    .unwrap()
    .matched;

    let prog = compile_with(
        pattern,
        VertexSelector::LoopDest,
        TableEncoding::RleTuned,
        2,
    );
    let outcome = backtrack(&prog, input).unwrap();
    assert_eq!(baseline, outcome.matched);
    assert!(outcome
        .report
        .memoization_info
        .results
        .max_observed_cost_per_memoized_vertex
        .iter()
        .all(|&cost| cost > 0));
}
