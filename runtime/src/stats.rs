//! Per-run cost statistics in the driver-facing report shape.

use serde::Serialize;

use crate::memo::{MemoTable, VisitTable};
use crate::Program;

/// Report emitted after every run, match or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub input_info: InputInfo,
    pub simulation_info: SimulationInfo,
    pub memoization_info: MemoizationInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputInfo {
    pub n_states: usize,
    pub len_w: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInfo {
    pub n_total_visits: u64,
    /// The `nStates x (|w| + 1)` ceiling a memoized run cannot exceed.
    pub n_possible_total_visits_with_memoization: u64,
    pub visits_to_most_visited_search_state: u64,
    pub visits_to_most_visited_vertex: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoizationInfo {
    pub config: MemoConfig,
    pub results: MemoResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoConfig {
    pub vertex_selection: String,
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoResults {
    pub n_selected_vertices: usize,
    pub len_w: usize,
    /// One entry per memoized vertex, in the unit native to the encoding
    /// (see [`MemoTable::max_observed_cost`]).
    pub max_observed_cost_per_memoized_vertex: Vec<usize>,
}

impl RunReport {
    pub fn new(
        prog: &Program,
        len_w: usize,
        visits: &VisitTable,
        memo: Option<&MemoTable>,
    ) -> Self {
        let costs = match memo {
            Some(table) => (0..prog.n_memoized_states)
                .map(|q| table.max_observed_cost(q))
                .collect(),
            None => vec![],
        };

        RunReport {
            input_info: InputInfo {
                n_states: prog.len(),
                len_w,
            },
            simulation_info: SimulationInfo {
                n_total_visits: visits.total_visits(),
                n_possible_total_visits_with_memoization: prog.len() as u64
                    * (len_w as u64 + 1),
                visits_to_most_visited_search_state: visits.max_search_state_visits(),
                visits_to_most_visited_vertex: visits.max_vertex_visits(),
            },
            memoization_info: MemoizationInfo {
                config: MemoConfig {
                    vertex_selection: prog.memo_mode.to_string(),
                    encoding: prog.memo_encoding.to_string(),
                },
                results: MemoResults {
                    n_selected_vertices: prog.n_memoized_states,
                    len_w,
                    max_observed_cost_per_memoized_vertex: costs,
                },
            },
        }
    }
}
