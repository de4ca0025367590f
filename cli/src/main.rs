//! Driver binary: loads a query, runs the memoized backtracker once, and
//! prints the match offsets plus the statistics report.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use regex_memo_compiler::{compile, parse, transform};
use regex_memo_runtime::backtrack::backtrack;
use regex_memo_runtime::{TableEncoding, VertexSelector, MAX_SUB};

/// Memoized backtracking regex matcher.
#[derive(Debug, Parser)]
#[command(name = "rem", version, about)]
struct Args {
    /// Vertex-selection policy: none|full|indeg|loop
    selection: VertexSelector,

    /// Memo-table encoding: none|neg|rle|rle-tuned
    encoding: TableEncoding,

    /// Regex pattern, unless --query is given
    pattern: Option<String>,

    /// Input string; backslash escapes are processed
    input: Option<String>,

    /// Load pattern, input and rleKValue from a JSON query file
    #[arg(short = 'f', long = "query", value_name = "FILE", conflicts_with_all = ["pattern", "input"])]
    query: Option<PathBuf>,

    /// Run width for the rle-tuned encoding
    #[arg(long = "rle-k", default_value_t = 1)]
    rle_k: usize,
}

#[derive(Debug, Deserialize)]
struct Query {
    pattern: String,
    input: String,
    #[serde(rename = "rleKValue", default = "default_rle_k")]
    rle_k: usize,
}

fn default_rle_k() -> usize {
    1
}

impl Query {
    fn load(path: &Path) -> anyhow::Result<Query> {
        log::info!("reading {}", path.display());
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading query file {}", path.display()))?;
        let query: Query = serde_json::from_str(&raw)
            .with_context(|| format!("parsing query file {}", path.display()))?;
        Ok(query)
    }
}

/// Processes backslash escapes in a command-line input string; unknown
/// escapes keep their backslash.
fn unescape_input(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// `match (0,3)(1,2)` with `?` for unset slots, pairs up to the last
/// populated slot.
fn render_match(slots: &[Option<usize>; MAX_SUB]) -> String {
    let populated = slots
        .iter()
        .rposition(|slot| slot.is_some())
        .map(|last| last + 1)
        .unwrap_or(0);

    let offset = |slot: Option<usize>| match slot {
        Some(value) => value.to_string(),
        None => "?".to_string(),
    };

    let mut line = String::from("match");
    for l in (0..populated).step_by(2) {
        line.push_str(&format!(" ({},{})", offset(slots[l]), offset(slots[l + 1])));
    }
    line
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let query = match (&args.query, &args.pattern, &args.input) {
        (Some(path), None, None) => Query::load(path)?,
        (None, Some(pattern), Some(input)) => Query {
            pattern: pattern.clone(),
            input: unescape_input(input),
            rle_k: args.rle_k,
        },
        _ => anyhow::bail!("provide either a pattern and an input string, or --query FILE"),
    };

    let selection = args.selection;
    // With no memoized vertices there is nothing to encode.
    let encoding = if selection == VertexSelector::None {
        TableEncoding::None
    } else {
        args.encoding
    };

    log::info!("pattern: <{}>", query.pattern);
    log::info!("input length: {}", query.input.len());

    let ast = parse(&query.pattern)?;
    log::debug!("parsed: {}", ast);
    let ast = transform(ast)?;
    log::debug!("transformed: {}", ast);

    let prog = compile(&ast, selection, encoding, query.rle_k)?;
    log::debug!("compiled program:\n{}", prog);
    log::info!("will memoize {} states", prog.n_memoized_states);

    let outcome = backtrack(&prog, &query.input)?;
    match &outcome.matched {
        Some(slots) => println!("{}", render_match(slots)),
        None => println!("-no match-"),
    }
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);

    Ok(())
}
