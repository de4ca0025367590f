//! Parsing, normalization and compilation of regex patterns into runnable
//! programs for the regex-memo runtime.
//!
//! # Example
//!
//! ```
//! use regex_memo_compiler::{compile, parse, transform};
//! use regex_memo_runtime::backtrack::backtrack;
//! use regex_memo_runtime::{TableEncoding, VertexSelector};
//!
//! let ast = parse("a(b|c)d").unwrap();
//! let ast = transform(ast).unwrap();
//! let prog = compile(&ast, VertexSelector::Full, TableEncoding::Rle, 1).unwrap();
//!
//! let outcome = backtrack(&prog, "acd").unwrap();
//! assert!(outcome.matched.is_some());
//! ```

pub mod analysis;
pub mod ast;
pub mod compiler;
pub mod parser;
pub mod transform;

pub use analysis::assert_no_infinite_loops;
pub use compiler::compile;
pub use parser::parse;
pub use transform::transform;

use thiserror::Error;

/// Errors raised between normalization and program emission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The program contains a zero-width cycle through a branch, as nested
    /// quantifiers over an empty-matching body compile to.
    #[error("infinite loop possible through zero-width instructions, as in (a*)*")]
    InfiniteLoop,

    /// A construct survived to a pass that cannot handle it.
    #[error("unsupported construct: {0}")]
    UnsupportedFeature(String),

    /// A capture group's save slots fall outside the addressable range.
    #[error("capture group {0} exceeds the addressable capture slots")]
    TooManyCaptureGroups(usize),
}
