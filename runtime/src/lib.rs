//! Runtime representation and execution of compiled regex programs.
//!
//! A [`Program`] is a flat, ordered array of instructions whose edges are
//! instruction indices rather than pointers. The backtracking simulator in
//! [`backtrack`] executes a program against an input string with an explicit
//! thread stack, consulting the memoization table in [`memo`] to prune
//! continuations that are already known to fail. The [`rle`] module provides
//! the run-length-encoded bit vector backing the RLE table encodings, and
//! [`stats`] assembles the per-run cost report.

pub mod backtrack;
pub mod memo;
pub mod rle;
pub mod stats;

use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

/// Number of capture-offset slots tracked per match. Slots are paired
/// (start, end) per group; the first pair holds the whole-match extent, so
/// groups 1 through 9 are addressable.
pub const MAX_SUB: usize = 20;

/// Default bound on the backtracking ready stack.
pub const MAX_THREADS: usize = 1000;

/// Errors surfaced while constructing runtime tables or executing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The ready stack outgrew its configured bound.
    #[error("backtrack overflow: ready stack exceeded {limit} threads")]
    StackOverflow { limit: usize },

    /// A run-length-encoded vector was requested with a zero run width.
    #[error("run width must be at least 1")]
    ZeroRunWidth,

    /// A run-length-encoded vector was requested with a run width that does
    /// not fit the run pattern word.
    #[error("run width {width} exceeds the {}-bit run pattern word", rle::RUN_PATTERN_BITS)]
    RunWidthTooWide { width: usize },
}

/// Errors produced while reading configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown vertex-selection policy `{0}`, expected none|full|indeg|loop")]
    UnknownSelector(String),

    #[error("unknown memo-table encoding `{0}`, expected none|neg|rle|rle-tuned")]
    UnknownEncoding(String),
}

/// Vertex-selection policy: decides which program vertices receive a row in
/// the memoization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSelector {
    /// No vertex is memoized.
    None,
    /// Every vertex is memoized.
    Full,
    /// Vertices whose control-flow in-degree exceeds one.
    InDegreeGt1,
    /// Targets of back-edges, i.e. the join points of quantifier loops.
    LoopDest,
}

impl VertexSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexSelector::None => "none",
            VertexSelector::Full => "full",
            VertexSelector::InDegreeGt1 => "indeg",
            VertexSelector::LoopDest => "loop",
        }
    }
}

impl Display for VertexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertexSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(VertexSelector::None),
            "full" => Ok(VertexSelector::Full),
            "indeg" => Ok(VertexSelector::InDegreeGt1),
            "loop" => Ok(VertexSelector::LoopDest),
            other => Err(ConfigError::UnknownSelector(other.to_string())),
        }
    }
}

/// Physical encoding of the memoization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEncoding {
    /// Dense two-dimensional bitmap.
    None,
    /// Sparse hash set keyed by (vertex, offset).
    Negative,
    /// One run-length-encoded bit vector per memoized vertex, run width 1.
    Rle,
    /// RLE with a caller-supplied run width shared by every vertex.
    RleTuned,
}

impl TableEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableEncoding::None => "none",
            TableEncoding::Negative => "neg",
            TableEncoding::Rle => "rle",
            TableEncoding::RleTuned => "rle-tuned",
        }
    }
}

impl Display for TableEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TableEncoding::None),
            "neg" => Ok(TableEncoding::Negative),
            "rle" => Ok(TableEncoding::Rle),
            "rle-tuned" => Ok(TableEncoding::RleTuned),
            other => Err(ConfigError::UnknownEncoding(other.to_string())),
        }
    }
}

/// Index of an instruction within a program's flat instruction array.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstIndex(u32);

impl InstIndex {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for InstIndex {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for InstIndex {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl std::ops::Add<u32> for InstIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        InstIndex::from(self.0 + rhs)
    }
}

/// One set of inclusive character ranges with its own membership polarity,
/// corresponding to a single item written inside a character class
/// (`a-z`, `\d`, `\W`, a lone literal, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRangeSet {
    pub ranges: Vec<(char, char)>,
    pub invert: bool,
}

impl CharRangeSet {
    pub fn new(ranges: Vec<(char, char)>) -> Self {
        Self {
            ranges,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// True when `value` is a member of this set.
    pub fn matches(&self, value: char) -> bool {
        let in_ranges = self
            .ranges
            .iter()
            .any(|&(low, high)| low <= value && value <= high);
        in_ranges != self.invert
    }
}

impl Display for CharRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "^")?;
        }
        for (i, (low, high)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}-{}", *low as u32, *high as u32)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstChar {
    pub value: char,
}

impl InstChar {
    #[must_use]
    pub fn new(value: char) -> Self {
        Self { value }
    }
}

impl Display for InstChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "char {:?}", self.value)
    }
}

/// A class match over one or more range sets. A character matches when any
/// set admits it; the instruction-level `invert` then flips the verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstCharClass {
    pub sets: Vec<CharRangeSet>,
    pub invert: bool,
}

impl InstCharClass {
    #[must_use]
    pub fn new(sets: Vec<CharRangeSet>, invert: bool) -> Self {
        Self { sets, invert }
    }

    pub fn matches(&self, value: char) -> bool {
        self.sets.iter().any(|set| set.matches(value)) != self.invert
    }
}

impl Display for InstCharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "charclass ")?;
        if self.invert {
            write!(f, "^")?;
        }
        write!(f, "[")?;
        for (i, set) in self.sets.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", set)?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstJmp {
    pub x: InstIndex,
}

impl InstJmp {
    #[must_use]
    pub fn new(x: InstIndex) -> Self {
        Self { x }
    }
}

impl Display for InstJmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jmp {:04}", self.x.as_u32())
    }
}

/// Non-deterministic choice. The simulator continues at `x` and stacks a
/// thread for `y`; non-greedy quantifiers are compiled with the two swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstSplit {
    pub x: InstIndex,
    pub y: InstIndex,
}

impl InstSplit {
    #[must_use]
    pub fn new(x: InstIndex, y: InstIndex) -> Self {
        Self { x, y }
    }
}

impl Display for InstSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "split {:04}, {:04}", self.x.as_u32(), self.y.as_u32())
    }
}

/// N-way choice emitted for flattened alternation lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstSplitMany {
    pub edges: Vec<InstIndex>,
}

impl InstSplitMany {
    #[must_use]
    pub fn new(edges: Vec<InstIndex>) -> Self {
        Self { edges }
    }
}

impl Display for InstSplitMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "splitmany ")?;
        for (i, edge) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:04}", edge.as_u32())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstSave {
    pub slot: usize,
}

impl InstSave {
    #[must_use]
    pub fn new(slot: usize) -> Self {
        Self { slot }
    }
}

impl Display for InstSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "save {}", self.slot)
    }
}

/// Backreference comparison against a previously captured group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstStringCompare {
    pub cg_num: usize,
}

impl InstStringCompare {
    #[must_use]
    pub fn new(cg_num: usize) -> Self {
        Self { cg_num }
    }
}

impl Display for InstStringCompare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stringcompare {}", self.cg_num)
    }
}

/// Zero-width assertions evaluated inline against the neighboring input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// `^`
    TextStart,
    /// `$`
    TextEnd,
    /// `\b`
    WordBoundary,
    /// `\B`
    NonWordBoundary,
}

impl Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            AssertionKind::TextStart => "^",
            AssertionKind::TextEnd => "$",
            AssertionKind::WordBoundary => "\\b",
            AssertionKind::NonWordBoundary => "\\B",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstAssertion {
    pub kind: AssertionKind,
}

impl InstAssertion {
    #[must_use]
    pub fn new(kind: AssertionKind) -> Self {
        Self { kind }
    }
}

impl Display for InstAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inlinezwa {}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    Char(InstChar),
    CharClass(InstCharClass),
    Any,
    Match,
    Jmp(InstJmp),
    Split(InstSplit),
    SplitMany(InstSplitMany),
    Save(InstSave),
    StringCompare(InstStringCompare),
    InlineAssertion(InstAssertion),
    /// Opens a lookahead sub-program, closed by the matching
    /// [`Opcode::RecursiveMatch`].
    RecursiveAssertion,
    RecursiveMatch,
}

impl Opcode {
    /// True if evaluating the opcode consumes an input character.
    pub fn is_consuming(&self) -> bool {
        matches!(self, Opcode::Char(_) | Opcode::CharClass(_) | Opcode::Any)
    }

    /// Explicit branch targets, excluding fallthrough.
    pub fn branch_targets(&self) -> Vec<InstIndex> {
        match self {
            Opcode::Jmp(InstJmp { x }) => vec![*x],
            Opcode::Split(InstSplit { x, y }) => vec![*x, *y],
            Opcode::SplitMany(InstSplitMany { edges }) => edges.clone(),
            _ => vec![],
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Char(i) => Display::fmt(i, f),
            Opcode::CharClass(i) => Display::fmt(i, f),
            Opcode::Any => write!(f, "any"),
            Opcode::Match => write!(f, "match"),
            Opcode::Jmp(i) => Display::fmt(i, f),
            Opcode::Split(i) => Display::fmt(i, f),
            Opcode::SplitMany(i) => Display::fmt(i, f),
            Opcode::Save(i) => Display::fmt(i, f),
            Opcode::StringCompare(i) => Display::fmt(i, f),
            Opcode::InlineAssertion(i) => Display::fmt(i, f),
            Opcode::RecursiveAssertion => write!(f, "recursivezwa"),
            Opcode::RecursiveMatch => write!(f, "recursivematch"),
        }
    }
}

/// Memoization annotations assigned per instruction after compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoInfo {
    pub should_memo: bool,
    /// Row in the memo table, when the instruction is memoized.
    pub memo_state_num: Option<usize>,
    /// Run width handed to the RLE table encodings for this vertex.
    pub visit_interval: usize,
}

impl Default for MemoInfo {
    fn default() -> Self {
        Self {
            should_memo: false,
            memo_state_num: None,
            visit_interval: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The instruction's state number; equal to its index in the program.
    pub id: usize,
    pub opcode: Opcode,
    pub memo: MemoInfo,
}

impl Instruction {
    #[must_use]
    pub fn new(id: usize, opcode: Opcode) -> Self {
        Self {
            id,
            opcode,
            memo: MemoInfo::default(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}: {}", self.id, self.opcode)?;
        if let Some(q) = self.memo.memo_state_num {
            write!(
                f,
                " (memo -- state {}, visit interval {})",
                q, self.memo.visit_interval
            )?;
        }
        Ok(())
    }
}

/// A compiled program: a flat instruction array ending in a sentinel
/// [`Opcode::Match`], plus the memoization configuration it was compiled
/// under.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    insts: Vec<Instruction>,
    pub n_memoized_states: usize,
    pub memo_mode: VertexSelector,
    pub memo_encoding: TableEncoding,
    pub rle_k: usize,
    pub eol_anchor: bool,
}

impl Program {
    #[must_use]
    pub fn new(opcodes: Vec<Opcode>) -> Self {
        Self {
            insts: opcodes
                .into_iter()
                .enumerate()
                .map(|(id, opcode)| Instruction::new(id, opcode))
                .collect(),
            n_memoized_states: 0,
            memo_mode: VertexSelector::None,
            memo_encoding: TableEncoding::None,
            rle_k: 1,
            eol_anchor: false,
        }
    }

    /// Records the table encoding and propagates the visit interval to every
    /// instruction: the caller-supplied `rle_k` under
    /// [`TableEncoding::RleTuned`], 1 otherwise.
    pub fn with_encoding(mut self, encoding: TableEncoding, rle_k: usize) -> Self {
        self.memo_encoding = encoding;
        self.rle_k = rle_k;
        let interval = match encoding {
            TableEncoding::RleTuned => rle_k.max(1),
            _ => 1,
        };
        for inst in self.insts.iter_mut() {
            inst.memo.visit_interval = interval;
        }
        self
    }

    pub fn with_eol_anchor(mut self, eol_anchor: bool) -> Self {
        self.eol_anchor = eol_anchor;
        self
    }

    /// Returns the length of the program.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Returns true if the program contains no instructions.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn get(&self, idx: InstIndex) -> Option<&Instruction> {
        self.insts.get(idx.as_usize())
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.insts
    }

    /// Control-flow in-degree per instruction, counting explicit edges and
    /// fallthrough. The entry instruction is granted one implicit in-edge.
    pub fn in_degrees(&self) -> Vec<usize> {
        let len = self.insts.len();
        let mut degrees = vec![0usize; len];
        if let Some(entry) = degrees.first_mut() {
            *entry = 1;
        }
        for (i, inst) in self.insts.iter().enumerate() {
            match &inst.opcode {
                Opcode::Match => {}
                Opcode::Jmp(_) | Opcode::Split(_) | Opcode::SplitMany(_) => {
                    for target in inst.opcode.branch_targets() {
                        degrees[target.as_usize()] += 1;
                    }
                }
                _ => {
                    if i + 1 < len {
                        degrees[i + 1] += 1;
                    }
                }
            }
        }
        degrees
    }

    /// Assigns the memoized-vertex set for `mode`, numbering memo-table rows
    /// densely in state order, and records the row count on the program.
    pub fn determine_memo_nodes(&mut self, mode: VertexSelector) {
        self.memo_mode = mode;
        let len = self.insts.len();
        let selected: Vec<bool> = match mode {
            VertexSelector::None => vec![false; len],
            VertexSelector::Full => vec![true; len],
            VertexSelector::InDegreeGt1 => {
                self.in_degrees().into_iter().map(|d| d > 1).collect()
            }
            VertexSelector::LoopDest => {
                let mut is_dest = vec![false; len];
                for (i, inst) in self.insts.iter().enumerate() {
                    for target in inst.opcode.branch_targets() {
                        if target.as_usize() <= i {
                            is_dest[target.as_usize()] = true;
                        }
                    }
                }
                is_dest
            }
        };

        let mut next_row = 0;
        for (inst, memoize) in self.insts.iter_mut().zip(selected) {
            if memoize {
                inst.memo.should_memo = true;
                inst.memo.memo_state_num = Some(next_row);
                next_row += 1;
            } else {
                inst.memo.should_memo = false;
                inst.memo.memo_state_num = None;
            }
        }
        self.n_memoized_states = next_row;
        log::debug!(
            "vertex selection {}: memoizing {} of {} states",
            mode,
            self.n_memoized_states,
            len
        );
    }
}

impl std::ops::Index<InstIndex> for Program {
    type Output = Instruction;

    fn index(&self, index: InstIndex) -> &Self::Output {
        &self.insts[index.as_usize()]
    }
}

impl AsRef<[Instruction]> for Program {
    fn as_ref(&self) -> &[Instruction] {
        &self.insts
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in self.insts.iter() {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}
