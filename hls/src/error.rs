// error.rs - Failure channel of the generator, loader and simulator

use crate::rtl::{Node, Reg};
use thiserror::Error;

/// Why a function could not be turned into a module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(&'static str),

    #[error("unsupported operator: {op} with {arity} argument(s)")]
    UnsupportedOperator { op: &'static str, arity: usize },

    #[error("{op} expects {expected} argument(s), found {found}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("entry function `{0}` not found")]
    EntryNotFound(String),

    #[error("node {0} translated twice")]
    DuplicateNode(Node),

    #[error("{reg} already declared with width {old}, cannot redeclare as {new}")]
    WidthConflict { reg: Reg, old: u32, new: u32 },

    #[error("invalid register width {0} (must be 1..=64)")]
    InvalidWidth(u32),

    #[error("state register of {width} bits cannot encode node {max_node}")]
    StateWidthTooSmall { width: u32, max_node: Node },

    #[error("register ids exhausted")]
    RegisterOverflow,

    #[error("node ids exhausted")]
    NodeOverflow,
}

pub type GenResult<T> = Result<T, GenError>;

/// Simulation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("module did not finish within {0} cycles")]
    CycleLimit(u64),

    #[error("expected {expected} argument(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },
}

/// Problems reading a serialized program
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed program: {0}")]
    Json(#[from] serde_json::Error),

    #[error("function `{func}` has no instruction at its entry node {entry}")]
    MissingEntry { func: String, entry: Node },

    #[error("function `{func}`: node {node} jumps to undefined node {target}")]
    DanglingSuccessor { func: String, node: Node, target: Node },
}
