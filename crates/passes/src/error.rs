use std::{fmt, io};

use waypoint_ir::Block;

/// Why a function was left untouched by the checkpoint pass.
///
/// Every variant is recoverable: the pass reports it and moves on to the next
/// function (or the next checkpoint), never aborting the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The analysis maps carry no entry for the function.
    MissingAnalysis,

    /// The function has no pointer argument named `ckpt_mem`.
    MissingArgument,

    /// An edge split could not be performed.
    SplitFailed { from: Block, to: Block },

    /// A checkpoint block ends in a terminator the surgeon doesn't handle.
    UnsupportedTerminator(Block),

    /// No block qualifies as a checkpoint, or none could be installed.
    NoCandidates,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingAnalysis => write!(f, "no analysis data for function"),
            Self::MissingArgument => write!(f, "no `ckpt_mem` argument in function"),
            Self::SplitFailed { from, to } => {
                write!(f, "failed to split edge {from} -> {to}")
            }
            Self::UnsupportedTerminator(block) => {
                write!(f, "unsupported terminator in checkpoint block {block}")
            }
            Self::NoCandidates => write!(f, "no viable checkpoint candidates"),
        }
    }
}

/// Failure to load an analysis-input file. Unlike [`SkipReason`], this is
/// fatal: without the files the pass cannot be constructed.
#[derive(Debug)]
pub enum AnalysisFileError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for AnalysisFileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read analysis file: {err}"),
            Self::Json(err) => write!(f, "malformed analysis file: {err}"),
        }
    }
}

impl std::error::Error for AnalysisFileError {}

impl From<io::Error> for AnalysisFileError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for AnalysisFileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
