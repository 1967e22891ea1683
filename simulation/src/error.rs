//! Error types for every stage of the pipeline, from parsing metric text to
//! stepping a particle.

use thiserror::Error;

/// Malformed metric expression text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid number literal '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
}

/// Failure inside the symbolic engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SymbolicError {
    /// The operation is not defined for this expression, e.g. differentiating `abs`.
    #[error("cannot {operation} expression '{expr}'")]
    Unsupported {
        operation: &'static str,
        expr: String,
    },
    /// A symbol has no value when compiling or evaluating.
    #[error("symbol '{name}' is not bound to a coordinate or parameter")]
    UnboundSymbol { name: String },
    /// A constant sub-expression folds to infinity or NaN.
    #[error("constant sub-expression '{expr}' is not finite")]
    NonFinite { expr: String },
}

/// Fatal configuration error raised while building the engine.
///
/// No partially built engine is ever returned alongside one of these.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("metric component g_{component} could not be parsed: {source}")]
    Parse {
        component: String,
        #[source]
        source: ParseError,
    },
    #[error("metric is not diagonal: entry ({row}, {col}) is '{entry}'")]
    NonDiagonal {
        row: usize,
        col: usize,
        entry: String,
    },
    #[error("metric is singular: diagonal entry {index} reduces to zero")]
    Singular { index: usize },
    #[error("symbol '{name}' is neither a coordinate nor a bound parameter")]
    UnknownSymbol { name: String },
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}

/// A state the local metric cannot describe. Reported per step; the step loop
/// halts rather than carry the state forward.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum UnphysicalState {
    #[error("particle reached the coordinate origin")]
    AtOrigin,
    #[error("four-velocity is not timelike at r = {radius} (normalization radicand {radicand})")]
    NonTimelike { radius: f64, radicand: f64 },
    #[error("metric or connection is not finite at r = {radius}")]
    NonFinite { radius: f64 },
}

/// Horizon detection could not produce a usable answer.
///
/// Recoverable: the caller degrades to "no horizon".
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HorizonError {
    #[error("g_rr depends on '{name}', expected a function of '{radial}' only")]
    NotRadial { name: String, radial: String },
    #[error("radial scan produced no finite samples of 1/g_rr")]
    NoFiniteSamples,
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}
