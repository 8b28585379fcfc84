use std::io;

use thiserror::Error;

/// Configuration problems caught eagerly at construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("mesh must have at least one cell")]
    EmptyMesh,
    #[error("mesh bounds are inverted or degenerate: [{x_left}, {x_right}]")]
    BadMeshBounds { x_left: f64, x_right: f64 },
    #[error("gas model needs at least one species")]
    NoSpecies,
    #[error("species property `{name}` must be positive, got {value}")]
    NonPositiveSpeciesProp { name: &'static str, value: f64 },
    #[error("state shape {got_rows}x{got_cols} does not match {want_rows}x{want_cols}")]
    ShapeMismatch {
        got_rows: usize,
        got_cols: usize,
        want_rows: usize,
        want_cols: usize,
    },
    #[error("boundary condition `{kind}` is not valid for the {side} side")]
    BoundarySideMismatch {
        kind: &'static str,
        side: &'static str,
    },
    #[error("boundary condition parameter `{name}` is invalid: {value}")]
    BadBoundaryParam { name: &'static str, value: f64 },
    #[error("boundary mass fractions must have {want} entries in [0, 1] summing to at most one")]
    BadBoundaryMassFracs { want: usize },
    #[error("unrecognized probe variable `{0}`")]
    InvalidProbeVar(String),
    #[error("cannot probe `{var}` at an {section} probe")]
    ProbeVarSection { var: String, section: &'static str },
    #[error("probe variable `{var}` needs at least one transported species")]
    ProbeVarNeedsSpecies { var: String },
    #[error("species index {idx} out of range (1..={max})")]
    SpeciesIndexOutOfRange { idx: usize, max: usize },
    #[error("{name} must be positive, got {value}")]
    NonPositiveParam { name: &'static str, value: f64 },
    #[error("time integration order {0} is unsupported (1 or 2)")]
    UnsupportedTimeOrder(usize),
    #[error("explicit integrator needs at least one stage")]
    NoStages,
    #[error("{name} interval must be at least one")]
    ZeroInterval { name: &'static str },
    #[error("run must have at least one step")]
    NoSteps,
    #[error("reduced-order state update requires an explicit time integrator")]
    RomRequiresExplicit,
    #[error("basis shape {rows}x{cols} does not match {want_rows} degrees of freedom")]
    BadBasisShape {
        rows: usize,
        cols: usize,
        want_rows: usize,
    },
}

/// Numerical failures. Fatal for the run: the state can no longer be
/// trusted, so the iteration loop converts these into a run-level
/// failure instead of continuing.
#[derive(Error, Debug)]
pub enum NumericsError {
    #[error("non-physical state in cell {cell}: {what} = {value}")]
    NonPhysicalState {
        cell: usize,
        what: &'static str,
        value: f64,
    },
    #[error("residual Jacobian factorization failed")]
    SingularJacobian,
    #[error("linear solve produced a non-finite solution")]
    NonFiniteSolution,
    #[error("non-finite value in {what}")]
    NonFinite { what: &'static str },
    #[error("failed to assemble the residual Jacobian")]
    JacobianAssembly,
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("output error")]
    Io(#[from] io::Error),
    #[error("malformed data file: {0}")]
    Malformed(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Numerics(#[from] NumericsError),
}
