//! One-dimensional reacting-flow finite-volume solver with a pluggable
//! state-update strategy (full-order or reduced-order projection).

pub mod boundary;
pub mod domain;
pub mod driver;
pub mod error;
pub mod faer_add;
pub mod gas;
pub mod integrator;
pub mod interior;
pub mod jacobian;
pub mod mesh;
pub mod output;
pub mod probe;
pub mod scheme;
pub mod state;
pub mod strategy;

pub use boundary::{BoundaryCond, BoundarySide, SolutionBoundary};
pub use domain::SolutionDomain;
pub use driver::{Driver, RunConfig};
pub use error::{ConfigError, NumericsError, SimError};
pub use gas::{CaloricallyPerfectGas, GasModel, SpeciesProps, R_UNIV};
pub use integrator::{TimeIntegrator, TimeScheme, TimeType};
pub use interior::SolutionInterior;
pub use jacobian::{FiniteDiffJacobian, ResJacobian};
pub use mesh::Mesh;
pub use output::{
    read_probe_file, read_restart_file, ProbeData, Recorder, RecorderConfig, RestartState,
};
pub use probe::{Probe, ProbeSection, ProbeVar};
pub use scheme::{OneStepReaction, RusanovScheme, SpatialScheme};
pub use state::{uniform_prim, SolutionState};
pub use strategy::{DirectUpdate, RomLinearUpdate, StateUpdateStrategy};
