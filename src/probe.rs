use std::fmt;
use std::str::FromStr;

use faer::Mat;

use crate::error::ConfigError;
use crate::gas::GasModel;
use crate::mesh::Mesh;

/// Where a probe location resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSection {
    Inlet,
    Interior,
    Outlet,
}

impl ProbeSection {
    pub fn name(self) -> &'static str {
        match self {
            ProbeSection::Inlet => "inlet",
            ProbeSection::Interior => "interior",
            ProbeSection::Outlet => "outlet",
        }
    }
}

/// Sampled quantity, resolved once at configuration time.
///
/// Species indices are one-based, matching the `"species3"` spelling the
/// string form uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVar {
    Pressure,
    Velocity,
    Temperature,
    Source,
    Density,
    Momentum,
    Energy,
    Species(usize),
    DensitySpecies(usize),
}

impl ProbeVar {
    /// Validate against the gas model and the section the probe resolved
    /// to. Source data only exists on interior cells and only when at
    /// least one species is transported.
    pub fn validate(&self, gas: &dyn GasModel, section: ProbeSection) -> Result<(), ConfigError> {
        match *self {
            ProbeVar::Species(idx) | ProbeVar::DensitySpecies(idx) => {
                if idx == 0 || idx > gas.num_species() {
                    return Err(ConfigError::SpeciesIndexOutOfRange {
                        idx,
                        max: gas.num_species(),
                    });
                }
            }
            ProbeVar::Source => {
                if gas.num_species() == 0 {
                    return Err(ConfigError::ProbeVarNeedsSpecies {
                        var: self.to_string(),
                    });
                }
                if section != ProbeSection::Interior {
                    return Err(ConfigError::ProbeVarSection {
                        var: self.to_string(),
                        section: section.name(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Extract the sampled value from the state columns of the resolved
    /// section. `source` is `None` for ghost cells.
    pub fn extract(&self, prim: &Mat<f64>, cons: &Mat<f64>, source: Option<&Mat<f64>>, col: usize) -> f64 {
        match *self {
            ProbeVar::Pressure => prim[(0, col)],
            ProbeVar::Velocity => prim[(1, col)],
            ProbeVar::Temperature => prim[(2, col)],
            ProbeVar::Source => source.map_or(f64::NAN, |s| s[(0, col)]),
            ProbeVar::Density => cons[(0, col)],
            ProbeVar::Momentum => cons[(1, col)],
            ProbeVar::Energy => cons[(2, col)],
            ProbeVar::Species(idx) => prim[(2 + idx, col)],
            ProbeVar::DensitySpecies(idx) => cons[(2 + idx, col)],
        }
    }
}

impl FromStr for ProbeVar {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_idx = |rest: &str| rest.parse::<usize>().ok();
        Ok(match s {
            "pressure" => ProbeVar::Pressure,
            "velocity" => ProbeVar::Velocity,
            "temperature" => ProbeVar::Temperature,
            "source" => ProbeVar::Source,
            "density" => ProbeVar::Density,
            "momentum" => ProbeVar::Momentum,
            "energy" => ProbeVar::Energy,
            "species" => ProbeVar::Species(1),
            "density-species" => ProbeVar::DensitySpecies(1),
            _ => {
                if let Some(rest) = s.strip_prefix("density-species") {
                    ProbeVar::DensitySpecies(
                        parse_idx(rest).ok_or_else(|| ConfigError::InvalidProbeVar(s.into()))?,
                    )
                } else if let Some(rest) = s.strip_prefix("species") {
                    ProbeVar::Species(
                        parse_idx(rest).ok_or_else(|| ConfigError::InvalidProbeVar(s.into()))?,
                    )
                } else {
                    return Err(ConfigError::InvalidProbeVar(s.into()));
                }
            }
        })
    }
}

impl fmt::Display for ProbeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProbeVar::Pressure => write!(f, "pressure"),
            ProbeVar::Velocity => write!(f, "velocity"),
            ProbeVar::Temperature => write!(f, "temperature"),
            ProbeVar::Source => write!(f, "source"),
            ProbeVar::Density => write!(f, "density"),
            ProbeVar::Momentum => write!(f, "momentum"),
            ProbeVar::Energy => write!(f, "energy"),
            ProbeVar::Species(idx) => write!(f, "species{idx}"),
            ProbeVar::DensitySpecies(idx) => write!(f, "density-species{idx}"),
        }
    }
}

/// One probe: its requested location and the section/cell it resolved to.
#[derive(Debug, Clone)]
pub struct Probe {
    pub loc: f64,
    pub section: ProbeSection,
    pub cell: Option<usize>,
}

impl Probe {
    /// Nearest-cell resolution. Locations at or beyond the mesh bounds
    /// resolve to the matching ghost section; interior ties go to the
    /// lower cell index.
    pub fn resolve(mesh: &Mesh, loc: f64) -> Self {
        if loc <= mesh.x_left() {
            return Self {
                loc,
                section: ProbeSection::Inlet,
                cell: None,
            };
        }
        if loc >= mesh.x_right() {
            return Self {
                loc,
                section: ProbeSection::Outlet,
                cell: None,
            };
        }
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &x) in mesh.x_cell().iter().enumerate() {
            let dist = (x - loc).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        Self {
            loc,
            section: ProbeSection::Interior,
            cell: Some(best),
        }
    }
}
