use faer::Mat;

use crate::error::{ConfigError, NumericsError};
use crate::gas::GasModel;
use crate::state::SolutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySide {
    Inlet,
    Outlet,
}

impl BoundarySide {
    fn name(self) -> &'static str {
        match self {
            BoundarySide::Inlet => "inlet",
            BoundarySide::Outlet => "outlet",
        }
    }
}

/// Ghost-cell policy, fixed at construction.
#[derive(Debug, Clone)]
pub enum BoundaryCond {
    /// Pin the entire primitive state (supersonic inflow).
    FullState {
        press: f64,
        vel: f64,
        temp: f64,
        mass_fracs: Vec<f64>,
    },
    /// Pin mass flux, temperature and composition; pressure is
    /// extrapolated from the adjacent interior cell. Inlet only.
    FixedMassFlow {
        mass_flux: f64,
        temp: f64,
        mass_fracs: Vec<f64>,
    },
    /// Pin static pressure, extrapolate the rest. Outlet only.
    FixedPressure { press: f64 },
    /// Mirror the adjacent interior cell with reversed velocity.
    Reflecting,
}

impl BoundaryCond {
    fn kind(&self) -> &'static str {
        match self {
            BoundaryCond::FullState { .. } => "full-state",
            BoundaryCond::FixedMassFlow { .. } => "fixed-mass-flow",
            BoundaryCond::FixedPressure { .. } => "fixed-pressure",
            BoundaryCond::Reflecting => "reflecting",
        }
    }

    fn validate(&self, gas: &dyn GasModel, side: BoundarySide) -> Result<(), ConfigError> {
        let check_positive = |name: &'static str, value: f64| {
            if !(value > 0.0) || !value.is_finite() {
                Err(ConfigError::BadBoundaryParam { name, value })
            } else {
                Ok(())
            }
        };
        let check_fracs = |fracs: &[f64]| {
            let want = gas.num_species();
            let sum: f64 = fracs.iter().sum();
            if fracs.len() != want || fracs.iter().any(|y| !(0.0..=1.0).contains(y)) || sum > 1.0 + 1e-12 {
                Err(ConfigError::BadBoundaryMassFracs { want })
            } else {
                Ok(())
            }
        };

        match self {
            BoundaryCond::FullState {
                press,
                temp,
                mass_fracs,
                ..
            } => {
                check_positive("press", *press)?;
                check_positive("temp", *temp)?;
                check_fracs(mass_fracs)
            }
            BoundaryCond::FixedMassFlow {
                mass_flux,
                temp,
                mass_fracs,
            } => {
                if side != BoundarySide::Inlet {
                    return Err(ConfigError::BoundarySideMismatch {
                        kind: self.kind(),
                        side: side.name(),
                    });
                }
                check_positive("mass_flux", *mass_flux)?;
                check_positive("temp", *temp)?;
                check_fracs(mass_fracs)
            }
            BoundaryCond::FixedPressure { press } => {
                if side != BoundarySide::Outlet {
                    return Err(ConfigError::BoundarySideMismatch {
                        kind: self.kind(),
                        side: side.name(),
                    });
                }
                check_positive("press", *press)
            }
            BoundaryCond::Reflecting => Ok(()),
        }
    }
}

/// One ghost cell's worth of state, recomputed from the interior every
/// call. No history is kept beyond the current value.
#[derive(Debug)]
pub struct SolutionBoundary {
    pub state: SolutionState,
    cond: BoundaryCond,
    side: BoundarySide,
}

impl SolutionBoundary {
    pub fn new(
        gas: &dyn GasModel,
        cond: BoundaryCond,
        side: BoundarySide,
    ) -> Result<Self, ConfigError> {
        cond.validate(gas, side)?;
        let num_eqs = gas.num_eqs();
        let mut sol_prim = Mat::zeros(num_eqs, 1);
        // placeholder quiescent state until the first refresh
        sol_prim[(0, 0)] = 101_325.0;
        sol_prim[(2, 0)] = 300.0;
        Ok(Self {
            state: SolutionState::from_prim(gas, sol_prim),
            cond,
            side,
        })
    }

    pub fn side(&self) -> BoundarySide {
        self.side
    }

    pub fn cond(&self) -> &BoundaryCond {
        &self.cond
    }

    /// Recompute the ghost-cell state from the interior solution.
    ///
    /// Must run before any full-domain assembly; a stale ghost state
    /// feeds incorrect fluxes into the edge cells.
    pub fn calc_boundary_state(
        &mut self,
        gas: &dyn GasModel,
        sol_int: &SolutionState,
    ) -> Result<(), NumericsError> {
        let adj = match self.side {
            BoundarySide::Inlet => 0,
            BoundarySide::Outlet => sol_int.num_cells() - 1,
        };
        let num_eqs = self.state.num_eqs();

        match &self.cond {
            BoundaryCond::FullState {
                press,
                vel,
                temp,
                mass_fracs,
            } => {
                self.state.sol_prim[(0, 0)] = *press;
                self.state.sol_prim[(1, 0)] = *vel;
                self.state.sol_prim[(2, 0)] = *temp;
                for (k, y) in mass_fracs.iter().enumerate() {
                    self.state.sol_prim[(3 + k, 0)] = *y;
                }
            }
            BoundaryCond::FixedMassFlow {
                mass_flux,
                temp,
                mass_fracs,
            } => {
                let press = sol_int.sol_prim[(0, adj)];
                let rho = gas.density(press, *temp, mass_fracs);
                self.state.sol_prim[(0, 0)] = press;
                self.state.sol_prim[(1, 0)] = mass_flux / rho;
                self.state.sol_prim[(2, 0)] = *temp;
                for (k, y) in mass_fracs.iter().enumerate() {
                    self.state.sol_prim[(3 + k, 0)] = *y;
                }
            }
            BoundaryCond::FixedPressure { press } => {
                for i in 1..num_eqs {
                    self.state.sol_prim[(i, 0)] = sol_int.sol_prim[(i, adj)];
                }
                self.state.sol_prim[(0, 0)] = *press;
            }
            BoundaryCond::Reflecting => {
                for i in 0..num_eqs {
                    self.state.sol_prim[(i, 0)] = sol_int.sol_prim[(i, adj)];
                }
                self.state.sol_prim[(1, 0)] = -sol_int.sol_prim[(1, adj)];
            }
        }

        self.state.update_state(gas, false)
    }
}
