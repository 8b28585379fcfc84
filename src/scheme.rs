use faer::Mat;
use reborrow::*;

use crate::domain::SolutionDomain;
use crate::error::NumericsError;

/// Spatial discretization: writes the conservative tendency (and any
/// species source) into the interior container from the padded
/// full-domain state.
///
/// Precondition: `fill_sol_full` ran after the last state mutation.
pub trait SpatialScheme {
    fn calc_rhs(&mut self, domain: &mut SolutionDomain) -> Result<(), NumericsError>;
    fn name(&self) -> &'static str;
}

/// One-step irreversible global reaction: the first transported species
/// converts to the derived last species at an Arrhenius rate.
#[derive(Debug, Clone, Copy)]
pub struct OneStepReaction {
    /// Pre-exponential factor, 1/s.
    pub pre_exp: f64,
    /// Activation temperature `E_a / R_univ`, K.
    pub temp_act: f64,
    /// Heat released per unit mass of consumed species, J/kg.
    pub heat_release: f64,
}

impl OneStepReaction {
    /// Mass consumption rate of the fuel species, kg/(m^3 s).
    fn rate(&self, rho: f64, fuel_frac: f64, temp: f64) -> f64 {
        self.pre_exp * rho * fuel_frac.max(0.0) * (-self.temp_act / temp).exp()
    }
}

/// First-order Rusanov (local Lax-Friedrichs) flux over the padded state.
pub struct RusanovScheme {
    /// Face fluxes, `[num_eqs x (num_cells + 1)]`.
    flux: Mat<f64>,
    reaction: Option<OneStepReaction>,
}

impl RusanovScheme {
    pub fn new(num_eqs: usize, num_cells: usize) -> Self {
        Self {
            flux: Mat::zeros(num_eqs, num_cells + 1),
            reaction: None,
        }
    }

    pub fn with_reaction(mut self, reaction: OneStepReaction) -> Self {
        self.reaction = Some(reaction);
        self
    }

    // Physical flux of equation `e` evaluated from full-buffer column `j`.
    fn phys_flux(domain: &SolutionDomain, e: usize, j: usize) -> f64 {
        let prim = &domain.sol_prim_full;
        let cons = &domain.sol_cons_full;
        let vel = prim[(1, j)];
        match e {
            0 => cons[(1, j)],
            1 => cons[(1, j)] * vel + prim[(0, j)],
            2 => (cons[(2, j)] + prim[(0, j)]) * vel,
            _ => cons[(e, j)] * vel,
        }
    }

    fn wave_speed(domain: &SolutionDomain, j: usize) -> f64 {
        let col = domain.sol_prim_full.col_as_slice(j);
        let c = domain.gas.sound_speed(col[2], &col[3..]);
        col[1].abs() + c
    }
}

impl SpatialScheme for RusanovScheme {
    fn calc_rhs(&mut self, domain: &mut SolutionDomain) -> Result<(), NumericsError> {
        let num_eqs = domain.num_eqs();
        let num_cells = domain.num_cells();
        debug_assert_eq!(self.flux.ncols(), num_cells + 1);

        // face j sits between full-buffer columns j and j+1
        let mut flux = self.flux.as_mut();
        for j in 0..=num_cells {
            let lambda = Self::wave_speed(domain, j).max(Self::wave_speed(domain, j + 1));
            if !lambda.is_finite() {
                return Err(NumericsError::NonFinite { what: "face wave speed" });
            }
            let mut face = flux.rb_mut().subcols_mut(j, 1);
            for e in 0..num_eqs {
                let fl = Self::phys_flux(domain, e, j);
                let fr = Self::phys_flux(domain, e, j + 1);
                let jump = domain.sol_cons_full[(e, j + 1)] - domain.sol_cons_full[(e, j)];
                face.rb_mut().write(e, 0, 0.5 * (fl + fr) - 0.5 * lambda * jump);
            }
        }

        let dx = domain.mesh.dx();
        for j in 0..num_cells {
            for e in 0..num_eqs {
                domain.sol_int.rhs[(e, j)] = -(self.flux[(e, j + 1)] - self.flux[(e, j)]) / dx;
            }
        }

        // finite-rate source: consume the first transported species,
        // release heat into the energy equation
        let num_species = domain.gas.num_species();
        if num_species > 0 {
            for k in 0..num_species {
                for j in 0..num_cells {
                    domain.sol_int.source[(k, j)] = 0.0;
                }
            }
        }
        if let (Some(reaction), true) = (self.reaction, num_species > 0) {
            for j in 0..num_cells {
                let rho = domain.sol_int.state.sol_cons[(0, j)];
                let temp = domain.sol_int.state.sol_prim[(2, j)];
                let fuel = domain.sol_int.state.sol_prim[(3, j)];
                let wf = reaction.rate(rho, fuel, temp);
                domain.sol_int.source[(0, j)] = -wf;
                domain.sol_int.rhs[(3, j)] -= wf;
                domain.sol_int.rhs[(2, j)] += reaction.heat_release * wf;
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "Rusanov"
    }
}
