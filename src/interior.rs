use faer::Mat;

use crate::error::NumericsError;
use crate::faer_add::norms_l2_l1;
use crate::gas::GasModel;
use crate::integrator::TimeType;
use crate::state::SolutionState;

/// Interior solution: current state, bounded-depth history, and the
/// residual/source storage mutated every sub-iteration.
///
/// History slot 0 tracks the newest state; older slots follow in order.
/// The history depth is fixed at construction and never reallocated.
#[derive(Debug)]
pub struct SolutionInterior {
    pub state: SolutionState,
    pub sol_hist_prim: Vec<Mat<f64>>,
    pub sol_hist_cons: Vec<Mat<f64>>,
    /// Conservative-variable tendency written by the spatial scheme.
    pub rhs: Mat<f64>,
    /// Residual storage. After an implicit sub-iteration this holds the
    /// linear-solve residual `J dq - res`, not the physical residual.
    pub res: Mat<f64>,
    /// Species production rates, `[num_species x num_cells]`.
    pub source: Mat<f64>,
    pub res_norm_l2: f64,
    pub res_norm_l1: f64,
    pub d_sol_norm_l2: f64,
    pub res_norm_hist: Vec<(f64, f64)>,
}

impl SolutionInterior {
    pub fn new(gas: &dyn GasModel, sol_prim_init: Mat<f64>, hist_depth: usize) -> Self {
        let num_eqs = sol_prim_init.nrows();
        let num_cells = sol_prim_init.ncols();
        let state = SolutionState::from_prim(gas, sol_prim_init);
        let sol_hist_prim = vec![state.sol_prim.clone(); hist_depth];
        let sol_hist_cons = vec![state.sol_cons.clone(); hist_depth];
        Self {
            state,
            sol_hist_prim,
            sol_hist_cons,
            rhs: Mat::zeros(num_eqs, num_cells),
            res: Mat::zeros(num_eqs, num_cells),
            source: Mat::zeros(gas.num_species(), num_cells),
            res_norm_l2: 0.0,
            res_norm_l1: 0.0,
            d_sol_norm_l2: f64::INFINITY,
            res_norm_hist: Vec::new(),
        }
    }

    pub fn num_cells(&self) -> usize {
        self.state.num_cells()
    }

    pub fn num_eqs(&self) -> usize {
        self.state.num_eqs()
    }

    pub fn update_state(&mut self, gas: &dyn GasModel, from_cons: bool) -> Result<(), NumericsError> {
        self.state.update_state(gas, from_cons)
    }

    /// L2/L1 norms of the residual buffer; the implicit convergence check.
    pub fn calc_res_norms(&mut self, subiter: usize) {
        let (l2, l1) = norms_l2_l1(self.res.as_ref());
        self.res_norm_l2 = l2;
        self.res_norm_l1 = l1;
        self.res_norm_hist.push((l2, l1));
        tracing::debug!(
            subiter,
            res_l2 = format_args!("{:.3}", l2.max(1e-300).log10()),
            res_l1 = format_args!("{:.3}", l1.max(1e-300).log10()),
            "sub-iteration residual norms (log10)"
        );
    }

    /// Norm of the primitive-state change across the last full iteration,
    /// scaled by the physical time step; the steady-run stop criterion.
    pub fn calc_d_sol_norms(&mut self, time_type: TimeType, dt: f64) {
        let d_sol = match time_type {
            // history slot 0 was overwritten during the sub-iterations
            TimeType::Implicit => &self.sol_hist_prim[0] - &self.sol_hist_prim[1],
            TimeType::Explicit => &self.state.sol_prim - &self.sol_hist_prim[0],
        };
        let (l2, _) = norms_l2_l1(d_sol.as_ref());
        self.d_sol_norm_l2 = l2 / dt;
        tracing::debug!(
            d_sol_l2 = format_args!("{:.3}", self.d_sol_norm_l2.max(1e-300).log10()),
            "solution change norm (log10)"
        );
    }

    /// Shift the history one slot (oldest dropped) and store the current
    /// state at slot 0.
    pub fn update_sol_hist(&mut self) {
        self.sol_hist_prim.rotate_right(1);
        self.sol_hist_cons.rotate_right(1);
        self.overwrite_hist_slot0();
    }

    /// Replace history slot 0 with the current state without shifting.
    /// Used by the implicit update so the next sub-iteration's residual
    /// is formed against the newest state.
    pub fn overwrite_hist_slot0(&mut self) {
        self.sol_hist_prim[0].clone_from(&self.state.sol_prim);
        self.sol_hist_cons[0].clone_from(&self.state.sol_cons);
    }
}
