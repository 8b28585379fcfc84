use std::rc::Rc;

use faer::Mat;

use crate::boundary::{BoundaryCond, BoundarySide, SolutionBoundary};
use crate::error::{ConfigError, NumericsError, SimError};
use crate::gas::GasModel;
use crate::interior::SolutionInterior;
use crate::mesh::Mesh;

/// Container for the interior and boundary physical solutions, plus the
/// padded full-domain buffers the spatial scheme consumes.
#[derive(Debug)]
pub struct SolutionDomain {
    pub gas: Rc<dyn GasModel>,
    pub mesh: Mesh,
    pub sol_int: SolutionInterior,
    pub sol_inlet: SolutionBoundary,
    pub sol_outlet: SolutionBoundary,
    /// `[num_eqs x (1 + num_cells + 1)]`; ghost columns at both ends.
    pub sol_prim_full: Mat<f64>,
    pub sol_cons_full: Mat<f64>,
}

impl SolutionDomain {
    pub fn new(
        gas: Rc<dyn GasModel>,
        mesh: Mesh,
        sol_prim_init: Mat<f64>,
        inlet: BoundaryCond,
        outlet: BoundaryCond,
        hist_depth: usize,
    ) -> Result<Self, SimError> {
        let num_eqs = gas.num_eqs();
        let num_cells = mesh.num_cells();
        if sol_prim_init.nrows() != num_eqs || sol_prim_init.ncols() != num_cells {
            return Err(ConfigError::ShapeMismatch {
                got_rows: sol_prim_init.nrows(),
                got_cols: sol_prim_init.ncols(),
                want_rows: num_eqs,
                want_cols: num_cells,
            }
            .into());
        }

        let sol_int = SolutionInterior::new(gas.as_ref(), sol_prim_init, hist_depth);
        let sol_inlet = SolutionBoundary::new(gas.as_ref(), inlet, BoundarySide::Inlet)?;
        let sol_outlet = SolutionBoundary::new(gas.as_ref(), outlet, BoundarySide::Outlet)?;

        let mut domain = Self {
            sol_prim_full: Mat::zeros(num_eqs, num_cells + 2),
            sol_cons_full: Mat::zeros(num_eqs, num_cells + 2),
            gas,
            mesh,
            sol_int,
            sol_inlet,
            sol_outlet,
        };
        domain.calc_boundary_cells()?;
        domain.fill_sol_full();
        Ok(domain)
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    pub fn num_eqs(&self) -> usize {
        self.gas.num_eqs()
    }

    /// Refresh both ghost-cell states from the current interior solution.
    pub fn calc_boundary_cells(&mut self) -> Result<(), NumericsError> {
        self.sol_inlet
            .calc_boundary_state(self.gas.as_ref(), &self.sol_int.state)?;
        self.sol_outlet
            .calc_boundary_state(self.gas.as_ref(), &self.sol_int.state)
    }

    /// Concatenate inlet ghost + interior + outlet ghost into the padded
    /// buffers. Pure copy into pre-sized storage.
    ///
    /// Precondition: the ghost states are current. Afterwards, and until
    /// the next state mutation, segment `i` of each full buffer matches
    /// its source container column-for-column.
    pub fn fill_sol_full(&mut self) {
        let n = self.num_cells();
        self.sol_prim_full
            .as_mut()
            .subcols_mut(0, 1)
            .copy_from(self.sol_inlet.state.sol_prim.as_ref());
        self.sol_prim_full
            .as_mut()
            .subcols_mut(1, n)
            .copy_from(self.sol_int.state.sol_prim.as_ref());
        self.sol_prim_full
            .as_mut()
            .subcols_mut(1 + n, 1)
            .copy_from(self.sol_outlet.state.sol_prim.as_ref());

        self.sol_cons_full
            .as_mut()
            .subcols_mut(0, 1)
            .copy_from(self.sol_inlet.state.sol_cons.as_ref());
        self.sol_cons_full
            .as_mut()
            .subcols_mut(1, n)
            .copy_from(self.sol_int.state.sol_cons.as_ref());
        self.sol_cons_full
            .as_mut()
            .subcols_mut(1 + n, 1)
            .copy_from(self.sol_outlet.state.sol_cons.as_ref());
    }

    /// Resynchronize one interior representation from the other.
    pub fn update_interior_state(&mut self, from_cons: bool) -> Result<(), NumericsError> {
        self.sol_int.update_state(self.gas.as_ref(), from_cons)
    }

    /// Total mass in the domain, `sum(rho dx)`. Diagnostic.
    pub fn total_mass(&self) -> f64 {
        let dx = self.mesh.dx();
        (0..self.num_cells())
            .map(|j| self.sol_int.state.sol_cons[(0, j)] * dx)
            .sum()
    }
}
