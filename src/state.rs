use faer::Mat;

use crate::error::NumericsError;
use crate::gas::GasModel;

/// A primitive/conservative state pair over a contiguous run of cells,
/// shaped `[num_eqs x num_cells]` with one column per cell.
///
/// Both interior and ghost-cell containers are built from this; only the
/// cell count differs.
#[derive(Debug, Clone)]
pub struct SolutionState {
    pub sol_prim: Mat<f64>,
    pub sol_cons: Mat<f64>,
}

impl SolutionState {
    /// Build from a primitive field; the conservative side is derived.
    pub fn from_prim(gas: &dyn GasModel, sol_prim: Mat<f64>) -> Self {
        let mut sol_cons = Mat::zeros(sol_prim.nrows(), sol_prim.ncols());
        for j in 0..sol_prim.ncols() {
            gas.cons_from_prim(sol_prim.col_as_slice(j), sol_cons.col_as_slice_mut(j));
        }
        Self { sol_prim, sol_cons }
    }

    pub fn num_eqs(&self) -> usize {
        self.sol_prim.nrows()
    }

    pub fn num_cells(&self) -> usize {
        self.sol_prim.ncols()
    }

    /// Recompute one representation from the other.
    ///
    /// `from_cons = true` treats the conservative arrays as the source of
    /// truth and inverts them through the gas model, which can fail on
    /// non-physical states; the opposite direction is total.
    pub fn update_state(&mut self, gas: &dyn GasModel, from_cons: bool) -> Result<(), NumericsError> {
        for j in 0..self.sol_prim.ncols() {
            if from_cons {
                gas.prim_from_cons(
                    j,
                    self.sol_cons.col_as_slice(j),
                    self.sol_prim.col_as_slice_mut(j),
                )?;
            } else {
                gas.cons_from_prim(
                    self.sol_prim.col_as_slice(j),
                    self.sol_cons.col_as_slice_mut(j),
                );
            }
        }
        Ok(())
    }

    /// Derived mass fraction of the last species in a cell.
    pub fn last_mass_frac(&self, cell: usize) -> f64 {
        let mut y_sum = 0.0;
        for k in 3..self.sol_prim.nrows() {
            y_sum += self.sol_prim[(k, cell)];
        }
        1.0 - y_sum
    }
}

/// Replicate one primitive cell state across `num_cells` columns.
pub fn uniform_prim(prim: &[f64], num_cells: usize) -> Mat<f64> {
    Mat::from_fn(prim.len(), num_cells, |i, _| prim[i])
}
