use faer::sparse::SparseColMat;

use crate::domain::SolutionDomain;
use crate::error::NumericsError;
use crate::integrator::TimeIntegrator;
use crate::scheme::SpatialScheme;

/// Assembles the sparse Jacobian of the implicit residual with respect
/// to the solve variables: primitive when dual-time stepping is active,
/// conservative otherwise. Row/column ordering is equation-major,
/// matching the flattened residual vector.
pub trait ResJacobian {
    fn assemble(
        &self,
        domain: &mut SolutionDomain,
        scheme: &mut dyn SpatialScheme,
        integrator: &TimeIntegrator,
    ) -> Result<SparseColMat<usize, f64>, NumericsError>;
}

/// Finite-difference assembly colored by cell stride.
///
/// All cells with the same index modulo the coloring stride are perturbed
/// together, so one assembly costs `num_eqs * (2 * stencil + 1)` residual
/// evaluations regardless of mesh size. The stencil radius must cover the
/// spatial scheme's support; the default suits three-point schemes.
pub struct FiniteDiffJacobian {
    eps: f64,
    stencil: usize,
}

impl FiniteDiffJacobian {
    pub fn new() -> Self {
        Self {
            // sqrt of machine epsilon, scaled per entry by magnitude
            eps: 1.49e-8,
            stencil: 1,
        }
    }

    pub fn with_stencil(mut self, stencil: usize) -> Self {
        self.stencil = stencil;
        self
    }

    fn residual(
        domain: &mut SolutionDomain,
        scheme: &mut dyn SpatialScheme,
        integrator: &TimeIntegrator,
    ) -> Result<faer::Mat<f64>, NumericsError> {
        domain.calc_boundary_cells()?;
        domain.fill_sol_full();
        scheme.calc_rhs(domain)?;
        Ok(integrator.calc_residual(
            &domain.sol_int.state.sol_cons,
            &domain.sol_int.sol_hist_cons,
            &domain.sol_int.rhs,
        ))
    }
}

impl Default for FiniteDiffJacobian {
    fn default() -> Self {
        Self::new()
    }
}

impl ResJacobian for FiniteDiffJacobian {
    fn assemble(
        &self,
        domain: &mut SolutionDomain,
        scheme: &mut dyn SpatialScheme,
        integrator: &TimeIntegrator,
    ) -> Result<SparseColMat<usize, f64>, NumericsError> {
        let num_eqs = domain.num_eqs();
        let num_cells = domain.num_cells();
        let ndof = num_eqs * num_cells;
        let dual = integrator.dual_time();

        let res_base = Self::residual(domain, scheme, integrator)?;
        let prim0 = domain.sol_int.state.sol_prim.clone();
        let cons0 = domain.sol_int.state.sol_cons.clone();
        let rhs0 = domain.sol_int.rhs.clone();
        let source0 = domain.sol_int.source.clone();

        let colors = 2 * self.stencil + 1;
        let mut eps_used = vec![0.0; num_cells];
        let mut trips: Vec<(usize, usize, f64)> =
            Vec::with_capacity(ndof * num_eqs * colors.min(num_cells));

        for var in 0..num_eqs {
            for color in 0..colors.min(num_cells) {
                for j in (color..num_cells).step_by(colors) {
                    let q = if dual { prim0[(var, j)] } else { cons0[(var, j)] };
                    let h = self.eps * (1.0 + q.abs());
                    eps_used[j] = h;
                    if dual {
                        domain.sol_int.state.sol_prim[(var, j)] = q + h;
                    } else {
                        domain.sol_int.state.sol_cons[(var, j)] = q + h;
                    }
                }
                // resync the untouched representation from the perturbed one
                domain.update_interior_state(!dual)?;

                let res_pert = Self::residual(domain, scheme, integrator)?;

                for j in (color..num_cells).step_by(colors) {
                    let h = eps_used[j];
                    let lo = j.saturating_sub(self.stencil);
                    let hi = (j + self.stencil).min(num_cells - 1);
                    for cell in lo..=hi {
                        for e in 0..num_eqs {
                            // solving J dq = res with J = -d(res)/dq
                            let d = -(res_pert[(e, cell)] - res_base[(e, cell)]) / h;
                            if d != 0.0 {
                                trips.push((e * num_cells + cell, var * num_cells + j, d));
                            }
                        }
                    }
                }

                domain.sol_int.state.sol_prim.clone_from(&prim0);
                domain.sol_int.state.sol_cons.clone_from(&cons0);
            }
        }

        // leave the domain exactly as found
        domain.sol_int.rhs.clone_from(&rhs0);
        domain.sol_int.source.clone_from(&source0);
        domain.calc_boundary_cells()?;
        domain.fill_sol_full();

        SparseColMat::try_new_from_triplets(ndof, ndof, &trips)
            .map_err(|_| NumericsError::JacobianAssembly)
    }
}
