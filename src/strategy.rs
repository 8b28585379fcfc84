use faer::prelude::*;
use faer::Mat;

use crate::domain::SolutionDomain;
use crate::error::{ConfigError, NumericsError};
use crate::faer_add::{all_finite, flatten_eq_major, sp_matvec};
use crate::integrator::{TimeIntegrator, TimeType};
use crate::jacobian::ResJacobian;
use crate::scheme::SpatialScheme;

/// Supplies the state increment of one sub-iteration, after the driver
/// has refreshed the ghost cells, rebuilt the padded buffers and
/// evaluated the tendency.
///
/// The full-order update and the reduced-order projections implement the
/// same contract, keeping the driver agnostic to where increments come
/// from.
pub trait StateUpdateStrategy {
    fn advance_subiter(
        &mut self,
        domain: &mut SolutionDomain,
        integrator: &TimeIntegrator,
        scheme: &mut dyn SpatialScheme,
        jacobian: &dyn ResJacobian,
        subiter: usize,
    ) -> Result<(), NumericsError>;

    fn name(&self) -> &'static str;
}

/// Full-order update: implicit Newton correction through the sparse
/// Jacobian, or the explicit stage rule.
#[derive(Default)]
pub struct DirectUpdate;

impl StateUpdateStrategy for DirectUpdate {
    fn advance_subiter(
        &mut self,
        domain: &mut SolutionDomain,
        integrator: &TimeIntegrator,
        scheme: &mut dyn SpatialScheme,
        jacobian: &dyn ResJacobian,
        subiter: usize,
    ) -> Result<(), NumericsError> {
        let num_eqs = domain.num_eqs();
        let num_cells = domain.num_cells();

        match integrator.time_type() {
            TimeType::Implicit => {
                let res = integrator.calc_residual(
                    &domain.sol_int.state.sol_cons,
                    &domain.sol_int.sol_hist_cons,
                    &domain.sol_int.rhs,
                );
                let res_jacob = jacobian.assemble(domain, scheme, integrator)?;

                let res_vec = flatten_eq_major(res.as_ref());
                let lu = res_jacob
                    .as_ref()
                    .sp_lu()
                    .map_err(|_| NumericsError::SingularJacobian)?;
                let d_sol = lu.solve(&res_vec);
                if !all_finite(d_sol.as_ref()) {
                    return Err(NumericsError::NonFiniteSolution);
                }

                // dual time solves for the primitive state
                let dual = integrator.dual_time();
                {
                    let target = if dual {
                        &mut domain.sol_int.state.sol_prim
                    } else {
                        &mut domain.sol_int.state.sol_cons
                    };
                    for e in 0..num_eqs {
                        for j in 0..num_cells {
                            target[(e, j)] += d_sol[(e * num_cells + j, 0)];
                        }
                    }
                }
                domain.update_interior_state(!dual)?;
                domain.sol_int.overwrite_hist_slot0();

                // store the linear-solve residual J dq - res for the
                // convergence check, in place of the physical residual
                let lin = sp_matvec(res_jacob.as_ref(), d_sol.as_ref());
                for e in 0..num_eqs {
                    for j in 0..num_cells {
                        let k = e * num_cells + j;
                        domain.sol_int.res[(e, j)] = lin[(k, 0)] - res_vec[(k, 0)];
                    }
                }
            }
            TimeType::Explicit => {
                let d_sol = integrator.solve_sol_change(&domain.sol_int.rhs, subiter);
                let sol_int = &mut domain.sol_int;
                let base = &sol_int.sol_hist_cons[0];
                for e in 0..num_eqs {
                    for j in 0..num_cells {
                        sol_int.state.sol_cons[(e, j)] = base[(e, j)] + d_sol[(e, j)];
                    }
                }
                domain.update_interior_state(true)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Linear-subspace update: the explicit increment is projected onto an
/// orthonormal basis before being applied, so the trajectory stays in
/// the affine subspace `center + span(basis)` (up to normalization).
#[derive(Debug)]
pub struct RomLinearUpdate {
    /// Orthonormal trial basis, `[num_eqs * num_cells x latent_dim]`.
    basis: Mat<f64>,
    center: Mat<f64>,
    norm_fac: Mat<f64>,
}

impl RomLinearUpdate {
    pub fn new(
        basis: Mat<f64>,
        center: Mat<f64>,
        norm_fac: Mat<f64>,
        domain: &SolutionDomain,
        integrator: &TimeIntegrator,
    ) -> Result<Self, ConfigError> {
        if integrator.time_type() != TimeType::Explicit {
            return Err(ConfigError::RomRequiresExplicit);
        }
        let num_eqs = domain.num_eqs();
        let num_cells = domain.num_cells();
        let ndof = num_eqs * num_cells;
        if basis.nrows() != ndof || basis.ncols() == 0 || basis.ncols() > ndof {
            return Err(ConfigError::BadBasisShape {
                rows: basis.nrows(),
                cols: basis.ncols(),
                want_rows: ndof,
            });
        }
        for m in [&center, &norm_fac] {
            if m.nrows() != num_eqs || m.ncols() != num_cells {
                return Err(ConfigError::ShapeMismatch {
                    got_rows: m.nrows(),
                    got_cols: m.ncols(),
                    want_rows: num_eqs,
                    want_cols: num_cells,
                });
            }
        }
        for j in 0..num_cells {
            for v in norm_fac.col_as_slice(j) {
                if *v == 0.0 || !v.is_finite() {
                    return Err(ConfigError::NonPositiveParam {
                        name: "norm_fac",
                        value: *v,
                    });
                }
            }
        }
        Ok(Self {
            basis,
            center,
            norm_fac,
        })
    }

    /// Project the conservative increment `d_sol` through the basis.
    fn project(&self, d_sol: &Mat<f64>) -> Mat<f64> {
        let (num_eqs, num_cells) = (d_sol.nrows(), d_sol.ncols());
        let scaled = Mat::from_fn(num_eqs * num_cells, 1, |k, _| {
            let (e, j) = (k / num_cells, k % num_cells);
            d_sol[(e, j)] / self.norm_fac[(e, j)]
        });
        let code = self.basis.as_ref().transpose() * scaled.as_ref();
        self.basis.as_ref() * code.as_ref()
    }

    /// Snap the current conservative state onto the affine subspace.
    /// Typically called once before the run when the initial condition
    /// was not generated from the basis.
    pub fn project_state(&self, domain: &mut SolutionDomain) -> Result<(), NumericsError> {
        let (num_eqs, num_cells) = (domain.num_eqs(), domain.num_cells());
        let centered = Mat::from_fn(num_eqs * num_cells, 1, |k, _| {
            let (e, j) = (k / num_cells, k % num_cells);
            (domain.sol_int.state.sol_cons[(e, j)] - self.center[(e, j)]) / self.norm_fac[(e, j)]
        });
        let code = self.basis.as_ref().transpose() * centered.as_ref();
        let recon = self.basis.as_ref() * code.as_ref();
        for e in 0..num_eqs {
            for j in 0..num_cells {
                domain.sol_int.state.sol_cons[(e, j)] =
                    self.center[(e, j)] + self.norm_fac[(e, j)] * recon[(e * num_cells + j, 0)];
            }
        }
        domain.update_interior_state(true)?;
        domain.sol_int.overwrite_hist_slot0();
        Ok(())
    }
}

impl StateUpdateStrategy for RomLinearUpdate {
    fn advance_subiter(
        &mut self,
        domain: &mut SolutionDomain,
        integrator: &TimeIntegrator,
        _scheme: &mut dyn SpatialScheme,
        _jacobian: &dyn ResJacobian,
        subiter: usize,
    ) -> Result<(), NumericsError> {
        if integrator.time_type() != TimeType::Explicit {
            return Err(NumericsError::Unsupported(
                "reduced-order update with an implicit integrator",
            ));
        }
        let d_sol = integrator.solve_sol_change(&domain.sol_int.rhs, subiter);
        let recon = self.project(&d_sol);
        if !all_finite(recon.as_ref()) {
            return Err(NumericsError::NonFinite { what: "projected increment" });
        }

        let (num_eqs, num_cells) = (domain.num_eqs(), domain.num_cells());
        let sol_int = &mut domain.sol_int;
        let base = &sol_int.sol_hist_cons[0];
        for e in 0..num_eqs {
            for j in 0..num_cells {
                sol_int.state.sol_cons[(e, j)] = base[(e, j)]
                    + self.norm_fac[(e, j)] * recon[(e * num_cells + j, 0)];
            }
        }
        domain.update_interior_state(true)
    }

    fn name(&self) -> &'static str {
        "rom-linear"
    }
}
