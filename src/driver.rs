use std::fmt;
use std::path::PathBuf;

use crate::domain::SolutionDomain;
use crate::error::{ConfigError, NumericsError, SimError};
use crate::integrator::{TimeIntegrator, TimeType};
use crate::jacobian::ResJacobian;
use crate::output::{Recorder, RecorderConfig};
use crate::probe::ProbeVar;
use crate::scheme::SpatialScheme;
use crate::strategy::StateUpdateStrategy;

/// Run-wide settings, passed explicitly instead of living as mutable
/// fields on a shared solver context.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub num_steps: usize,
    pub out_interval: usize,
    pub restart_interval: usize,
    pub save_restarts: bool,
    pub run_steady: bool,
    pub steady_tol: f64,
    pub out_dir: PathBuf,
    pub sim_label: String,
    /// Absolute iteration offset when resuming from a restart file.
    pub start_iter: usize,
}

impl RunConfig {
    pub fn new(num_steps: usize, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            num_steps,
            out_interval: 1,
            restart_interval: 100,
            save_restarts: false,
            run_steady: false,
            steady_tol: 1e-8,
            out_dir: out_dir.into(),
            sim_label: "fom".into(),
            start_iter: 0,
        }
    }

    pub fn with_out_interval(mut self, out_interval: usize) -> Self {
        self.out_interval = out_interval;
        self
    }

    pub fn with_restarts(mut self, restart_interval: usize) -> Self {
        self.save_restarts = true;
        self.restart_interval = restart_interval;
        self
    }

    pub fn with_steady(mut self, steady_tol: f64) -> Self {
        self.run_steady = true;
        self.steady_tol = steady_tol;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.sim_label = label.into();
        self
    }

    pub fn with_start_iter(mut self, start_iter: usize) -> Self {
        self.start_iter = start_iter;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_steps == 0 {
            return Err(ConfigError::NoSteps);
        }
        if self.run_steady && !(self.steady_tol > 0.0) {
            return Err(ConfigError::NonPositiveParam {
                name: "steady_tol",
                value: self.steady_tol,
            });
        }
        Ok(())
    }
}

/// Orchestrates the advancement loop: ghost-cell refresh, full-domain
/// assembly, tendency evaluation, the state update, convergence checks,
/// history and recording, in that order, every sub-iteration.
pub struct Driver {
    pub domain: SolutionDomain,
    pub integrator: TimeIntegrator,
    scheme: Box<dyn SpatialScheme>,
    jacobian: Box<dyn ResJacobian>,
    strategy: Box<dyn StateUpdateStrategy>,
    pub recorder: Recorder,
    config: RunConfig,
    iter: usize,
    completed_iters: usize,
    solve_failed: bool,
}

impl Driver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: SolutionDomain,
        integrator: TimeIntegrator,
        scheme: Box<dyn SpatialScheme>,
        jacobian: Box<dyn ResJacobian>,
        strategy: Box<dyn StateUpdateStrategy>,
        config: RunConfig,
        probe_locs: &[f64],
        probe_vars: Vec<ProbeVar>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let recorder = Recorder::new(
            &domain,
            RecorderConfig {
                out_dir: config.out_dir.clone(),
                sim_label: config.sim_label.clone(),
                num_steps: config.num_steps,
                dt: integrator.dt(),
                start_iter: config.start_iter,
                out_interval: config.out_interval,
                restart_interval: config.restart_interval,
                save_restarts: config.save_restarts,
                run_steady: config.run_steady,
                steady_tol: config.steady_tol,
            },
            probe_locs,
            probe_vars,
        )?;
        Ok(Self {
            domain,
            integrator,
            scheme,
            jacobian,
            strategy,
            recorder,
            config,
            iter: 0,
            completed_iters: 0,
            solve_failed: false,
        })
    }

    pub fn solve_failed(&self) -> bool {
        self.solve_failed
    }

    pub fn completed_iters(&self) -> usize {
        self.completed_iters
    }

    /// Advance the full run. A numerical failure stops the loop, flushes
    /// everything recorded up to the last completed iteration under a
    /// failure marker, and then propagates.
    pub fn run(&mut self) -> Result<(), SimError> {
        tracing::info!(
            steps = self.config.num_steps,
            dt = self.integrator.dt(),
            cells = self.domain.num_cells(),
            scheme = self.scheme.name(),
            strategy = self.strategy.name(),
            "starting solution advancement"
        );

        let mut failure: Option<NumericsError> = None;
        for i in 1..=self.config.num_steps {
            self.iter = i;
            self.integrator.begin_iter(self.config.start_iter + i);

            if let Err(e) = self.advance_iter() {
                tracing::error!(iter = i, error = %e, "numerical failure, aborting run");
                self.solve_failed = true;
                failure = Some(e);
                break;
            }
            self.completed_iters = i;

            self.recorder.write_iter_outputs(&self.domain, i)?;
            if self.config.run_steady && self.recorder.write_steady_outputs(&self.domain, i)? {
                tracing::info!(iter = i, "steady solution criterion met, terminating run");
                break;
            }
        }

        self.recorder
            .write_final_outputs(&self.domain, self.completed_iters, self.solve_failed)?;

        match failure {
            Some(e) => Err(e.into()),
            None => {
                tracing::info!(iters = self.completed_iters, "finished solution advancement");
                Ok(())
            }
        }
    }

    /// One physical time iteration: up to `subiter_max` sub-iterations,
    /// with an early break once the implicit residual norm meets the
    /// tolerance, then the history shift.
    pub fn advance_iter(&mut self) -> Result<(), NumericsError> {
        if !self.config.run_steady {
            tracing::debug!(iter = self.iter, "advancing iteration");
        }

        let implicit = self.integrator.time_type() == TimeType::Implicit;
        let mut converged = false;
        for subiter in 0..self.integrator.subiter_max() {
            self.advance_subiter(subiter)?;

            if implicit {
                self.domain.sol_int.calc_res_norms(subiter);
                if self.domain.sol_int.res_norm_l2 < self.integrator.res_tol() {
                    converged = true;
                    break;
                }
            }
        }
        if implicit && !converged {
            // not fatal: proceed with the last computed state
            tracing::warn!(
                iter = self.iter,
                res_l2 = self.domain.sol_int.res_norm_l2,
                "sub-iterations exhausted before reaching the residual tolerance"
            );
        }

        if self.config.run_steady {
            self.domain
                .sol_int
                .calc_d_sol_norms(self.integrator.time_type(), self.integrator.dt());
        }
        self.domain.sol_int.update_sol_hist();
        Ok(())
    }

    /// One sub-iteration with strict causal ordering: boundary refresh,
    /// full-domain assembly, tendency evaluation, then the state update.
    pub fn advance_subiter(&mut self, subiter: usize) -> Result<(), NumericsError> {
        self.domain.calc_boundary_cells()?;
        self.domain.fill_sol_full();
        self.scheme.calc_rhs(&mut self.domain)?;
        self.strategy.advance_subiter(
            &mut self.domain,
            &self.integrator,
            self.scheme.as_mut(),
            self.jacobian.as_ref(),
            subiter,
        )
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells, dt={:e} ({} steps), `{}` scheme, `{}` update ({})",
            self.domain.num_cells(),
            self.integrator.dt(),
            self.config.num_steps,
            self.scheme.name(),
            self.strategy.name(),
            match self.integrator.time_type() {
                TimeType::Explicit => "explicit",
                TimeType::Implicit => "implicit",
            }
        )
    }
}
