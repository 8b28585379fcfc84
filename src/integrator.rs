use faer::Mat;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeType {
    Explicit,
    Implicit,
}

/// Time-integration scheme selection.
#[derive(Debug, Clone, Copy)]
pub enum TimeScheme {
    /// Low-storage Runge-Kutta: stage `s` of `S` applies
    /// `dq = dt / (S - s) * rhs` on top of the iteration's base state.
    /// One stage is forward Euler.
    ExplicitRk { stages: usize },
    /// Backward differentiation of the given order. `dual_time` switches
    /// the implicit solve (and its Jacobian) to primitive variables.
    Bdf { order: usize, dual_time: bool },
}

/// Owns the step size, sub-iteration bounds and the residual formula of
/// the selected scheme.
pub struct TimeIntegrator {
    dt: f64,
    scheme: TimeScheme,
    subiter_max: usize,
    res_tol: f64,
    /// Effective BDF order; ramps up from 1 over the first iterations so
    /// that multi-step history is never consumed before it exists.
    active_order: usize,
}

impl TimeIntegrator {
    pub fn new(
        scheme: TimeScheme,
        dt: f64,
        subiter_max: usize,
        res_tol: f64,
    ) -> Result<Self, ConfigError> {
        if !(dt > 0.0) {
            return Err(ConfigError::NonPositiveParam {
                name: "dt",
                value: dt,
            });
        }
        match scheme {
            TimeScheme::ExplicitRk { stages } => {
                if stages == 0 {
                    return Err(ConfigError::NoStages);
                }
            }
            TimeScheme::Bdf { order, .. } => {
                if !(1..=2).contains(&order) {
                    return Err(ConfigError::UnsupportedTimeOrder(order));
                }
                if subiter_max == 0 {
                    return Err(ConfigError::ZeroInterval {
                        name: "subiter_max",
                    });
                }
                if !(res_tol > 0.0) {
                    return Err(ConfigError::NonPositiveParam {
                        name: "res_tol",
                        value: res_tol,
                    });
                }
            }
        }
        Ok(Self {
            dt,
            scheme,
            subiter_max,
            res_tol,
            active_order: 1,
        })
    }

    /// Forward Euler with a single sub-iteration; the simplest valid setup.
    pub fn explicit_euler(dt: f64) -> Result<Self, ConfigError> {
        Self::new(TimeScheme::ExplicitRk { stages: 1 }, dt, 1, 1.0)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time_type(&self) -> TimeType {
        match self.scheme {
            TimeScheme::ExplicitRk { .. } => TimeType::Explicit,
            TimeScheme::Bdf { .. } => TimeType::Implicit,
        }
    }

    pub fn dual_time(&self) -> bool {
        matches!(self.scheme, TimeScheme::Bdf { dual_time: true, .. })
    }

    /// Sub-iterations per physical step: RK stages when explicit, the
    /// configured cap when implicit.
    pub fn subiter_max(&self) -> usize {
        match self.scheme {
            TimeScheme::ExplicitRk { stages } => stages,
            TimeScheme::Bdf { .. } => self.subiter_max,
        }
    }

    pub fn res_tol(&self) -> f64 {
        self.res_tol
    }

    /// History slots the integrator consumes (current state included).
    pub fn hist_depth(&self) -> usize {
        match self.scheme {
            TimeScheme::ExplicitRk { .. } => 2,
            TimeScheme::Bdf { order, .. } => order + 1,
        }
    }

    /// Announce the 1-based absolute iteration about to run, ramping the
    /// BDF order while the history fills.
    pub fn begin_iter(&mut self, iter: usize) {
        if let TimeScheme::Bdf { order, .. } = self.scheme {
            self.active_order = order.min(iter.max(1));
        }
    }

    /// Implicit residual `rhs - d(cons)/dt`, with the time derivative
    /// discretized by the active BDF formula. `cons` is the newest
    /// (sub-iteration) state; `hist[1..]` are the prior physical steps.
    pub fn calc_residual(&self, cons: &Mat<f64>, hist: &[Mat<f64>], rhs: &Mat<f64>) -> Mat<f64> {
        let dt = self.dt;
        match self.active_order {
            1 => Mat::from_fn(rhs.nrows(), rhs.ncols(), |e, i| {
                rhs[(e, i)] - (cons[(e, i)] - hist[1][(e, i)]) / dt
            }),
            _ => Mat::from_fn(rhs.nrows(), rhs.ncols(), |e, i| {
                rhs[(e, i)]
                    - (1.5 * cons[(e, i)] - 2.0 * hist[1][(e, i)] + 0.5 * hist[2][(e, i)]) / dt
            }),
        }
    }

    /// Explicit stage increment from the tendency.
    pub fn solve_sol_change(&self, rhs: &Mat<f64>, subiter: usize) -> Mat<f64> {
        let stages = self.subiter_max();
        debug_assert!(subiter < stages);
        let coeff = self.dt / (stages - subiter) as f64;
        Mat::from_fn(rhs.nrows(), rhs.ncols(), |e, i| coeff * rhs[(e, i)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn construction_validation() {
        assert!(TimeIntegrator::explicit_euler(0.0).is_err());
        assert!(TimeIntegrator::new(TimeScheme::ExplicitRk { stages: 0 }, 1e-3, 1, 1.0).is_err());
        assert!(TimeIntegrator::new(
            TimeScheme::Bdf { order: 3, dual_time: false },
            1e-3,
            10,
            1e-8,
        )
        .is_err());
        assert!(TimeIntegrator::new(
            TimeScheme::Bdf { order: 2, dual_time: false },
            1e-3,
            10,
            -1.0,
        )
        .is_err());
    }

    #[test]
    fn bdf_order_ramps_from_one() {
        let mut ti = TimeIntegrator::new(
            TimeScheme::Bdf { order: 2, dual_time: false },
            0.5,
            10,
            1e-8,
        )
        .unwrap();
        assert_eq!(ti.hist_depth(), 3);

        let cons = Mat::from_fn(1, 1, |_, _| 3.0);
        let hist = vec![
            Mat::from_fn(1, 1, |_, _| 3.0),
            Mat::from_fn(1, 1, |_, _| 2.0),
            Mat::from_fn(1, 1, |_, _| 1.0),
        ];
        let rhs = Mat::zeros(1, 1);

        ti.begin_iter(1);
        let res = ti.calc_residual(&cons, &hist, &rhs);
        assert_relative_eq!(res[(0, 0)], -(3.0 - 2.0) / 0.5);

        ti.begin_iter(2);
        let res = ti.calc_residual(&cons, &hist, &rhs);
        assert_relative_eq!(res[(0, 0)], -(1.5 * 3.0 - 2.0 * 2.0 + 0.5 * 1.0) / 0.5);
    }

    #[test]
    fn explicit_stage_coefficients() {
        let ti = TimeIntegrator::new(TimeScheme::ExplicitRk { stages: 4 }, 0.8, 1, 1.0).unwrap();
        let rhs = Mat::from_fn(2, 3, |_, _| 1.0);
        assert_relative_eq!(ti.solve_sol_change(&rhs, 0)[(0, 0)], 0.8 / 4.0);
        assert_relative_eq!(ti.solve_sol_change(&rhs, 3)[(1, 2)], 0.8);
    }
}
