//! End-to-end advancement tests: explicit and implicit runs, the
//! reduced-order update, and the failure path.

use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;
use faer::sparse::SparseColMat;

use reflow::{
    read_probe_file, read_restart_file, BoundaryCond, CaloricallyPerfectGas, DirectUpdate, Driver,
    FiniteDiffJacobian, GasModel, Mesh, NumericsError, ProbeVar, ResJacobian, RomLinearUpdate,
    RunConfig, RusanovScheme, SimError, SolutionDomain, SpatialScheme, StateUpdateStrategy,
    TimeIntegrator, TimeScheme,
};

const PRIM: [f64; 3] = [101_325.0, 25.0, 300.0];

fn inert_gas() -> Rc<CaloricallyPerfectGas> {
    Rc::new(CaloricallyPerfectGas::single(28.97, 1005.0).unwrap())
}

/// Uniform flow with boundary conditions consistent with the interior
/// state, so the exact solution is steady.
fn uniform_domain(gas: Rc<CaloricallyPerfectGas>, num_cells: usize, hist_depth: usize) -> SolutionDomain {
    let rho = gas.density(PRIM[0], PRIM[2], &[]);
    SolutionDomain::new(
        gas,
        Mesh::from_cells(0.0, 1.0, num_cells).unwrap(),
        reflow::uniform_prim(&PRIM, num_cells),
        BoundaryCond::FixedMassFlow {
            mass_flux: rho * PRIM[1],
            temp: PRIM[2],
            mass_fracs: vec![],
        },
        BoundaryCond::FixedPressure { press: PRIM[0] },
        hist_depth,
    )
    .unwrap()
}

#[test]
fn explicit_run_keeps_mass_and_writes_probes() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::explicit_euler(1e-5).unwrap();
    let domain = uniform_domain(gas, 10, 2);
    let mass0 = domain.total_mass();

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 10)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(5, dir.path()),
        &[0.5],
        vec![ProbeVar::Pressure, ProbeVar::Temperature],
    )
    .unwrap();

    driver.run().unwrap();
    assert!(!driver.solve_failed());
    assert_eq!(driver.completed_iters(), 5);

    let sol = &driver.domain.sol_int.state;
    for j in 0..10 {
        for e in 0..3 {
            assert!(sol.sol_cons[(e, j)].is_finite());
        }
    }
    let drift = (driver.domain.total_mass() - mass0).abs() / mass0;
    assert!(drift <= 1e-10, "relative mass drift {drift}");

    let probe = read_probe_file(&dir.path().join("probe_pressure_temperature_1_fom.bin")).unwrap();
    assert_eq!(probe.data.nrows(), 3);
    assert_eq!(probe.data.ncols(), 5);
    for s in 0..5 {
        assert_relative_eq!(probe.data[(0, s)], 1e-5 * (s + 1) as f64, max_relative = 1e-12);
        assert_relative_eq!(probe.data[(1, s)], PRIM[0], max_relative = 1e-6);
    }
}

#[test]
fn implicit_run_stays_on_steady_state() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::new(
        TimeScheme::Bdf {
            order: 2,
            dual_time: false,
        },
        1e-5,
        10,
        1e-8,
    )
    .unwrap();
    let domain = uniform_domain(gas, 8, integrator.hist_depth());

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 8)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(3, dir.path()),
        &[],
        vec![],
    )
    .unwrap();

    driver.run().unwrap();
    let sol = &driver.domain.sol_int.state;
    for j in 0..8 {
        assert_relative_eq!(sol.sol_prim[(0, j)], PRIM[0], max_relative = 1e-6);
        assert_relative_eq!(sol.sol_prim[(1, j)], PRIM[1], max_relative = 1e-4);
        assert_relative_eq!(sol.sol_prim[(2, j)], PRIM[2], max_relative = 1e-6);
    }
}

#[test]
fn dual_time_solves_for_primitives() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::new(
        TimeScheme::Bdf {
            order: 1,
            dual_time: true,
        },
        1e-5,
        5,
        1e-8,
    )
    .unwrap();
    let domain = uniform_domain(gas, 6, integrator.hist_depth());

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 6)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(2, dir.path()),
        &[],
        vec![],
    )
    .unwrap();

    driver.run().unwrap();
    let sol = &driver.domain.sol_int.state;
    for j in 0..6 {
        assert_relative_eq!(sol.sol_prim[(0, j)], PRIM[0], max_relative = 1e-5);
        assert!(sol.sol_prim[(2, j)].is_finite());
    }
}

/// Writes a prescribed residual norm per sub-iteration and counts calls;
/// exercises the early-break logic without any physics.
struct SyntheticResidual {
    norms: Vec<f64>,
    calls: Rc<Cell<usize>>,
}

impl StateUpdateStrategy for SyntheticResidual {
    fn advance_subiter(
        &mut self,
        domain: &mut SolutionDomain,
        _integrator: &TimeIntegrator,
        _scheme: &mut dyn SpatialScheme,
        _jacobian: &dyn ResJacobian,
        subiter: usize,
    ) -> Result<(), NumericsError> {
        self.calls.set(self.calls.get() + 1);
        let v = self.norms[subiter];
        for j in 0..domain.num_cells() {
            for e in 0..domain.num_eqs() {
                domain.sol_int.res[(e, j)] = v;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "synthetic-residual"
    }
}

#[test]
fn implicit_iteration_breaks_once_residual_converges() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::new(
        TimeScheme::Bdf {
            order: 1,
            dual_time: false,
        },
        1e-4,
        5,
        5e-4,
    )
    .unwrap();
    let domain = uniform_domain(gas, 4, integrator.hist_depth());

    let calls = Rc::new(Cell::new(0));
    let strategy = SyntheticResidual {
        // drops below the 5e-4 tolerance at the third sub-iteration
        norms: vec![1e-1, 1e-2, 1e-4, 1e-5, 1e-6],
        calls: Rc::clone(&calls),
    };

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 4)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(strategy),
        RunConfig::new(1, dir.path()),
        &[],
        vec![],
    )
    .unwrap();

    driver.advance_iter().unwrap();
    assert_eq!(calls.get(), 3);
}

/// Delegates to the finite-difference assembler for a few iterations and
/// then hands out a numerically singular matrix.
struct EventuallySingular {
    healthy_iters: usize,
    calls: Cell<usize>,
    inner: FiniteDiffJacobian,
}

impl ResJacobian for EventuallySingular {
    fn assemble(
        &self,
        domain: &mut SolutionDomain,
        scheme: &mut dyn SpatialScheme,
        integrator: &TimeIntegrator,
    ) -> Result<SparseColMat<usize, f64>, NumericsError> {
        self.calls.set(self.calls.get() + 1);
        if self.calls.get() <= self.healthy_iters {
            return self.inner.assemble(domain, scheme, integrator);
        }
        let ndof = domain.num_eqs() * domain.num_cells();
        let trips: Vec<(usize, usize, f64)> = (0..ndof).map(|i| (i, i, 0.0)).collect();
        Ok(SparseColMat::try_new_from_triplets(ndof, ndof, &trips).unwrap())
    }
}

#[test]
fn singular_jacobian_fails_run_but_flushes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::new(
        TimeScheme::Bdf {
            order: 1,
            dual_time: false,
        },
        1e-5,
        1,
        1e-12,
    )
    .unwrap();
    let domain = uniform_domain(gas, 6, integrator.hist_depth());

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 6)),
        Box::new(EventuallySingular {
            healthy_iters: 2,
            calls: Cell::new(0),
            inner: FiniteDiffJacobian::new(),
        }),
        Box::new(DirectUpdate),
        RunConfig::new(5, dir.path()),
        &[0.5],
        vec![ProbeVar::Density],
    )
    .unwrap();

    let err = driver.run().unwrap_err();
    assert!(matches!(err, SimError::Numerics(_)));
    assert!(driver.solve_failed());
    assert_eq!(driver.completed_iters(), 2);

    // partial probe data still lands on disk, marked as failed
    let probe = read_probe_file(&dir.path().join("probe_density_1_fom_FAILED.bin")).unwrap();
    assert_eq!(probe.data.ncols(), 2);
    assert!(dir.path().join("sol_prim_fom_FAILED.bin").exists());
}

#[test]
fn restart_files_resume_the_interior_state() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::explicit_euler(1e-5).unwrap();
    let domain = uniform_domain(gas, 6, 2);

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 6)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(4, dir.path()).with_restarts(2),
        &[],
        vec![],
    )
    .unwrap();
    driver.run().unwrap();

    let restart = read_restart_file(&dir.path().join("restart_4.bin")).unwrap();
    assert_eq!(restart.iter, 4);
    assert_relative_eq!(restart.time, 4e-5, max_relative = 1e-12);
    assert_eq!(restart.sol_prim, driver.domain.sol_int.state.sol_prim);
    assert_eq!(restart.sol_cons, driver.domain.sol_int.state.sol_cons);
}

#[test]
fn steady_run_terminates_once_solution_stops_changing() {
    let dir = tempfile::tempdir().unwrap();
    let gas = inert_gas();
    let integrator = TimeIntegrator::explicit_euler(1e-5).unwrap();
    let domain = uniform_domain(gas, 6, 2);

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(RusanovScheme::new(3, 6)),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(50, dir.path()).with_steady(1e-3),
        &[],
        vec![],
    )
    .unwrap();

    driver.run().unwrap();
    // the uniform state never moves, so the change norm converges at once
    assert!(driver.completed_iters() < 50);
    assert!(dir.path().join("convergence_fom.dat").exists());
    assert!(dir.path().join("sol_prim_steady_fom.bin").exists());
}

#[test]
fn full_rank_rom_matches_direct_update() {
    let gas = inert_gas();
    let num_cells = 6;
    let ndof = 3 * num_cells;

    let run = |strategy_kind: &str| -> faer::Mat<f64> {
        let dir = tempfile::tempdir().unwrap();
        let integrator = TimeIntegrator::explicit_euler(1e-5).unwrap();
        let domain = uniform_domain(Rc::clone(&gas), num_cells, 2);
        let strategy: Box<dyn StateUpdateStrategy> = match strategy_kind {
            "direct" => Box::new(DirectUpdate),
            _ => {
                let basis =
                    faer::Mat::from_fn(ndof, ndof, |i, j| if i == j { 1.0 } else { 0.0 });
                let ones = faer::Mat::from_fn(3, num_cells, |_, _| 1.0);
                Box::new(
                    RomLinearUpdate::new(basis, ones.clone(), ones, &domain, &integrator)
                        .unwrap(),
                )
            }
        };
        let mut driver = Driver::new(
            domain,
            integrator,
            Box::new(RusanovScheme::new(3, num_cells)),
            Box::new(FiniteDiffJacobian::new()),
            strategy,
            RunConfig::new(3, dir.path()),
            &[],
            vec![],
        )
        .unwrap();
        driver.run().unwrap();
        driver.domain.sol_int.state.sol_cons.clone()
    };

    let direct = run("direct");
    let rom = run("rom");
    for j in 0..num_cells {
        for e in 0..3 {
            assert_relative_eq!(rom[(e, j)], direct[(e, j)], max_relative = 1e-12);
        }
    }
}
