use std::rc::Rc;

use faer::Mat;
use tracing::info;

use reflow::{
    BoundaryCond, CaloricallyPerfectGas, DirectUpdate, Driver, FiniteDiffJacobian, GasModel, Mesh,
    OneStepReaction, ProbeVar, RunConfig, RusanovScheme, SimError, SolutionDomain, SpeciesProps,
    TimeIntegrator, TimeScheme,
};

// Premixed reactant column ahead of a hot ignition kernel, fed by a
// fixed-mass-flow inlet against a fixed-pressure outlet.
fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt::init();

    info!("setting up gas model and mesh");

    let gas = Rc::new(CaloricallyPerfectGas::new(
        vec![
            SpeciesProps::new("reactant", 21.32, 1538.22, -7.441e6),
            SpeciesProps::new("product", 21.32, 1538.22, -1.086e7),
        ],
        298.15,
    )?);
    let mesh = Mesh::from_cells(0.0, 0.01, 256)?;
    let num_eqs = gas.num_eqs();
    let num_cells = mesh.num_cells();

    // cold reactants everywhere, a hot product kernel near the outlet
    let sol_prim_init = Mat::from_fn(num_eqs, num_cells, |e, j| {
        let x = (j as f64 + 0.5) / num_cells as f64;
        let burnt = x > 0.75;
        match e {
            0 => 1e6,
            1 => 10.0,
            2 => {
                if burnt {
                    2400.0
                } else {
                    300.0
                }
            }
            _ => {
                if burnt {
                    0.0
                } else {
                    1.0
                }
            }
        }
    });

    let rho_in = gas.density(1e6, 300.0, &[1.0]);
    let domain = SolutionDomain::new(
        gas,
        mesh,
        sol_prim_init,
        BoundaryCond::FixedMassFlow {
            mass_flux: rho_in * 10.0,
            temp: 300.0,
            mass_fracs: vec![1.0],
        },
        BoundaryCond::FixedPressure { press: 1e6 },
        2,
    )?;

    let integrator = TimeIntegrator::new(TimeScheme::ExplicitRk { stages: 4 }, 2.5e-9, 1, 1.0)?;
    let scheme = RusanovScheme::new(num_eqs, num_cells).with_reaction(OneStepReaction {
        pre_exp: 2.12e10,
        temp_act: 2.025e4,
        heat_release: 3.42e6,
    });

    let mut driver = Driver::new(
        domain,
        integrator,
        Box::new(scheme),
        Box::new(FiniteDiffJacobian::new()),
        Box::new(DirectUpdate),
        RunConfig::new(10_000, "output_flame_tube").with_out_interval(100),
        &[0.0025, 0.0075],
        vec![
            ProbeVar::Pressure,
            ProbeVar::Temperature,
            ProbeVar::Species(1),
        ],
    )?;

    info!("running: {driver}");
    driver.run()?;
    info!("done");

    Ok(())
}
