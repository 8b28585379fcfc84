use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use reflow::{
    BoundaryCond, CaloricallyPerfectGas, GasModel, Mesh, RusanovScheme, SolutionDomain,
    SpatialScheme,
};

fn benchmark_calc_rhs(c: &mut Criterion) {
    let gas = Rc::new(CaloricallyPerfectGas::single(28.97, 1005.0).unwrap());
    let num_cells = 512;
    let rho = gas.density(101_325.0, 300.0, &[]);
    let mut domain = SolutionDomain::new(
        gas,
        Mesh::from_cells(0.0, 1.0, num_cells).unwrap(),
        reflow::uniform_prim(&[101_325.0, 25.0, 300.0], num_cells),
        BoundaryCond::FixedMassFlow {
            mass_flux: rho * 25.0,
            temp: 300.0,
            mass_fracs: vec![],
        },
        BoundaryCond::FixedPressure { press: 101_325.0 },
        2,
    )
    .unwrap();
    let mut scheme = RusanovScheme::new(3, num_cells);

    c.bench_function("calc_rhs_512_cells", |b| {
        b.iter(|| {
            scheme.calc_rhs(black_box(&mut domain)).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_calc_rhs);
criterion_main!(benches);
