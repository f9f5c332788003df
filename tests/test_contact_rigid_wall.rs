use russell_lab::approx_eq;
use std::collections::HashMap;
use tissuefem::prelude::*;
use tissuefem::StrError;

// Unit cube hanging from its top face pushed by a rigid plane moving up from z = 0
fn pushed_cube(augmented: bool) -> Result<FemModel, StrError> {
    let mesh = SampleMeshes::column(DofConfig::solid(), 1.0, 1, 1)?;
    let attributes = HashMap::from([(1, Etype::Solid(ParamSolid::sample_neo_hookean()))]);
    let mut essential = Essential::new();
    essential.fix(&[4, 5, 6, 7], &[Dof::Ux, Dof::Uy, Dof::Uz]);
    let mut param = ParamContact::new(1e4);
    param.augmented = augmented;
    param.atol = 1e-3;
    let slave = ContactSurface::new(&mesh, &[(0, 4)])?;
    let wall = RigidWall::new(param, slave, [0.0; 3], [0.0, 0.0, 1.0], 0.01, LoadCurve::Ramp)?;
    FemModel::new(
        mesh,
        attributes,
        &essential,
        Natural::new(),
        vec![ContactInterface::RigidWall(wall)],
    )
}

#[test]
fn test_contact_rigid_wall_penalty() -> Result<(), StrError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = pushed_cube(false)?;
    let config = Config::new();
    let mut solver = SolverImplicit::new(&config, &model)?;
    let summary = solver.solve_step(&mut model, 1.0).map_err(|_| "step failed")?;
    assert_eq!(summary.augmentations, 0);

    // the force pushes the cube up and equals the penalty × penetration × area
    let force = model.contacts[0].force();
    assert!(force[2] > 0.0);
    let mut penetration = 0.0;
    for point in &model.contacts[0].slave().points {
        assert!(point.gap < 0.0);
        penetration += point.weight * point.eps * (-point.gap);
    }
    approx_eq(force[2], penetration, 1e-10);
    Ok(())
}

#[test]
fn test_contact_rigid_wall_augmented() -> Result<(), StrError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = Config::new();

    let mut penalty = pushed_cube(false)?;
    let mut solver = SolverImplicit::new(&config, &penalty)?;
    solver.solve_step(&mut penalty, 1.0).map_err(|_| "step failed")?;
    let force_penalty = penalty.contacts[0].force()[2];

    let mut model = pushed_cube(true)?;
    let mut solver = SolverImplicit::new(&config, &model)?;
    let summary = solver.solve_step(&mut model, 1.0).map_err(|_| "step failed")?;
    assert!(summary.augmentations > 0);

    // the multipliers remove most of the penetration, so the cube is pushed further
    for point in &model.contacts[0].slave().points {
        assert!(f64::abs(point.gap) < 1e-4);
        assert!(point.lm > 0.0);
    }
    assert!(model.contacts[0].force()[2] > force_penalty);
    Ok(())
}
