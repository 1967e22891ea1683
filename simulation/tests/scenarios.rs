use std::collections::BTreeMap;

use simulation::schwarzschild::Schwarzschild;
use simulation::{
    setup, AccelerationModel, CoordinateSystem, GeodesicModel, HaltReason, MetricTensor, RootScan,
    Simulation, StateVector, StepConfig, StepOutcome,
};

fn symbolic(diagonal: [&str; 3]) -> Simulation<GeodesicModel<simulation::Connection>> {
    symbolic_from(diagonal, StateVector::new(10.0, 0.0, 0.0, 0.0))
}

fn symbolic_from(
    diagonal: [&str; 3],
    initial: StateVector,
) -> Simulation<GeodesicModel<simulation::Connection>> {
    let metric =
        MetricTensor::parse_diagonal(CoordinateSystem::polar(), diagonal, &BTreeMap::new()).unwrap();
    let (model, horizon) = setup(metric, &RootScan::default()).unwrap();
    Simulation::new(model, initial, horizon, StepConfig::default())
}

/// Steps `sim` up to `max_steps` times, returning the tick on which it
/// first halted and how many Running -> Halted transitions were seen.
fn drive<M: AccelerationModel>(sim: &mut Simulation<M>, max_steps: usize) -> (Option<usize>, usize) {
    let mut first = None;
    let mut transitions = 0;
    let mut previous = sim.outcome();
    for tick in 0..max_steps {
        let outcome = sim.step();
        if outcome.is_halted() && !previous.is_halted() {
            first.get_or_insert(tick);
            transitions += 1;
        }
        previous = outcome;
    }
    (first, transitions)
}

#[test]
fn flat_space_straight_line() {
    let mut sim = symbolic_from(["-1", "1", "r^2"], StateVector::new(10.0, 0.0, 0.0, 0.2));
    assert!(!sim.horizon().is_present());

    for _ in 0..1000 {
        assert_eq!(sim.step(), StepOutcome::Running);
    }

    assert_eq!(sim.history().len(), 1001);
    let end = sim.state().position;
    assert!((end.x - 10.0).abs() < 1e-6);
    assert!((end.y - 10.0).abs() < 1e-6);
    assert!(sim.state().radius() > 0.0);
    for pair in sim.history().windows(2) {
        assert!((pair[1].x - 10.0).abs() < 1e-6);
        assert!(pair[1].y > pair[0].y);
    }
}

#[test]
fn schwarzschild_infall_halts_once() {
    let mut sim = symbolic(["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"]);
    let horizon = sim.horizon().radius().unwrap();
    assert!((horizon - 2.0).abs() < 1e-9);

    let (first, transitions) = drive(&mut sim, 3000);
    assert_eq!(transitions, 1);
    assert!(first.is_some());
    match sim.outcome() {
        StepOutcome::Halted(HaltReason::HorizonCrossed { radius }) => assert_eq!(radius, horizon),
        other => panic!("expected horizon crossing, got {other:?}"),
    }

    let r = sim.state().radius();
    assert!(r <= horizon + 0.1);
    assert!(r > horizon);

    let frozen = *sim.state();
    let length = sim.history().len();
    for _ in 0..10 {
        sim.step();
        assert_eq!(*sim.state(), frozen);
        assert_eq!(sim.history().len(), length);
    }
}

#[test]
fn radial_infall_stays_on_axis() {
    let mut sim = symbolic_from(
        ["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"],
        StateVector::new(10.0, 0.0, -0.1, 0.0),
    );
    drive(&mut sim, 3000);
    assert!(matches!(
        sim.outcome(),
        StepOutcome::Halted(HaltReason::HorizonCrossed { .. })
    ));
    assert!(sim.history().iter().all(|p| p.y.abs() < 1e-12));
    assert!(sim.history().windows(2).all(|pair| pair[1].x < pair[0].x));
}

#[test]
fn extremal_infall_halts_at_double_root_horizon() {
    let mut sim = symbolic_from(
        ["-(1 - 1/r)^2", "1/(1 - 1/r)^2", "r^2"],
        StateVector::new(3.0, 0.0, -0.3, 0.0),
    );
    let horizon = sim.horizon().radius().unwrap();
    assert!((horizon - 1.0).abs() < 1e-6);

    let (first, transitions) = drive(&mut sim, 5000);
    assert_eq!(transitions, 1);
    assert!(first.is_some());
    assert!(matches!(
        sim.outcome(),
        StepOutcome::Halted(HaltReason::HorizonCrossed { .. })
    ));
    assert!(sim.state().radius() <= horizon + 0.1);
}

#[test]
fn symbolic_and_closed_form_trajectories_agree() {
    let initial = StateVector::new(0.0, 10.0, 0.05, -0.1);
    let mut derived = symbolic_from(["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"], initial);
    let exact_model = GeodesicModel::new(Schwarzschild::new(1.0));
    let mut exact = Simulation::new(
        exact_model,
        initial,
        Schwarzschild::new(1.0).horizon(),
        StepConfig::default(),
    );

    for _ in 0..400 {
        derived.step();
        exact.step();
    }
    assert_eq!(derived.history().len(), exact.history().len());
    for (a, b) in derived.history().iter().zip(exact.history()) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?} vs {b:?}");
    }
}

#[test]
fn frame_budget_stops_orbit() {
    let mut sim = symbolic_from(
        ["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"],
        StateVector::new(10.0, 0.0, 0.0, 0.3),
    );
    assert_eq!(sim.run(1000), StepOutcome::Halted(HaltReason::ExternalStop));
    assert_eq!(sim.steps(), 1000);
    assert!(sim.history().iter().all(|p| (p.x * p.x + p.y * p.y).sqrt() > 2.1));
}
