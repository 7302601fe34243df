//! Tests that run the whole corridor through the public interface.

use assert_approx_eq::assert_approx_eq;
use motorway_sim::{
    Arrival, ArrivalConfig, Lane, SimConfig, Simulation, VehicleClass, VehicleId,
};
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

/// A short road with a short, busy arrival schedule.
fn short_config(seed: u64) -> SimConfig {
    SimConfig {
        road_length: 3000.0,
        section_length: 500.0,
        on_ramp_start: 500.0,
        on_ramp_end: 1500.0,
        seed,
        arrivals: ArrivalConfig {
            period_durations: vec![30.0, 30.0],
            mean_intervals: vec![[6.0, 3.0, 3.0], [6.0, 1.5, 1.5]],
            jitter: 0.1,
            class_mix: vec![[[1.0, 1.0], [4.0, 1.0], [4.0, 1.0]]; 2],
        },
        ..Default::default()
    }
}

/// Checks that every lane chain is consistent with the vehicles in it.
fn assert_chains_consistent<R: Rng>(sim: &Simulation<R>) {
    let mut seen = 0;
    for lane in Lane::ALL {
        let chain = sim.lane(lane);
        let ids = chain.iter().collect::<Vec<_>>();
        for (idx, id) in ids.iter().enumerate() {
            let vehicle = sim.get_vehicle(*id).unwrap();
            assert_eq!(vehicle.lane(), lane);
            for other in Lane::ALL.iter().filter(|other| **other != lane) {
                assert!(!sim.lane(*other).contains(*id));
            }
            if let Some(next) = sim.successor(*id) {
                assert_eq!(sim.predecessor(next), Some(*id));
                assert_eq!(Some(&next), ids.get(idx + 1));
            }
            if let Some(prev) = sim.predecessor(*id) {
                assert_eq!(sim.successor(prev), Some(*id));
            }
        }
        seen += ids.len();
    }
    assert_eq!(seen, sim.iter_vehicles().count());
}

/// Test that a vehicle's position increases monotonically.
#[test]
fn vehicle_drives_forward() {
    let mut sim = Simulation::with_rng(SimConfig::default(), StdRng::seed_from_u64(3))
        .unwrap()
        .with_arrivals(VecDeque::new());
    let veh = sim.place_vehicle(Lane::Right, VehicleClass::Truck, 100.0, 60.0);

    let mut pos = sim.get_vehicle(veh).unwrap().pos();
    for _ in 0..200 {
        sim.step();
        let next_pos = sim.get_vehicle(veh).unwrap().pos();
        assert!(next_pos > pos);
        pos = next_pos;
    }
}

/// Test that lane chains and speeds stay within bounds while traffic flows.
#[test]
fn invariants_hold_under_load() {
    let mut sim = Simulation::new(short_config(17)).unwrap();
    let mut speeds = HashMap::<VehicleId, f64>::new();

    for _ in 0..1500 {
        sim.step();
        assert_chains_consistent(&sim);

        for vehicle in sim.iter_vehicles() {
            let lane = vehicle.lane();
            if let Some(old) = speeds.get(&vehicle.id()) {
                assert!(vehicle.vel() >= lane.min_speed());
                assert!(vehicle.vel() <= f64::max(*old, vehicle.top_speed(lane)) + 1e-9);
            }
            assert!(vehicle.fuel() >= 0.0);
            assert!(vehicle.emissions() >= 0.0);
        }
        speeds = sim.iter_vehicles().map(|v| (v.id(), v.vel())).collect();
    }
}

/// Test that a full run terminates and accounts for every vehicle on the main lanes.
#[test]
fn run_completes() {
    let mut sim = Simulation::new(short_config(5)).unwrap();
    let stats = sim.run();

    assert!(sim.is_finished());
    assert_eq!(stats.arrivals.periods(), 2);
    let main_arrivals: usize = (0..2)
        .flat_map(|period| {
            let arrivals = &stats.arrivals;
            Lane::MAIN.map(|lane| arrivals.group(period, lane, false) + arrivals.group(period, lane, true))
        })
        .sum();
    assert!(main_arrivals > 0);
    assert!(stats.trips >= main_arrivals);
    assert!(stats.trips <= stats.arrivals.total());
    assert_eq!(stats.trips, sim.trips().len());

    assert!(stats.trip_time.mean > 0.0);
    assert!(stats.fuel.mean > 0.0);
    assert!(stats.emissions.mean > 0.0);
    for trip in sim.trips() {
        assert_approx_eq!(trip.lifetime, trip.removed_at - trip.created_at);
        assert!(trip.fuel >= 0.0);
    }
}

/// Test that the same seed reproduces the same run.
#[test]
fn seeded_runs_are_reproducible() {
    let a = Simulation::new(short_config(99)).unwrap().run();
    let b = Simulation::new(short_config(99)).unwrap().run();
    assert_eq!(a, b);
}

/// Test that a jammed section slows down and recovers once the jam clears.
#[test]
fn reactive_limit_reverts() {
    let config = SimConfig {
        road_length: 3000.0,
        section_length: 1000.0,
        on_ramp_start: 500.0,
        on_ramp_end: 1500.0,
        ..Default::default()
    };
    let mut sim = Simulation::with_rng(config, StepRng::new(3 << 62, 0))
        .unwrap()
        .with_arrivals(VecDeque::new());
    for i in 0..6 {
        sim.place_vehicle(Lane::Right, VehicleClass::Sedan, 2000.0 + 50.0 * i as f64, 10.0);
    }

    sim.step();
    let section = &sim.controller().sections()[2];
    assert_approx_eq!(section.speed_limit(Lane::Right), 85.0);
    assert_eq!(section.speed_limit(Lane::Left), 100.0);
    assert_eq!(sim.section_views()[2].limits[0], section.speed_limit(Lane::Right));

    while sim.time() < 60.0 {
        sim.step();
    }
    assert!(sim.is_finished());
    let section = &sim.controller().sections()[2];
    assert_eq!(section.speed_limit(Lane::Right), 100.0);
    assert!(section.last_update(Lane::Right) >= 20.0);
}

/// Test that a ramp vehicle joins the right lane behind traffic already there.
#[test]
fn ramp_vehicle_merges_into_gap() {
    let config = SimConfig {
        road_length: 3000.0,
        section_length: 1000.0,
        on_ramp_start: 500.0,
        on_ramp_end: 1500.0,
        ..Default::default()
    };
    let mut sim = Simulation::with_rng(config, StepRng::new(3 << 62, 0))
        .unwrap()
        .with_arrivals(VecDeque::new());
    let ahead = sim.place_vehicle(Lane::Right, VehicleClass::Sedan, 900.0, 80.0);
    let merging = sim.place_vehicle(Lane::Ramp, VehicleClass::Compact, 600.0, 60.0);

    let mut ticks = 0;
    while sim.get_vehicle(merging).unwrap().lane() == Lane::Ramp {
        sim.step();
        ticks += 1;
        assert!(ticks < 400);
    }
    assert_eq!(sim.successor(merging), Some(ahead));
    assert_eq!(sim.predecessor(ahead), Some(merging));
    assert!(sim.lane(Lane::Ramp).is_empty());
    assert_chains_consistent(&sim);
}

/// Test that queued arrivals enter one at a time as the entrance clears.
#[test]
fn arrivals_enter_in_order() {
    let arrivals = (0..4)
        .map(|i| Arrival {
            lane: Lane::Left,
            class: VehicleClass::Truck,
            time: 0.1 * i as f64,
            period: 0,
        })
        .collect::<VecDeque<_>>();
    let mut sim = Simulation::with_rng(SimConfig::default(), StepRng::new(3 << 62, 0))
        .unwrap()
        .with_arrivals(arrivals);

    let mut ticks = 0;
    while sim.lane(Lane::Left).len() + sim.lane(Lane::Right).len() < 4 {
        sim.step();
        ticks += 1;
        assert!(ticks < 1000);
    }
    assert_eq!(sim.queue_len(Lane::Left), 0);
    assert_eq!(sim.statistics().arrivals.get(0, Lane::Left, VehicleClass::Truck), 4);
    assert_chains_consistent(&sim);
}
