use crate::arrivals::{ArrivalSource, ScheduledArrivals};
use crate::config::SimConfig;
use crate::controller::{Probe, SpeedLimitController};
#[cfg(feature = "debug")]
use crate::debug::{debug_lane_change, take_debug_frame};
use crate::error::ConfigError;
use crate::lane::{Lane, LaneChain, PerLane};
use crate::math::Point2d;
use crate::section::RoadSection;
use crate::stats::{ArrivalCounts, RunStatistics, TripRecord};
use crate::util::Interval;
use crate::vehicle::lane_change::{self, LaneChangeDecision};
use crate::vehicle::{Vehicle, VehicleClass};
use crate::{VehicleId, VehicleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// New vehicles wait until the rear vehicle of their lane is this far past the entrance.
const ENTRANCE_CLEARANCE: f64 = 25.0;

/// The shared state read by the per-vehicle operations of a single tick.
pub(crate) struct TickContext<'a> {
    /// The simulation time at the start of the tick.
    pub now: f64,
    /// The duration of the tick.
    pub dt: f64,
    pub config: &'a SimConfig,
    /// The road sections and their current limits.
    pub sections: &'a [RoadSection],
}

/// A snapshot of one vehicle, for drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleView {
    pub id: VehicleId,
    pub class: VehicleClass,
    pub lane: Lane,
    /// The position of the rear of the vehicle along the road.
    pub pos: f64,
    /// The lateral offset of the vehicle from the right lane centre.
    pub lateral: f64,
    /// The centre of the vehicle.
    pub world_pos: Point2d,
    pub vel: f64,
}

/// A snapshot of one road section, for drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectionView {
    pub bounds: Interval<f64>,
    /// The posted limits in the right and left lanes.
    pub limits: [f64; 2],
}

/// A simulation of a two-lane motorway with an on-ramp.
pub struct Simulation<R = StdRng> {
    config: SimConfig,
    /// The vehicles on the road.
    vehicles: VehicleSet,
    /// The vehicles in each lane, ordered from rear to front.
    lanes: PerLane<LaneChain>,
    /// Vehicles waiting to enter each lane.
    queues: PerLane<VecDeque<Vehicle>>,
    controller: SpeedLimitController,
    arrivals: Box<dyn ArrivalSource>,
    rng: R,
    /// The current simulation time.
    time: f64,
    /// The current frame of simulation.
    frame: usize,
    /// The trips of the vehicles that have left the road.
    trips: Vec<TripRecord>,
    arrival_counts: ArrivalCounts,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation<StdRng> {
    /// Creates a simulation driven by the configured arrival schedule,
    /// with a random number generator seeded from the configuration.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    /// Creates a simulation driven by the configured arrival schedule and the given RNG.
    pub fn with_rng(config: SimConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!("simulation config: {:?}", config);
        Ok(Self {
            controller: SpeedLimitController::new(&config),
            arrivals: Box::new(ScheduledArrivals::new(config.arrivals.clone())),
            config,
            vehicles: VehicleSet::default(),
            lanes: PerLane::default(),
            queues: PerLane::default(),
            rng,
            time: 0.0,
            frame: 0,
            trips: vec![],
            arrival_counts: ArrivalCounts::default(),
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    /// Replaces the source of vehicle arrivals.
    pub fn with_arrivals(mut self, source: impl ArrivalSource + 'static) -> Self {
        self.arrivals = Box::new(source);
        self
    }

    /// The configuration of the simulation.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Places a vehicle directly on the road, bypassing the arrival queues.
    pub fn place_vehicle(&mut self, lane: Lane, class: VehicleClass, pos: f64, vel: f64) -> VehicleId {
        let mut vehicle = Vehicle::new(class, lane, pos, self.time, &mut self.rng);
        vehicle.set_state(pos, vel);
        self.insert_vehicle(vehicle)
    }

    /// Sets whether the driver of the given vehicle keeps to the right lane.
    pub fn set_vehicle_only_right(&mut self, id: VehicleId, only_right: bool) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_only_right(only_right);
        }
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        self.update_speed_limits();
        self.admit_arrivals();
        self.update_vehicles();
        self.time += self.config.dt;
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Runs the simulation until every scheduled vehicle has left the main carriageway.
    pub fn run(&mut self) -> RunStatistics {
        while !self.is_finished() {
            self.step();
        }
        if !self.lanes[Lane::Ramp].is_empty() {
            log::warn!(
                "{} vehicles stranded on the ramp at the end of the run",
                self.lanes[Lane::Ramp].len()
            );
        }
        log::info!(
            "run finished at t={:.2} after {} frames, {} trips",
            self.time,
            self.frame,
            self.trips.len()
        );
        self.statistics()
    }

    /// Whether all arrivals have been produced and the main carriageway is empty.
    pub fn is_finished(&self) -> bool {
        self.arrivals.is_exhausted()
            && Lane::MAIN
                .iter()
                .all(|lane| self.queues[*lane].is_empty() && self.lanes[*lane].is_empty())
    }

    /// Summarises the trips completed so far.
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::new(&self.trips, self.arrival_counts.clone())
    }

    /// Gets the current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Returns an iterator over all the vehicles on the road.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID, if it is still on the road.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Gets the vehicles in the given lane.
    pub fn lane(&self, lane: Lane) -> &LaneChain {
        &self.lanes[lane]
    }

    /// The number of vehicles waiting to enter the given lane.
    pub fn queue_len(&self, lane: Lane) -> usize {
        self.queues[lane].len()
    }

    /// The vehicle immediately behind the given vehicle in its lane.
    pub fn predecessor(&self, id: VehicleId) -> Option<VehicleId> {
        let vehicle = self.vehicles.get(id)?;
        self.lanes[vehicle.lane()].predecessor(id)
    }

    /// The vehicle immediately ahead of the given vehicle in its lane.
    pub fn successor(&self, id: VehicleId) -> Option<VehicleId> {
        let vehicle = self.vehicles.get(id)?;
        self.lanes[vehicle.lane()].successor(id)
    }

    /// Gets the speed limit controller.
    pub fn controller(&self) -> &SpeedLimitController {
        &self.controller
    }

    /// The trips of the vehicles that have left the road.
    pub fn trips(&self) -> &[TripRecord] {
        &self.trips
    }

    /// Snapshots every vehicle on the road.
    pub fn vehicle_views(&self) -> Vec<VehicleView> {
        self.vehicles
            .values()
            .map(|vehicle| VehicleView {
                id: vehicle.id(),
                class: vehicle.class(),
                lane: vehicle.lane(),
                pos: vehicle.pos(),
                lateral: vehicle.lateral(self.time),
                world_pos: vehicle.world_pos(self.time),
                vel: vehicle.vel(),
            })
            .collect()
    }

    /// Snapshots every road section.
    pub fn section_views(&self) -> Vec<SectionView> {
        self.controller
            .sections()
            .iter()
            .map(|section| SectionView {
                bounds: section.bounds(),
                limits: Lane::MAIN.map(|lane| section.speed_limit(lane)),
            })
            .collect()
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Adds a vehicle to the arena and to its lane.
    fn insert_vehicle(&mut self, mut vehicle: Vehicle) -> VehicleId {
        let lane = vehicle.lane();
        let id = self.vehicles.insert_with_key(|id| {
            vehicle.id = id;
            vehicle
        });
        self.lanes[lane].insert_vehicle(&self.vehicles, id);
        id
    }

    /// Feeds the current traffic state to the speed limit controller.
    fn update_speed_limits(&mut self) {
        let probes = self
            .vehicles
            .values()
            .map(|vehicle| Probe {
                lane: vehicle.lane(),
                pos: vehicle.pos(),
                vel: vehicle.vel(),
            })
            .collect::<Vec<_>>();
        self.controller.update(self.time, &probes);
    }

    /// The position at which vehicles enter the given lane.
    fn entrance(&self, lane: Lane) -> f64 {
        match lane {
            Lane::Ramp => self.config.on_ramp_start,
            _ => 0.0,
        }
    }

    /// Whether the entrance of the lane has room for another vehicle.
    fn entrance_clear(&self, lane: Lane) -> bool {
        self.lanes[lane]
            .rear()
            .map(|id| self.vehicles[id].pos() > self.entrance(lane) + ENTRANCE_CLEARANCE)
            .unwrap_or(true)
    }

    /// Produces the vehicles that are due, and lets at most one waiting vehicle into each lane.
    fn admit_arrivals(&mut self) {
        for arrival in self.arrivals.poll(self.time, &mut self.rng) {
            self.arrival_counts.record(arrival.period, arrival.lane, arrival.class);
            let pos = self.entrance(arrival.lane) - arrival.class.params().length;
            let vehicle = Vehicle::new(arrival.class, arrival.lane, pos, arrival.time, &mut self.rng);
            self.queues[arrival.lane].push_back(vehicle);
        }

        for lane in Lane::ALL {
            if !self.entrance_clear(lane) {
                continue;
            }
            if let Some(vehicle) = self.queues[lane].pop_front() {
                let id = self.insert_vehicle(vehicle);
                log::debug!(
                    "vehicle {:?} entered {:?} lane at t={:.2}, {} waiting",
                    id,
                    lane,
                    self.time,
                    self.queues[lane].len()
                );
            }
        }
    }

    /// Moves every vehicle once: lanes in order, front-most vehicle first.
    fn update_vehicles(&mut self) {
        let order = Lane::ALL
            .iter()
            .flat_map(|lane| self.lanes[*lane].iter().rev())
            .collect::<Vec<_>>();

        let ctx = TickContext {
            now: self.time,
            dt: self.config.dt,
            config: &self.config,
            sections: self.controller.sections(),
        };
        let vehicles = &mut self.vehicles;
        let lanes = &mut self.lanes;
        let rng = &mut self.rng;

        for id in order {
            let vehicle = &mut vehicles[id];
            vehicle.apply_left_lane_patience(ctx.now);
            vehicle.refresh_top_speed(&ctx, rng);
            vehicle.update_lane_change(ctx.now);

            if let Some(decision) = lane_change::evaluate(&vehicles[id], lanes, vehicles, &ctx) {
                commit_lane_change(vehicles, lanes, id, decision, ctx.now);
            }

            let lane = vehicles[id].lane();
            let leader = lanes[lane].successor(id).map(|id| &vehicles[id]);
            let vehicle = &vehicles[id];
            let safe = vehicle.follow_speed(leader, ctx.config.on_ramp_end);
            let new_vel = vehicle.choose_speed(safe, &ctx, rng);

            let vehicle = &mut vehicles[id];
            vehicle.integrate(new_vel, ctx.dt);

            if vehicle.pos() > ctx.config.road_length {
                let trip = vehicle.finish(ctx.now + ctx.dt);
                log::trace!("vehicle {:?} left the road: {:?}", id, trip);
                self.trips.push(trip);
                lanes[lane].remove_vehicle(id);
                vehicles.remove(id);
            }
        }
    }
}

/// Moves a vehicle into the lane chosen for it, between the neighbours found for it there.
/// The move is skipped if the target lane no longer has the same clear gap.
fn commit_lane_change(
    vehicles: &mut VehicleSet,
    lanes: &mut PerLane<LaneChain>,
    id: VehicleId,
    decision: LaneChangeDecision,
    now: f64,
) {
    let LaneChangeDecision { target, neighbours } = decision;
    let current = lane_change::find_prev_next(&vehicles[id], &lanes[target], vehicles);
    if current.intersects || current != neighbours {
        log::trace!("vehicle {:?} lost its gap in the {:?} lane", id, target);
        return;
    }
    let from = vehicles[id].lane();
    lanes[from].remove_vehicle(id);
    lanes[target].splice_vehicle(vehicles, id, neighbours.prev, neighbours.next);
    vehicles[id].start_lane_change(target, now);
    log::debug!(
        "vehicle {:?} moved from {:?} to {:?} lane at {:.1}",
        id,
        from,
        target,
        vehicles[id].pos()
    );
    #[cfg(feature = "debug")]
    debug_lane_change(id, from, target, vehicles[id].pos());
}
