//! Lane-change decisions: merging from the ramp, returning to the right lane
//! and moving out to overtake.

use super::safe_speed::{safe_distance, safe_speed, safe_speed_aggressive, UNCONSTRAINED};
use super::Vehicle;
use crate::lane::{Lane, LaneChain, PerLane};
use crate::math::CubicFn;
use crate::simulation::TickContext;
use crate::{VehicleId, VehicleSet};

/// Vehicles do not change lanes within this distance of where they joined the road.
const SETTLE_DISTANCE: f64 = 50.0;

/// The duration of the lateral move between lanes.
const CHANGE_DURATION: f64 = 1.25;

/// The speed margin a gap must offer before a move is considered safe.
const SPEED_MARGIN: f64 = 5.0;

/// Below this safe speed in both lanes, traffic is jammed and changing lanes is pointless.
const TRASH_SPEED: f64 = 40.0;

/// Represents an in-progress lane change.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LaneChange {
    /// The time at which the lane change is complete.
    end_time: f64,
    /// The vehicle's lateral offset as a function of time.
    offset: CubicFn,
}

impl LaneChange {
    pub fn new(from: Lane, to: Lane, now: f64) -> Self {
        let end_time = now + CHANGE_DURATION;
        Self {
            end_time,
            offset: CubicFn::from_ends(now, from.lateral(), end_time, to.lateral()),
        }
    }

    pub fn is_complete(&self, now: f64) -> bool {
        now >= self.end_time
    }

    pub fn lateral(&self, now: f64) -> f64 {
        self.offset.y(f64::min(now, self.end_time))
    }
}

/// The vehicles either side of a vehicle's projection onto another lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighbours {
    /// The nearest vehicle entirely behind.
    pub prev: Option<VehicleId>,
    /// The nearest vehicle entirely ahead.
    pub next: Option<VehicleId>,
    /// Whether some vehicle overlaps the projection.
    pub intersects: bool,
}

/// An approved lane change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LaneChangeDecision {
    pub target: Lane,
    pub neighbours: Neighbours,
}

/// Finds the vehicles that would surround `vehicle` if it moved into the `target` lane.
pub(crate) fn find_prev_next(vehicle: &Vehicle, target: &LaneChain, vehicles: &VehicleSet) -> Neighbours {
    let extent = vehicle.extent();
    let mut result = Neighbours::default();
    for id in target.iter().filter(|id| *id != vehicle.id) {
        let other = &vehicles[id];
        let other_extent = other.extent();
        if extent.intersects(&other_extent) {
            result.intersects = true;
            break;
        }
        let closer = |current: Option<VehicleId>, ahead: bool| match current {
            Some(current) if ahead => other.pos() < vehicles[current].pos(),
            Some(current) => other.pos() > vehicles[current].pos(),
            None => true,
        };
        if other_extent.is_before(&extent) && closer(result.prev, false) {
            result.prev = Some(id);
        }
        if extent.is_before(&other_extent) && closer(result.next, true) {
            result.next = Some(id);
        }
    }
    result
}

/// Determines whether staying in the current lane is no better than moving
/// between `neighbours`, i.e. whether the move can be made safely.
pub(crate) fn is_safe_moving(vehicle: &Vehicle, neighbours: &Neighbours, vehicles: &VehicleSet) -> bool {
    if neighbours.intersects {
        return false;
    }
    let gap_speed = match vehicle.lane() {
        Lane::Ramp => safe_speed_aggressive,
        _ => safe_speed,
    };

    // The vehicle behind must not be forced to brake hard
    let mut stay = match neighbours.prev.map(|id| &vehicles[id]) {
        Some(prev) => {
            let safe = gap_speed(
                prev.vel(),
                vehicle.vel(),
                prev.pos(),
                vehicle.pos(),
                prev.length(),
                prev.max_dec(),
            );
            let dist = vehicle.pos() - (prev.pos() + prev.length());
            !(prev.vel() - SPEED_MARGIN < safe && dist > safe_distance(prev.vel()))
        }
        None => false,
    };

    // And this vehicle must not have to brake hard behind the vehicle ahead
    if !stay {
        if let Some(next) = neighbours.next.map(|id| &vehicles[id]) {
            let safe = gap_speed(
                vehicle.vel(),
                next.vel(),
                vehicle.pos(),
                next.pos(),
                vehicle.length(),
                vehicle.max_dec(),
            );
            let dist = next.pos() - (vehicle.pos() + vehicle.length());
            stay = vehicle.vel() >= safe + SPEED_MARGIN || dist < safe_distance(vehicle.vel());
        }
    }

    !stay
}

/// Decides whether the vehicle should change lanes this tick.
/// At most one kind of change applies, according to the vehicle's lane.
pub(crate) fn evaluate(
    vehicle: &Vehicle,
    lanes: &PerLane<LaneChain>,
    vehicles: &VehicleSet,
    ctx: &TickContext,
) -> Option<LaneChangeDecision> {
    if vehicle.is_changing_lanes() {
        return None;
    }

    let approve = |target: Lane, neighbours: Neighbours| LaneChangeDecision { target, neighbours };

    match vehicle.lane() {
        Lane::Ramp => {
            if vehicle.pos() <= ctx.config.on_ramp_start + SETTLE_DISTANCE {
                return None;
            }
            let neighbours = find_prev_next(vehicle, &lanes[Lane::Right], vehicles);
            is_safe_moving(vehicle, &neighbours, vehicles).then(|| approve(Lane::Right, neighbours))
        }
        Lane::Left => {
            if vehicle.pos() <= SETTLE_DISTANCE {
                return None;
            }
            let neighbours = find_prev_next(vehicle, &lanes[Lane::Right], vehicles);
            let (here, there) = compare_lanes(vehicle, &neighbours, lanes, vehicles, ctx);
            let free_flowing =
                here > vehicle.top_speed(Lane::Left) && there > vehicle.top_speed(Lane::Right);
            (free_flowing && is_safe_moving(vehicle, &neighbours, vehicles))
                .then(|| approve(Lane::Right, neighbours))
        }
        Lane::Right => {
            if vehicle.only_right() || vehicle.pos() <= SETTLE_DISTANCE {
                return None;
            }
            let neighbours = find_prev_next(vehicle, &lanes[Lane::Left], vehicles);
            let (here, there) = compare_lanes(vehicle, &neighbours, lanes, vehicles, ctx);
            let held_up = here < vehicle.top_speed(Lane::Right);
            let congested = here < TRASH_SPEED && there < TRASH_SPEED;
            (held_up && !congested && is_safe_moving(vehicle, &neighbours, vehicles))
                .then(|| approve(Lane::Left, neighbours))
        }
    }
}

/// The safe speed available in the vehicle's own lane, and behind the
/// vehicle it would follow in the other lane.
fn compare_lanes(
    vehicle: &Vehicle,
    neighbours: &Neighbours,
    lanes: &PerLane<LaneChain>,
    vehicles: &VehicleSet,
    ctx: &TickContext,
) -> (f64, f64) {
    let leader = lanes[vehicle.lane()].successor(vehicle.id).map(|id| &vehicles[id]);
    let here = vehicle.follow_speed(leader, ctx.config.on_ramp_end);
    let there = neighbours
        .next
        .map(|id| &vehicles[id])
        .map(|next| {
            safe_speed(
                vehicle.vel(),
                next.vel(),
                vehicle.pos(),
                next.pos(),
                vehicle.length(),
                vehicle.max_dec(),
            )
        })
        .unwrap_or(UNCONSTRAINED);
    (here, there)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SimConfig;
    use crate::section::build_sections;
    use crate::vehicle::VehicleClass;
    use rand::rngs::mock::StepRng;
    use slotmap::SlotMap;

    struct Road {
        vehicles: VehicleSet,
        lanes: PerLane<LaneChain>,
    }

    impl Road {
        fn new() -> Self {
            Self {
                vehicles: SlotMap::with_key(),
                lanes: Default::default(),
            }
        }

        fn add(&mut self, lane: Lane, pos: f64, vel: f64) -> VehicleId {
            let mut rng = StepRng::new(3 << 62, 0);
            let id = self.vehicles.insert_with_key(|id| {
                let mut veh = Vehicle::new(VehicleClass::Sedan, lane, pos, 0.0, &mut rng);
                veh.id = id;
                veh.set_state(pos, vel);
                veh
            });
            self.lanes[lane].insert_vehicle(&self.vehicles, id);
            id
        }

        fn evaluate(&self, id: VehicleId) -> Option<LaneChangeDecision> {
            let config = SimConfig::default();
            let sections = build_sections(config.road_length, config.section_length, config.base_speed);
            let ctx = TickContext {
                now: 0.0,
                dt: config.dt,
                config: &config,
                sections: &sections,
            };
            evaluate(&self.vehicles[id], &self.lanes, &self.vehicles, &ctx)
        }
    }

    #[test]
    fn overlapping_vehicle_blocks_change() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 40.0);
        let _blocker = road.add(Lane::Right, 1200.0, 20.0);
        let twin = road.add(Lane::Left, 1000.0, 90.0);

        let neighbours = find_prev_next(&road.vehicles[me], &road.lanes[Lane::Left], &road.vehicles);
        assert!(neighbours.intersects);
        assert!(!is_safe_moving(&road.vehicles[me], &neighbours, &road.vehicles));
        assert_eq!(road.evaluate(me), None);

        let neighbours = find_prev_next(&road.vehicles[twin], &road.lanes[Lane::Right], &road.vehicles);
        assert!(neighbours.intersects);
    }

    #[test]
    fn finds_nearest_neighbours() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 90.0);
        let far_behind = road.add(Lane::Left, 500.0, 90.0);
        let behind = road.add(Lane::Left, 900.0, 90.0);
        let ahead = road.add(Lane::Left, 1100.0, 90.0);
        let _far_ahead = road.add(Lane::Left, 1500.0, 90.0);

        let neighbours = find_prev_next(&road.vehicles[me], &road.lanes[Lane::Left], &road.vehicles);
        assert_eq!(
            neighbours,
            Neighbours {
                prev: Some(behind),
                next: Some(ahead),
                intersects: false
            }
        );
        assert_ne!(neighbours.prev, Some(far_behind));
    }

    #[test]
    fn empty_lane_is_safe() {
        let mut road = Road::new();
        let me = road.add(Lane::Ramp, 2100.0, 60.0);
        let neighbours = find_prev_next(&road.vehicles[me], &road.lanes[Lane::Right], &road.vehicles);
        assert!(is_safe_moving(&road.vehicles[me], &neighbours, &road.vehicles));
        assert_eq!(
            road.evaluate(me),
            Some(LaneChangeDecision {
                target: Lane::Right,
                neighbours: Neighbours::default()
            })
        );
    }

    #[test]
    fn ramp_settle_zone() {
        let mut road = Road::new();
        let me = road.add(Lane::Ramp, 2040.0, 60.0);
        assert_eq!(road.evaluate(me), None);
    }

    #[test]
    fn tight_gap_behind_is_unsafe() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 50.0);
        let _leader = road.add(Lane::Right, 1100.0, 20.0);
        // A fast vehicle just behind in the left lane
        let _chaser = road.add(Lane::Left, 960.0, 100.0);
        assert_eq!(road.evaluate(me), None);
    }

    #[test]
    fn held_up_vehicle_overtakes() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 80.0);
        let _slow = road.add(Lane::Right, 1080.0, 40.0);
        let decision = road.evaluate(me).expect("should overtake");
        assert_eq!(decision.target, Lane::Left);
        assert_eq!(decision.neighbours, Neighbours::default());
    }

    #[test]
    fn only_right_drivers_stay() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 80.0);
        let _slow = road.add(Lane::Right, 1080.0, 40.0);
        road.vehicles[me].set_only_right(true);
        assert_eq!(road.evaluate(me), None);
    }

    #[test]
    fn jammed_lanes_do_not_trade() {
        let mut road = Road::new();
        let me = road.add(Lane::Right, 1000.0, 60.0);
        let _slow = road.add(Lane::Right, 1040.0, 10.0);
        let _slow_left = road.add(Lane::Left, 1060.0, 10.0);
        assert_eq!(road.evaluate(me), None);
    }

    #[test]
    fn free_left_lane_vehicle_returns_right() {
        let mut road = Road::new();
        let me = road.add(Lane::Left, 1000.0, 100.0);
        let decision = road.evaluate(me).expect("should return to the right lane");
        assert_eq!(decision.target, Lane::Right);

        // Not while still held up in the left lane
        let _slow = road.add(Lane::Left, 1060.0, 30.0);
        assert_eq!(road.evaluate(me), None);
    }

    #[test]
    fn transition_eases_between_lanes() {
        let lc = LaneChange::new(Lane::Right, Lane::Left, 10.0);
        assert_eq!(lc.lateral(10.0), Lane::Right.lateral());
        assert!(!lc.is_complete(11.0));
        assert!(lc.is_complete(11.25));
        assert!((lc.lateral(20.0) - Lane::Left.lateral()).abs() < 1e-9);
    }
}
