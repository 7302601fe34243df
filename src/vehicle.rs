use self::consumption::{consumption, ConsumptionKind};
use self::lane_change::LaneChange;
use self::safe_speed::{following_safe_speed, safe_speed, UNCONSTRAINED};
use crate::lane::{Lane, PerLane};
use crate::math::Point2d;
use crate::simulation::TickContext;
use crate::stats::TripRecord;
use crate::util::Interval;
use crate::VehicleId;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub(crate) mod consumption;
pub(crate) mod lane_change;
pub(crate) mod safe_speed;

/// The probability that a new driver never moves into the left lane.
const ONLY_RIGHT_PROBABILITY: f64 = 0.2;

/// The relative spread of per-vehicle acceleration and deceleration.
const TRAIT_SPREAD: f64 = 0.05;

/// Vehicles on the ramp start at this fraction of their class top speed.
const RAMP_SPEED_FACTOR: f64 = 0.8;

/// After this long in the left lane, a driver raises its left-lane cap once.
const LEFT_LANE_PATIENCE: f64 = 10.0;

/// The amount by which an impatient driver raises its left-lane cap.
const LEFT_LANE_BOOST: f64 = 10.0;

/// Drivers below this speed rarely brake at random.
const SLOW_SPEED: f64 = 40.0;

/// The class of a vehicle, which fixes its size and performance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VehicleClass {
    Sedan,
    Compact,
    Truck,
    Articulated,
}

/// The performance and dimensions shared by all vehicles of a class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassParams {
    /// The speed the vehicle travels at on a clear road.
    pub top_speed: f64,
    /// The baseline acceleration capacity.
    pub max_acc: f64,
    /// The baseline deceleration capacity, a positive number.
    pub max_dec: f64,
    /// The longitudinal extent of the vehicle.
    pub length: f64,
    /// The lateral extent of the vehicle.
    pub width: f64,
}

impl VehicleClass {
    /// All vehicle classes.
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Sedan,
        VehicleClass::Compact,
        VehicleClass::Truck,
        VehicleClass::Articulated,
    ];

    /// The parameters of the class.
    pub fn params(self) -> ClassParams {
        let (top_speed, max_acc, max_dec, length) = match self {
            VehicleClass::Sedan => (100.0, 7.5, 13.5, 18.0),
            VehicleClass::Compact => (95.0, 4.5, 12.0, 15.0),
            VehicleClass::Truck => (85.0, 3.6, 12.0, 36.0),
            VehicleClass::Articulated => (90.0, 2.1, 12.0, 54.0),
        };
        ClassParams {
            top_speed,
            max_acc,
            max_dec,
            length,
            width: 6.0,
        }
    }

    /// The class's position in [VehicleClass::ALL].
    pub fn index(self) -> usize {
        match self {
            VehicleClass::Sedan => 0,
            VehicleClass::Compact => 1,
            VehicleClass::Truck => 2,
            VehicleClass::Articulated => 3,
        }
    }

    /// Whether the class is a heavy vehicle.
    pub fn is_heavy(self) -> bool {
        matches!(self, VehicleClass::Truck | VehicleClass::Articulated)
    }

    /// Picks one of the two classes of the light or heavy group.
    pub(crate) fn from_group(heavy: bool, second: bool) -> Self {
        match (heavy, second) {
            (false, false) => VehicleClass::Sedan,
            (false, true) => VehicleClass::Compact,
            (true, false) => VehicleClass::Truck,
            (true, true) => VehicleClass::Articulated,
        }
    }
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The vehicle's class.
    class: VehicleClass,
    /// The lane the vehicle belongs to.
    lane: Lane,
    /// The longitudinal position of the rear of the vehicle.
    pos: f64,
    /// The current speed.
    vel: f64,
    /// This vehicle's acceleration capacity.
    max_acc: f64,
    /// This vehicle's deceleration capacity.
    max_dec: f64,
    /// The speed this driver aims for in each lane.
    top_speed: PerLane<f64>,
    /// Whether the driver never moves into the left lane.
    only_right: bool,
    /// The in-progress lane change, if there is one.
    lane_change: Option<LaneChange>,
    /// The number of sections whose speed limits the driver has seen.
    sections_seen: usize,
    /// When the driver last settled into the left lane or raised its cap there.
    left_since: f64,
    /// Whether the left-lane cap has been raised since the last section sign.
    left_boosted: bool,
    /// Accumulated fuel consumption.
    fuel: f64,
    /// Accumulated emissions.
    emissions: f64,
    /// The number of ticks the vehicle has been simulated for.
    ticks: usize,
    /// The time the vehicle was created.
    created_at: f64,
    /// The time the vehicle left the road.
    removed_at: Option<f64>,
}

impl Vehicle {
    /// Creates a new vehicle at the entrance of `lane`, drawing its individual traits.
    pub(crate) fn new<R: Rng + ?Sized>(
        class: VehicleClass,
        lane: Lane,
        pos: f64,
        now: f64,
        rng: &mut R,
    ) -> Self {
        let params = class.params();
        let top_speed = match lane {
            Lane::Ramp => RAMP_SPEED_FACTOR * params.top_speed,
            _ => params.top_speed,
        };
        let max_acc = rng.gen_range(
            (1.0 - TRAIT_SPREAD) * params.max_acc..(1.0 + TRAIT_SPREAD) * params.max_acc,
        );
        let max_dec = rng.gen_range(
            (1.0 - TRAIT_SPREAD) * params.max_dec..(1.0 + TRAIT_SPREAD) * params.max_dec,
        );
        let only_right = rng.gen_bool(ONLY_RIGHT_PROBABILITY);
        Self {
            id: VehicleId::default(),
            class,
            lane,
            pos,
            vel: top_speed,
            max_acc,
            max_dec,
            top_speed: PerLane::splat(top_speed),
            only_right,
            lane_change: None,
            sections_seen: 0,
            left_since: now,
            left_boosted: false,
            fuel: 0.0,
            emissions: 0.0,
            ticks: 0,
            created_at: now,
            removed_at: None,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's class.
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// The lane the vehicle is in, or is moving into.
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// The longitudinal position of the rear of the vehicle.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// The vehicle's speed.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The vehicle's length.
    pub fn length(&self) -> f64 {
        self.class.params().length
    }

    /// The vehicle's width.
    pub fn width(&self) -> f64 {
        self.class.params().width
    }

    /// This vehicle's acceleration capacity.
    pub fn max_acc(&self) -> f64 {
        self.max_acc
    }

    /// This vehicle's deceleration capacity.
    pub fn max_dec(&self) -> f64 {
        self.max_dec
    }

    /// The speed the driver currently aims for in the given lane.
    pub fn top_speed(&self, lane: Lane) -> f64 {
        self.top_speed[lane]
    }

    /// Whether the driver never moves into the left lane.
    pub fn only_right(&self) -> bool {
        self.only_right
    }

    /// Whether the vehicle is part-way through a lane change.
    pub fn is_changing_lanes(&self) -> bool {
        self.lane_change.is_some()
    }

    /// The longitudinal extent of the vehicle.
    pub fn extent(&self) -> Interval<f64> {
        Interval::new(self.pos, self.pos + self.length())
    }

    /// Accumulated fuel consumption.
    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    /// Accumulated emissions.
    pub fn emissions(&self) -> f64 {
        self.emissions
    }

    /// The time the vehicle was created.
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// The time the vehicle left the road, once it has.
    pub fn removed_at(&self) -> Option<f64> {
        self.removed_at
    }

    /// The vehicle's lateral offset from the right lane centre at time `now`.
    pub fn lateral(&self, now: f64) -> f64 {
        self.lane_change
            .map(|lc| lc.lateral(now))
            .unwrap_or_else(|| self.lane.lateral())
    }

    /// The coordinates of the centre of the vehicle, for drawing.
    pub fn world_pos(&self, now: f64) -> Point2d {
        Point2d::new(self.pos + 0.5 * self.length(), self.lateral(now))
    }

    /// Overrides the vehicle's position and speed.
    pub(crate) fn set_state(&mut self, pos: f64, vel: f64) {
        self.pos = pos;
        self.vel = vel;
    }

    /// Overrides the driver's lane preference.
    pub(crate) fn set_only_right(&mut self, only_right: bool) {
        self.only_right = only_right;
    }

    /// Raises the left-lane cap of a driver that has been held up in the left lane.
    pub(crate) fn apply_left_lane_patience(&mut self, now: f64) {
        if self.lane == Lane::Left && !self.left_boosted && now - self.left_since > LEFT_LANE_PATIENCE {
            self.top_speed[Lane::Left] += LEFT_LANE_BOOST;
            self.left_boosted = true;
            self.left_since = now;
        }
    }

    /// Reads the speed limit of the next section once the vehicle has passed
    /// its start, and picks new target speeds for both main lanes.
    pub(crate) fn refresh_top_speed<R: Rng + ?Sized>(&mut self, ctx: &TickContext, rng: &mut R) {
        if self.lane == Lane::Ramp {
            return;
        }
        if ctx.config.section_length * self.sections_seen as f64 >= self.pos {
            return;
        }
        let section = match ctx.sections.get(self.sections_seen) {
            Some(section) => section,
            None => return,
        };
        let class_top = self.class.params().top_speed;
        for lane in Lane::MAIN {
            let limit = f64::min(section.speed_limit(lane), class_top);
            self.top_speed[lane] = rng.gen_range(0.95 * limit..1.01 * limit);
        }
        self.left_boosted = false;
        self.sections_seen += 1;
    }

    /// Moves the vehicle into `target` and begins the lateral transition.
    pub(crate) fn start_lane_change(&mut self, target: Lane, now: f64) {
        self.lane_change = Some(LaneChange::new(self.lane, target, now));
        self.lane = target;
    }

    /// Completes the lane change in progress once its transition has elapsed.
    pub(crate) fn update_lane_change(&mut self, now: f64) {
        if let Some(lc) = self.lane_change {
            if lc.is_complete(now) {
                self.lane_change = None;
                if self.lane == Lane::Left {
                    self.left_since = now;
                    self.left_boosted = false;
                }
            }
        }
    }

    /// The probability of braking at random this tick.
    pub(crate) fn braking_probability(&self, on_ramp_end: f64) -> f64 {
        if self.vel < SLOW_SPEED || self.pos > on_ramp_end {
            0.05
        } else if self.lane == Lane::Left {
            0.08
        } else {
            0.3
        }
    }

    /// The highest speed that keeps a safe gap to the vehicle ahead.
    /// Vehicles at the front of the ramp treat the end of the ramp as a stopped vehicle.
    pub(crate) fn follow_speed(&self, leader: Option<&Vehicle>, on_ramp_end: f64) -> f64 {
        match (leader, self.lane) {
            (Some(leader), _) => following_safe_speed(
                self.vel,
                leader.vel,
                self.pos,
                leader.pos,
                self.length(),
                self.max_dec,
            ),
            (None, Lane::Ramp) => safe_speed(self.vel, 0.0, self.pos, on_ramp_end, self.length(), self.max_dec),
            (None, _) => UNCONSTRAINED,
        }
    }

    /// Chooses the speed for the next tick given the safe speed behind the leader.
    pub(crate) fn choose_speed<R: Rng + ?Sized>(&self, safe: f64, ctx: &TickContext, rng: &mut R) -> f64 {
        let top = self.top_speed[self.lane];
        let braking = self.max_dec * ctx.dt;
        let new_vel = if self.vel > top {
            self.vel - braking
        } else {
            let vel = top.min(self.vel + self.max_acc * ctx.dt).min(safe);
            if rng.gen_bool(self.braking_probability(ctx.config.on_ramp_end)) {
                vel - braking
            } else {
                vel
            }
        };
        f64::max(new_vel, self.lane.min_speed())
    }

    /// Accounts for the change to `new_vel` and advances the vehicle's position.
    pub(crate) fn integrate(&mut self, new_vel: f64, dt: f64) {
        self.fuel += consumption(self.vel, new_vel, dt, ConsumptionKind::Fuel);
        self.emissions += consumption(self.vel, new_vel, dt, ConsumptionKind::Emissions);
        self.ticks += 1;
        self.vel = new_vel;
        self.pos += self.vel * dt;
    }

    /// Marks the vehicle as having left the road and summarises its trip.
    pub(crate) fn finish(&mut self, now: f64) -> TripRecord {
        self.removed_at = Some(now);
        let ticks = usize::max(self.ticks, 1) as f64;
        TripRecord {
            class: self.class,
            created_at: self.created_at,
            removed_at: now,
            lifetime: now - self.created_at,
            fuel: self.fuel / ticks,
            emissions: self.emissions / ticks,
        }
    }
}
