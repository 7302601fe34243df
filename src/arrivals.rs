//! Vehicle arrival events and the production schedule that generates them.

use crate::config::ArrivalConfig;
use crate::lane::{Lane, PerLane};
use crate::vehicle::VehicleClass;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Uniform};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// A request to add a vehicle to the entrance of a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrival {
    pub lane: Lane,
    pub class: VehicleClass,
    /// The time at which the vehicle was produced.
    pub time: f64,
    /// The schedule period in which the vehicle was produced.
    pub period: usize,
}

/// A source of vehicle arrivals.
pub trait ArrivalSource {
    /// Returns the arrivals due at time `now`.
    fn poll(&mut self, now: f64, rng: &mut dyn RngCore) -> SmallVec<[Arrival; 3]>;

    /// Whether the source will produce no further arrivals.
    fn is_exhausted(&self) -> bool;
}

/// A fixed list of arrivals, ordered by time.
impl ArrivalSource for VecDeque<Arrival> {
    fn poll(&mut self, now: f64, _rng: &mut dyn RngCore) -> SmallVec<[Arrival; 3]> {
        let mut due = SmallVec::new();
        while let Some(arrival) = self.front() {
            if arrival.time > now {
                break;
            }
            due.extend(self.pop_front());
        }
        due
    }

    fn is_exhausted(&self) -> bool {
        self.is_empty()
    }
}

/// Produces vehicles in every lane at jittered intervals, with rates and vehicle
/// mix that change from one period of the schedule to the next.
#[derive(Clone, Debug)]
pub struct ScheduledArrivals {
    config: ArrivalConfig,
    /// The current period of the schedule.
    period: usize,
    /// The time the current period began.
    period_start: f64,
    /// The time of the last arrival in each lane.
    last_arrival: PerLane<f64>,
    /// The number of vehicles produced in each lane.
    produced: PerLane<usize>,
    /// The jitter factor of the next interval in each lane, once drawn.
    jitter: PerLane<Option<f64>>,
}

impl ScheduledArrivals {
    /// Creates a schedule starting at time zero.
    pub fn new(config: ArrivalConfig) -> Self {
        Self {
            config,
            period: 0,
            period_start: 0.0,
            last_arrival: PerLane::splat(0.0),
            produced: PerLane::splat(0),
            jitter: PerLane::splat(None),
        }
    }

    /// The current period of the schedule.
    pub fn period(&self) -> usize {
        self.period
    }

    /// The time to wait between the previous arrival in `lane` and the next.
    fn interval(&mut self, lane: Lane, rng: &mut dyn RngCore) -> f64 {
        let spread = self.config.jitter;
        let factor = *self.jitter[lane]
            .get_or_insert_with(|| Uniform::new_inclusive(1.0 - spread, 1.0 + spread).sample(rng));
        let interval = factor * self.config.mean_intervals[self.period][lane.index()];
        // The first vehicle in the right lane comes early to seed the road
        if self.period == 0 && lane == Lane::Right && self.produced[lane] == 0 {
            0.5 * interval
        } else {
            interval
        }
    }

    /// Picks the class of a new vehicle: light or heavy according to the
    /// period's mix, then either class of the group with equal probability.
    fn pick_class(&self, lane: Lane, rng: &mut dyn RngCore) -> VehicleClass {
        let [light, heavy] = self.config.class_mix[self.period][lane.index()];
        let p_heavy = heavy / (light + heavy);
        let is_heavy = rng.gen_bool(p_heavy);
        let second = rng.gen_bool(0.5);
        VehicleClass::from_group(is_heavy, second)
    }
}

impl ArrivalSource for ScheduledArrivals {
    fn poll(&mut self, now: f64, rng: &mut dyn RngCore) -> SmallVec<[Arrival; 3]> {
        let mut due = SmallVec::new();
        while !self.is_exhausted() && now - self.period_start > self.config.period_durations[self.period] {
            self.period_start += self.config.period_durations[self.period];
            self.period += 1;
            log::info!("arrival schedule entered period {} at t={:.1}", self.period, now);
        }
        if self.is_exhausted() {
            return due;
        }

        for lane in Lane::ALL {
            let interval = self.interval(lane, rng);
            if now - self.last_arrival[lane] > interval {
                due.push(Arrival {
                    lane,
                    class: self.pick_class(lane, rng),
                    time: now,
                    period: self.period,
                });
                self.last_arrival[lane] = now;
                self.produced[lane] += 1;
                self.jitter[lane] = None;
            }
        }
        due
    }

    fn is_exhausted(&self) -> bool {
        self.period >= self.config.periods()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn short_schedule() -> ArrivalConfig {
        ArrivalConfig {
            period_durations: vec![10.0, 10.0],
            mean_intervals: vec![[4.0, 2.0, 2.0], [4.0, 1.0, 1.0]],
            jitter: 0.1,
            class_mix: vec![[[1.0, 0.0]; 3], [[0.0, 1.0]; 3]],
        }
    }

    #[test]
    fn follows_schedule() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut source = ScheduledArrivals::new(short_schedule());
        let mut arrivals = vec![];
        let mut t = 0.0;
        while !source.is_exhausted() {
            arrivals.extend(source.poll(t, &mut rng));
            t += 0.05;
        }
        assert!(t > 20.0 && t < 20.2);
        assert_eq!(source.period(), 2);

        let in_period = |period, lane| {
            arrivals
                .iter()
                .filter(|a| a.period == period && a.lane == lane)
                .count()
        };
        // Intervals of 2 ± 10% over 10 time units, the first one halved
        assert!((4..=6).contains(&in_period(0, Lane::Right)));
        assert!((2..=3).contains(&in_period(0, Lane::Ramp)));
        assert!((8..=11).contains(&in_period(1, Lane::Left)));

        // The class mix switches from light to heavy vehicles
        assert!(arrivals.iter().filter(|a| a.period == 0).all(|a| !a.class.is_heavy()));
        assert!(arrivals.iter().filter(|a| a.period == 1).all(|a| a.class.is_heavy()));
    }

    #[test]
    fn first_right_lane_arrival_is_early() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut source = ScheduledArrivals::new(short_schedule());
        let mut t = 0.0;
        let first = loop {
            if let Some(arrival) = source.poll(t, &mut rng).into_iter().find(|a| a.lane == Lane::Right) {
                break arrival;
            }
            t += 0.05;
        };
        assert!(first.time > 0.9 && first.time < 1.2);
    }

    #[test]
    fn scripted_arrivals() {
        let mut rng = StdRng::seed_from_u64(0);
        let arrival = |time| Arrival {
            lane: Lane::Left,
            class: VehicleClass::Sedan,
            time,
            period: 0,
        };
        let mut source: VecDeque<Arrival> = vec![arrival(0.0), arrival(1.0), arrival(1.0)].into();
        assert_eq!(source.poll(0.5, &mut rng).len(), 1);
        assert!(!source.is_exhausted());
        assert_eq!(source.poll(1.0, &mut rng).len(), 2);
        assert!(source.is_exhausted());
    }
}
