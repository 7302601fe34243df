//! Variable speed limits.
//!
//! The road is divided into sections, each with a posted limit per lane.
//! Every tick the controller aggregates the vehicles in each section and
//! lowers the limit where traffic is congested, restoring it once traffic
//! recovers.

use crate::config::{ControlAlgorithm, SimConfig};
use crate::lane::Lane;
use crate::section::{build_sections, section_index, RoadSection};
use itertools::Itertools;

/// The minimum time between successive changes.
const COOLDOWN: f64 = 20.0;

/// The desired time headway in the kinematic wave model.
const WAVE_HEADWAY: f64 = 1.0;

/// The jam spacing in the kinematic wave model.
const WAVE_JAM_SPACING: f64 = 15.0;

/// The kinematic wave limit is never lower than this fraction of the baseline.
const WAVE_FLOOR: f64 = 0.7;

/// The vehicle count a section must exceed before the per-lane algorithm reacts.
const REACTIVE_MIN_COUNT: usize = 4;

/// The vehicle count a section must exceed before the backward algorithm reacts.
const BACKWARD_MIN_COUNT: usize = 5;

/// The position and speed of one vehicle, as seen by the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Probe {
    pub lane: Lane,
    pub pos: f64,
    pub vel: f64,
}

/// The vehicles in one section.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Occupancy {
    count: usize,
    mean_speed: f64,
}

/// The fraction of the baseline limit posted on congested sections.
pub fn reducing_coefficient(base_speed: f64) -> f64 {
    if base_speed < 80.0 {
        0.9
    } else if base_speed < 100.0 {
        0.87
    } else {
        0.85
    }
}

/// The speed at which upstream traffic can approach slower downstream
/// traffic `distance` ahead, following the shock wave between them under a
/// linear speed-density relation.
///
/// Returns `base_speed` if the upstream traffic is no faster.
pub fn kinematic_wave_speed(downstream: f64, upstream: f64, distance: f64, base_speed: f64) -> f64 {
    if upstream <= downstream {
        return base_speed;
    }
    let density = |speed: f64| 1.0 / (speed * WAVE_HEADWAY + WAVE_JAM_SPACING);
    let (rho_up, rho_down) = (density(upstream), density(downstream));
    let tau = distance / (upstream - downstream);
    let wave = (downstream * rho_down - upstream * rho_up) / (rho_down - rho_up);
    downstream + (distance + wave * tau - downstream * WAVE_HEADWAY) / tau
}

/// Adjusts section speed limits according to traffic conditions.
#[derive(Clone, Debug)]
pub struct SpeedLimitController {
    /// The road sections, in order.
    sections: Vec<RoadSection>,
    road_length: f64,
    section_length: f64,
    /// The limit posted in free-flowing conditions.
    base_speed: f64,
    /// Whether limits change at all.
    adaptive: bool,
    algorithm: ControlAlgorithm,
    slow_cars_coefficient: f64,
    reducing_coefficient: f64,
    steps_backward: usize,
    /// When the gated algorithms last changed a limit.
    last_update: f64,
}

impl SpeedLimitController {
    /// Creates a controller with every section posted at the baseline limit.
    /// The configuration must already be validated.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            sections: build_sections(config.road_length, config.section_length, config.base_speed),
            road_length: config.road_length,
            section_length: config.section_length,
            base_speed: config.base_speed,
            adaptive: config.adaptive,
            algorithm: config.algorithm,
            slow_cars_coefficient: config.slow_cars_coefficient,
            reducing_coefficient: reducing_coefficient(config.base_speed),
            steps_backward: config.steps_backward,
            last_update: 0.0,
        }
    }

    /// The road sections, in order.
    pub fn sections(&self) -> &[RoadSection] {
        &self.sections
    }

    /// The section containing `pos`.
    pub fn section_at(&self, pos: f64) -> Option<&RoadSection> {
        section_index(pos, self.section_length, self.sections.len()).map(|idx| &self.sections[idx])
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> ControlAlgorithm {
        self.algorithm
    }

    /// The limit posted in free-flowing conditions.
    pub fn base_speed(&self) -> f64 {
        self.base_speed
    }

    /// The limit posted on congested sections.
    pub fn reduced_speed(&self) -> f64 {
        self.base_speed * self.reducing_coefficient
    }

    /// When a gated algorithm last changed a limit.
    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    /// Updates the section limits from the current positions and speeds of the vehicles.
    pub fn update(&mut self, now: f64, probes: &[Probe]) {
        match self.algorithm {
            ControlAlgorithm::PerLaneReactive => {
                for lane in Lane::MAIN {
                    let occupancy = self.occupancy(probes.iter().filter(|p| p.lane == lane));
                    self.update_reactive(now, lane, &occupancy);
                }
            }
            _ if now - self.last_update < COOLDOWN => {}
            ControlAlgorithm::BackwardPropagating => {
                let occupancy = self.occupancy(probes.iter().filter(|p| p.lane.is_main()));
                self.update_backward(now, &occupancy);
            }
            ControlAlgorithm::PairwiseKinematicWave => {
                let occupancy = self.occupancy(probes.iter().filter(|p| p.lane.is_main()));
                self.update_pairwise(now, &occupancy);
            }
        }
    }

    /// Counts the vehicles in each section and their mean speed.
    fn occupancy<'a>(&self, probes: impl Iterator<Item = &'a Probe>) -> Vec<Occupancy> {
        let mut occupancy = vec![Occupancy::default(); self.sections.len()];
        for probe in probes.filter(|p| p.pos < self.road_length) {
            if let Some(idx) = section_index(probe.pos, self.section_length, self.sections.len()) {
                occupancy[idx].count += 1;
                occupancy[idx].mean_speed += probe.vel;
            }
        }
        for section in &mut occupancy {
            if section.count > 0 {
                section.mean_speed /= section.count as f64;
            }
        }
        log::trace!("section occupancy: {:?}", occupancy);
        occupancy
    }

    /// Lowers the limit of each congested section in `lane`, and restores it
    /// once the lane has been clear of congestion for the cooldown period.
    fn update_reactive(&mut self, now: f64, lane: Lane, occupancy: &[Occupancy]) {
        if !self.adaptive {
            return;
        }
        let reduced = self.reduced_speed();
        for (idx, (section, occ)) in self.sections.iter_mut().zip(occupancy).enumerate() {
            let threshold = self.slow_cars_coefficient * section.speed_limit(lane);
            if occ.count > REACTIVE_MIN_COUNT && occ.mean_speed < threshold {
                if section.set_speed_limit(lane, reduced, now) {
                    log::info!("section {} {:?} lane limit lowered to {:.1}", idx, lane, reduced);
                }
            } else if now - section.last_update(lane) >= COOLDOWN
                && section.speed_limit(lane) != self.base_speed
            {
                section.set_speed_limit(lane, self.base_speed, now);
                log::info!("section {} {:?} lane limit restored to {:.1}", idx, lane, self.base_speed);
            }
        }
    }

    /// Lowers the limits of each congested section and of the sections
    /// behind it; every other section returns to the baseline.
    fn update_backward(&mut self, now: f64, occupancy: &[Occupancy]) {
        if !self.adaptive {
            return;
        }
        let reduced = self.reduced_speed();
        let mut marked = vec![false; self.sections.len()];
        let mut changed = false;

        for (idx, occ) in occupancy.iter().enumerate().skip(1) {
            let threshold = self.slow_cars_coefficient * self.sections[idx].speed_limit(Lane::Right);
            let congested = occ.count > BACKWARD_MIN_COUNT && occ.mean_speed < threshold;
            let upstream = idx.saturating_sub(self.steps_backward)..=idx;
            for j in upstream.rev() {
                if congested {
                    marked[j] = true;
                    changed |= self.set_main_limits(j, reduced, now);
                } else if !marked[j] {
                    changed |= self.set_main_limits(j, self.base_speed, now);
                }
            }
            if congested {
                log::info!("section {} congested, slowing sections {}..={}", idx, idx.saturating_sub(self.steps_backward), idx);
            }
        }

        if changed {
            self.last_update = now;
        }
    }

    /// Sets each section's limit from the shock wave between it and the next
    /// section, where both are occupied.
    fn update_pairwise(&mut self, now: f64, occupancy: &[Occupancy]) {
        let mut evaluated = false;
        for ((idx, upstream), (_, downstream)) in occupancy.iter().enumerate().tuple_windows() {
            if upstream.count == 0 || downstream.count == 0 {
                continue;
            }
            evaluated = true;
            if self.adaptive {
                let wave = kinematic_wave_speed(
                    downstream.mean_speed,
                    upstream.mean_speed,
                    self.section_length,
                    self.base_speed,
                );
                let limit = f64::max(wave, WAVE_FLOOR * self.base_speed);
                if self.set_main_limits(idx, limit, now) {
                    log::info!("section {} limit set to {:.1}", idx, limit);
                }
            }
        }
        if evaluated {
            self.last_update = now;
        }
    }

    /// Posts `limit` in both main lanes of a section. Returns `true` iff either changed.
    fn set_main_limits(&mut self, idx: usize, limit: f64, now: f64) -> bool {
        Lane::MAIN
            .iter()
            .fold(false, |changed, lane| self.sections[idx].set_speed_limit(*lane, limit, now) | changed)
    }
}
