use crate::lane::{Lane, PerLane};
use crate::util::Interval;

/// A fixed-length stretch of road with its own posted speed limit in each lane.
#[derive(Clone, Debug)]
pub struct RoadSection {
    /// The longitudinal extent of the section.
    bounds: Interval<f64>,
    /// The posted speed limit in each lane.
    limits: PerLane<f64>,
    /// The simulation time at which each lane's limit was last changed.
    last_update: PerLane<f64>,
}

impl RoadSection {
    /// Creates a section posted at `speed_limit` in every lane.
    pub(crate) fn new(bounds: Interval<f64>, speed_limit: f64, now: f64) -> Self {
        Self {
            bounds,
            limits: PerLane::splat(speed_limit),
            last_update: PerLane::splat(now),
        }
    }

    /// The longitudinal extent of the section.
    pub fn bounds(&self) -> Interval<f64> {
        self.bounds
    }

    /// The posted speed limit in the given lane.
    pub fn speed_limit(&self, lane: Lane) -> f64 {
        self.limits[lane]
    }

    /// The time at which the given lane's limit was last changed.
    pub fn last_update(&self, lane: Lane) -> f64 {
        self.last_update[lane]
    }

    /// Posts a new limit in the given lane. Returns `true` iff the limit changed.
    pub(crate) fn set_speed_limit(&mut self, lane: Lane, limit: f64, now: f64) -> bool {
        let changed = self.limits[lane] != limit;
        self.limits[lane] = limit;
        self.last_update[lane] = now;
        changed
    }
}

/// Divides a road into consecutive sections of equal length.
/// The final section is truncated at the end of the road.
pub(crate) fn build_sections(road_length: f64, section_length: f64, speed_limit: f64) -> Vec<RoadSection> {
    let count = (road_length / section_length).ceil() as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * section_length;
            let end = f64::min(start + section_length, road_length);
            RoadSection::new(Interval::new(start, end), speed_limit, 0.0)
        })
        .collect()
}

/// The index of the section containing `pos`, if it is on the road.
pub(crate) fn section_index(pos: f64, section_length: f64, count: usize) -> Option<usize> {
    if pos < 0.0 {
        return None;
    }
    let idx = (pos / section_length) as usize;
    (idx < count).then_some(idx)
}
