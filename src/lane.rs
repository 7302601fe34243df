use crate::{VehicleId, VehicleSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// The minimum speed of vehicles on the main carriageway.
const JAM_SPEED: f64 = 10.0;

/// The lateral distance between adjacent lane centres.
const LANE_WIDTH: f64 = 25.0;

/// A lane of the corridor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Lane {
    /// The on-ramp.
    Ramp,
    /// The right (slow) main lane.
    Right,
    /// The left (overtaking) main lane.
    Left,
}

impl Lane {
    /// All lanes, in update order.
    pub const ALL: [Lane; 3] = [Lane::Ramp, Lane::Right, Lane::Left];

    /// The lanes of the main carriageway.
    pub const MAIN: [Lane; 2] = [Lane::Right, Lane::Left];

    /// The lane's index: 0 for the ramp, 1 for the right lane, 2 for the left lane.
    pub fn index(self) -> usize {
        match self {
            Lane::Ramp => 0,
            Lane::Right => 1,
            Lane::Left => 2,
        }
    }

    /// Whether the lane is part of the main carriageway.
    pub fn is_main(self) -> bool {
        self != Lane::Ramp
    }

    /// The lowest speed a vehicle will voluntarily travel at in this lane.
    pub fn min_speed(self) -> f64 {
        match self {
            Lane::Ramp => 0.0,
            _ => JAM_SPEED,
        }
    }

    /// The lateral offset of the lane centre from the right lane centre.
    pub fn lateral(self) -> f64 {
        match self {
            Lane::Ramp => LANE_WIDTH,
            Lane::Right => 0.0,
            Lane::Left => -LANE_WIDTH,
        }
    }
}

/// A value stored for each lane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PerLane<T>(pub [T; 3]);

impl<T: Copy> PerLane<T> {
    pub fn splat(value: T) -> Self {
        Self([value; 3])
    }
}

impl<T> Index<Lane> for PerLane<T> {
    type Output = T;

    fn index(&self, lane: Lane) -> &T {
        &self.0[lane.index()]
    }
}

impl<T> IndexMut<Lane> for PerLane<T> {
    fn index_mut(&mut self, lane: Lane) -> &mut T {
        &mut self.0[lane.index()]
    }
}

/// The vehicles travelling in a lane, ordered from the rear of the lane to the front.
///
/// A vehicle's predecessor is the one immediately behind it in this order,
/// and its successor the one immediately ahead.
#[derive(Clone, Debug, Default)]
pub struct LaneChain {
    vehicles: Vec<VehicleId>,
}

impl LaneChain {
    /// The number of vehicles in the lane.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the lane is empty.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Iterates over the vehicles from the rear of the lane to the front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = VehicleId> + '_ {
        self.vehicles.iter().copied()
    }

    /// Whether the vehicle is in this lane.
    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.contains(&id)
    }

    /// The rear-most vehicle in the lane.
    pub fn rear(&self) -> Option<VehicleId> {
        self.vehicles.first().copied()
    }

    /// The vehicle immediately behind the given vehicle.
    pub fn predecessor(&self, id: VehicleId) -> Option<VehicleId> {
        let idx = self.position(id)?;
        idx.checked_sub(1).map(|idx| self.vehicles[idx])
    }

    /// The vehicle immediately ahead of the given vehicle.
    pub fn successor(&self, id: VehicleId) -> Option<VehicleId> {
        let idx = self.position(id)?;
        self.vehicles.get(idx + 1).copied()
    }

    /// Inserts the vehicle with the given ID according to its position.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        let veh_pos = vehicles[id].pos();
        let idx = self
            .vehicles
            .iter()
            .map(|id| vehicles[*id].pos())
            .position(|pos| pos > veh_pos)
            .unwrap_or(self.vehicles.len());
        self.vehicles.insert(idx, id);
    }

    /// Splices the vehicle into the lane between the given neighbours.
    /// Falls back to ordering by position if the neighbours are not adjacent.
    pub(crate) fn splice_vehicle(
        &mut self,
        vehicles: &VehicleSet,
        id: VehicleId,
        prev: Option<VehicleId>,
        next: Option<VehicleId>,
    ) {
        let prev_idx = prev.and_then(|prev| self.position(prev));
        let next_idx = next.and_then(|next| self.position(next));
        let idx = match (prev_idx, next_idx) {
            (Some(p), Some(n)) if p + 1 == n => Some(n),
            (None, Some(0)) if prev.is_none() => Some(0),
            (Some(p), None) if next.is_none() && p + 1 == self.vehicles.len() => Some(p + 1),
            (None, None) if prev.is_none() && next.is_none() && self.vehicles.is_empty() => Some(0),
            _ => None,
        };
        match idx {
            Some(idx) => self.vehicles.insert(idx, id),
            None => self.insert_vehicle(vehicles, id),
        }
    }

    /// Removes the vehicle with the given ID from the lane.
    /// Returns `true` iff the vehicle was in the lane.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) -> bool {
        if let Some(idx) = self.vehicles.iter().rposition(|v| *v == id) {
            self.vehicles.remove(idx);
            true
        } else {
            false
        }
    }

    fn position(&self, id: VehicleId) -> Option<usize> {
        self.vehicles.iter().position(|v| *v == id)
    }
}
