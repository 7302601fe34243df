//! Trip records and run statistics.

use crate::lane::Lane;
use crate::vehicle::VehicleClass;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A summary of one vehicle's completed trip.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TripRecord {
    pub class: VehicleClass,
    /// The time the vehicle was created.
    pub created_at: f64,
    /// The time the vehicle passed the end of the road.
    pub removed_at: f64,
    /// The time between creation and removal.
    pub lifetime: f64,
    /// Mean fuel consumption per tick.
    pub fuel: f64,
    /// Mean emissions per tick.
    pub emissions: f64,
}

/// The mean and population standard deviation of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    pub mean: f64,
    pub sd: f64,
}

impl Summary {
    /// Summarises a sample. An empty sample has zero mean and deviation.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Self {
        let samples: Vec<f64> = samples.into_iter().collect();
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            sd: var.sqrt(),
        }
    }
}

/// The number of vehicles produced, per period, per lane, per class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrivalCounts {
    counts: Vec<[[usize; 4]; 3]>,
}

impl ArrivalCounts {
    pub(crate) fn record(&mut self, period: usize, lane: Lane, class: VehicleClass) {
        if self.counts.len() <= period {
            self.counts.resize(period + 1, Default::default());
        }
        self.counts[period][lane.index()][class.index()] += 1;
    }

    /// The number of vehicles of `class` produced in `lane` during `period`.
    pub fn get(&self, period: usize, lane: Lane, class: VehicleClass) -> usize {
        self.counts
            .get(period)
            .map_or(0, |lanes| lanes[lane.index()][class.index()])
    }

    /// The number of light or heavy vehicles produced in `lane` during `period`.
    pub fn group(&self, period: usize, lane: Lane, heavy: bool) -> usize {
        VehicleClass::ALL
            .iter()
            .filter(|class| class.is_heavy() == heavy)
            .map(|class| self.get(period, lane, *class))
            .sum()
    }

    /// The total number of vehicles produced.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().flatten().sum()
    }

    /// The number of periods with recorded arrivals.
    pub fn periods(&self) -> usize {
        self.counts.len()
    }
}

/// Aggregate statistics of a simulation run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunStatistics {
    /// The number of completed trips.
    pub trips: usize,
    /// Trip duration.
    pub trip_time: Summary,
    /// Mean fuel consumption per trip.
    pub fuel: Summary,
    /// Mean emissions per trip.
    pub emissions: Summary,
    /// The vehicles produced by the arrival schedule.
    pub arrivals: ArrivalCounts,
}

impl RunStatistics {
    pub(crate) fn new(trips: &[TripRecord], arrivals: ArrivalCounts) -> Self {
        Self {
            trips: trips.len(),
            trip_time: Summary::from_samples(trips.iter().map(|t| t.lifetime)),
            fuel: Summary::from_samples(trips.iter().map(|t| t.fuel)),
            emissions: Summary::from_samples(trips.iter().map(|t| t.emissions)),
            arrivals,
        }
    }
}
