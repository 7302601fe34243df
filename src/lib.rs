pub use cgmath;
pub use arrivals::{Arrival, ArrivalSource, ScheduledArrivals};
pub use config::{ArrivalConfig, ControlAlgorithm, SimConfig};
pub use controller::{kinematic_wave_speed, reducing_coefficient, Probe, SpeedLimitController};
pub use error::ConfigError;
pub use lane::{Lane, LaneChain};
pub use section::RoadSection;
pub use simulation::{SectionView, Simulation, VehicleView};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use stats::{ArrivalCounts, RunStatistics, Summary, TripRecord};
pub use util::Interval;
pub use vehicle::consumption::{consumption, ConsumptionKind};
pub use vehicle::safe_speed::{aggressiveness, safe_distance, safe_speed, safe_speed_aggressive, UNCONSTRAINED};
pub use vehicle::{ClassParams, Vehicle, VehicleClass};

mod arrivals;
mod config;
mod controller;
#[cfg(feature = "debug")]
mod debug;
mod error;
mod lane;
pub mod math;
mod section;
mod simulation;
mod stats;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
