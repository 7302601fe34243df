/// A configuration that cannot be simulated.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("road length must be positive, got {0}")]
    RoadLength(f64),
    #[error("section length must be positive, got {0}")]
    SectionLength(f64),
    #[error("baseline speed limit must be positive, got {0}")]
    BaseSpeed(f64),
    #[error("tick duration must be positive, got {0}")]
    TickDuration(f64),
    #[error("on-ramp [{start}, {end}] must lie within the road and have start < end")]
    OnRamp { start: f64, end: f64 },
    #[error("slow cars coefficient must be in (0, 1], got {0}")]
    SlowCarsCoefficient(f64),
    #[error("arrival schedule has no periods")]
    NoArrivalPeriods,
    #[error("arrival period {period} has a non-positive duration or interval")]
    ArrivalPeriod { period: usize },
    #[error("arrival period {period} has no vehicles in its class mix for lane {lane}")]
    ClassMix { period: usize, lane: usize },
    #[cfg(feature = "serde")]
    #[error("error parsing configuration: {0}")]
    Parse(String),
}
