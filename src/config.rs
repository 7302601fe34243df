use crate::error::ConfigError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The algorithm used to adjust section speed limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControlAlgorithm {
    /// Reacts to congestion in each lane of each section independently, every tick.
    #[default]
    PerLaneReactive,
    /// Lowers the limit of a congested section and the sections behind it.
    BackwardPropagating,
    /// Sets each section's limit from the kinematic wave between it and the section ahead.
    PairwiseKinematicWave,
}

/// The parameters of a simulation run.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SimConfig {
    /// The length of the main carriageway.
    pub road_length: f64,
    /// The length of each speed-limit section.
    pub section_length: f64,
    /// The position at which the on-ramp starts.
    pub on_ramp_start: f64,
    /// The position at which the on-ramp ends.
    pub on_ramp_end: f64,
    /// The baseline speed limit.
    pub base_speed: f64,
    /// Whether the speed limits adapt to traffic at all.
    pub adaptive: bool,
    /// The speed-limit algorithm.
    pub algorithm: ControlAlgorithm,
    /// A section is congested when its mean speed is below this fraction of its limit.
    pub slow_cars_coefficient: f64,
    /// The number of upstream sections slowed along with a congested one.
    pub steps_backward: usize,
    /// The simulated duration of one tick.
    pub dt: f64,
    /// The seed of the random number generator.
    pub seed: u64,
    /// The vehicle arrival schedule.
    pub arrivals: ArrivalConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            road_length: 10000.0,
            section_length: 1000.0,
            on_ramp_start: 2000.0,
            on_ramp_end: 3000.0,
            base_speed: 100.0,
            adaptive: true,
            algorithm: ControlAlgorithm::PerLaneReactive,
            slow_cars_coefficient: 0.7,
            steps_backward: 1,
            dt: 0.05,
            seed: 0,
            arrivals: ArrivalConfig::default(),
        }
    }
}

impl SimConfig {
    /// Checks that the configuration describes a road that can be simulated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.road_length > 0.0) {
            return Err(ConfigError::RoadLength(self.road_length));
        }
        if !(self.section_length > 0.0) {
            return Err(ConfigError::SectionLength(self.section_length));
        }
        if !(self.base_speed > 0.0) {
            return Err(ConfigError::BaseSpeed(self.base_speed));
        }
        if !(self.dt > 0.0) {
            return Err(ConfigError::TickDuration(self.dt));
        }
        let ramp_ok = self.on_ramp_start >= 0.0
            && self.on_ramp_start < self.on_ramp_end
            && self.on_ramp_end <= self.road_length;
        if !ramp_ok {
            return Err(ConfigError::OnRamp {
                start: self.on_ramp_start,
                end: self.on_ramp_end,
            });
        }
        if !(self.slow_cars_coefficient > 0.0 && self.slow_cars_coefficient <= 1.0) {
            return Err(ConfigError::SlowCarsCoefficient(self.slow_cars_coefficient));
        }
        self.arrivals.validate()
    }

    /// Parses a JSON configuration and validates it.
    /// Missing fields take their default values.
    #[cfg(feature = "serde")]
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(data).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// The vehicle production schedule: a sequence of periods, each with its own
/// arrival rate and vehicle mix per lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ArrivalConfig {
    /// The duration of each period.
    pub period_durations: Vec<f64>,
    /// The mean time between arrivals, per period, per lane.
    pub mean_intervals: Vec<[f64; 3]>,
    /// The relative jitter applied to each interval, e.g. 0.1 for ±10%.
    pub jitter: f64,
    /// The relative number of light and heavy vehicles, per period, per lane.
    pub class_mix: Vec<[[f64; 2]; 3]>,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            period_durations: vec![900.0, 1800.0, 900.0],
            mean_intervals: vec![[9.0, 3.6, 3.6], [9.0, 2.0, 2.0], [9.0, 3.6, 3.6]],
            jitter: 0.1,
            class_mix: vec![
                [[200.0, 200.0], [720.0, 80.0], [720.0, 80.0]],
                [[200.0, 200.0], [900.0, 100.0], [900.0, 100.0]],
                [[200.0, 200.0], [720.0, 80.0], [720.0, 80.0]],
            ],
        }
    }
}

impl ArrivalConfig {
    /// The number of periods in the schedule.
    pub fn periods(&self) -> usize {
        self.period_durations.len()
    }

    /// Checks that every period has a usable rate and vehicle mix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_durations.is_empty() {
            return Err(ConfigError::NoArrivalPeriods);
        }
        for period in 0..self.periods() {
            let intervals = self.mean_intervals.get(period);
            let duration_ok = self.period_durations[period] > 0.0;
            let intervals_ok = intervals.map_or(false, |iv| iv.iter().all(|t| *t > 0.0));
            if !duration_ok || !intervals_ok || !(0.0..1.0).contains(&self.jitter) {
                return Err(ConfigError::ArrivalPeriod { period });
            }
            let mix = self
                .class_mix
                .get(period)
                .ok_or(ConfigError::ClassMix { period, lane: 0 })?;
            for (lane, [light, heavy]) in mix.iter().enumerate() {
                if *light < 0.0 || *heavy < 0.0 || !(light + heavy > 0.0) {
                    return Err(ConfigError::ClassMix { period, lane });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_geometry() {
        let config = SimConfig {
            road_length: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::RoadLength(0.0)));

        let config = SimConfig {
            section_length: -5.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::SectionLength(-5.0)));

        let config = SimConfig {
            base_speed: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::BaseSpeed(0.0)));

        let config = SimConfig {
            on_ramp_start: 3000.0,
            on_ramp_end: 2000.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::OnRamp { .. })));
    }

    #[test]
    fn rejects_empty_class_mix() {
        let mut config = SimConfig::default();
        config.arrivals.class_mix[1][2] = [0.0, 0.0];
        assert_eq!(
            config.validate(),
            Err(ConfigError::ClassMix { period: 1, lane: 2 })
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn parses_partial_json() {
        let config = SimConfig::from_json(
            r#"{ "road_length": 5000.0, "on_ramp_start": 500.0, "on_ramp_end": 900.0,
                 "algorithm": "BackwardPropagating" }"#,
        )
        .unwrap();
        assert_eq!(config.road_length, 5000.0);
        assert_eq!(config.algorithm, ControlAlgorithm::BackwardPropagating);
        assert_eq!(config.section_length, 1000.0);

        assert!(SimConfig::from_json(r#"{ "road_length": -1.0 }"#).is_err());
    }
}
