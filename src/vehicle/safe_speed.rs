//! Safe-speed model of car following.
//!
//! Positions refer to the rear of each vehicle, so the gap between a follower
//! and its leader is `leader_pos - pos - length`, where `length` is the
//! follower's own length.

/// Returned when the follower is no faster than its leader and so is not
/// constrained by it. Larger than any attainable speed.
pub const UNCONSTRAINED: f64 = 200.0;

/// Within this distance of the leader, the follower simply matches its speed.
const NEAR_FIELD: f64 = 10.0;

/// The driver reaction time when judging a gap to a neighbour.
const REACTION_TIME: f64 = 0.5;

/// The driver reaction time when following the vehicle directly ahead.
const FOLLOWING_REACTION_TIME: f64 = 1.0;

/// The desired bumper-to-bumper distance at the given speed.
pub fn safe_distance(speed: f64) -> f64 {
    speed * 0.15 + 8.5
}

/// The highest speed the follower may hold without closing to an unsafe gap.
///
/// # Parameters
/// * `speed` - The follower's speed.
/// * `leader_speed` - The leader's speed.
/// * `pos` - The follower's position.
/// * `leader_pos` - The leader's position.
/// * `length` - The follower's length.
/// * `dec` - The follower's deceleration capacity.
pub fn safe_speed(speed: f64, leader_speed: f64, pos: f64, leader_pos: f64, length: f64, dec: f64) -> f64 {
    if pos >= leader_pos - NEAR_FIELD {
        return leader_speed;
    }
    if speed <= leader_speed {
        return UNCONSTRAINED;
    }
    closing_speed(speed, leader_speed, pos, leader_pos, length, dec, REACTION_TIME)
}

/// Like [safe_speed], but credits the follower's braking distance back to it,
/// which lets merging vehicles accept tighter gaps.
pub fn safe_speed_aggressive(
    speed: f64,
    leader_speed: f64,
    pos: f64,
    leader_pos: f64,
    length: f64,
    dec: f64,
) -> f64 {
    if pos >= leader_pos - NEAR_FIELD {
        return leader_speed;
    }
    if speed <= leader_speed {
        return UNCONSTRAINED;
    }
    let safe = closing_speed(speed, leader_speed, pos, leader_pos, length, dec, REACTION_TIME);
    let braking_time = (speed - leader_speed) / dec;
    safe + dec * braking_time * braking_time / (2.0 * (braking_time + REACTION_TIME))
}

/// The aggressiveness of a merging driver at the given speed.
///
/// Not applied by [safe_speed_aggressive]; kept as a tuning input for merge behaviour.
pub fn aggressiveness(speed: f64) -> f64 {
    if speed < 20.0 {
        1.5
    } else {
        1.2
    }
}

/// The safe speed of a vehicle behind its direct leader.
pub(crate) fn following_safe_speed(
    speed: f64,
    leader_speed: f64,
    pos: f64,
    leader_pos: f64,
    length: f64,
    dec: f64,
) -> f64 {
    if speed <= leader_speed {
        return UNCONSTRAINED;
    }
    if pos >= leader_pos - NEAR_FIELD {
        return leader_speed;
    }
    closing_speed(speed, leader_speed, pos, leader_pos, length, dec, FOLLOWING_REACTION_TIME)
}

fn closing_speed(
    speed: f64,
    leader_speed: f64,
    pos: f64,
    leader_pos: f64,
    length: f64,
    dec: f64,
    reaction_time: f64,
) -> f64 {
    let gap = leader_pos - pos - length;
    let braking_time = (speed - leader_speed) / dec;
    leader_speed + (gap - safe_distance(speed)) / (braking_time + reaction_time)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn slower_follower_is_unconstrained() {
        for (speed, leader_speed) in [(0.0, 0.0), (20.0, 20.0), (35.0, 80.0), (99.0, 100.0)] {
            assert_eq!(safe_speed(speed, leader_speed, 0.0, 300.0, 18.0, 12.0), UNCONSTRAINED);
            assert_eq!(
                safe_speed_aggressive(speed, leader_speed, 0.0, 300.0, 18.0, 12.0),
                UNCONSTRAINED
            );
        }
    }

    #[test]
    fn near_field_matches_leader() {
        assert_eq!(safe_speed(80.0, 20.0, 100.0, 105.0, 18.0, 12.0), 20.0);
        assert_eq!(safe_speed(10.0, 30.0, 100.0, 110.0, 18.0, 12.0), 30.0);
        assert_eq!(safe_speed(80.0, 20.0, 120.0, 100.0, 18.0, 12.0), 20.0);
    }

    #[test]
    fn closing_on_leader() {
        assert_approx_eq!(safe_distance(40.0), 14.5);
        let expected = 20.0 + (95.0 - 14.5) / (20.0 / 12.0 + 0.5);
        assert_approx_eq!(safe_speed(40.0, 20.0, 100.0, 200.0, 5.0, 12.0), expected);
        assert_approx_eq!(safe_speed(40.0, 20.0, 100.0, 200.0, 5.0, 12.0), 57.15, 0.01);
    }

    #[test]
    fn aggressive_is_more_permissive() {
        let normal = safe_speed(40.0, 20.0, 100.0, 200.0, 5.0, 12.0);
        let aggressive = safe_speed_aggressive(40.0, 20.0, 100.0, 200.0, 5.0, 12.0);
        let braking_time: f64 = 20.0 / 12.0;
        let bonus = 12.0 * braking_time.powi(2) / (2.0 * (braking_time + 0.5));
        assert_approx_eq!(aggressive, normal + bonus);
        assert_eq!(aggressiveness(15.0), 1.5);
        assert_eq!(aggressiveness(20.0), 1.2);
    }

    #[test]
    fn following_uses_longer_reaction() {
        let expected = 20.0 + (95.0 - 14.5) / (20.0 / 12.0 + 1.0);
        assert_approx_eq!(following_safe_speed(40.0, 20.0, 100.0, 200.0, 5.0, 12.0), expected);
        assert_eq!(following_safe_speed(20.0, 20.0, 100.0, 105.0, 5.0, 12.0), UNCONSTRAINED);
    }
}
