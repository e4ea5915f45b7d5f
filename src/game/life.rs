use crate::game::note::FailureKind;

pub const MAX_HEALTH: i32 = 100;

// Health lost per failure category. Releasing a spin early hurts a little
// less than never touching it.
pub const PENALTY_TAP_MISS: i32 = 10;
pub const PENALTY_TAP_TOO_EARLY: i32 = 5;
pub const PENALTY_HOLD_TOO_EARLY: i32 = 5;
pub const PENALTY_HOLD_TIMEOUT: i32 = 10;
pub const PENALTY_HOLD_RELEASE: i32 = 8;
pub const PENALTY_HOLD_SKIP: i32 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HealthRules {
    pub max_health: i32,
    pub tap_miss: i32,
    pub tap_too_early: i32,
    pub hold_too_early: i32,
    pub hold_timeout: i32,
    pub hold_release: i32,
    pub hold_skip: i32,
}

impl Default for HealthRules {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            tap_miss: PENALTY_TAP_MISS,
            tap_too_early: PENALTY_TAP_TOO_EARLY,
            hold_too_early: PENALTY_HOLD_TOO_EARLY,
            hold_timeout: PENALTY_HOLD_TIMEOUT,
            hold_release: PENALTY_HOLD_RELEASE,
            hold_skip: PENALTY_HOLD_SKIP,
        }
    }
}

impl HealthRules {
    #[inline(always)]
    pub fn penalty(&self, kind: FailureKind) -> i32 {
        let p = match kind {
            FailureKind::TapMiss => self.tap_miss,
            FailureKind::TapTooEarly => self.tap_too_early,
            FailureKind::HoldTooEarly => self.hold_too_early,
            FailureKind::HoldTimeout => self.hold_timeout,
            FailureKind::HoldRelease => self.hold_release,
            FailureKind::HoldSkip => self.hold_skip,
        };
        p.max(0)
    }

    /// Health after applying `delta`, clamped to `[0, max_health]`.
    #[inline(always)]
    pub fn apply(&self, health: i32, delta: i32) -> i32 {
        health.saturating_add(delta).clamp(0, self.max_health.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_clamped_to_the_bar() {
        let rules = HealthRules::default();
        assert_eq!(rules.apply(5, -rules.penalty(FailureKind::TapMiss)), 0);
        assert_eq!(rules.apply(95, 20), MAX_HEALTH);
    }

    #[test]
    fn negative_penalties_never_heal() {
        let rules = HealthRules {
            hold_skip: -40,
            ..HealthRules::default()
        };
        assert_eq!(rules.penalty(FailureKind::HoldSkip), 0);
        assert_eq!(rules.penalty(FailureKind::HoldRelease), PENALTY_HOLD_RELEASE);
    }
}
