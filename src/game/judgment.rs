use serde::{Deserialize, Serialize};

use crate::game::note::{FailureKind, Note};
use crate::game::timing_windows::TimingProfile;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgementState {
    Pending,
    Active,
    Hit,
    Missed,
    FailedTooEarly,
    FailedOnRelease,
    FailedTimeout,
}

impl JudgementState {
    #[inline(always)]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, JudgementState::Pending | JudgementState::Active)
    }

    #[inline(always)]
    pub const fn is_failure(self) -> bool {
        self.is_terminal() && !matches!(self, JudgementState::Hit)
    }
}

/// The one place judgement state is read from a note's flags.
pub fn derive_state(note: &Note) -> JudgementState {
    let j = note.judgement();
    if j.hit() {
        return JudgementState::Hit;
    }
    match j.failure() {
        Some(FailureKind::TapMiss | FailureKind::HoldSkip) => JudgementState::Missed,
        Some(FailureKind::TapTooEarly | FailureKind::HoldTooEarly) => JudgementState::FailedTooEarly,
        Some(FailureKind::HoldRelease) => JudgementState::FailedOnRelease,
        Some(FailureKind::HoldTimeout) => JudgementState::FailedTimeout,
        None if j.press_hold_time().is_some() => JudgementState::Active,
        None => JudgementState::Pending,
    }
}

/// Like `derive_state`, but also reports a note the sweep has not reached
/// yet as the terminal state it is bound for. Read-only; nothing is written.
pub fn derive_state_at(note: &Note, now: f64, profile: &TimingProfile) -> JudgementState {
    match derive_state(note) {
        JudgementState::Pending if now > note.time + profile.tap_failure_buffer_ms => {
            JudgementState::Missed
        }
        JudgementState::Active if now > note.end_time() + profile.hold_miss_timeout_ms => {
            JudgementState::FailedTimeout
        }
        state => state,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Accuracy {
    Perfect,
    Great,
    Normal,
}

impl Accuracy {
    pub const ALL: [Accuracy; 3] = [Accuracy::Perfect, Accuracy::Great, Accuracy::Normal];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Classify a signed press offset (ms, negative = early) into an accuracy
/// tier. Callers make sure the offset is inside the hit window; anything
/// outside the GREAT window is NORMAL.
#[inline(always)]
pub fn classify_offset_ms(offset_ms: f64, profile: &TimingProfile) -> Accuracy {
    let abs = offset_ms.abs();
    let [perfect, great] = profile.tier_windows_ms;
    if abs <= perfect {
        Accuracy::Perfect
    } else if abs <= great {
        Accuracy::Great
    } else {
        Accuracy::Normal
    }
}

/// FAST/SLOW direction of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingDirection {
    Fast,
    Exact,
    Slow,
}

impl TimingDirection {
    const EXACT_THRESHOLD_MS: f64 = 1.0;

    pub fn from_offset_ms(offset_ms: f64) -> Self {
        if offset_ms < -Self::EXACT_THRESHOLD_MS {
            TimingDirection::Fast
        } else if offset_ms > Self::EXACT_THRESHOLD_MS {
            TimingDirection::Slow
        } else {
            TimingDirection::Exact
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::{Lane, Note};

    #[test]
    fn derive_state_follows_flags() {
        let mut tap = Note::tap(1, Lane::Up, 1000.0);
        assert_eq!(derive_state(&tap), JudgementState::Pending);
        tap.judgement.mark_tap_hit(1010.0);
        assert_eq!(derive_state(&tap), JudgementState::Hit);

        let mut spin = Note::spin(2, Lane::SpinLeft, 2000.0, 500.0);
        spin.judgement.activate(1990.0);
        assert_eq!(derive_state(&spin), JudgementState::Active);
        spin.judgement.fail(FailureKind::HoldRelease, 2100.0);
        assert_eq!(derive_state(&spin), JudgementState::FailedOnRelease);
        assert!(derive_state(&spin).is_failure());
    }

    #[test]
    fn every_failure_kind_maps_to_a_terminal_state() {
        let cases = [
            (FailureKind::TapMiss, JudgementState::Missed),
            (FailureKind::HoldSkip, JudgementState::Missed),
            (FailureKind::TapTooEarly, JudgementState::FailedTooEarly),
            (FailureKind::HoldTooEarly, JudgementState::FailedTooEarly),
            (FailureKind::HoldRelease, JudgementState::FailedOnRelease),
            (FailureKind::HoldTimeout, JudgementState::FailedTimeout),
        ];
        for (kind, expected) in cases {
            let mut n = Note::spin(1, Lane::SpinRight, 0.0, 100.0);
            n.judgement.fail(kind, 5.0);
            assert_eq!(derive_state(&n), expected, "{kind:?}");
        }
    }

    #[test]
    fn derive_state_at_anticipates_the_sweep() {
        let profile = TimingProfile::default();
        let tap = Note::tap(1, Lane::Up, 1000.0);
        assert_eq!(derive_state_at(&tap, 1150.0, &profile), JudgementState::Pending);
        assert_eq!(derive_state_at(&tap, 1151.0, &profile), JudgementState::Missed);
        assert_eq!(derive_state(&tap), JudgementState::Pending);

        let mut spin = Note::spin(2, Lane::SpinLeft, 2000.0, 500.0);
        spin.judgement.activate(2000.0);
        assert_eq!(derive_state_at(&spin, 3000.0, &profile), JudgementState::Active);
        assert_eq!(derive_state_at(&spin, 3001.0, &profile), JudgementState::FailedTimeout);
    }

    #[test]
    fn accuracy_tiers_use_absolute_offset() {
        let p = TimingProfile::default();
        assert_eq!(classify_offset_ms(40.0, &p), Accuracy::Perfect);
        assert_eq!(classify_offset_ms(-50.0, &p), Accuracy::Perfect);
        assert_eq!(classify_offset_ms(-51.0, &p), Accuracy::Great);
        assert_eq!(classify_offset_ms(100.0, &p), Accuracy::Great);
        assert_eq!(classify_offset_ms(149.0, &p), Accuracy::Normal);
    }

    #[test]
    fn timing_direction_has_a_dead_zone() {
        assert_eq!(TimingDirection::from_offset_ms(-12.0), TimingDirection::Fast);
        assert_eq!(TimingDirection::from_offset_ms(0.5), TimingDirection::Exact);
        assert_eq!(TimingDirection::from_offset_ms(3.0), TimingDirection::Slow);
    }
}
