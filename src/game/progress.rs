use serde::Serialize;

use crate::game::judgment::JudgementState;
use crate::game::note::Note;
use crate::game::timing_windows::TimingProfile;

/// Render-ready approach values for one note. 0.0 is the far end of the
/// tunnel, 1.0 the judgement line.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct NoteProgress {
    pub raw: f64,
    pub progress: f64,
    /// Head of the note.
    pub near: f64,
    /// Tail of the note; equals `near` for taps.
    pub far: f64,
    /// Shrink-away fraction for holds that were released or failed.
    pub collapse: Option<f64>,
}

#[inline(always)]
pub fn raw_progress(time: f64, now: f64, lead_time_ms: f64) -> f64 {
    1.0 - (time - now) / lead_time_ms
}

pub fn progress_for(
    note: &Note,
    state: JudgementState,
    now: f64,
    profile: &TimingProfile,
) -> NoteProgress {
    let lead = profile.lead_time_ms;
    let terminal = state.is_terminal();
    // Classified notes overshoot the line so hit/miss flashes keep moving.
    let settle = |v: f64| if terminal { v } else { v.clamp(0.0, 1.0) };

    let raw = raw_progress(note.time, now, lead);
    let progress = settle(raw);
    if !note.is_hold() {
        return NoteProgress {
            raw,
            progress,
            near: progress,
            far: progress,
            collapse: None,
        };
    }

    let near = if state == JudgementState::Active {
        1.0
    } else {
        progress
    };
    let far = settle(raw_progress(note.end_time(), now, lead));
    let collapse = if terminal {
        note.judgement()
            .terminal_time()
            .map(|t| ((now - t) / profile.hold_animation_duration_ms).clamp(0.0, 1.0))
    } else {
        None
    };
    NoteProgress {
        raw,
        progress,
        near,
        far,
        collapse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::judgment::derive_state;
    use crate::game::note::{FailureKind, Lane};

    #[test]
    fn pending_progress_is_clamped() {
        let p = TimingProfile::default();
        let n = Note::tap(1, Lane::Up, 3000.0);
        let at = |now| progress_for(&n, derive_state(&n), now, &p);
        assert_eq!(at(500.0).progress, 0.0);
        assert!(at(500.0).raw < 0.0);
        assert_eq!(at(2000.0).progress, 0.5);
        assert_eq!(at(3100.0).progress, 1.0);
        assert_eq!(at(3100.0).collapse, None);
    }

    #[test]
    fn classified_taps_overshoot_the_line() {
        let p = TimingProfile::default();
        let mut n = Note::tap(1, Lane::Up, 3000.0);
        n.judgement.mark_tap_hit(3000.0);
        let g = progress_for(&n, derive_state(&n), 3200.0, &p);
        assert!((g.progress - 1.1).abs() < 1e-9);
        assert_eq!(g.near, g.far);
    }

    #[test]
    fn active_holds_pin_their_head() {
        let p = TimingProfile::default();
        let mut n = Note::spin(1, Lane::SpinLeft, 2000.0, 1000.0);
        n.judgement.activate(1950.0);
        let g = progress_for(&n, derive_state(&n), 2200.0, &p);
        assert_eq!(g.near, 1.0);
        assert!((g.far - 0.6).abs() < 1e-9);
        assert_eq!(g.collapse, None);
    }

    #[test]
    fn failed_holds_collapse_over_the_animation() {
        let p = TimingProfile::default();
        let mut n = Note::spin(1, Lane::SpinLeft, 2000.0, 500.0);
        n.judgement.activate(1950.0);
        n.judgement.fail(FailureKind::HoldRelease, 2100.0);
        let state = derive_state(&n);
        assert_eq!(progress_for(&n, state, 2100.0, &p).collapse, Some(0.0));
        assert_eq!(progress_for(&n, state, 2250.0, &p).collapse, Some(0.5));
        assert_eq!(progress_for(&n, state, 9000.0, &p).collapse, Some(1.0));
    }
}
