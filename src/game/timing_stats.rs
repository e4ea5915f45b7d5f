use serde::Serialize;

use crate::game::judgment::{JudgementState, TimingDirection, derive_state};
use crate::game::note::Note;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean_abs_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub max_abs_ms: f64,
    pub count: usize,
    pub fast: usize,
    pub slow: usize,
}

/// Signed press offset of a tap hit.
#[inline(always)]
fn tap_offset_ms(note: &Note) -> Option<f64> {
    if note.is_hold() || derive_state(note) != JudgementState::Hit {
        return None;
    }
    note.judgement().press_hold_time().map(|t| t - note.time)
}

pub fn compute_note_timing_stats(notes: &[Note]) -> TimingStats {
    let mut sum_abs = 0.0;
    let mut sum_signed = 0.0;
    let mut max_abs: f64 = 0.0;
    let mut count = 0usize;
    let mut fast = 0usize;
    let mut slow = 0usize;

    for e in notes.iter().filter_map(tap_offset_ms) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        max_abs = max_abs.max(a);
        count += 1;
        match TimingDirection::from_offset_ms(e) {
            TimingDirection::Fast => fast += 1,
            TimingDirection::Slow => slow += 1,
            TimingDirection::Exact => {}
        }
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed / count as f64;
    let mean_abs_ms = sum_abs / count as f64;

    // Sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f64 = notes
            .iter()
            .filter_map(tap_offset_ms)
            .map(|e| (e - mean_ms) * (e - mean_ms))
            .sum();
        (sum_diff_sq / (count as f64 - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats {
        mean_abs_ms,
        mean_ms,
        stddev_ms,
        max_abs_ms: max_abs,
        count,
        fast,
        slow,
    }
}
