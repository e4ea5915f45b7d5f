use crate::game::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::game::judgment::{JudgementState, derive_state};
use crate::game::note::{NUM_HOLD_LANES, Note};
use crate::game::store::NoteStore;
use crate::game::timing_windows::TimingProfile;

/// Last moment a note may be drawn, animation included.
pub fn visibility_end(note: &Note, profile: &TimingProfile) -> f64 {
    let anim = profile.hold_animation_duration_ms;
    let j = note.judgement();
    if let Some(t) = j.terminal_time() {
        return t + anim;
    }
    if !note.is_hold() {
        // Unjudged taps stay until the sweep classifies them.
        return f64::INFINITY;
    }
    match derive_state(note) {
        JudgementState::Active => {
            j.press_hold_time().unwrap_or(note.time) + note.hold_duration() + anim
        }
        _ => note.end_time() + anim,
    }
}

/// Never judged because its own time lies outside its sub-beatmap window.
#[inline(always)]
fn unplayable(note: &Note) -> bool {
    !note.in_beatmap_window(note.time)
}

/// Cannot be drawn at `now` or any later time.
fn retired(store: &NoteStore, idx: usize, now: f64, profile: &TimingProfile) -> bool {
    let note = &store.notes()[idx];
    if !note.time.is_finite() {
        return false;
    }
    if note.beatmap_end.is_some_and(|end| now > end) {
        return true;
    }
    if unplayable(note) || store.defect(idx).is_some() {
        return now > note.time;
    }
    note.judgement()
        .terminal_time()
        .is_some_and(|t| now > t + profile.hold_animation_duration_ms)
}

/// Per-session lower bound for the visibility scan. Notes before the cursor
/// are retired for good, so a frame only walks the live part of the chart.
/// Call `reset` after a rewind or when store indices move.
#[derive(Copy, Clone, Debug, Default)]
pub struct VisibilityCursor {
    first_live: usize,
}

impl VisibilityCursor {
    pub fn reset(&mut self) {
        self.first_live = 0;
    }

    #[inline(always)]
    pub fn first_live(&self) -> usize {
        self.first_live
    }

    /// Same result as [`visible_notes`], for a clock that never goes back.
    pub fn visible_notes(
        &mut self,
        store: &NoteStore,
        now: f64,
        profile: &TimingProfile,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Vec<usize> {
        while self.first_live < store.len() && retired(store, self.first_live, now, profile) {
            self.first_live += 1;
        }
        scan_visible(store, self.first_live, now, profile, diagnostics)
    }
}

/// Store indices of the notes to draw at `now`, ordered by `(time, id)`.
///
/// Hold lanes show at most one note each. Defective notes and terminal
/// notes without a timestamp are skipped and reported. Notes that can never
/// be judged are never drawn.
pub fn visible_notes(
    store: &NoteStore,
    now: f64,
    profile: &TimingProfile,
    diagnostics: &mut dyn DiagnosticsSink,
) -> Vec<usize> {
    scan_visible(store, 0, now, profile, diagnostics)
}

fn scan_visible(
    store: &NoteStore,
    from: usize,
    now: f64,
    profile: &TimingProfile,
    diagnostics: &mut dyn DiagnosticsSink,
) -> Vec<usize> {
    let notes = store.notes();
    let horizon = now + profile.lead_time_ms;
    // Sorted by time with non-finite times last, so this also stops there.
    let upper = notes.partition_point(|n| n.time.is_finite() && n.time <= horizon);

    let mut out = Vec::new();
    let mut hold_slots: [Option<usize>; NUM_HOLD_LANES] = [None; NUM_HOLD_LANES];
    let expired = |idx: usize| now > visibility_end(&notes[idx], profile);

    for (idx, note) in notes.iter().enumerate().take(upper).skip(from) {
        if !note.in_beatmap_window(now) || unplayable(note) {
            continue;
        }
        if let Some(defect) = store.defect(idx) {
            diagnostics.report(Diagnostic::MalformedNote { id: note.id, defect });
            continue;
        }
        if !note.judgement().has_terminal_timestamp() {
            diagnostics.report(Diagnostic::TerminalWithoutTimestamp { id: note.id });
            continue;
        }
        match note.lane.hold_slot() {
            Some(slot) => {
                hold_slots[slot] = match hold_slots[slot] {
                    None => Some(idx),
                    Some(cur) if expired(cur) => Some(idx),
                    Some(cur) if note.time < notes[cur].time => Some(idx),
                    kept => kept,
                };
            }
            None if !expired(idx) => out.push(idx),
            None => {}
        }
    }

    out.extend(hold_slots.into_iter().flatten().filter(|&idx| !expired(idx)));
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::diagnostics::{LogSink, NoopSink};
    use crate::game::note::{FailureKind, Lane, NoteId, NoteType};

    fn ids(store: &NoteStore, v: &[usize]) -> Vec<u32> {
        v.iter().map(|&i| store.notes()[i].id.0).collect()
    }

    #[test]
    fn taps_appear_within_lead_and_leave_after_animation() {
        let mut store = NoteStore::new(vec![Note::tap(1, Lane::Up, 3000.0)]);
        let p = TimingProfile::default();
        assert!(visible_notes(&store, 999.0, &p, &mut NoopSink).is_empty());
        assert_eq!(visible_notes(&store, 1000.0, &p, &mut NoopSink), vec![0]);
        store.note_mut(0).judgement.mark_tap_hit(3010.0);
        assert_eq!(visible_notes(&store, 3310.0, &p, &mut NoopSink), vec![0]);
        assert!(visible_notes(&store, 3311.0, &p, &mut NoopSink).is_empty());
    }

    #[test]
    fn hold_lanes_show_one_note_each() {
        let mut store = NoteStore::new(vec![
            Note::spin(1, Lane::SpinLeft, 2000.0, 500.0),
            Note::spin(2, Lane::SpinLeft, 2600.0, 300.0),
            Note::spin(3, Lane::SpinRight, 2100.0, 300.0),
            Note::tap(4, Lane::Up, 2050.0),
        ]);
        let p = TimingProfile::default();
        let v = visible_notes(&store, 1500.0, &p, &mut NoopSink);
        assert_eq!(ids(&store, &v), vec![1, 4, 3]);

        // Once the first spin has finished animating, the next one takes the lane.
        store.note_mut(0).judgement.activate(2000.0);
        store.note_mut(0).judgement.mark_hold_complete(2450.0);
        let v = visible_notes(&store, 2700.0, &p, &mut NoopSink);
        assert!(ids(&store, &v).contains(&1));
        let v = visible_notes(&store, 2751.0, &p, &mut NoopSink);
        assert!(ids(&store, &v).contains(&2));
        assert!(!ids(&store, &v).contains(&1));
    }

    #[test]
    fn expired_hold_survivor_is_dropped() {
        let mut store = NoteStore::new(vec![Note::spin(1, Lane::SpinLeft, 1000.0, 200.0)]);
        store.note_mut(0).judgement.fail(FailureKind::HoldSkip, 1201.0);
        let p = TimingProfile::default();
        assert_eq!(visible_notes(&store, 1501.0, &p, &mut NoopSink), vec![0]);
        assert!(visible_notes(&store, 1502.0, &p, &mut NoopSink).is_empty());
    }

    #[test]
    fn beatmap_bounds_gate_visibility() {
        let store = NoteStore::new(vec![
            Note::tap(1, Lane::Up, 1000.0).with_bounds(Some(500.0), Some(1100.0)),
        ]);
        let p = TimingProfile::default();
        assert!(visible_notes(&store, 400.0, &p, &mut NoopSink).is_empty());
        assert_eq!(visible_notes(&store, 600.0, &p, &mut NoopSink), vec![0]);
        assert!(visible_notes(&store, 1101.0, &p, &mut NoopSink).is_empty());
    }

    #[test]
    fn notes_scheduled_outside_their_window_are_never_drawn() {
        let store = NoteStore::new(vec![
            Note::tap(1, Lane::Up, 1000.0).with_bounds(Some(1200.0), None),
            Note::tap(2, Lane::Down, 3000.0).with_bounds(Some(1200.0), None),
        ]);
        let p = TimingProfile::default();
        for now in [1200.0, 5000.0, 600_000.0] {
            let v = visible_notes(&store, now, &p, &mut NoopSink);
            assert!(!ids(&store, &v).contains(&1), "unplayable tap drawn at {now}");
        }
        assert_eq!(ids(&store, &visible_notes(&store, 1300.0, &p, &mut NoopSink)), vec![2]);
    }

    #[test]
    fn cursor_skips_retired_notes_and_matches_a_full_scan() {
        let mut store = NoteStore::new(vec![
            Note::tap(1, Lane::Up, 1000.0),
            Note::tap(2, Lane::Right, 1200.0),
            Note::spin(3, Lane::SpinLeft, 1500.0, 400.0),
            Note::tap(4, Lane::Down, 3000.0),
        ]);
        store.note_mut(0).judgement.mark_tap_hit(1000.0);
        store.note_mut(1).judgement.fail(FailureKind::TapMiss, 1351.0);
        let p = TimingProfile::default();
        let mut cursor = VisibilityCursor::default();

        let v = cursor.visible_notes(&store, 1200.0, &p, &mut NoopSink);
        assert_eq!(cursor.first_live(), 0);
        assert_eq!(v, visible_notes(&store, 1200.0, &p, &mut NoopSink));

        // Tap 2 finished animating at 1651; the pending spin holds the cursor.
        let v = cursor.visible_notes(&store, 1700.0, &p, &mut NoopSink);
        assert_eq!(cursor.first_live(), 2);
        assert_eq!(ids(&store, &v), vec![3, 4]);
        assert_eq!(v, visible_notes(&store, 1700.0, &p, &mut NoopSink));

        cursor.reset();
        assert_eq!(cursor.first_live(), 0);
    }

    #[test]
    fn defects_and_broken_records_are_reported_not_drawn() {
        let mut store = NoteStore::new(vec![
            Note::new(1, Lane::SpinLeft, 1000.0, NoteType::SpinLeft, None),
            Note::tap(2, Lane::Up, 1100.0),
        ]);
        store.note_mut(1).judgement.fail(FailureKind::TapMiss, 1251.0);
        store.note_mut(1).judgement.failure_time = None;
        let mut sink = LogSink::default();
        let p = TimingProfile::default();
        for _ in 0..3 {
            assert!(visible_notes(&store, 900.0, &p, &mut sink).is_empty());
        }
        let counts = sink.counts();
        assert_eq!(counts.malformed_notes, 1);
        assert_eq!(counts.invariant_violations, 1);
        assert!(store.get_by_id(NoteId(1)).is_some());
    }
}
