use log::{debug, info};

use crate::game::judgment::{JudgementState, derive_state};
use crate::game::note::{FailureKind, Lane, NUM_HOLD_LANES, NoteId};
use crate::game::store::NoteStore;
use crate::game::timing_windows::TimingProfile;

/// A single state change of one note.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transition {
    pub note_index: usize,
    pub id: NoteId,
    pub from: JudgementState,
    pub to: JudgementState,
    pub at: f64,
}

/// Input-driven and time-driven note transitions.
///
/// Owns the bookkeeping the transitions need between calls: which note is
/// held on each hold lane and how far the miss sweep has advanced.
#[derive(Clone, Debug)]
pub struct Judge {
    profile: TimingProfile,
    active_holds: [Option<usize>; NUM_HOLD_LANES],
    next_miss_cursor: usize,
}

enum PressTarget {
    InWindow(usize),
    Late(usize),
    TooEarly(usize),
}

impl Judge {
    pub fn new(profile: TimingProfile) -> Self {
        Self {
            profile,
            active_holds: [None; NUM_HOLD_LANES],
            next_miss_cursor: 0,
        }
    }

    #[inline(always)]
    pub fn profile(&self) -> &TimingProfile {
        &self.profile
    }

    pub fn active_hold(&self, lane: Lane) -> Option<usize> {
        lane.hold_slot().and_then(|slot| self.active_holds[slot])
    }

    pub fn reset(&mut self) {
        self.active_holds = [None; NUM_HOLD_LANES];
        self.next_miss_cursor = 0;
    }

    /// Recovers lane bookkeeping after store indices moved.
    pub fn reindex(&mut self, store: &NoteStore) {
        self.reset();
        for (idx, note) in store.notes().iter().enumerate() {
            if let Some(slot) = note.lane.hold_slot()
                && note.judgement().is_active()
            {
                self.active_holds[slot] = Some(idx);
            }
        }
    }

    fn find_press_target(&self, store: &NoteStore, lane: Lane, now: f64) -> Option<PressTarget> {
        let p = &self.profile;
        let mut best: Option<(usize, f64)> = None;
        let mut late = None;
        let mut too_early = None;
        for &idx in store.lane_indices(lane) {
            let note = &store.notes()[idx];
            if !store.is_interactive(idx, now) || derive_state(note) != JudgementState::Pending {
                continue;
            }
            let offset = now - note.time;
            if offset < -p.too_early_window_ms {
                break;
            }
            if offset > p.tap_hit_window_ms {
                late.get_or_insert(idx);
                continue;
            }
            if offset >= -p.early_edge_ms(note.is_hold()) {
                let abs = offset.abs();
                match best {
                    Some((_, best_abs)) if abs >= best_abs => {}
                    _ => best = Some((idx, abs)),
                }
                continue;
            }
            // Later notes on the lane are even further away.
            too_early = Some(idx);
            break;
        }
        best.map(|(idx, _)| PressTarget::InWindow(idx))
            .or(late.map(PressTarget::Late))
            .or(too_early.map(PressTarget::TooEarly))
    }

    /// Applies a press on `lane` at `now`. Returns the transition it caused,
    /// if any; stray presses change nothing.
    pub fn press(&mut self, store: &mut NoteStore, lane: Lane, now: f64) -> Option<Transition> {
        if self.active_hold(lane).is_some() {
            return None;
        }
        let target = self.find_press_target(store, lane, now)?;
        let (idx, to) = match target {
            PressTarget::InWindow(idx) => {
                let note = store.note_mut(idx);
                if note.is_hold() {
                    note.judgement.activate(now);
                    if let Some(slot) = lane.hold_slot() {
                        self.active_holds[slot] = Some(idx);
                    }
                    (idx, JudgementState::Active)
                } else {
                    note.judgement.mark_tap_hit(now);
                    (idx, JudgementState::Hit)
                }
            }
            PressTarget::Late(idx) => {
                let note = store.note_mut(idx);
                let kind = if note.is_hold() {
                    FailureKind::HoldSkip
                } else {
                    FailureKind::TapMiss
                };
                note.judgement.fail(kind, now);
                (idx, JudgementState::Missed)
            }
            PressTarget::TooEarly(idx) => {
                let note = store.note_mut(idx);
                let kind = if note.is_hold() {
                    FailureKind::HoldTooEarly
                } else {
                    FailureKind::TapTooEarly
                };
                note.judgement.fail(kind, now);
                (idx, JudgementState::FailedTooEarly)
            }
        };
        let note = &store.notes()[idx];
        debug!(
            "Press lane {lane} at {now:.1}ms: note {} ({:+.1}ms) -> {to:?}",
            note.id,
            now - note.time
        );
        Some(Transition {
            note_index: idx,
            id: note.id,
            from: JudgementState::Pending,
            to,
            at: now,
        })
    }

    /// Applies a release on `lane` at `now`. Only the held note on a hold
    /// lane reacts; releases elsewhere are ignored.
    pub fn release(&mut self, store: &mut NoteStore, lane: Lane, now: f64) -> Option<Transition> {
        let slot = lane.hold_slot()?;
        let idx = self.active_holds[slot]?;
        let note = store.note_mut(idx);
        if !note.judgement().is_active() {
            self.active_holds[slot] = None;
            return None;
        }
        if note.judgement().press_hold_time().is_some_and(|pressed| now < pressed) {
            return None;
        }
        self.active_holds[slot] = None;
        let required = note.end_time() - self.profile.hold_release_window_ms;
        let to = if now >= required {
            note.judgement.mark_hold_complete(now);
            JudgementState::Hit
        } else {
            note.judgement.fail(FailureKind::HoldRelease, now);
            info!(
                "Hold {} released early at {now:.1}ms ({:.1}ms short)",
                note.id,
                required - now
            );
            JudgementState::FailedOnRelease
        };
        Some(Transition {
            note_index: idx,
            id: note.id,
            from: JudgementState::Active,
            to,
            at: now,
        })
    }

    /// Time-based transitions: unpressed notes past the failure buffer are
    /// missed, holds kept down past their timeout fail.
    pub fn sweep(&mut self, store: &mut NoteStore, now: f64, out: &mut Vec<Transition>) {
        let p = self.profile;
        for slot in 0..NUM_HOLD_LANES {
            let Some(idx) = self.active_holds[slot] else {
                continue;
            };
            let note = store.note_mut(idx);
            if !note.judgement().is_active() {
                self.active_holds[slot] = None;
                continue;
            }
            if now > note.end_time() + p.hold_miss_timeout_ms {
                note.judgement.fail(FailureKind::HoldTimeout, now);
                self.active_holds[slot] = None;
                info!("Hold {} never released; timed out at {now:.1}ms", note.id);
                out.push(Transition {
                    note_index: idx,
                    id: note.id,
                    from: JudgementState::Active,
                    to: JudgementState::FailedTimeout,
                    at: now,
                });
            }
        }

        let cutoff = now - p.tap_failure_buffer_ms;
        let mut cursor = self.next_miss_cursor;
        while cursor < store.len() {
            let note_time = store.notes()[cursor].time;
            if !note_time.is_finite() || note_time >= cutoff {
                break;
            }
            // A note whose own time falls outside its sub-beatmap was never
            // playable; one that was keeps its deadline even after the
            // window closes.
            let note = &store.notes()[cursor];
            let should_miss = store.defect(cursor).is_none()
                && note.in_beatmap_window(note.time)
                && derive_state(note) == JudgementState::Pending;
            if should_miss {
                let note = store.note_mut(cursor);
                let kind = if note.is_hold() {
                    FailureKind::HoldSkip
                } else {
                    FailureKind::TapMiss
                };
                note.judgement.fail(kind, now);
                info!("MISSED (time-based): note {} lane {} at {now:.1}ms", note.id, note.lane);
                out.push(Transition {
                    note_index: cursor,
                    id: note.id,
                    from: JudgementState::Pending,
                    to: JudgementState::Missed,
                    at: now,
                });
            }
            cursor += 1;
        }
        self.next_miss_cursor = cursor;
    }
}
