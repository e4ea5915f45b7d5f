use log::debug;
use serde::Serialize;

use crate::game::judgment::{JudgementState, derive_state};
use crate::game::note::{Lane, Note, NoteId};
use crate::game::store::NoteStore;
use crate::game::timing_windows::TimingProfile;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RotationStatus {
    Idle,
    Rotating,
    Settled,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct QueuedRotation {
    pub note_id: NoteId,
    pub target_angle: f64,
}

/// Snapshot of the tunnel alignment. Angles are in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct RotationState {
    pub status: RotationStatus,
    pub current_target_note: Option<NoteId>,
    pub target_angle: f64,
    pub start_angle: f64,
    pub rotation_start_time: f64,
    pub next_queued_rotation: Option<QueuedRotation>,
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            status: RotationStatus::Idle,
            current_target_note: None,
            target_angle: 0.0,
            start_angle: 0.0,
            rotation_start_time: 0.0,
            next_queued_rotation: None,
        }
    }
}

/// Wraps an angle into (-180, 180].
#[inline(always)]
pub fn normalize_angle(deg: f64) -> f64 {
    let a = deg.rem_euclid(360.0);
    if a > 180.0 { a - 360.0 } else { a }
}

/// Quarter turn a hold lane asks for.
#[inline(always)]
pub const fn rotation_delta(lane: Lane) -> Option<f64> {
    match lane {
        Lane::SpinLeft => Some(-90.0),
        Lane::SpinRight => Some(90.0),
        _ => None,
    }
}

#[inline(always)]
fn smoothstep01(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Pre-rotates the tunnel for upcoming holds and chains back-to-back holds.
#[derive(Clone, Debug)]
pub struct RotationCoordinator {
    state: RotationState,
    lead_time_ms: f64,
    trigger_advance_ms: f64,
    duration_ms: f64,
}

impl RotationCoordinator {
    pub fn new(profile: &TimingProfile) -> Self {
        Self {
            state: RotationState::default(),
            lead_time_ms: profile.lead_time_ms,
            trigger_advance_ms: profile.rotation_trigger_advance_ms,
            duration_ms: profile.rotation_duration_ms,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RotationState::default();
    }

    /// Lead time shortened for notes that sit close to their sub-beatmap start.
    pub fn effective_lead(&self, note: &Note) -> f64 {
        match note.beatmap_start {
            Some(start) => self.lead_time_ms.min(note.time - start).max(0.0),
            None => self.lead_time_ms,
        }
    }

    /// The angle the tunnel is heading to once everything scheduled is done.
    fn reference_angle(&self) -> f64 {
        self.state
            .next_queued_rotation
            .map_or(self.state.target_angle, |q| q.target_angle)
    }

    pub fn should_override(&self, angle: f64) -> bool {
        self.state.status == RotationStatus::Idle || angle != self.state.target_angle
    }

    pub fn angle_at(&self, now: f64) -> f64 {
        let s = &self.state;
        match s.status {
            RotationStatus::Rotating => {
                let t = smoothstep01((now - s.rotation_start_time) / self.duration_ms);
                let span = normalize_angle(s.target_angle - s.start_angle);
                normalize_angle(s.start_angle + span * t)
            }
            RotationStatus::Idle | RotationStatus::Settled => s.target_angle,
        }
    }

    fn start_rotation(&mut self, note_id: Option<NoteId>, target_angle: f64, now: f64) {
        let from = self.angle_at(now);
        debug!("Rotation {from:.1} -> {target_angle:.1} for {note_id:?} at {now:.1}ms");
        self.state.start_angle = from;
        self.state.target_angle = target_angle;
        self.state.rotation_start_time = now;
        self.state.current_target_note = note_id;
        self.state.status = RotationStatus::Rotating;
    }

    fn is_live_target(store: &NoteStore, id: NoteId) -> bool {
        store
            .get_by_id(id)
            .is_some_and(|n| !derive_state(n).is_terminal())
    }

    /// Nearest pending, playable hold whose trigger point has been reached,
    /// ignoring notes already targeted or queued.
    fn next_candidate<'a>(&self, store: &'a NoteStore, now: f64) -> Option<&'a Note> {
        let queued = self.state.next_queued_rotation.map(|q| q.note_id);
        let mut best: Option<&Note> = None;
        for lane in [Lane::SpinLeft, Lane::SpinRight] {
            for &idx in store.lane_indices(lane) {
                let note = &store.notes()[idx];
                if best.is_some_and(|b| note.time >= b.time) {
                    break;
                }
                if Some(note.id) == self.state.current_target_note
                    || Some(note.id) == queued
                    || !store.is_interactive(idx, now)
                    || derive_state(note) != JudgementState::Pending
                {
                    continue;
                }
                if now >= note.time - self.effective_lead(note) - self.trigger_advance_ms {
                    best = Some(note);
                }
                break;
            }
        }
        best
    }

    /// Looks for the next hold to align for. Starts it when nothing is being
    /// held toward, queues it (one slot) while the current target is live.
    pub fn scan(&mut self, store: &NoteStore, now: f64) {
        let current_live = self
            .state
            .current_target_note
            .is_some_and(|id| Self::is_live_target(store, id));
        if current_live && self.state.next_queued_rotation.is_some() {
            return;
        }
        let Some(note) = self.next_candidate(store, now) else {
            return;
        };
        let Some(delta) = rotation_delta(note.lane) else {
            return;
        };
        let target = normalize_angle(self.reference_angle() + delta);
        if current_live {
            debug!("Queued rotation to {target:.1} for {}", note.id);
            self.state.next_queued_rotation = Some(QueuedRotation {
                note_id: note.id,
                target_angle: target,
            });
        } else if self.should_override(target) {
            self.start_rotation(Some(note.id), target, now);
        } else {
            self.state.current_target_note = Some(note.id);
        }
    }

    /// A targeted hold was released or otherwise classified.
    pub fn on_hold_release(&mut self, note_id: NoteId, now: f64) {
        if self.state.current_target_note != Some(note_id) {
            if self.state.next_queued_rotation.is_some_and(|q| q.note_id == note_id) {
                self.state.next_queued_rotation = None;
            }
            return;
        }
        match self.state.next_queued_rotation.take() {
            Some(q) => self.start_rotation(Some(q.note_id), q.target_angle, now),
            None => self.start_rotation(None, 0.0, now),
        }
    }

    pub fn update(&mut self, now: f64) {
        if self.state.status == RotationStatus::Rotating
            && now - self.state.rotation_start_time >= self.duration_ms
        {
            self.state.status = if self.state.current_target_note.is_some() {
                RotationStatus::Settled
            } else {
                RotationStatus::Idle
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> RotationCoordinator {
        RotationCoordinator::new(&TimingProfile::default())
    }

    #[test]
    fn angles_wrap_into_half_open_range() {
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(270.0), -90.0);
        assert_eq!(normalize_angle(-450.0), -90.0);
    }

    #[test]
    fn scan_triggers_at_lead_plus_advance() {
        let store = NoteStore::new(vec![Note::spin(1, Lane::SpinRight, 5000.0, 400.0)]);
        let mut r = coordinator();
        r.scan(&store, 2499.0);
        assert_eq!(r.state().status, RotationStatus::Idle);
        r.scan(&store, 2500.0);
        let s = r.state();
        assert_eq!(s.status, RotationStatus::Rotating);
        assert_eq!(s.current_target_note, Some(NoteId(1)));
        assert_eq!(s.target_angle, 90.0);
        r.update(2749.0);
        assert_eq!(r.state().status, RotationStatus::Rotating);
        r.update(2750.0);
        assert_eq!(r.state().status, RotationStatus::Settled);
        assert_eq!(r.angle_at(3000.0), 90.0);
    }

    #[test]
    fn effective_lead_respects_the_segment_start() {
        let r = coordinator();
        let note = Note::spin(1, Lane::SpinLeft, 5000.0, 400.0).with_bounds(Some(4500.0), None);
        assert_eq!(r.effective_lead(&note), 500.0);
        assert_eq!(r.effective_lead(&Note::spin(2, Lane::SpinLeft, 5000.0, 1.0)), 2000.0);
    }

    #[test]
    fn rescanning_the_same_target_does_not_restart() {
        let store = NoteStore::new(vec![Note::spin(1, Lane::SpinLeft, 3000.0, 400.0)]);
        let mut r = coordinator();
        r.scan(&store, 1000.0);
        let first = r.state();
        r.scan(&store, 1100.0);
        assert_eq!(r.state(), first);
        assert!(!r.should_override(-90.0));
        assert!(r.should_override(90.0));
    }

    #[test]
    fn release_without_queue_returns_to_neutral() {
        let store = NoteStore::new(vec![Note::spin(1, Lane::SpinLeft, 3000.0, 400.0)]);
        let mut r = coordinator();
        r.scan(&store, 1000.0);
        r.update(2000.0);
        r.on_hold_release(NoteId(1), 3400.0);
        let s = r.state();
        assert_eq!(s.target_angle, 0.0);
        assert_eq!(s.start_angle, -90.0);
        assert_eq!(s.current_target_note, None);
        let mid = r.angle_at(3525.0);
        assert!(mid > -90.0 && mid < 0.0, "eased midpoint {mid}");
        r.update(3650.0);
        assert_eq!(r.state().status, RotationStatus::Idle);
    }

    #[test]
    fn releases_of_other_notes_are_ignored() {
        let store = NoteStore::new(vec![Note::spin(1, Lane::SpinLeft, 3000.0, 400.0)]);
        let mut r = coordinator();
        r.scan(&store, 1000.0);
        let before = r.state();
        r.on_hold_release(NoteId(42), 1200.0);
        assert_eq!(r.state(), before);
    }
}
