use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::Config;
use crate::game::diagnostics::{Diagnostic, DiagnosticCounts, DiagnosticsSink, sink_for};
use crate::game::judgment::{JudgementState, derive_state};
use crate::game::note::{Lane, Note, NoteId};
use crate::game::progress::{NoteProgress, progress_for};
use crate::game::rotation::{RotationCoordinator, RotationState};
use crate::game::scores::{FailureCounters, ScoreEvent, ScoreKeeper, ScoreState};
use crate::game::store::NoteStore;
use crate::game::timing_stats::{TimingStats, compute_note_timing_stats};
use crate::game::timing_windows::TimingProfile;
use crate::game::transitions::{Judge, Transition};
use crate::game::visibility::VisibilityCursor;

const SUMMARY_LOG_INTERVAL_MS: f64 = 1000.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Press,
    Release,
}

/// A raw key edge with the clock time it happened at.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub lane: Lane,
    pub kind: InputKind,
    pub time: f64,
}

impl InputEvent {
    pub const fn press(lane: Lane, time: f64) -> Self {
        Self {
            lane,
            kind: InputKind::Press,
            time,
        }
    }

    pub const fn release(lane: Lane, time: f64) -> Self {
        Self {
            lane,
            kind: InputKind::Release,
            time,
        }
    }
}

/// One drawable note for the current frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct RenderNote {
    pub id: NoteId,
    pub lane: Lane,
    pub state: JudgementState,
    pub progress: NoteProgress,
}

/// Everything a renderer needs after one tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameResult {
    pub time: f64,
    pub visible: Vec<RenderNote>,
    #[serde(skip)]
    pub transitions: Vec<Transition>,
    #[serde(skip)]
    pub score_events: SmallVec<[ScoreEvent; 4]>,
    pub score: ScoreState,
    pub failures: FailureCounters,
    pub rotation: RotationState,
    pub rotation_angle: f64,
    pub is_dead: bool,
    /// The clock jumped back far enough to restart the session this tick.
    pub rewound: bool,
}

/// A play session: notes, judgement bookkeeping, score and tunnel rotation.
pub struct State {
    store: NoteStore,
    profile: TimingProfile,
    judge: Judge,
    scores: ScoreKeeper,
    rotation: RotationCoordinator,
    diagnostics: Box<dyn DiagnosticsSink>,
    rewind_threshold_ms: f64,
    // Transitions waiting to be scored by the next tick.
    pending: Vec<Transition>,
    visible: Vec<usize>,
    visibility: VisibilityCursor,
    last_time: Option<f64>,
    log_timer_ms: f64,
}

impl State {
    pub fn new(notes: Vec<Note>, config: &Config) -> Self {
        let profile = config.timing_profile();
        let store = NoteStore::new(notes);
        let mut diagnostics = sink_for(config.diagnostics);
        for (note, defect) in store.defects() {
            diagnostics.report(Diagnostic::MalformedNote { id: note.id, defect });
        }
        info!(
            "Session ready: {} notes ({} excluded), lead {:.0}ms.",
            store.len(),
            store.defects().count(),
            profile.lead_time_ms
        );
        Self {
            judge: Judge::new(profile),
            scores: ScoreKeeper::new(config.scoring, config.health, profile),
            rotation: RotationCoordinator::new(&profile),
            store,
            profile,
            diagnostics,
            rewind_threshold_ms: config.rewind_threshold_ms,
            pending: Vec::new(),
            visible: Vec::new(),
            visibility: VisibilityCursor::default(),
            last_time: None,
            log_timer_ms: 0.0,
        }
    }

    /// Composes another sub-beatmap into the running session.
    pub fn append_segment(
        &mut self,
        notes: Vec<Note>,
        offset_ms: f64,
        start: Option<f64>,
        end: Option<f64>,
    ) -> usize {
        let added = self.store.append_segment(notes, offset_ms, start, end);
        self.judge.reindex(&self.store);
        self.visible.clear();
        self.visibility.reset();
        for (note, defect) in self.store.defects() {
            self.diagnostics.report(Diagnostic::MalformedNote { id: note.id, defect });
        }
        added
    }

    /// Applies one input edge right away. Scoring follows on the next tick.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<Transition> {
        if !event.time.is_finite() {
            self.diagnostics.report(Diagnostic::NonFiniteInput {
                lane: event.lane,
                time: event.time,
            });
            return None;
        }
        let t = match event.kind {
            InputKind::Press => self.judge.press(&mut self.store, event.lane, event.time),
            InputKind::Release => self.judge.release(&mut self.store, event.lane, event.time),
        }?;
        self.pending.push(t);
        Some(t)
    }

    /// Advances the session to `current_time`. Buffered `events` are applied
    /// first, each at its own timestamp, so they win over this tick's sweep.
    pub fn tick(&mut self, current_time: f64, events: &[InputEvent]) -> FrameResult {
        let mut rewound = false;
        let mut now = if current_time.is_finite() {
            current_time
        } else {
            warn!("Ignoring non-finite clock value {current_time}.");
            self.last_time.unwrap_or(0.0)
        };
        if let Some(last) = self.last_time
            && now < last
        {
            if last - now > self.rewind_threshold_ms {
                info!("Clock jumped back from {last:.1}ms to {now:.1}ms; rewinding.");
                self.reset_session();
                rewound = true;
            } else {
                self.diagnostics.report(Diagnostic::ClockRegression {
                    from_ms: last,
                    to_ms: now,
                });
                now = last;
            }
        }
        let elapsed = self.last_time.map_or(0.0, |last| now - last);
        self.last_time = Some(now);

        for &event in events {
            self.handle_input(event);
        }

        self.visible =
            self.visibility
                .visible_notes(&self.store, now, &self.profile, self.diagnostics.as_mut());
        self.judge.sweep(&mut self.store, now, &mut self.pending);

        let visible: Vec<RenderNote> = self
            .visible
            .iter()
            .map(|&idx| {
                let note = &self.store.notes()[idx];
                let state = derive_state(note);
                RenderNote {
                    id: note.id,
                    lane: note.lane,
                    state,
                    progress: progress_for(note, state, now, &self.profile),
                }
            })
            .collect();

        let transitions = std::mem::take(&mut self.pending);
        let mut score_events = SmallVec::new();
        for t in &transitions {
            let Some(note) = self.store.get_by_id(t.id) else {
                continue;
            };
            let state = derive_state(note);
            if let Some(event) = self.scores.record(note, state, t.at) {
                score_events.push(event);
            }
            if note.is_hold() && state.is_terminal() {
                self.rotation.on_hold_release(note.id, t.at);
            }
        }
        self.rotation.scan(&self.store, now);
        self.rotation.update(now);

        self.log_timer_ms += elapsed;
        if self.log_timer_ms >= SUMMARY_LOG_INTERVAL_MS {
            let s = self.scores.state();
            info!(
                "Time: {now:.0}ms, Score: {}, Combo: {}, Health: {}, Visible: {}",
                s.score,
                s.combo,
                s.health,
                visible.len()
            );
            self.log_timer_ms %= SUMMARY_LOG_INTERVAL_MS;
        }

        FrameResult {
            time: now,
            visible,
            transitions,
            score_events,
            score: self.scores.state(),
            failures: self.scores.counters(),
            rotation: self.rotation.state(),
            rotation_angle: self.rotation.angle_at(now),
            is_dead: self.scores.is_dead(),
            rewound,
        }
    }

    fn reset_session(&mut self) {
        self.store.reset_judgements();
        self.judge.reset();
        self.scores.reset();
        self.rotation.reset();
        self.pending.clear();
        self.visible.clear();
        self.visibility.reset();
        self.last_time = None;
        self.log_timer_ms = 0.0;
    }

    /// Back to the start of the chart with every note pending again.
    pub fn restart(&mut self) {
        info!("Restarting session.");
        self.reset_session();
    }

    /// Same reset as `restart`; used when the clock is sent back to zero.
    pub fn rewind(&mut self) {
        debug!("Rewinding session.");
        self.reset_session();
    }

    /// Notes drawn by the last tick, in draw order.
    pub fn visible_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.visible.iter().filter_map(|&idx| self.store.get(idx))
    }

    pub fn active_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.store.active_notes()
    }

    pub fn completed_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.store.completed_notes()
    }

    #[inline(always)]
    pub fn is_dead(&self) -> bool {
        self.scores.is_dead()
    }

    #[inline(always)]
    pub fn score_state(&self) -> ScoreState {
        self.scores.state()
    }

    #[inline(always)]
    pub fn failure_counters(&self) -> FailureCounters {
        self.scores.counters()
    }

    #[inline(always)]
    pub fn rotation_state(&self) -> RotationState {
        self.rotation.state()
    }

    pub fn diagnostic_counts(&self) -> DiagnosticCounts {
        self.diagnostics.counts()
    }

    pub fn timing_stats(&self) -> TimingStats {
        compute_note_timing_stats(self.store.notes())
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        self.store.notes()
    }

    #[inline(always)]
    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    #[inline(always)]
    pub fn profile(&self) -> &TimingProfile {
        &self.profile
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rotation::RotationStatus;

    fn state(notes: Vec<Note>) -> State {
        State::new(notes, &Config::default())
    }

    #[test]
    fn input_between_frames_is_scored_on_the_next_tick() {
        let mut s = state(vec![Note::tap(1, Lane::Up, 1000.0)]);
        s.tick(900.0, &[]);
        let t = s.handle_input(InputEvent::press(Lane::Up, 1040.0));
        assert_eq!(t.map(|t| t.to), Some(JudgementState::Hit));
        assert_eq!(s.score_state().score, 0);
        let frame = s.tick(1050.0, &[]);
        assert_eq!(frame.score.score, 100);
        assert_eq!(frame.score_events.len(), 1);
        let again = s.tick(1060.0, &[]);
        assert!(again.score_events.is_empty());
        assert_eq!(again.score.score, 100);
    }

    #[test]
    fn release_in_the_same_tick_as_the_timeout_is_honored() {
        let mut s = state(vec![Note::spin(1, Lane::SpinLeft, 2000.0, 500.0)]);
        s.tick(1900.0, &[InputEvent::press(Lane::SpinLeft, 1990.0)]);
        let frame = s.tick(3100.0, &[InputEvent::release(Lane::SpinLeft, 2480.0)]);
        assert_eq!(frame.score.score, 150);
        assert_eq!(frame.failures.hold_miss_failures, 0);
    }

    #[test]
    fn non_finite_input_times_are_dropped_and_reported() {
        let mut s = state(vec![Note::tap(1, Lane::Up, 1000.0)]);
        s.tick(900.0, &[]);
        assert!(s.handle_input(InputEvent::press(Lane::Up, f64::NAN)).is_none());
        let frame = s.tick(950.0, &[InputEvent::press(Lane::Up, f64::INFINITY)]);
        assert!(frame.transitions.is_empty());
        assert_eq!(frame.failures, FailureCounters::default());
        assert_eq!(frame.score.health, 100);
        assert_eq!(s.diagnostic_counts().rejected_inputs, 2);
        assert_eq!(
            s.store().get_by_id(NoteId(1)).map(derive_state),
            Some(JudgementState::Pending)
        );
        s.tick(1000.0, &[InputEvent::press(Lane::Up, 1000.0)]);
        assert_eq!(s.score_state().score, 100);
    }

    #[test]
    fn unplayable_notes_do_not_linger_on_screen() {
        let mut s = state(vec![
            Note::tap(1, Lane::Up, 1000.0).with_bounds(Some(1200.0), None),
            Note::tap(2, Lane::Left, 1500.0),
        ]);
        let mut t = 0.0;
        while t <= 5000.0 {
            let frame = s.tick(t, &[]);
            assert!(frame.visible.iter().all(|r| r.id != NoteId(1)), "drawn at {t}");
            t += 100.0;
        }
        assert_eq!(s.visible_notes().count(), 0);
        assert_eq!(s.failure_counters().tap_miss_failures, 1);
    }

    #[test]
    fn small_clock_regressions_are_clamped_and_reported() {
        let mut s = state(vec![Note::tap(1, Lane::Up, 1000.0)]);
        s.tick(500.0, &[]);
        let frame = s.tick(400.0, &[]);
        assert_eq!(frame.time, 500.0);
        assert!(!frame.rewound);
        assert_eq!(s.diagnostic_counts().clock_regressions, 1);
    }

    #[test]
    fn large_clock_jumps_rewind_everything() {
        let mut s = state(vec![
            Note::tap(1, Lane::Up, 1000.0),
            Note::spin(2, Lane::SpinLeft, 2000.0, 300.0),
        ]);
        s.tick(1200.0, &[]);
        s.tick(2600.0, &[]);
        assert_eq!(s.failure_counters().total(), 2);
        assert_ne!(s.rotation_state().status, RotationStatus::Idle);
        let frame = s.tick(0.0, &[]);
        assert!(frame.rewound);
        assert_eq!(s.failure_counters(), FailureCounters::default());
        assert_eq!(s.score_state().health, 100);
        assert_eq!(s.completed_notes().count(), 0);
        s.rewind();
        assert_eq!(s.rotation_state(), RotationState::default());
        assert_eq!(s.last_time(), None);
    }

    #[test]
    fn defective_notes_are_counted_once() {
        let notes = vec![Note::tap(1, Lane::SpinLeft, 100.0), Note::tap(2, Lane::Up, 200.0)];
        let mut s = state(notes);
        s.tick(0.0, &[]);
        s.tick(16.0, &[]);
        assert_eq!(s.diagnostic_counts().malformed_notes, 1);
        let ids: Vec<u32> = s.visible_notes().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn appended_segments_join_the_running_session() {
        let mut s = state(vec![Note::tap(1, Lane::Up, 1000.0)]);
        s.tick(0.0, &[]);
        let added = s.append_segment(
            vec![Note::tap(1, Lane::Right, 0.0)],
            3000.0,
            Some(2500.0),
            None,
        );
        assert_eq!(added, 1);
        s.tick(2400.0, &[]);
        assert!(
            s.visible_notes().all(|n| n.lane != Lane::Right),
            "segment not started yet"
        );
        let frame = s.tick(2600.0, &[InputEvent::press(Lane::Right, 3000.0)]);
        assert_eq!(frame.score_events.len(), 1);
        assert_eq!(s.failure_counters().tap_miss_failures, 1);
    }
}
