use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::game::judgment::{Accuracy, JudgementState, classify_offset_ms};
use crate::game::life::HealthRules;
use crate::game::note::{FailureKind, Note, NoteId};
use crate::game::timing_windows::TimingProfile;

pub const PERFECT_POINTS: u64 = 100;
pub const GREAT_POINTS: u64 = 75;
pub const NORMAL_POINTS: u64 = 50;
pub const HOLD_COMPLETION_POINTS: u64 = 150;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScoringRules {
    /// Indexed by `Accuracy::index()`.
    pub tier_points: [u64; 3],
    pub hold_completion_points: u64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            tier_points: [PERFECT_POINTS, GREAT_POINTS, NORMAL_POINTS],
            hold_completion_points: HOLD_COMPLETION_POINTS,
        }
    }
}

impl ScoringRules {
    #[inline(always)]
    pub fn points_for(&self, accuracy: Accuracy) -> u64 {
        self.tier_points[accuracy.index()]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub health: i32,
    /// Tap hits per accuracy tier: PERFECT, GREAT, NORMAL.
    pub tier_counts: [u32; 3],
    pub hold_hits: u32,
    /// Time health first reached zero.
    pub fail_time: Option<f64>,
}

impl ScoreState {
    fn fresh(max_health: i32) -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            health: max_health,
            tier_counts: [0; 3],
            hold_hits: 0,
            fail_time: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounters {
    pub tap_miss_failures: u32,
    pub tap_too_early_failures: u32,
    pub too_early_failures: u32,
    pub hold_miss_failures: u32,
    pub hold_release_failures: u32,
    pub hold_skip_failures: u32,
}

impl FailureCounters {
    fn bump(&mut self, kind: FailureKind) {
        let slot = match kind {
            FailureKind::TapMiss => &mut self.tap_miss_failures,
            FailureKind::TapTooEarly => &mut self.tap_too_early_failures,
            FailureKind::HoldTooEarly => &mut self.too_early_failures,
            FailureKind::HoldTimeout => &mut self.hold_miss_failures,
            FailureKind::HoldRelease => &mut self.hold_release_failures,
            FailureKind::HoldSkip => &mut self.hold_skip_failures,
        };
        *slot += 1;
    }

    pub fn get(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::TapMiss => self.tap_miss_failures,
            FailureKind::TapTooEarly => self.tap_too_early_failures,
            FailureKind::HoldTooEarly => self.too_early_failures,
            FailureKind::HoldTimeout => self.hold_miss_failures,
            FailureKind::HoldRelease => self.hold_release_failures,
            FailureKind::HoldSkip => self.hold_skip_failures,
        }
    }

    pub fn total(&self) -> u32 {
        self.tap_miss_failures
            + self.tap_too_early_failures
            + self.too_early_failures
            + self.hold_miss_failures
            + self.hold_release_failures
            + self.hold_skip_failures
    }
}

/// What one newly terminal note did to the aggregate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScoreEvent {
    TapHit {
        id: NoteId,
        accuracy: Accuracy,
        offset_ms: f64,
        points: u64,
    },
    HoldHit {
        id: NoteId,
        points: u64,
    },
    Failure {
        id: NoteId,
        kind: FailureKind,
        penalty: i32,
    },
}

/// Score, combo, health and failure counters. Each note is counted at most
/// once no matter how often it is offered.
#[derive(Clone, Debug)]
pub struct ScoreKeeper {
    rules: ScoringRules,
    health_rules: HealthRules,
    profile: TimingProfile,
    state: ScoreState,
    counters: FailureCounters,
    scored: FxHashSet<NoteId>,
}

impl ScoreKeeper {
    pub fn new(rules: ScoringRules, health_rules: HealthRules, profile: TimingProfile) -> Self {
        Self {
            rules,
            health_rules,
            profile,
            state: ScoreState::fresh(health_rules.max_health.max(1)),
            counters: FailureCounters::default(),
            scored: FxHashSet::default(),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> ScoreState {
        self.state
    }

    #[inline(always)]
    pub fn counters(&self) -> FailureCounters {
        self.counters
    }

    #[inline(always)]
    pub fn is_dead(&self) -> bool {
        self.state.fail_time.is_some()
    }

    pub fn is_scored(&self, id: NoteId) -> bool {
        self.scored.contains(&id)
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::fresh(self.health_rules.max_health.max(1));
        self.counters = FailureCounters::default();
        self.scored.clear();
    }

    /// Folds a classified note into the aggregate. Non-terminal states and
    /// notes that were already counted are ignored.
    pub fn record(&mut self, note: &Note, state: JudgementState, now: f64) -> Option<ScoreEvent> {
        if !state.is_terminal() || self.scored.contains(&note.id) {
            return None;
        }
        let event = match state {
            JudgementState::Hit if note.is_hold() => ScoreEvent::HoldHit {
                id: note.id,
                points: self.rules.hold_completion_points,
            },
            JudgementState::Hit => {
                let offset_ms = note.judgement().press_hold_time().unwrap_or(note.time) - note.time;
                let accuracy = classify_offset_ms(offset_ms, &self.profile);
                ScoreEvent::TapHit {
                    id: note.id,
                    accuracy,
                    offset_ms,
                    points: self.rules.points_for(accuracy),
                }
            }
            _ => {
                let kind = note.judgement().failure().unwrap_or(if note.is_hold() {
                    FailureKind::HoldSkip
                } else {
                    FailureKind::TapMiss
                });
                ScoreEvent::Failure {
                    id: note.id,
                    kind,
                    penalty: self.health_rules.penalty(kind),
                }
            }
        };
        self.scored.insert(note.id);
        self.apply(event, now);
        Some(event)
    }

    fn apply(&mut self, event: ScoreEvent, now: f64) {
        let s = &mut self.state;
        match event {
            ScoreEvent::TapHit { accuracy, points, .. } => {
                s.score += points;
                s.tier_counts[accuracy.index()] += 1;
                s.combo += 1;
            }
            ScoreEvent::HoldHit { points, .. } => {
                s.score += points;
                s.hold_hits += 1;
                s.combo += 1;
            }
            ScoreEvent::Failure { id, kind, penalty } => {
                s.combo = 0;
                s.health = self.health_rules.apply(s.health, -penalty);
                self.counters.bump(kind);
                debug!("Note {id} failed ({kind:?}): -{penalty} health, now {}", s.health);
                if s.health <= 0 && s.fail_time.is_none() {
                    s.fail_time = Some(now);
                    info!("Player has failed at {now:.1}ms");
                }
            }
        }
        s.max_combo = s.max_combo.max(s.combo);
    }
}
