use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u32);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lane {0} is outside -2..=3")]
pub struct LaneError(pub i8);

/// One of the six interaction zones.
///
/// -1/-2 are the fixed hold axis endpoints; 0..3 are diamond positions that
/// turn with the tunnel (0 = top, then clockwise).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
#[repr(i8)]
pub enum Lane {
    SpinRight = -2,
    SpinLeft = -1,
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

pub const NUM_LANES: usize = 6;
pub const NUM_HOLD_LANES: usize = 2;

impl Lane {
    pub const ALL: [Lane; NUM_LANES] = [
        Lane::SpinRight,
        Lane::SpinLeft,
        Lane::Up,
        Lane::Right,
        Lane::Down,
        Lane::Left,
    ];

    #[inline(always)]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Dense index for per-lane arrays.
    #[inline(always)]
    pub const fn index(self) -> usize {
        (self as i8 + 2) as usize
    }

    #[inline(always)]
    pub const fn is_hold(self) -> bool {
        (self as i8) < 0
    }

    #[inline(always)]
    pub const fn hold_slot(self) -> Option<usize> {
        match self {
            Lane::SpinLeft => Some(0),
            Lane::SpinRight => Some(1),
            _ => None,
        }
    }

    /// Angle of a diamond position before tunnel rotation is applied.
    pub const fn base_angle(self) -> Option<f64> {
        match self {
            Lane::Up => Some(0.0),
            Lane::Right => Some(90.0),
            Lane::Down => Some(180.0),
            Lane::Left => Some(270.0),
            Lane::SpinLeft | Lane::SpinRight => None,
        }
    }
}

impl TryFrom<i8> for Lane {
    type Error = LaneError;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -2 => Ok(Lane::SpinRight),
            -1 => Ok(Lane::SpinLeft),
            0 => Ok(Lane::Up),
            1 => Ok(Lane::Right),
            2 => Ok(Lane::Down),
            3 => Ok(Lane::Left),
            other => Err(LaneError(other)),
        }
    }
}

impl From<Lane> for i8 {
    fn from(lane: Lane) -> Self {
        lane.value()
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteType {
    Tap,
    SpinLeft,
    SpinRight,
    /// Older charts encode spins as `HOLD` plus a hold lane. The note store
    /// rewrites it to `SpinLeft`/`SpinRight` on load.
    Hold,
}

impl NoteType {
    #[inline(always)]
    pub const fn is_hold(self) -> bool {
        !matches!(self, NoteType::Tap)
    }

    /// Canonical spin type for a hold lane.
    pub const fn spin_for_lane(lane: Lane) -> Option<NoteType> {
        match lane {
            Lane::SpinLeft => Some(NoteType::SpinLeft),
            Lane::SpinRight => Some(NoteType::SpinRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NoteDefect {
    #[error("time {0} is not finite")]
    NonFiniteTime(f64),
    #[error("hold note has no finite positive duration")]
    MissingDuration,
    #[error("hold note on tap lane {0}")]
    HoldOnTapLane(Lane),
    #[error("tap note on hold lane {0}")]
    TapOnHoldLane(Lane),
    #[error("id {0} is already used by an earlier note")]
    DuplicateId(NoteId),
}

/// Why a note ended without a hit. One variant per failure counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    TapMiss,
    TapTooEarly,
    HoldTooEarly,
    HoldTimeout,
    HoldRelease,
    HoldSkip,
}

/// Mutable judgement fields of a note.
///
/// Every terminal write goes through `mark_*`/`fail`, which refuse to touch a
/// record that is already terminal; `reset` is the only way back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgementRecord {
    pub(crate) hit: bool,
    pub(crate) missed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) press_hold_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) release_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) failure_time: Option<f64>,
    pub(crate) tap_too_early_failure: bool,
    pub(crate) tap_miss_failure: bool,
    pub(crate) too_early_failure: bool,
    pub(crate) hold_miss_failure: bool,
    pub(crate) hold_release_failure: bool,
}

impl JudgementRecord {
    pub fn hit(&self) -> bool {
        self.hit
    }

    pub fn missed(&self) -> bool {
        self.missed
    }

    pub fn press_hold_time(&self) -> Option<f64> {
        self.press_hold_time
    }

    pub fn release_time(&self) -> Option<f64> {
        self.release_time
    }

    pub fn failure_time(&self) -> Option<f64> {
        self.failure_time
    }

    pub fn tap_too_early_failure(&self) -> bool {
        self.tap_too_early_failure
    }

    pub fn tap_miss_failure(&self) -> bool {
        self.tap_miss_failure
    }

    pub fn too_early_failure(&self) -> bool {
        self.too_early_failure
    }

    pub fn hold_miss_failure(&self) -> bool {
        self.hold_miss_failure
    }

    pub fn hold_release_failure(&self) -> bool {
        self.hold_release_failure
    }

    /// Number of outcome flags set. Anything above 1 is corrupt.
    pub fn terminal_flag_count(&self) -> usize {
        [
            self.hit,
            self.missed,
            self.tap_too_early_failure,
            self.tap_miss_failure,
            self.too_early_failure,
            self.hold_miss_failure,
            self.hold_release_failure,
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }

    #[inline(always)]
    pub fn is_terminal(&self) -> bool {
        self.terminal_flag_count() > 0
    }

    /// Pressed hold still waiting for its release.
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.press_hold_time.is_some() && !self.is_terminal()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        if self.tap_miss_failure {
            Some(FailureKind::TapMiss)
        } else if self.tap_too_early_failure {
            Some(FailureKind::TapTooEarly)
        } else if self.too_early_failure {
            Some(FailureKind::HoldTooEarly)
        } else if self.hold_miss_failure {
            Some(FailureKind::HoldTimeout)
        } else if self.hold_release_failure {
            Some(FailureKind::HoldRelease)
        } else if self.missed {
            Some(FailureKind::HoldSkip)
        } else {
            None
        }
    }

    /// When the note was classified: the release (or press, for taps) of a
    /// hit, the failure time otherwise.
    pub fn terminal_time(&self) -> Option<f64> {
        if self.hit {
            self.release_time.or(self.press_hold_time)
        } else if self.is_terminal() {
            self.failure_time
        } else {
            None
        }
    }

    /// False for a terminal record that lost its timestamp.
    pub fn has_terminal_timestamp(&self) -> bool {
        !self.is_terminal() || self.terminal_time().is_some()
    }

    pub(crate) fn activate(&mut self, now: f64) -> bool {
        if self.is_terminal() || self.press_hold_time.is_some() {
            return false;
        }
        self.press_hold_time = Some(now);
        true
    }

    pub(crate) fn mark_tap_hit(&mut self, now: f64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.hit = true;
        self.press_hold_time = Some(now);
        true
    }

    pub(crate) fn mark_hold_complete(&mut self, now: f64) -> bool {
        if !self.is_active() {
            return false;
        }
        self.hit = true;
        self.release_time = Some(now);
        true
    }

    pub(crate) fn fail(&mut self, kind: FailureKind, now: f64) -> bool {
        if self.is_terminal() {
            return false;
        }
        match kind {
            FailureKind::TapMiss => self.tap_miss_failure = true,
            FailureKind::TapTooEarly => self.tap_too_early_failure = true,
            FailureKind::HoldTooEarly => self.too_early_failure = true,
            FailureKind::HoldTimeout => self.hold_miss_failure = true,
            FailureKind::HoldRelease => {
                self.hold_release_failure = true;
                self.release_time = Some(now);
            }
            FailureKind::HoldSkip => self.missed = true,
        }
        self.failure_time = Some(now);
        true
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A scheduled interaction event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub lane: Lane,
    /// Scheduled hit time in milliseconds.
    pub time: f64,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beatmap_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beatmap_end: Option<f64>,
    #[serde(flatten)]
    pub(crate) judgement: JudgementRecord,
}

impl Note {
    pub fn new(id: u32, lane: Lane, time: f64, note_type: NoteType, duration: Option<f64>) -> Self {
        Self {
            id: NoteId(id),
            lane,
            time,
            note_type,
            duration,
            beatmap_start: None,
            beatmap_end: None,
            judgement: JudgementRecord::default(),
        }
    }

    pub fn tap(id: u32, lane: Lane, time: f64) -> Self {
        Self::new(id, lane, time, NoteType::Tap, None)
    }

    /// Spin on a hold lane; the type follows the lane.
    pub fn spin(id: u32, lane: Lane, time: f64, duration: f64) -> Self {
        let note_type = NoteType::spin_for_lane(lane).unwrap_or(NoteType::Hold);
        Self::new(id, lane, time, note_type, Some(duration))
    }

    pub fn with_bounds(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.beatmap_start = start;
        self.beatmap_end = end;
        self
    }

    #[inline(always)]
    pub fn judgement(&self) -> &JudgementRecord {
        &self.judgement
    }

    #[inline(always)]
    pub fn is_hold(&self) -> bool {
        self.note_type.is_hold()
    }

    /// Hold duration, zero for taps.
    #[inline(always)]
    pub fn hold_duration(&self) -> f64 {
        if self.is_hold() {
            self.duration.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    #[inline(always)]
    pub fn end_time(&self) -> f64 {
        self.time + self.hold_duration()
    }

    /// Sub-beatmap gate. A note outside its window is neither visible nor
    /// interactive.
    #[inline(always)]
    pub fn in_beatmap_window(&self, now: f64) -> bool {
        if let Some(start) = self.beatmap_start
            && now < start
        {
            return false;
        }
        if let Some(end) = self.beatmap_end
            && now > end
        {
            return false;
        }
        true
    }

    pub fn validate(&self) -> Result<(), NoteDefect> {
        if !self.time.is_finite() {
            return Err(NoteDefect::NonFiniteTime(self.time));
        }
        match (self.note_type.is_hold(), self.lane.is_hold()) {
            (true, false) => return Err(NoteDefect::HoldOnTapLane(self.lane)),
            (false, true) => return Err(NoteDefect::TapOnHoldLane(self.lane)),
            _ => {}
        }
        if self.is_hold() && !self.duration.is_some_and(|d| d.is_finite() && d > 0.0) {
            return Err(NoteDefect::MissingDuration);
        }
        Ok(())
    }

    /// Rewrites the legacy `Hold` type to the spin type of its lane.
    /// Returns true when the note changed.
    pub(crate) fn canonicalize(&mut self) -> bool {
        if self.note_type != NoteType::Hold {
            return false;
        }
        match NoteType::spin_for_lane(self.lane) {
            Some(spin) => {
                self.note_type = spin;
                true
            }
            None => false,
        }
    }
}
