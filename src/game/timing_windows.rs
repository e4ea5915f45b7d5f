// Shared timing window definitions to keep judgement, visibility and
// rotation in sync. All values are in milliseconds.

pub const LEAD_TIME_MS: f64 = 2000.0;

// Tap windows around the scheduled time. The late edge is inclusive.
pub const TAP_EARLY_WINDOW_MS: f64 = 150.0;
pub const TAP_HIT_WINDOW_MS: f64 = 150.0;
pub const TAP_FAILURE_BUFFER_MS: f64 = 150.0;

// Presses earlier than the hit window but inside this range fail the note.
// Anything earlier is a stray press and ignored.
pub const TOO_EARLY_WINDOW_MS: f64 = 400.0;

pub const HOLD_ACTIVATION_WINDOW_MS: f64 = 200.0;
pub const HOLD_RELEASE_WINDOW_MS: f64 = 100.0;
pub const HOLD_MISS_TIMEOUT_MS: f64 = 500.0;

// Hit/miss flashes and hold collapse run this long after classification.
pub const HOLD_ANIMATION_DURATION_MS: f64 = 300.0;

pub const PERFECT_WINDOW_MS: f64 = 50.0;
pub const GREAT_WINDOW_MS: f64 = 100.0;

pub const ROTATION_TRIGGER_ADVANCE_MS: f64 = 500.0;
pub const ROTATION_DURATION_MS: f64 = 250.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingProfile {
    pub lead_time_ms: f64,
    pub tap_early_window_ms: f64,
    pub tap_hit_window_ms: f64,
    pub tap_failure_buffer_ms: f64,
    pub too_early_window_ms: f64,
    pub hold_activation_window_ms: f64,
    pub hold_release_window_ms: f64,
    pub hold_miss_timeout_ms: f64,
    pub hold_animation_duration_ms: f64,
    // Accuracy tiers by absolute offset: PERFECT, GREAT; NORMAL beyond.
    pub tier_windows_ms: [f64; 2],
    pub rotation_trigger_advance_ms: f64,
    pub rotation_duration_ms: f64,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            lead_time_ms: LEAD_TIME_MS,
            tap_early_window_ms: TAP_EARLY_WINDOW_MS,
            tap_hit_window_ms: TAP_HIT_WINDOW_MS,
            tap_failure_buffer_ms: TAP_FAILURE_BUFFER_MS,
            too_early_window_ms: TOO_EARLY_WINDOW_MS,
            hold_activation_window_ms: HOLD_ACTIVATION_WINDOW_MS,
            hold_release_window_ms: HOLD_RELEASE_WINDOW_MS,
            hold_miss_timeout_ms: HOLD_MISS_TIMEOUT_MS,
            hold_animation_duration_ms: HOLD_ANIMATION_DURATION_MS,
            tier_windows_ms: [PERFECT_WINDOW_MS, GREAT_WINDOW_MS],
            rotation_trigger_advance_ms: ROTATION_TRIGGER_ADVANCE_MS,
            rotation_duration_ms: ROTATION_DURATION_MS,
        }
    }
}

impl TimingProfile {
    /// Repairs values that would break the state machine: a failure buffer
    /// shorter than the hit window would miss hittable notes, and the
    /// too-early range has to reach past both hit windows.
    pub fn sanitized(mut self) -> Self {
        let fallback = Self::default();
        for (v, d) in [
            (&mut self.lead_time_ms, fallback.lead_time_ms),
            (&mut self.hold_animation_duration_ms, fallback.hold_animation_duration_ms),
            (&mut self.rotation_duration_ms, fallback.rotation_duration_ms),
        ] {
            if !v.is_finite() || *v <= 0.0 {
                *v = d;
            }
        }
        for v in [
            &mut self.tap_early_window_ms,
            &mut self.tap_hit_window_ms,
            &mut self.tap_failure_buffer_ms,
            &mut self.too_early_window_ms,
            &mut self.hold_activation_window_ms,
            &mut self.hold_release_window_ms,
            &mut self.hold_miss_timeout_ms,
            &mut self.rotation_trigger_advance_ms,
        ] {
            if !v.is_finite() || *v < 0.0 {
                *v = 0.0;
            }
        }
        self.tap_failure_buffer_ms = self.tap_failure_buffer_ms.max(self.tap_hit_window_ms);
        self.too_early_window_ms = self
            .too_early_window_ms
            .max(self.tap_early_window_ms)
            .max(self.hold_activation_window_ms);
        let perfect = self.tier_windows_ms[0].max(0.0);
        self.tier_windows_ms = [perfect, self.tier_windows_ms[1].max(perfect)];
        self
    }

    /// Earliest offset (negative = before the note) at which a press counts
    /// as a hit or a hold activation.
    #[inline(always)]
    pub fn early_edge_ms(&self, is_hold: bool) -> f64 {
        if is_hold {
            self.hold_activation_window_ms
        } else {
            self.tap_early_window_ms
        }
    }
}
