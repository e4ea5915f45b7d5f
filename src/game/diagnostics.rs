use log::warn;
use rustc_hash::FxHashSet;
use serde::Serialize;
use thiserror::Error;

use crate::game::note::{Lane, NoteDefect, NoteId};

/// Non-fatal problems found while running a session. None of them stop the
/// frame loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("note {id} excluded: {defect}")]
    MalformedNote { id: NoteId, defect: NoteDefect },
    #[error("note {id} is terminal but carries no timestamp; hidden")]
    TerminalWithoutTimestamp { id: NoteId },
    #[error("clock went backwards from {from_ms:.1}ms to {to_ms:.1}ms")]
    ClockRegression { from_ms: f64, to_ms: f64 },
    #[error("input on lane {lane} has non-finite time {time}; dropped")]
    NonFiniteInput { lane: Lane, time: f64 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub malformed_notes: u32,
    pub invariant_violations: u32,
    pub clock_regressions: u32,
    pub rejected_inputs: u32,
}

pub trait DiagnosticsSink: Send {
    fn report(&mut self, diagnostic: Diagnostic);
    fn counts(&self) -> DiagnosticCounts;
}

/// Logs each distinct problem once and keeps counters for the UI.
#[derive(Debug, Default)]
pub struct LogSink {
    seen: FxHashSet<(u8, NoteId)>,
    counts: DiagnosticCounts,
}

impl DiagnosticsSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::MalformedNote { id, .. } => {
                if !self.seen.insert((0, *id)) {
                    return;
                }
                self.counts.malformed_notes += 1;
            }
            Diagnostic::TerminalWithoutTimestamp { id } => {
                if !self.seen.insert((1, *id)) {
                    return;
                }
                self.counts.invariant_violations += 1;
            }
            Diagnostic::ClockRegression { .. } => self.counts.clock_regressions += 1,
            Diagnostic::NonFiniteInput { .. } => self.counts.rejected_inputs += 1,
        }
        warn!("{diagnostic}");
    }

    fn counts(&self) -> DiagnosticCounts {
        self.counts
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    #[inline(always)]
    fn report(&mut self, _diagnostic: Diagnostic) {}

    fn counts(&self) -> DiagnosticCounts {
        DiagnosticCounts::default()
    }
}

pub fn sink_for(enabled: bool) -> Box<dyn DiagnosticsSink> {
    if enabled {
        Box::new(LogSink::default())
    } else {
        Box::new(NoopSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_counts_each_note_once() {
        let mut sink = LogSink::default();
        for _ in 0..3 {
            sink.report(Diagnostic::MalformedNote {
                id: NoteId(4),
                defect: NoteDefect::MissingDuration,
            });
        }
        sink.report(Diagnostic::TerminalWithoutTimestamp { id: NoteId(4) });
        sink.report(Diagnostic::ClockRegression { from_ms: 10.0, to_ms: 5.0 });
        sink.report(Diagnostic::ClockRegression { from_ms: 10.0, to_ms: 5.0 });
        sink.report(Diagnostic::NonFiniteInput {
            lane: Lane::Up,
            time: f64::NAN,
        });
        assert_eq!(
            sink.counts(),
            DiagnosticCounts {
                malformed_notes: 1,
                invariant_violations: 1,
                clock_regressions: 2,
                rejected_inputs: 1,
            }
        );
    }

    #[test]
    fn disabled_diagnostics_use_the_noop_sink() {
        let mut sink = sink_for(false);
        sink.report(Diagnostic::TerminalWithoutTimestamp { id: NoteId(1) });
        assert_eq!(sink.counts(), DiagnosticCounts::default());
    }

    #[test]
    fn diagnostics_render_readable_messages() {
        let d = Diagnostic::MalformedNote {
            id: NoteId(9),
            defect: NoteDefect::MissingDuration,
        };
        assert_eq!(d.to_string(), "note #9 excluded: hold note has no finite positive duration");
    }
}
