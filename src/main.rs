use serde::Serialize;
use tunnelsync::config;
use tunnelsync::game::diagnostics::DiagnosticCounts;
use tunnelsync::game::rotation::RotationState;
use tunnelsync::game::scores::{FailureCounters, ScoreState};
use tunnelsync::game::timing_stats::TimingStats;
use tunnelsync::{InputEvent, Lane, Note, State};

const FRAME_MS: f64 = 1000.0 / 60.0;
// Press offsets the autoplayer cycles through, in ms. Negative = early.
const TAP_OFFSETS_MS: [f64; 7] = [-12.0, 35.0, -70.0, 4.0, 120.0, -45.0, 18.0];
const TAP_LANES: [Lane; 4] = [Lane::Up, Lane::Right, Lane::Down, Lane::Left];

#[derive(Serialize)]
struct Summary {
    score: ScoreState,
    failures: FailureCounters,
    timing: TimingStats,
    diagnostics: DiagnosticCounts,
    rotation: RotationState,
}

/// Taps every 400ms with a pair of back-to-back spins every eight beats.
fn demo_chart() -> Vec<Note> {
    let mut notes = Vec::new();
    let mut id = 0;
    for bar in 0..6u32 {
        let base = 2000.0 + f64::from(bar) * 4000.0;
        for step in 0..6u32 {
            notes.push(Note::tap(id, TAP_LANES[(id % 4) as usize], base + f64::from(step) * 400.0));
            id += 1;
        }
        let spin_lane = if bar % 2 == 0 { Lane::SpinLeft } else { Lane::SpinRight };
        notes.push(Note::spin(id, spin_lane, base + 2600.0, 500.0));
        id += 1;
        notes.push(Note::spin(id, spin_lane, base + 3300.0, 400.0));
        id += 1;
    }
    notes
}

/// Deterministic input script: offsets cycle, every ninth tap is skipped and
/// every fifth spin is let go early.
fn autoplay_script(notes: &[Note]) -> Vec<InputEvent> {
    let mut events = Vec::new();
    for (i, note) in notes.iter().enumerate() {
        if note.is_hold() {
            events.push(InputEvent::press(note.lane, note.time - 20.0));
            let release = if i % 5 == 0 {
                note.time + note.hold_duration() * 0.5
            } else {
                note.end_time() - 30.0
            };
            events.push(InputEvent::release(note.lane, release));
        } else if i % 9 != 8 {
            let offset = TAP_OFFSETS_MS[i % TAP_OFFSETS_MS.len()];
            events.push(InputEvent::press(note.lane, note.time + offset));
        }
    }
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let notes = demo_chart();
    let script = autoplay_script(&notes);
    let end_time = notes.iter().map(Note::end_time).fold(0.0, f64::max) + 2000.0;
    let mut state = State::new(notes, &cfg);

    let mut next_event = 0;
    let mut frame = 0u32;
    loop {
        let now = f64::from(frame) * FRAME_MS;
        let due = script[next_event..].partition_point(|e| e.time <= now);
        let result = state.tick(now, &script[next_event..next_event + due]);
        next_event += due;
        if result.is_dead {
            log::warn!("Health depleted at {now:.0}ms; stopping autoplay.");
            break;
        }
        if now >= end_time {
            break;
        }
        frame += 1;
    }

    let summary = Summary {
        score: state.score_state(),
        failures: state.failure_counters(),
        timing: state.timing_stats(),
        diagnostics: state.diagnostic_counts(),
        rotation: state.rotation_state(),
    };
    log::info!(
        "Autoplay finished: score {}, max combo {}, health {}, failures {}",
        summary.score.score,
        summary.score.max_combo,
        summary.score.health,
        summary.failures.total()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
