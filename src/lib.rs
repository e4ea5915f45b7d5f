//! Timing and judgement core for a rotating-tunnel rhythm game.
//!
//! Feed a [`State`] the clock and raw key edges once per frame with
//! [`State::tick`]; it classifies notes, keeps score and health, and steers
//! the tunnel rotation for upcoming spins.

pub mod config;
pub mod game;

pub use config::Config;
pub use game::gameplay::{FrameResult, InputEvent, InputKind, RenderNote, State};
pub use game::judgment::{Accuracy, JudgementState, derive_state, derive_state_at};
pub use game::note::{FailureKind, Lane, Note, NoteDefect, NoteId, NoteType};
