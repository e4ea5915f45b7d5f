pub mod diagnostics;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod note;
pub mod progress;
pub mod rotation;
pub mod scores;
pub mod store;
pub mod timing_stats;
pub mod timing_windows;
pub mod transitions;
pub mod visibility;
