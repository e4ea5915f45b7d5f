use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::game::judgment::{JudgementState, derive_state};
use crate::game::note::{Lane, NUM_LANES, Note, NoteDefect, NoteId};

/// Authoritative, time-ordered note collection.
///
/// Notes are sorted by `(time, id)` with non-finite times at the end.
/// Indices are stable until the next `append_segment`.
#[derive(Clone, Debug, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    defects: Vec<Option<NoteDefect>>,
    index: FxHashMap<NoteId, usize>,
    by_lane: [Vec<usize>; NUM_LANES],
}

#[inline(always)]
fn note_order(a: &Note, b: &Note) -> Ordering {
    match (a.time.is_finite(), b.time.is_finite()) {
        (true, true) => a.time.total_cmp(&b.time).then(a.id.cmp(&b.id)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.id.cmp(&b.id),
    }
}

impl NoteStore {
    pub fn new(notes: Vec<Note>) -> Self {
        let mut store = Self {
            notes,
            ..Self::default()
        };
        let rewritten = store
            .notes
            .iter_mut()
            .map(Note::canonicalize)
            .filter(|rewrote| *rewrote)
            .count();
        if rewritten > 0 {
            debug!("Rewrote {rewritten} legacy HOLD notes to spin types.");
        }
        store.rebuild();
        store
    }

    /// Appends a composed sub-beatmap: every note is shifted by `offset_ms`
    /// and gated to `[start, end]`. Ids that collide with existing notes are
    /// renumbered past the current maximum. Returns the number of notes added.
    pub fn append_segment(
        &mut self,
        notes: Vec<Note>,
        offset_ms: f64,
        start: Option<f64>,
        end: Option<f64>,
    ) -> usize {
        let mut next_id = self
            .notes
            .iter()
            .chain(notes.iter())
            .map(|n| n.id.0)
            .max()
            .map_or(0, |m| m.saturating_add(1));
        let added = notes.len();
        for mut note in notes {
            if self.index.contains_key(&note.id) {
                let fresh = NoteId(next_id);
                next_id = next_id.saturating_add(1);
                warn!("Segment note {} collides with an existing id; renumbered to {fresh}.", note.id);
                note.id = fresh;
            }
            note.time += offset_ms;
            note.beatmap_start = start;
            note.beatmap_end = end;
            note.canonicalize();
            self.index.insert(note.id, usize::MAX);
            self.notes.push(note);
        }
        self.rebuild();
        added
    }

    fn rebuild(&mut self) {
        self.notes.sort_by(note_order);
        self.index.clear();
        self.defects.clear();
        for lane in &mut self.by_lane {
            lane.clear();
        }
        for (i, note) in self.notes.iter().enumerate() {
            let defect = match note.validate() {
                Err(e) => Some(e),
                Ok(()) if self.index.contains_key(&note.id) => Some(NoteDefect::DuplicateId(note.id)),
                Ok(()) => None,
            };
            if defect.is_none() || !self.index.contains_key(&note.id) {
                self.index.insert(note.id, i);
            }
            self.defects.push(defect);
            self.by_lane[note.lane.index()].push(i);
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> Option<&Note> {
        self.notes.get(idx)
    }

    pub fn index_of(&self, id: NoteId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get_by_id(&self, id: NoteId) -> Option<&Note> {
        self.index_of(id).and_then(|i| self.notes.get(i))
    }

    #[inline(always)]
    pub(crate) fn note_mut(&mut self, idx: usize) -> &mut Note {
        &mut self.notes[idx]
    }

    #[inline(always)]
    pub fn defect(&self, idx: usize) -> Option<NoteDefect> {
        self.defects.get(idx).copied().flatten()
    }

    /// Defective notes with their defects, in store order.
    pub fn defects(&self) -> impl Iterator<Item = (&Note, NoteDefect)> + '_ {
        self.notes
            .iter()
            .zip(self.defects.iter())
            .filter_map(|(n, d)| d.map(|d| (n, d)))
    }

    /// Well-formed and inside its sub-beatmap window at `now`.
    #[inline(always)]
    pub fn is_interactive(&self, idx: usize, now: f64) -> bool {
        self.defect(idx).is_none() && self.notes[idx].in_beatmap_window(now)
    }

    /// Store indices of the notes on `lane`, time-ordered.
    #[inline(always)]
    pub fn lane_indices(&self, lane: Lane) -> &[usize] {
        &self.by_lane[lane.index()]
    }

    /// Pressed holds awaiting release.
    pub fn active_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.notes
            .iter()
            .filter(|n| derive_state(n) == JudgementState::Active)
    }

    pub fn completed_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(|n| derive_state(n).is_terminal())
    }

    /// Clears every judgement record at once. Rewind/restart only.
    pub(crate) fn reset_judgements(&mut self) {
        for note in &mut self.notes {
            note.judgement.reset();
        }
    }
}
