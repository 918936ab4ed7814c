//! Exercise evaluation state machine.
//!
//! An [`Evaluator`] owns at most one session. `start_exercise` moves it from
//! idle to evaluating; the session resolves exactly once, either when the
//! expected number of notes has been logged ([`Evaluator::check_completion`])
//! or when the caller rejects a wrong note ([`Evaluator::reject`]). `reset`
//! returns to idle from any state.
//!
//! Two independent checks answer "is this note right?":
//!
//! * [`Evaluator::check_note`] is set membership on pitch classes. It drives
//!   chord and scale grading and the live key colouring in every mode.
//! * [`Evaluator::check_sequential_note`] is an exact-pitch match at the
//!   melody cursor. Only this one decides whether a melody is on track.
//!
//! Nothing here fails: input outside a session is answered with
//! [`NoteStatus::Neutral`], `false` or ignored.

use std::rc::Rc;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::exercises::types::Exercise;
use crate::scoring::types::{
    EvaluationMode, EvaluatorState, NoteStatus, Phase, PlayedNote, Progress, Verdict,
    VerdictReason,
};
use crate::theory::{
    compare_pitch_class_sets, midi_to_name, pitch_class, pitch_class_set, Pitch, PitchClass,
};

pub type CompletionCallback = Box<dyn FnMut(&Verdict)>;

/// What a session grades, fixed at start.
#[derive(Debug)]
struct Targets {
    /// Number of leading notes graded as a pitch-class set.
    set_count: usize,
    /// Deduplicated pitch classes for the set part.
    set_pitch_classes: Vec<PitchClass>,
    /// Exact pitches for the positional part, in order.
    sequence: Vec<Pitch>,
    sequence_pitch_classes: Vec<PitchClass>,
}

impl Targets {
    fn new(exercise: &Exercise, mode: EvaluationMode) -> Self {
        let (set_notes, set_pcs): (&[Pitch], Vec<PitchClass>) = match exercise {
            Exercise::Chord(c) => (c.notes.as_slice(), c.pitch_classes.clone()),
            Exercise::Scale(s) => (s.notes.as_slice(), s.pitch_classes.clone()),
            Exercise::Melody(m) => (
                m.notes.as_slice(),
                m.notes.iter().map(|&n| pitch_class(n)).collect(),
            ),
            Exercise::Combined(c) => (c.chord.notes.as_slice(), c.chord.pitch_classes.clone()),
        };
        let sequence: &[Pitch] = match exercise {
            Exercise::Chord(c) => c.notes.as_slice(),
            Exercise::Scale(s) => s.notes.as_slice(),
            Exercise::Melody(m) => m.notes.as_slice(),
            Exercise::Combined(c) => c.melody.notes.as_slice(),
        };

        let (set_count, set_pcs, sequence) = match mode {
            EvaluationMode::Chord | EvaluationMode::Scale => (set_notes.len(), set_pcs, Vec::new()),
            EvaluationMode::Melody => (0, Vec::new(), sequence.to_vec()),
            EvaluationMode::Combined => (set_notes.len(), set_pcs, sequence.to_vec()),
        };

        Targets {
            set_count,
            set_pitch_classes: pitch_class_set(set_pcs),
            sequence_pitch_classes: pitch_class_set(sequence.iter().map(|&n| pitch_class(n))),
            sequence,
        }
    }

    fn expected_note_count(&self) -> usize {
        self.set_count + self.sequence.len()
    }
}

#[derive(Debug)]
struct Session {
    exercise: Rc<Exercise>,
    mode: EvaluationMode,
    targets: Targets,
    notes: Vec<PlayedNote>,
    start_ms: f64,
    melody_index: usize,
    is_evaluating: bool,
}

impl Session {
    fn phase(&self) -> Phase {
        match self.mode {
            EvaluationMode::Melody => Phase::Sequence,
            _ if self.notes.len() < self.targets.set_count || self.targets.sequence.is_empty() => {
                Phase::Set
            }
            _ => Phase::Sequence,
        }
    }
}

pub struct Evaluator<C: Clock = SystemClock> {
    clock: C,
    session: Option<Session>,
    on_complete: Option<CompletionCallback>,
}

impl Default for Evaluator<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> Evaluator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            session: None,
            on_complete: None,
        }
    }

    /// Register the callback that receives each session's verdict. It is
    /// called at most once per `start_exercise`.
    pub fn on_complete(&mut self, callback: impl FnMut(&Verdict) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Begin evaluating `exercise`. Replaces any session already running.
    pub fn start_exercise(&mut self, exercise: impl Into<Rc<Exercise>>, mode: EvaluationMode) {
        let exercise = exercise.into();
        let targets = Targets::new(&exercise, mode);
        debug!(
            mode = mode.key(),
            exercise = exercise.full_name(),
            expected = targets.expected_note_count(),
            "exercise started"
        );
        self.session = Some(Session {
            exercise,
            mode,
            targets,
            notes: Vec::new(),
            start_ms: self.clock.now_ms(),
            melody_index: 0,
            is_evaluating: true,
        });
    }

    /// Drop the session and return to idle.
    pub fn reset(&mut self) {
        self.session = None;
    }

    pub fn state(&self) -> EvaluatorState {
        match &self.session {
            None => EvaluatorState::Idle,
            Some(s) if s.is_evaluating => EvaluatorState::Evaluating,
            Some(_) => EvaluatorState::Resolved,
        }
    }

    pub fn is_evaluating(&self) -> bool {
        self.active().is_some()
    }

    pub fn mode(&self) -> Option<EvaluationMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn exercise(&self) -> Option<&Rc<Exercise>> {
        self.session.as_ref().map(|s| &s.exercise)
    }

    pub fn notes(&self) -> &[PlayedNote] {
        match &self.session {
            Some(s) => &s.notes,
            None => &[],
        }
    }

    pub fn expected_note_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.targets.expected_note_count())
    }

    pub fn melody_index(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.melody_index)
    }

    pub fn start_time_ms(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.start_ms)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.session
            .as_ref()
            .map_or(0.0, |s| self.clock.now_ms() - s.start_ms)
    }

    /// Which check the next note should go through, while evaluating.
    pub fn phase(&self) -> Option<Phase> {
        self.active().map(Session::phase)
    }

    pub fn progress(&self) -> Progress {
        let received = self.notes().len();
        let expected = self.expected_note_count();
        Progress {
            is_active: self.is_evaluating(),
            mode: self.mode(),
            notes_received: received,
            notes_expected: expected,
            progress: if expected > 0 {
                received as f64 / expected as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    fn active(&self) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_evaluating)
    }

    fn active_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.is_evaluating)
    }

    /// Set-membership check for live feedback. Octave and order are ignored.
    ///
    /// While a melody is being played this only says whether the pitch class
    /// occurs somewhere in the melody; use [`Self::check_sequential_note`]
    /// to judge the melody itself.
    pub fn check_note(&self, pitch: Pitch) -> NoteStatus {
        let Some(session) = self.active() else {
            return NoteStatus::Neutral;
        };
        let pcs = match session.phase() {
            Phase::Set => &session.targets.set_pitch_classes,
            Phase::Sequence => &session.targets.sequence_pitch_classes,
        };
        if pcs.contains(&pitch_class(pitch)) {
            NoteStatus::Correct
        } else {
            NoteStatus::Incorrect
        }
    }

    /// True iff `pitch` is exactly the melody note at the cursor.
    pub fn check_sequential_note(&self, pitch: Pitch) -> bool {
        let Some(session) = self.active() else {
            return false;
        };
        if session.phase() != Phase::Sequence {
            return false;
        }
        session.targets.sequence.get(session.melody_index) == Some(&pitch)
    }

    /// Move the melody cursor forward one note. Bounded by the melody
    /// length; does not check the note. Prefer [`Self::try_advance`].
    pub fn advance_melody_index(&mut self) {
        if let Some(session) = self.active_mut() {
            if session.melody_index < session.targets.sequence.len() {
                session.melody_index += 1;
            }
        }
    }

    /// Advance the cursor if and only if `pitch` is the expected melody note.
    pub fn try_advance(&mut self, pitch: Pitch) -> bool {
        if !self.check_sequential_note(pitch) {
            return false;
        }
        self.advance_melody_index();
        true
    }

    /// Cursor at or past the last melody note. Always false for chords and
    /// scales.
    pub fn is_melody_complete(&self) -> bool {
        self.session.as_ref().is_some_and(|s| match s.mode {
            EvaluationMode::Melody => s.melody_index >= s.targets.sequence.len(),
            EvaluationMode::Combined => {
                !s.targets.sequence.is_empty() && s.melody_index >= s.targets.sequence.len()
            }
            EvaluationMode::Chord | EvaluationMode::Scale => false,
        })
    }

    /// Log a played note.
    ///
    /// In chord, scale and combined modes this also runs
    /// [`Self::check_completion`] and returns its verdict, so the note that
    /// completes the exercise resolves it. In melody mode it only logs; the
    /// caller calls `check_completion` once the melody is complete.
    pub fn add_note(&mut self, pitch: Pitch) -> Option<Verdict> {
        let now = self.clock.now_ms();
        let session = self.active_mut()?;
        session.notes.push(PlayedNote {
            midi: pitch,
            pitch_class: pitch_class(pitch),
            name: midi_to_name(pitch),
            timestamp_ms: now,
        });
        debug!(note = %midi_to_name(pitch), count = session.notes.len(), "note added");

        match session.mode {
            EvaluationMode::Melody => None,
            _ => self.check_completion(),
        }
    }

    /// Remove the most recent logged occurrence of `pitch`.
    ///
    /// Only notes of a chord or scale still being built can be taken back. In
    /// the sequence phase the melody cursor has already moved past the note,
    /// so this is a no-op there.
    pub fn remove_note(&mut self, pitch: Pitch) {
        if let Some(session) = self.active_mut() {
            if session.phase() != Phase::Set {
                return;
            }
            if let Some(idx) = session.notes.iter().rposition(|n| n.midi == pitch) {
                session.notes.remove(idx);
                debug!(note = %midi_to_name(pitch), "note removed");
            }
        }
    }

    /// Forget every logged note and rewind the melody cursor, keeping the
    /// session running.
    pub fn clear_notes(&mut self) {
        if let Some(session) = self.active_mut() {
            session.notes.clear();
            session.melody_index = 0;
        }
    }

    /// Resolve the session once enough notes have been logged.
    ///
    /// Fires at most once per session: the first call that finds the log at
    /// or beyond the expected count grades it, ends evaluation and invokes
    /// the completion callback. Every other call returns `None`.
    pub fn check_completion(&mut self) -> Option<Verdict> {
        let session = self.active()?;
        if session.notes.len() < session.targets.expected_note_count() {
            return None;
        }
        let is_correct = grade(session);
        self.resolve(is_correct, VerdictReason::Completed)
    }

    /// Log `pitch` as a wrong answer and fail the session immediately.
    ///
    /// For callers that stop an exercise on the first wrong key. Returns
    /// `None` when nothing is being evaluated.
    pub fn reject(&mut self, pitch: Pitch) -> Option<Verdict> {
        let now = self.clock.now_ms();
        let session = self.active_mut()?;
        session.notes.push(PlayedNote {
            midi: pitch,
            pitch_class: pitch_class(pitch),
            name: midi_to_name(pitch),
            timestamp_ms: now,
        });
        self.resolve(false, VerdictReason::WrongNote)
    }

    /// End the active session with a verdict. The evaluating flag is cleared
    /// before the callback runs, so a verdict can never be emitted twice.
    fn resolve(&mut self, is_correct: bool, reason: VerdictReason) -> Option<Verdict> {
        let now = self.clock.now_ms();
        let session = self.active_mut()?;
        session.is_evaluating = false;

        let set_len = session.targets.set_count.min(session.notes.len());
        let verdict = Verdict {
            is_correct,
            reason,
            mode: session.mode,
            exercise: Rc::clone(&session.exercise),
            user_answer: session.notes.clone(),
            user_pitch_classes: pitch_class_set(
                session.notes[..set_len].iter().map(|n| n.pitch_class),
            ),
            expected_pitch_classes: session.targets.set_pitch_classes.clone(),
            expected_notes: session.targets.sequence.clone(),
            time_taken_ms: now - session.start_ms,
        };
        debug!(
            correct = verdict.is_correct,
            reason = ?verdict.reason,
            ms = verdict.time_taken_ms,
            "exercise resolved"
        );

        if let Some(callback) = self.on_complete.as_mut() {
            callback(&verdict);
        }
        Some(verdict)
    }
}

/// Set part: same deduplicated pitch classes. Sequence part: same pitches in
/// the same order, same length.
fn grade(session: &Session) -> bool {
    let targets = &session.targets;
    let set_len = targets.set_count.min(session.notes.len());
    let (set_part, sequence_part) = session.notes.split_at(set_len);

    let set_ok = targets.set_count == 0
        || compare_pitch_class_sets(
            &set_part.iter().map(|n| n.pitch_class).collect::<Vec<_>>(),
            &targets.set_pitch_classes,
        );
    let sequence_ok = targets.sequence.is_empty()
        || sequence_part.iter().map(|n| n.midi).eq(targets.sequence.iter().copied());

    set_ok && sequence_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use proptest::prelude::*;

    use crate::clock::ManualClock;
    use crate::exercises::catalog::ChordType;
    use crate::exercises::generators::{build_chord, generate_major_scale};
    use crate::exercises::types::{CombinedExercise, MelodyExercise};
    use crate::theory::RootNote;

    fn chord(root: &str, chord_type: ChordType) -> Exercise {
        let root = RootNote::from_name(root).unwrap();
        Exercise::Chord(build_chord(root, chord_type, false))
    }

    fn melody_exercise(notes: &[Pitch]) -> MelodyExercise {
        MelodyExercise {
            scale: generate_major_scale("C").unwrap(),
            notes: notes.to_vec(),
            length: notes.len(),
            start_with_tonic: false,
            full_name: "test melody".to_string(),
        }
    }

    fn melody(notes: &[Pitch]) -> Exercise {
        Exercise::Melody(melody_exercise(notes))
    }

    fn combined(notes: &[Pitch]) -> Exercise {
        let root = RootNote::from_name("C").unwrap();
        Exercise::Combined(CombinedExercise {
            chord: build_chord(root, ChordType::Major, false),
            melody: melody_exercise(notes),
            full_name: "test combined".to_string(),
        })
    }

    fn evaluator() -> (Evaluator<Rc<ManualClock>>, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(10_000.0));
        (Evaluator::new(Rc::clone(&clock)), clock)
    }

    /// Evaluator whose callback pushes every verdict into the returned log.
    fn recording_evaluator() -> (Evaluator<Rc<ManualClock>>, Rc<ManualClock>, Rc<RefCell<Vec<Verdict>>>) {
        let (mut ev, clock) = evaluator();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        ev.on_complete(move |v| sink.borrow_mut().push(v.clone()));
        (ev, clock, log)
    }

    #[test]
    fn test_idle_input_is_neutral() {
        let (mut ev, _) = evaluator();
        assert_eq!(ev.state(), EvaluatorState::Idle);
        assert_eq!(ev.check_note(60), NoteStatus::Neutral);
        assert!(!ev.check_sequential_note(60));
        assert!(!ev.try_advance(60));
        assert!(ev.add_note(60).is_none());
        assert!(ev.check_completion().is_none());
        assert!(ev.reject(61).is_none());
        ev.remove_note(60);
        ev.clear_notes();
        ev.advance_melody_index();
        assert!(ev.notes().is_empty());
        assert!(!ev.is_melody_complete());
        assert_eq!(ev.phase(), None);
    }

    #[test]
    fn test_chord_in_another_octave_is_correct() {
        let (mut ev, clock, log) = recording_evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        assert_eq!(ev.state(), EvaluatorState::Evaluating);
        assert_eq!(ev.expected_note_count(), 3);

        for pitch in [72, 76] {
            assert_eq!(ev.check_note(pitch), NoteStatus::Correct);
            clock.advance(100.0);
            assert!(ev.add_note(pitch).is_none());
        }
        clock.advance(100.0);
        let verdict = ev.add_note(79).expect("third note completes the chord");

        assert!(verdict.is_correct);
        assert_eq!(verdict.reason, VerdictReason::Completed);
        assert_eq!(verdict.mode, EvaluationMode::Chord);
        assert_eq!(verdict.user_pitch_classes, vec![0, 4, 7]);
        assert_eq!(verdict.expected_pitch_classes, vec![0, 4, 7]);
        assert_eq!(verdict.time_taken_ms, 300.0);
        assert_eq!(verdict.user_answer.len(), 3);
        assert_eq!(verdict.user_answer[0].name, "C5");
        assert_eq!(ev.state(), EvaluatorState::Resolved);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0], verdict);
    }

    #[test]
    fn test_chord_order_is_irrelevant() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(67);
        ev.add_note(60);
        assert!(ev.add_note(64).unwrap().is_correct);
    }

    #[test]
    fn test_chord_wrong_note_grades_incorrect() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        assert_eq!(ev.check_note(65), NoteStatus::Incorrect);
        ev.add_note(60);
        ev.add_note(64);
        let verdict = ev.add_note(65).unwrap();
        assert!(!verdict.is_correct);
        assert_eq!(verdict.user_pitch_classes, vec![0, 4, 5]);
    }

    #[test]
    fn test_doubled_note_does_not_stand_in_for_missing_one() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(60);
        ev.add_note(72);
        let verdict = ev.add_note(64).unwrap();
        assert!(!verdict.is_correct);
        assert_eq!(verdict.user_pitch_classes, vec![0, 4]);
    }

    #[test]
    fn test_completion_fires_exactly_once() {
        let (mut ev, _, log) = recording_evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(60);
        ev.add_note(64);
        assert!(ev.add_note(67).is_some());
        for pitch in [60, 64, 67, 71, 72] {
            assert!(ev.add_note(pitch).is_none());
            assert!(ev.check_completion().is_none());
        }
        assert!(ev.reject(61).is_none());
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(ev.notes().len(), 3);
        assert_eq!(ev.check_note(60), NoteStatus::Neutral);
    }

    #[test]
    fn test_each_session_gets_its_own_verdict() {
        let (mut ev, _, log) = recording_evaluator();
        for _ in 0..3 {
            ev.start_exercise(chord("G", ChordType::Minor), EvaluationMode::Chord);
            ev.add_note(67);
            ev.add_note(70);
            ev.add_note(74);
        }
        assert_eq!(log.borrow().len(), 3);
        assert!(log.borrow().iter().all(|v| v.is_correct));
    }

    #[test]
    fn test_remove_note_undoes_add() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Maj7), EvaluationMode::Chord);
        ev.add_note(60);
        let before: Vec<_> = ev.notes().to_vec();
        ev.add_note(64);
        ev.remove_note(64);
        assert_eq!(ev.notes(), before.as_slice());
        assert_eq!(ev.state(), EvaluatorState::Evaluating);
    }

    #[test]
    fn test_remove_note_takes_last_occurrence() {
        let (mut ev, clock) = evaluator();
        ev.start_exercise(chord("C", ChordType::Maj7), EvaluationMode::Chord);
        ev.add_note(60);
        clock.advance(50.0);
        ev.add_note(64);
        clock.advance(50.0);
        ev.add_note(60);
        ev.remove_note(60);

        let notes = ev.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].midi, 60);
        assert_eq!(notes[0].timestamp_ms, 10_000.0);
        assert_eq!(notes[1].midi, 64);

        ev.remove_note(71);
        assert_eq!(ev.notes().len(), 2);
    }

    #[test]
    fn test_removed_note_delays_completion() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(60);
        ev.add_note(64);
        ev.remove_note(64);
        assert!(ev.add_note(67).is_none());
        assert!(ev.add_note(64).unwrap().is_correct);
    }

    #[test]
    fn test_played_melody_note_cannot_be_taken_back() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        assert!(ev.try_advance(60));
        ev.add_note(60);
        ev.remove_note(60);
        assert_eq!(ev.notes().len(), 1);

        for pitch in [64, 67] {
            assert!(ev.try_advance(pitch));
            ev.add_note(pitch);
        }
        assert!(ev.is_melody_complete());
        assert!(ev.check_completion().unwrap().is_correct);
        assert_eq!(ev.state(), EvaluatorState::Resolved);
    }

    #[test]
    fn test_chord_half_is_locked_once_melody_starts() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(combined(&[62, 64]), EvaluationMode::Combined);
        for pitch in [60, 64, 67] {
            ev.add_note(pitch);
        }
        assert_eq!(ev.phase(), Some(Phase::Sequence));
        ev.remove_note(60);
        assert_eq!(ev.notes().len(), 3);

        assert!(ev.try_advance(62));
        assert!(ev.add_note(62).is_none());
        ev.remove_note(62);
        assert_eq!(ev.notes().len(), 4);
        assert!(ev.try_advance(64));
        assert!(ev.add_note(64).unwrap().is_correct);
    }

    #[test]
    fn test_empty_melody_is_sequential_and_complete() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[]), EvaluationMode::Melody);
        assert_eq!(ev.phase(), Some(Phase::Sequence));
        assert!(ev.is_melody_complete());
        assert!(!ev.check_sequential_note(60));
        assert!(ev.check_completion().unwrap().is_correct);
    }

    #[test]
    fn test_chord_mode_never_reports_melody_complete() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        assert!(!ev.is_melody_complete());
        assert_eq!(ev.phase(), Some(Phase::Set));
    }

    #[test]
    fn test_scale_mode_is_order_free() {
        let (mut ev, _) = evaluator();
        let scale = Exercise::Scale(generate_major_scale("D").unwrap());
        ev.start_exercise(scale, EvaluationMode::Scale);
        assert_eq!(ev.expected_note_count(), 7);
        // D major, descending and spread over octaves.
        let answer = [85, 71, 57, 79, 66, 52, 74];
        for &pitch in &answer[..6] {
            assert_eq!(ev.check_note(pitch), NoteStatus::Correct);
            assert!(ev.add_note(pitch).is_none());
        }
        let verdict = ev.add_note(answer[6]).unwrap();
        assert!(verdict.is_correct);
        assert_eq!(verdict.mode, EvaluationMode::Scale);
    }

    #[test]
    fn test_melody_sequence_in_order() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        for (i, pitch) in [60, 64, 67].into_iter().enumerate() {
            assert!(!ev.is_melody_complete());
            assert_eq!(ev.melody_index(), i);
            assert!(ev.check_sequential_note(pitch));
            ev.advance_melody_index();
        }
        assert!(ev.is_melody_complete());
    }

    #[test]
    fn test_melody_out_of_order_fails_at_second_note() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        assert!(ev.try_advance(60));
        assert!(!ev.try_advance(67));
        assert_eq!(ev.melody_index(), 1);
        assert!(!ev.check_sequential_note(67));
        assert!(ev.check_sequential_note(64));
    }

    #[test]
    fn test_sequential_check_is_octave_sensitive() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        assert!(!ev.check_sequential_note(72));
        // The lax check still colours the key as part of the melody.
        assert_eq!(ev.check_note(72), NoteStatus::Correct);
        assert_eq!(ev.check_note(76), NoteStatus::Correct);
        assert_eq!(ev.check_note(62), NoteStatus::Incorrect);
        assert_eq!(ev.melody_index(), 0);
    }

    #[test]
    fn test_advance_is_bounded() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60]), EvaluationMode::Melody);
        ev.advance_melody_index();
        ev.advance_melody_index();
        assert_eq!(ev.melody_index(), 1);
        assert!(ev.is_melody_complete());
        assert!(!ev.check_sequential_note(60));
    }

    #[test]
    fn test_melody_graded_on_exact_sequence() {
        let (mut ev, _, log) = recording_evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        for pitch in [60, 64, 67] {
            assert!(ev.try_advance(pitch));
            // Melody mode never resolves from inside add_note.
            assert!(ev.add_note(pitch).is_none());
        }
        assert!(ev.is_melody_complete());
        let verdict = ev.check_completion().unwrap();
        assert!(verdict.is_correct);
        assert_eq!(verdict.expected_notes, vec![60, 64, 67]);
        assert!(verdict.expected_pitch_classes.is_empty());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_melody_octave_shift_is_incorrect() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        for pitch in [60, 76, 67] {
            ev.add_note(pitch);
        }
        assert!(!ev.check_completion().unwrap().is_correct);
    }

    #[test]
    fn test_melody_wrong_order_is_incorrect() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        ev.add_note(60);
        ev.add_note(67);
        assert!(ev.check_completion().is_none());
        ev.add_note(64);
        assert!(!ev.check_completion().unwrap().is_correct);
    }

    #[test]
    fn test_reject_fails_immediately() {
        let (mut ev, clock, log) = recording_evaluator();
        ev.start_exercise(melody(&[60, 64, 67]), EvaluationMode::Melody);
        assert!(ev.try_advance(60));
        ev.add_note(60);
        clock.advance(1200.0);
        let verdict = ev.reject(65).unwrap();
        assert!(!verdict.is_correct);
        assert_eq!(verdict.reason, VerdictReason::WrongNote);
        assert_eq!(verdict.time_taken_ms, 1200.0);
        assert_eq!(verdict.user_answer.last().unwrap().midi, 65);
        assert_eq!(ev.state(), EvaluatorState::Resolved);

        assert!(ev.reject(65).is_none());
        assert!(ev.check_completion().is_none());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_restart_replaces_session() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(60);
        ev.start_exercise(melody(&[62, 64]), EvaluationMode::Melody);
        assert_eq!(ev.state(), EvaluatorState::Evaluating);
        assert_eq!(ev.mode(), Some(EvaluationMode::Melody));
        assert!(ev.notes().is_empty());
        assert_eq!(ev.melody_index(), 0);
        assert_eq!(ev.expected_note_count(), 2);
    }

    #[test]
    fn test_restart_after_resolution() {
        let (mut ev, _) = evaluator();
        let exercise = Rc::new(chord("C", ChordType::Major));
        ev.start_exercise(Rc::clone(&exercise), EvaluationMode::Chord);
        ev.reject(61);
        assert_eq!(ev.state(), EvaluatorState::Resolved);
        ev.start_exercise(Rc::clone(&exercise), EvaluationMode::Chord);
        assert_eq!(ev.state(), EvaluatorState::Evaluating);
        assert!(Rc::ptr_eq(ev.exercise().unwrap(), &exercise));
    }

    #[test]
    fn test_reset_from_any_state() {
        let (mut ev, _) = evaluator();
        ev.reset();
        assert_eq!(ev.state(), EvaluatorState::Idle);

        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.add_note(60);
        ev.reset();
        assert_eq!(ev.state(), EvaluatorState::Idle);
        assert!(ev.notes().is_empty());
        assert_eq!(ev.expected_note_count(), 0);
        assert_eq!(ev.mode(), None);

        ev.start_exercise(chord("C", ChordType::Major), EvaluationMode::Chord);
        ev.reject(61);
        ev.reset();
        assert_eq!(ev.state(), EvaluatorState::Idle);
        assert_eq!(ev.check_note(60), NoteStatus::Neutral);
    }

    #[test]
    fn test_clear_notes_keeps_session() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(melody(&[60, 62, 64]), EvaluationMode::Melody);
        ev.try_advance(60);
        ev.add_note(60);
        ev.clear_notes();
        assert!(ev.notes().is_empty());
        assert_eq!(ev.melody_index(), 0);
        assert_eq!(ev.state(), EvaluatorState::Evaluating);
    }

    #[test]
    fn test_progress() {
        let (mut ev, clock) = evaluator();
        let idle = ev.progress();
        assert!(!idle.is_active);
        assert_eq!(idle.progress, 0.0);

        ev.start_exercise(chord("C", ChordType::Maj7), EvaluationMode::Chord);
        ev.add_note(60);
        let p = ev.progress();
        assert!(p.is_active);
        assert_eq!(p.mode, Some(EvaluationMode::Chord));
        assert_eq!(p.notes_received, 1);
        assert_eq!(p.notes_expected, 4);
        assert_eq!(p.progress, 25.0);

        clock.advance(500.0);
        assert_eq!(ev.elapsed_ms(), 500.0);
        assert_eq!(ev.start_time_ms(), Some(10_000.0));
    }

    #[test]
    fn test_combined_runs_chord_then_melody() {
        let (mut ev, _, log) = recording_evaluator();
        ev.start_exercise(combined(&[62, 71, 60]), EvaluationMode::Combined);
        assert_eq!(ev.expected_note_count(), 6);
        assert_eq!(ev.phase(), Some(Phase::Set));

        // Chord half: D is in the melody but not in the chord.
        assert_eq!(ev.check_note(62), NoteStatus::Incorrect);
        assert!(!ev.try_advance(62));
        for pitch in [55, 64, 72] {
            assert_eq!(ev.check_note(pitch), NoteStatus::Correct);
            assert!(ev.add_note(pitch).is_none());
        }

        assert_eq!(ev.phase(), Some(Phase::Sequence));
        assert_eq!(ev.check_note(62), NoteStatus::Correct);
        assert_eq!(ev.check_note(64), NoteStatus::Incorrect);
        assert!(ev.try_advance(62));
        assert!(ev.add_note(62).is_none());
        assert!(ev.try_advance(71));
        assert!(ev.add_note(71).is_none());
        assert!(ev.try_advance(60));
        assert!(ev.is_melody_complete());

        let verdict = ev.add_note(60).unwrap();
        assert!(verdict.is_correct);
        assert_eq!(verdict.user_pitch_classes, vec![0, 4, 7]);
        assert_eq!(verdict.expected_notes, vec![62, 71, 60]);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_combined_requires_both_halves() {
        let (mut ev, _) = evaluator();
        ev.start_exercise(combined(&[62, 64]), EvaluationMode::Combined);
        for pitch in [60, 64, 67, 62] {
            ev.add_note(pitch);
        }
        assert!(!ev.add_note(76).unwrap().is_correct);

        ev.start_exercise(combined(&[62, 64]), EvaluationMode::Combined);
        for pitch in [60, 60, 67, 62] {
            ev.add_note(pitch);
        }
        assert!(!ev.add_note(64).unwrap().is_correct);
    }

    fn chord_and_scrambled_answer() -> impl Strategy<Value = (Exercise, Vec<Pitch>)> {
        (0..ChordType::ALL.len(), 0u8..12)
            .prop_flat_map(|(t, root)| {
                let exercise = Exercise::Chord(build_chord(
                    RootNote::from_pitch_class(root),
                    ChordType::ALL[t],
                    false,
                ));
                let notes = exercise.playback_notes();
                let len = notes.len();
                (
                    Just(exercise),
                    Just(notes).prop_shuffle(),
                    prop::collection::vec(-2i16..=2, len),
                )
            })
            .prop_map(|(exercise, notes, shifts)| {
                let answer = notes
                    .iter()
                    .zip(shifts)
                    .map(|(&n, octaves)| (n as i16 + 12 * octaves) as Pitch)
                    .collect();
                (exercise, answer)
            })
    }

    proptest! {
        #[test]
        fn test_chord_grading_ignores_order_and_octave(
            (exercise, answer) in chord_and_scrambled_answer()
        ) {
            let (mut ev, _) = evaluator();
            ev.start_exercise(exercise, EvaluationMode::Chord);
            let mut verdict = None;
            for pitch in answer {
                prop_assert_eq!(ev.check_note(pitch), NoteStatus::Correct);
                verdict = ev.add_note(pitch);
            }
            prop_assert!(verdict.unwrap().is_correct);
        }

        #[test]
        fn test_melody_grading_flips_on_octave_shift(
            degrees in prop::collection::vec(0usize..7, 1..9),
            shifted in any::<prop::sample::Index>(),
            up in any::<bool>(),
        ) {
            let scale = generate_major_scale("C").unwrap();
            let notes: Vec<Pitch> = degrees.iter().map(|&d| scale.notes[d]).collect();

            let (mut ev, _) = evaluator();
            ev.start_exercise(melody(&notes), EvaluationMode::Melody);
            for &pitch in &notes {
                prop_assert!(ev.try_advance(pitch));
                ev.add_note(pitch);
            }
            prop_assert!(ev.check_completion().unwrap().is_correct);

            let mut answer = notes.clone();
            let i = shifted.index(answer.len());
            answer[i] = if up { answer[i] + 12 } else { answer[i] - 12 };
            ev.start_exercise(melody(&notes), EvaluationMode::Melody);
            for &pitch in &answer {
                ev.add_note(pitch);
            }
            prop_assert!(!ev.check_completion().unwrap().is_correct);
        }
    }
}
