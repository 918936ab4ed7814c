use serde::Serialize;

use crate::scoring::types::{EvaluationMode, Verdict};
use crate::theory::{pitch_class_name, Pitch};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Success,
    Error,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub title: String,
    pub message: String,
    pub kind: FeedbackKind,
}

/// "2.3s" style elapsed time, truncated to tenths.
pub fn format_elapsed(ms: f64) -> String {
    let ms = ms.max(0.0) as u64;
    format!("{}.{}s", ms / 1000, (ms % 1000) / 100)
}

/// Percentage of `expected` notes that appear anywhere in `received`.
pub fn accuracy(expected: &[Pitch], received: &[Pitch]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let hits = expected.iter().filter(|n| received.contains(*n)).count();
    hits as f64 / expected.len() as f64 * 100.0
}

fn expected_names(verdict: &Verdict) -> String {
    verdict
        .expected_pitch_classes
        .iter()
        .map(|&pc| pitch_class_name(pc))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn generate_feedback(verdict: &Verdict) -> Feedback {
    if verdict.is_correct {
        return Feedback {
            title: "✅ Corretto".to_string(),
            message: format!("Ottimo lavoro! Tempo: {}", format_elapsed(verdict.time_taken_ms)),
            kind: FeedbackKind::Success,
        };
    }

    let retry_sequence = "Nota sbagliata! Riprova con la sequenza corretta.";
    let message = match verdict.mode {
        EvaluationMode::Chord | EvaluationMode::Scale => {
            format!("Note attese: {}", expected_names(verdict))
        }
        EvaluationMode::Melody => retry_sequence.to_string(),
        EvaluationMode::Combined => {
            format!("Note attese: {}. {}", expected_names(verdict), retry_sequence)
        }
    };

    Feedback {
        title: "Sbagliato".to_string(),
        message,
        kind: FeedbackKind::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::exercises::catalog::ChordType;
    use crate::exercises::generators::build_chord;
    use crate::exercises::types::Exercise;
    use crate::scoring::types::VerdictReason;
    use crate::theory::RootNote;

    fn verdict(is_correct: bool, mode: EvaluationMode) -> Verdict {
        let root = RootNote::from_name("F").unwrap();
        Verdict {
            is_correct,
            reason: VerdictReason::Completed,
            mode,
            exercise: Rc::new(Exercise::Chord(build_chord(root, ChordType::Major, false))),
            user_answer: Vec::new(),
            user_pitch_classes: Vec::new(),
            expected_pitch_classes: vec![0, 5, 9],
            expected_notes: vec![65, 69],
            time_taken_ms: 2345.0,
        }
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(2345.0), "2.3s");
        assert_eq!(format_elapsed(999.0), "0.9s");
        assert_eq!(format_elapsed(12_000.0), "12.0s");
        assert_eq!(format_elapsed(-5.0), "0.0s");
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[], &[60]), 0.0);
        assert_eq!(accuracy(&[60, 64, 67, 71], &[60, 67]), 50.0);
        assert_eq!(accuracy(&[60, 64], &[64, 60, 72]), 100.0);
    }

    #[test]
    fn test_success_feedback() {
        let fb = generate_feedback(&verdict(true, EvaluationMode::Chord));
        assert_eq!(fb.kind, FeedbackKind::Success);
        assert_eq!(fb.message, "Ottimo lavoro! Tempo: 2.3s");
    }

    #[test]
    fn test_chord_failure_lists_expected_notes() {
        let fb = generate_feedback(&verdict(false, EvaluationMode::Chord));
        assert_eq!(fb.kind, FeedbackKind::Error);
        assert_eq!(fb.message, "Note attese: C, F, A");
    }

    #[test]
    fn test_melody_failure_asks_for_retry() {
        let fb = generate_feedback(&verdict(false, EvaluationMode::Melody));
        assert_eq!(fb.message, "Nota sbagliata! Riprova con la sequenza corretta.");
        let fb = generate_feedback(&verdict(false, EvaluationMode::Combined));
        assert!(fb.message.starts_with("Note attese: C, F, A."));
    }
}
