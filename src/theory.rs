use serde::Serialize;

/// Absolute MIDI-style note number.
pub type Pitch = u8;

/// Pitch modulo 12, 0 = C.
pub type PitchClass = u8;

/// Reference octave for generated voicings: C4.
pub const BASE_OCTAVE: Pitch = 60;

pub const MAJOR_SCALE_INTERVALS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 roots an exercise can be built on.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct RootNote {
    pub pitch_class: PitchClass,
    /// Canonical (flat-spelled) name, e.g. "Eb".
    pub name: &'static str,
    /// Localized solfege name shown to the user, e.g. "Mib".
    pub display_name: &'static str,
}

pub const ROOT_NOTES: [RootNote; 12] = [
    RootNote { pitch_class: 0, name: "C", display_name: "Do" },
    RootNote { pitch_class: 1, name: "Db", display_name: "Reb" },
    RootNote { pitch_class: 2, name: "D", display_name: "Re" },
    RootNote { pitch_class: 3, name: "Eb", display_name: "Mib" },
    RootNote { pitch_class: 4, name: "E", display_name: "Mi" },
    RootNote { pitch_class: 5, name: "F", display_name: "Fa" },
    RootNote { pitch_class: 6, name: "Gb", display_name: "Solb" },
    RootNote { pitch_class: 7, name: "G", display_name: "Sol" },
    RootNote { pitch_class: 8, name: "Ab", display_name: "Lab" },
    RootNote { pitch_class: 9, name: "A", display_name: "La" },
    RootNote { pitch_class: 10, name: "Bb", display_name: "Sib" },
    RootNote { pitch_class: 11, name: "B", display_name: "Si" },
];

impl RootNote {
    /// Look up a root by canonical name. Sharp spellings ("F#") resolve to
    /// their flat-spelled canonical entry.
    pub fn from_name(name: &str) -> Option<RootNote> {
        let name = name.trim();
        ROOT_NOTES
            .iter()
            .find(|r| r.name == name)
            .or_else(|| {
                NOTE_NAMES
                    .iter()
                    .position(|n| *n == name)
                    .map(|pc| &ROOT_NOTES[pc])
            })
            .copied()
    }

    pub fn from_pitch_class(pc: PitchClass) -> RootNote {
        ROOT_NOTES[(pc % 12) as usize]
    }

    /// Pitch classes of this root's major scale, tonic first.
    pub fn major_scale_pitch_classes(&self) -> Vec<PitchClass> {
        MAJOR_SCALE_INTERVALS
            .iter()
            .map(|&i| (self.pitch_class + i) % 12)
            .collect()
    }
}

pub fn pitch_class(pitch: Pitch) -> PitchClass {
    pitch % 12
}

/// "C4" style name for a MIDI note (60 = C4).
pub fn midi_to_name(pitch: Pitch) -> String {
    let name = NOTE_NAMES[pitch_class(pitch) as usize];
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", name, octave)
}

/// Inverse of [`midi_to_name`]; accepts sharps and flats ("Bb3", "F#4").
pub fn name_to_midi(name: &str) -> Option<Pitch> {
    let name = name.trim();
    let mut chars = name.chars();
    let base: i32 = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (alter, octave_str) = if let Some(r) = rest.strip_prefix('#') {
        (1, r)
    } else if let Some(r) = rest.strip_prefix('b') {
        (-1, r)
    } else {
        (0, rest)
    };
    let octave: i32 = octave_str.parse().ok()?;
    let midi = (octave + 1) * 12 + base + alter;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

pub fn pitch_class_name(pc: PitchClass) -> &'static str {
    NOTE_NAMES[(pc % 12) as usize]
}

/// Names for intervals measured from `root`, e.g. a C-rooted [0, 4, 7] gives
/// ["C", "E", "G"].
pub fn pitch_classes_to_names(intervals: &[u8], root: &RootNote) -> Vec<&'static str> {
    intervals
        .iter()
        .map(|&i| pitch_class_name((root.pitch_class + i % 12) % 12))
        .collect()
}

/// Sorted, deduplicated pitch-class set. Every set-based comparison goes
/// through this so doubled notes and wrapped extensions grade the same way.
pub fn pitch_class_set(pcs: impl IntoIterator<Item = PitchClass>) -> Vec<PitchClass> {
    let mut set: Vec<PitchClass> = pcs.into_iter().map(|pc| pc % 12).collect();
    set.sort_unstable();
    set.dedup();
    set
}

pub fn compare_pitch_class_sets(a: &[PitchClass], b: &[PitchClass]) -> bool {
    pitch_class_set(a.iter().copied()) == pitch_class_set(b.iter().copied())
}
