//! Annotation labels used across the Phrase, Segmental, Repair and language tiers.

/// Phonated run
pub const PHONATED_RUN: &str = "pr";
/// Silent pause inside a clause
pub const WITHIN_CLAUSE_PAUSE: &str = "ps";
/// Silent pause between clauses
pub const BETWEEN_CLAUSE_PAUSE: &str = "psb";
/// Filled pause (hesitation sound)
pub const FILLED_PAUSE: &str = "fp";
/// Self-repair span
pub const REPAIR: &str = "rp";
/// Vowel nucleus
pub const VOWEL: &str = "v";
/// Vowel of 500ms or longer
pub const LONG_VOWEL: &str = "vl";
/// Final vowel of a phonated run
pub const FINAL_VOWEL: &str = "vf";
/// Vowel realized in the secondary language
pub const SECOND_LANGUAGE: &str = "jp";
/// No annotation
pub const BLANK: &str = "";

/// Sentinel written by Praat when no pitch could be measured
pub const UNDEFINED_READING: &str = "--undefined--";

/// Labels a Phrase tier may carry before reconciliation
pub const PHRASE_INPUT_LABELS: &[&str] = &[
    PHONATED_RUN,
    WITHIN_CLAUSE_PAUSE,
    BETWEEN_CLAUSE_PAUSE,
    FILLED_PAUSE,
    BLANK,
];

/// Labels a Segmental tier may carry before reconciliation
pub const SEGMENTAL_INPUT_LABELS: &[&str] = &[VOWEL, BLANK];

/// Labels a Segmental tier may carry once reconciled
pub const SEGMENTAL_RECONCILED_LABELS: &[&str] = &[
    VOWEL,
    FILLED_PAUSE,
    REPAIR,
    LONG_VOWEL,
    SECOND_LANGUAGE,
    BLANK,
];

pub const REPAIR_LABELS: &[&str] = &[REPAIR, BLANK];

pub const LANGUAGE_LABELS: &[&str] = &[SECOND_LANGUAGE, BLANK];

/// Pause labels a repair may never start or end on
pub fn is_pause(label: &str) -> bool {
    matches!(
        label,
        WITHIN_CLAUSE_PAUSE | BETWEEN_CLAUSE_PAUSE | FILLED_PAUSE
    )
}

/// Whether a Segmental label counts as a plain vowel for variability measures
pub fn is_plain_vowel(label: &str) -> bool {
    matches!(label, VOWEL | FINAL_VOWEL)
}
