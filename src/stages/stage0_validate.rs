use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::models::labels::{self, is_pause};
use crate::models::{Reading, Tier, TierRole, Timeline};

/// Structural rule a diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    BoundaryLabeled,
    TooFewTiers,
    MissingTier,
    UnknownPhraseLabel,
    InteriorGap,
    UnknownSegmentalLabel,
    UnknownRepairLabel,
    RepairInsidePause,
    RepairStartsOnPause,
    RepairEndsOnPause,
    UnknownLanguageLabel,
    PitchNotNumeric,
    PitchBelowFloor,
    PitchMisaligned,
    IntensityMisaligned,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rule::BoundaryLabeled => "first and last Phrases intervals must be blank",
            Rule::TooFewTiers => "fewer tiers than required",
            Rule::MissingTier => "required tier is missing",
            Rule::UnknownPhraseLabel => "Phrases label other than pr, ps, psb, fp",
            Rule::InteriorGap => "blank Phrases interval between the first and last",
            Rule::UnknownSegmentalLabel => "Segmental label other than v",
            Rule::UnknownRepairLabel => "Repairs label other than rp",
            Rule::RepairInsidePause => "rp boundary inside a ps, psb or fp interval",
            Rule::RepairStartsOnPause => "rp starts on a ps, psb or fp start",
            Rule::RepairEndsOnPause => "rp ends on a ps, psb or fp end",
            Rule::UnknownLanguageLabel => "LanguageTags label other than jp",
            Rule::PitchNotNumeric => "Pitch value is not a number",
            Rule::PitchBelowFloor => "Pitch value below half the mean pitch",
            Rule::PitchMisaligned => "Segmental and Pitch boundaries differ",
            Rule::IntensityMisaligned => "Segmental and Intensity boundaries differ",
        };
        f.write_str(text)
    }
}

/// One itemized validation finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub rule: Rule,
    /// Offending time point, when the rule has one
    pub time: Option<f64>,
    /// Offending label
    pub label: String,
}

impl Diagnostic {
    fn new(rule: Rule, time: Option<f64>, label: impl Into<String>) -> Self {
        Self {
            rule,
            time,
            label: label.into(),
        }
    }

    fn at(rule: Rule, time: f64, label: impl Into<String>) -> Self {
        Self::new(rule, Some(time), label)
    }

    /// Diagnostic line naming the file
    pub fn render(&self, file: &str) -> String {
        format!("{}: {}", file, self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.rule)?;
        if let Some(time) = self.time {
            write!(f, " {}", time)?;
        }
        if !self.label.is_empty() {
            write!(f, " {}", self.label)?;
        }
        Ok(())
    }
}

/// Outcome of the consistency checks
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid,
    Invalid(Vec<Diagnostic>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Validation::Valid => &[],
            Validation::Invalid(d) => d,
        }
    }
}

/// Run the consistency checks on a freshly loaded timeline.
///
/// Tier count, missing role tiers and non-numeric pitch values stop the
/// checks immediately; every other rule accumulates all of its violations.
pub fn validate(timeline: &Timeline, config: &ValidationConfig, undefined: &str) -> Validation {
    let mut diagnostics = Vec::new();

    // 1. Boundary intervals of the Phrases tier are blank
    if let Some(phrases) = timeline.find_tier(TierRole::Phrases) {
        if let Some(first) = phrases.intervals.first() {
            if first.start == timeline.xmin && !first.is_blank() {
                diagnostics.push(Diagnostic::at(Rule::BoundaryLabeled, first.start, &first.label));
            }
        }
        if let Some(last) = phrases.intervals.last() {
            if phrases.len() > 1 && last.end == timeline.xmax && !last.is_blank() {
                diagnostics.push(Diagnostic::at(Rule::BoundaryLabeled, last.start, &last.label));
            }
        }
    }

    // 2. Enough tiers, and every required role present
    if timeline.tier_count() < config.min_tiers {
        diagnostics.push(Diagnostic::new(
            Rule::TooFewTiers,
            None,
            format!("{} < {}", timeline.tier_count(), config.min_tiers),
        ));
        return Validation::Invalid(diagnostics);
    }
    let missing = timeline.missing_roles();
    if !missing.is_empty() {
        for role in missing {
            diagnostics.push(Diagnostic::new(
                Rule::MissingTier,
                None,
                timeline.layout.name(role),
            ));
        }
        return Validation::Invalid(diagnostics);
    }

    let (Ok(phrases), Ok(segmental), Ok(repairs), Ok(pitch), Ok(intensity)) = (
        timeline.tier(TierRole::Phrases),
        timeline.tier(TierRole::Segmental),
        timeline.tier(TierRole::Repairs),
        timeline.tier(TierRole::Pitch),
        timeline.tier(TierRole::Intensity),
    ) else {
        return Validation::Invalid(diagnostics);
    };

    // 3. Phrase labels
    for interval in timeline.labels_outside(TierRole::Phrases, labels::PHRASE_INPUT_LABELS) {
        diagnostics.push(Diagnostic::at(
            Rule::UnknownPhraseLabel,
            interval.start,
            &interval.label,
        ));
    }

    // 4. No interior gaps
    let last_index = phrases.len().saturating_sub(1);
    for (i, interval) in phrases.intervals.iter().enumerate() {
        if i != 0 && i != last_index && interval.is_blank() {
            diagnostics.push(Diagnostic::at(Rule::InteriorGap, interval.start, &interval.label));
        }
    }

    // 5. Segmental labels
    for interval in timeline.labels_outside(TierRole::Segmental, labels::SEGMENTAL_INPUT_LABELS) {
        diagnostics.push(Diagnostic::at(
            Rule::UnknownSegmentalLabel,
            interval.start,
            &interval.label,
        ));
    }

    // 6. Repair labels
    for interval in timeline.labels_outside(TierRole::Repairs, labels::REPAIR_LABELS) {
        diagnostics.push(Diagnostic::at(
            Rule::UnknownRepairLabel,
            interval.start,
            &interval.label,
        ));
    }

    // 7. Repairs never start, end or sit inside a pause
    diagnostics.extend(check_repair_boundaries(phrases, repairs));

    // 8. Language tags
    for interval in timeline.labels_outside(TierRole::LanguageTags, labels::LANGUAGE_LABELS) {
        diagnostics.push(Diagnostic::at(
            Rule::UnknownLanguageLabel,
            interval.start,
            &interval.label,
        ));
    }

    // 9. Pitch values are numeric
    let mut values = Vec::new();
    for interval in &pitch.intervals {
        match interval.reading(undefined) {
            Some(Reading::Value(v)) => values.push((interval.start, v, interval.label.as_str())),
            Some(_) => {}
            None => {
                diagnostics.push(Diagnostic::at(
                    Rule::PitchNotNumeric,
                    interval.start,
                    &interval.label,
                ));
                return Validation::Invalid(diagnostics);
            }
        }
    }

    // 10. Implausibly low pitch
    if !values.is_empty() {
        let mean = values.iter().map(|(_, v, _)| v).sum::<f64>() / values.len() as f64;
        let floor = mean * config.pitch_floor_ratio;
        for (time, value, label) in &values {
            if *value < floor {
                diagnostics.push(Diagnostic::at(Rule::PitchBelowFloor, *time, *label));
            }
        }
    }

    // 11. Pitch aligned with Segmental; 12. Intensity aligned with Segmental
    diagnostics.extend(check_alignment(segmental, pitch, Rule::PitchMisaligned, undefined));
    diagnostics.extend(check_alignment(
        segmental,
        intensity,
        Rule::IntensityMisaligned,
        undefined,
    ));

    debug!("Validation: {} diagnostics", diagnostics.len());

    if diagnostics.is_empty() {
        Validation::Valid
    } else {
        Validation::Invalid(diagnostics)
    }
}

fn check_repair_boundaries(phrases: &Tier, repairs: &Tier) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for repair in repairs.intervals.iter().filter(|i| i.label == labels::REPAIR) {
        for pause in phrases.intervals.iter().filter(|i| is_pause(&i.label)) {
            for time in [repair.start, repair.end] {
                if pause.start < time && time < pause.end {
                    diagnostics.push(Diagnostic::at(Rule::RepairInsidePause, time, &pause.label));
                }
            }
            if pause.start == repair.start {
                diagnostics.push(Diagnostic::at(
                    Rule::RepairStartsOnPause,
                    repair.start,
                    &repair.label,
                ));
            }
            if pause.end == repair.end {
                diagnostics.push(Diagnostic::at(
                    Rule::RepairEndsOnPause,
                    repair.end,
                    &repair.label,
                ));
            }
        }
    }

    diagnostics
}

/// First labeled Segmental interval whose counterpart differs in span, is
/// blank, or does not hold a reading
fn check_alignment(
    segmental: &Tier,
    measured: &Tier,
    rule: Rule,
    undefined: &str,
) -> Option<Diagnostic> {
    segmental
        .intervals
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_blank())
        .find(|(i, s)| match measured.intervals.get(*i) {
            Some(m) => {
                !m.same_span(s)
                    || m.is_blank()
                    || !matches!(m.reading(undefined), Some(Reading::Value(_) | Reading::Undefined))
            }
            None => true,
        })
        .map(|(_, s)| Diagnostic::at(rule, s.start, &s.label))
}
