use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FluencyError, Result};

/// Semantic role of a tier. All tier access goes through a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierRole {
    /// Phrase-level speech/pause classification
    Phrases,
    /// Vowel nuclei and their fluency reclassification
    Segmental,
    /// Independently annotated self-repairs
    Repairs,
    /// Secondary-language spans
    LanguageTags,
    /// Per-vowel intensity readings (dB)
    Intensity,
    /// Per-vowel pitch readings (Hz)
    Pitch,
}

impl TierRole {
    pub const ALL: [TierRole; 6] = [
        TierRole::Phrases,
        TierRole::Segmental,
        TierRole::Repairs,
        TierRole::LanguageTags,
        TierRole::Intensity,
        TierRole::Pitch,
    ];

    /// Whether a file must carry this tier
    pub fn is_required(self) -> bool {
        !matches!(self, TierRole::LanguageTags)
    }
}

impl fmt::Display for TierRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierRole::Phrases => "Phrases",
            TierRole::Segmental => "Segmental",
            TierRole::Repairs => "Repairs",
            TierRole::LanguageTags => "LanguageTags",
            TierRole::Intensity => "Intensity",
            TierRole::Pitch => "Pitch",
        };
        f.write_str(name)
    }
}

/// Mapping from tier role to the tier name used in the annotation files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLayout {
    pub phrases: String,
    pub segmental: String,
    pub repairs: String,
    pub language_tags: String,
    pub intensity: String,
    pub pitch: String,
}

impl Default for TierLayout {
    fn default() -> Self {
        Self {
            phrases: "Phrases".to_string(),
            segmental: "DFauto (English)".to_string(),
            repairs: "Repairs".to_string(),
            language_tags: "Japanese".to_string(),
            intensity: "Intensity".to_string(),
            pitch: "Pitch".to_string(),
        }
    }
}

impl TierLayout {
    /// Tier name for a role
    pub fn name(&self, role: TierRole) -> &str {
        match role {
            TierRole::Phrases => &self.phrases,
            TierRole::Segmental => &self.segmental,
            TierRole::Repairs => &self.repairs,
            TierRole::LanguageTags => &self.language_tags,
            TierRole::Intensity => &self.intensity,
            TierRole::Pitch => &self.pitch,
        }
    }
}

/// A labeled half-open time range `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

/// Numeric content of a Pitch or Intensity interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f64),
    Undefined,
    Blank,
}

impl Interval {
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_blank(&self) -> bool {
        self.label.is_empty()
    }

    /// Temporal containment: `self.start <= other.start && other.end <= self.end`
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Point-in-range test on the half-open span
    pub fn covers_time(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }

    pub fn same_span(&self, other: &Interval) -> bool {
        self.start == other.start && self.end == other.end
    }

    /// Interpret the label as a measurement. `None` when it is neither a number,
    /// blank, nor the undefined sentinel.
    pub fn reading(&self, undefined: &str) -> Option<Reading> {
        let text = self.label.trim();
        if text.is_empty() {
            return Some(Reading::Blank);
        }
        if text == undefined {
            return Some(Reading::Undefined);
        }
        text.parse::<f64>().ok().map(Reading::Value)
    }
}

/// One named row of ordered, non-overlapping intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    /// Tier's own time bounds, which may be narrower than the timeline's
    pub xmin: f64,
    pub xmax: f64,
    pub intervals: Vec<Interval>,
}

impl Tier {
    /// Tier bounded by its first and last interval
    pub fn new(name: impl Into<String>, intervals: Vec<Interval>) -> Self {
        let xmin = intervals.first().map_or(0.0, |i| i.start);
        let xmax = intervals.last().map_or(0.0, |i| i.end);
        Self::with_bounds(name, xmin, xmax, intervals)
    }

    pub fn with_bounds(
        name: impl Into<String>,
        xmin: f64,
        xmax: f64,
        intervals: Vec<Interval>,
    ) -> Self {
        Self {
            name: name.into(),
            xmin,
            xmax,
            intervals,
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Index of the interval covering `time`, if any
    pub fn interval_at(&self, time: f64) -> Option<usize> {
        self.intervals.iter().position(|i| i.covers_time(time))
    }

    /// Spans of all intervals carrying `label`
    pub fn spans_labeled(&self, label: &str) -> Vec<Interval> {
        self.intervals
            .iter()
            .filter(|i| i.label == label)
            .cloned()
            .collect()
    }

    /// Insert `[start, end)` with `label`, overwriting whatever it overlaps.
    ///
    /// Intervals fully inside the span are removed, partially overlapped ones are
    /// trimmed to the part outside it, and an enclosing interval is split in two.
    /// Zero-length remnants of trimming are dropped. Returns whether the tier
    /// changed.
    pub fn upsert(&mut self, start: f64, end: f64, label: &str) -> bool {
        let incoming = Interval::new(start, end, label);
        let old = std::mem::take(&mut self.intervals);
        let mut updated = Vec::with_capacity(old.len() + 2);
        let mut inserted = false;

        for interval in &old {
            if interval.end <= start {
                updated.push(interval.clone());
            } else if interval.start >= end {
                if !inserted {
                    updated.push(incoming.clone());
                    inserted = true;
                }
                updated.push(interval.clone());
            } else {
                if interval.start < start {
                    updated.push(Interval::new(interval.start, start, interval.label.clone()));
                }
                if !inserted {
                    updated.push(incoming.clone());
                    inserted = true;
                }
                if interval.end > end {
                    updated.push(Interval::new(end, interval.end, interval.label.clone()));
                }
            }
        }

        if !inserted {
            updated.push(incoming);
        }

        let changed = updated != old;
        self.intervals = updated;
        changed
    }
}

/// All tiers of one annotation file on a shared time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub xmin: f64,
    pub xmax: f64,
    /// Tiers in file order (preserved when written back)
    pub tiers: Vec<Tier>,
    /// Role to tier-name mapping
    pub layout: TierLayout,
}

impl Timeline {
    pub fn new(xmin: f64, xmax: f64, tiers: Vec<Tier>, layout: TierLayout) -> Self {
        Self {
            xmin,
            xmax,
            tiers,
            layout,
        }
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    fn position(&self, role: TierRole) -> Option<usize> {
        let name = self.layout.name(role);
        self.tiers.iter().position(|t| t.name == name)
    }

    /// Tier for a role, if the file carries it
    pub fn find_tier(&self, role: TierRole) -> Option<&Tier> {
        self.position(role).map(|i| &self.tiers[i])
    }

    pub fn tier(&self, role: TierRole) -> Result<&Tier> {
        self.find_tier(role).ok_or(FluencyError::MissingTier(role))
    }

    pub fn tier_mut(&mut self, role: TierRole) -> Result<&mut Tier> {
        let index = self.position(role).ok_or(FluencyError::MissingTier(role))?;
        Ok(&mut self.tiers[index])
    }

    /// Required roles with no matching tier
    pub fn missing_roles(&self) -> Vec<TierRole> {
        TierRole::ALL
            .into_iter()
            .filter(|r| r.is_required() && self.position(*r).is_none())
            .collect()
    }

    /// Intervals of a role's tier whose labels fall outside `allowed`
    pub fn labels_outside(&self, role: TierRole, allowed: &[&str]) -> Vec<&Interval> {
        self.find_tier(role)
            .map(|tier| {
                tier.intervals
                    .iter()
                    .filter(|i| !allowed.contains(&i.label.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
