use serde::Serialize;
use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::models::labels::{
    BLANK, FILLED_PAUSE, LONG_VOWEL, PHONATED_RUN, REPAIR, SECOND_LANGUAGE, VOWEL,
};
use crate::models::{Interval, Tier, TierRole, Timeline};

/// Counts of the changes made by each reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pass 1: Segmental `v` inside a repair, now `rp`
    pub segmental_to_repair: usize,
    /// Pass 2: Segmental `v` inside a filled pause, now `fp`
    pub segmental_to_filled_pause: usize,
    /// Pass 3: repair spans written into the Phrases tier
    pub phrase_repairs_inserted: usize,
    /// Pass 3: gaps and blank interior intervals turned into `pr`
    pub phrase_gaps_filled: usize,
    /// Pass 4: vowels inside a secondary-language span, now `jp`
    pub segmental_to_language: usize,
    /// Pass 4: vowels over the length threshold, now `vl`
    pub segmental_to_long_vowel: usize,
}

impl ReconcileReport {
    pub fn total_changes(&self) -> usize {
        self.segmental_to_repair
            + self.segmental_to_filled_pause
            + self.phrase_repairs_inserted
            + self.phrase_gaps_filled
            + self.segmental_to_language
            + self.segmental_to_long_vowel
    }
}

/// Reconciled timeline together with the state it had before repairs were
/// written into the Phrases tier
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Timeline after all four passes
    pub timeline: Timeline,
    /// Timeline after passes 1 and 2: Phrases as annotated, Segmental with
    /// `rp`/`fp` relabels and every other vowel still `v`
    pub before_repairs: Timeline,
    pub report: ReconcileReport,
}

/// Propagate repair, filled-pause and language annotations into the Phrases
/// and Segmental tiers.
///
/// The passes run in a fixed order because each one reads labels the
/// previous ones wrote:
/// 1. Segmental `v` contained in a Repairs `rp` becomes `rp`
/// 2. Segmental `v` contained in a Phrases `fp` becomes `fp`
/// 3. Every repair span is written into the Phrases tier, then interior gaps
///    and blank interior intervals become `pr`
/// 4. Segmental `v` contained in a language `jp` becomes `jp`; a `v` at least
///    `long_vowel_threshold` long becomes `vl` (overriding `jp`)
pub fn reconcile(
    timeline: Timeline,
    config: &ReconcileConfig,
) -> Result<(Timeline, ReconcileReport)> {
    let reconciliation = reconcile_with_snapshot(timeline, config)?;
    Ok((reconciliation.timeline, reconciliation.report))
}

/// Same passes as [`reconcile`], also keeping a copy of the timeline taken
/// between passes 2 and 3
pub fn reconcile_with_snapshot(
    mut timeline: Timeline,
    config: &ReconcileConfig,
) -> Result<Reconciliation> {
    let mut report = ReconcileReport::default();

    let repairs = timeline.tier(TierRole::Repairs)?.spans_labeled(REPAIR);

    // Pass 1
    report.segmental_to_repair =
        relabel_contained(timeline.tier_mut(TierRole::Segmental)?, &repairs, VOWEL, REPAIR);
    debug!("Pass 1: {} vowels inside repairs", report.segmental_to_repair);

    // Pass 2
    let filled_pauses = timeline.tier(TierRole::Phrases)?.spans_labeled(FILLED_PAUSE);
    report.segmental_to_filled_pause = relabel_contained(
        timeline.tier_mut(TierRole::Segmental)?,
        &filled_pauses,
        VOWEL,
        FILLED_PAUSE,
    );
    debug!(
        "Pass 2: {} vowels inside filled pauses",
        report.segmental_to_filled_pause
    );

    let before_repairs = timeline.clone();

    // Pass 3
    let phrases = timeline.tier_mut(TierRole::Phrases)?;
    report.phrase_repairs_inserted = insert_repairs(phrases, &repairs);
    report.phrase_gaps_filled = fill_gaps(phrases);
    debug!(
        "Pass 3: {} repairs inserted, {} gaps filled",
        report.phrase_repairs_inserted, report.phrase_gaps_filled
    );

    // Pass 4
    let language_spans = timeline
        .find_tier(TierRole::LanguageTags)
        .map(|t| t.spans_labeled(SECOND_LANGUAGE))
        .unwrap_or_default();
    let (to_language, to_long) = tag_vowels(
        timeline.tier_mut(TierRole::Segmental)?,
        &language_spans,
        config.long_vowel_threshold,
    );
    report.segmental_to_language = to_language;
    report.segmental_to_long_vowel = to_long;
    debug!(
        "Pass 4: {} language vowels, {} long vowels",
        to_language, to_long
    );

    info!(
        "Reconciliation: {} changes ({} repair, {} filled pause, {} language, {} long vowel relabels)",
        report.total_changes(),
        report.segmental_to_repair,
        report.segmental_to_filled_pause,
        report.segmental_to_language,
        report.segmental_to_long_vowel
    );

    Ok(Reconciliation {
        timeline,
        before_repairs,
        report,
    })
}

/// Relabel `from` intervals contained in any of `spans` to `to`
fn relabel_contained(tier: &mut Tier, spans: &[Interval], from: &str, to: &str) -> usize {
    let mut changed = 0;
    for interval in tier.intervals.iter_mut().filter(|i| i.label == from) {
        if spans.iter().any(|span| span.contains(interval)) {
            interval.label = to.to_string();
            changed += 1;
        }
    }
    changed
}

fn insert_repairs(phrases: &mut Tier, repairs: &[Interval]) -> usize {
    repairs
        .iter()
        .filter(|rp| phrases.upsert(rp.start, rp.end, REPAIR))
        .count()
}

/// Forward sweep over the Phrases tier: an uncovered range between two
/// consecutive intervals gets a new `pr` interval, and a blank interval that
/// is neither first nor last is relabeled `pr`.
fn fill_gaps(phrases: &mut Tier) -> usize {
    let intervals = std::mem::take(&mut phrases.intervals);
    let last = intervals.len().saturating_sub(1);
    let mut swept = Vec::with_capacity(intervals.len());
    let mut filled = 0;

    for (i, mut interval) in intervals.into_iter().enumerate() {
        let previous_end = swept.last().map(|p: &Interval| p.end);
        if let Some(previous_end) = previous_end {
            if interval.start > previous_end {
                swept.push(Interval::new(previous_end, interval.start, PHONATED_RUN));
                filled += 1;
            }
        }
        if i != 0 && i != last && interval.label == BLANK {
            interval.label = PHONATED_RUN.to_string();
            filled += 1;
        }
        swept.push(interval);
    }

    phrases.intervals = swept;
    filled
}

/// Returns `(jp relabels, vl relabels)`. Both rules look at the label the
/// interval carried when the pass started.
fn tag_vowels(segmental: &mut Tier, language: &[Interval], threshold: f64) -> (usize, usize) {
    let mut to_language = 0;
    let mut to_long = 0;

    for interval in segmental.intervals.iter_mut().filter(|i| i.label == VOWEL) {
        if language.iter().any(|span| span.contains(interval)) {
            interval.label = SECOND_LANGUAGE.to_string();
            to_language += 1;
        }
        if interval.duration() >= threshold {
            interval.label = LONG_VOWEL.to_string();
            to_long += 1;
        }
    }

    (to_language, to_long)
}
