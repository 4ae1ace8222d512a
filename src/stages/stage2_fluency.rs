use tracing::{debug, warn};

use crate::error::Result;
use crate::models::labels::{
    BETWEEN_CLAUSE_PAUSE, BLANK, FILLED_PAUSE, PHONATED_RUN, REPAIR, VOWEL, WITHIN_CLAUSE_PAUSE,
};
use crate::models::{FluencyMeasures, Tier, TierRole, Timeline};

/// `numerator / denominator`, or 0 when the denominator is 0
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Arithmetic mean, 0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

/// Running totals of one Phrases tier scan
#[derive(Debug, Default)]
struct PhraseTotals {
    speaking: f64,
    runs: usize,
    within_pause: f64,
    within_pauses: usize,
    between_pause: f64,
    between_pauses: usize,
    filled_pause: f64,
    filled_pauses: usize,
    repair: f64,
    repairs: usize,
    ignored: usize,
}

impl PhraseTotals {
    fn scan(phrases: &Tier) -> Self {
        let mut totals = Self::default();
        for interval in &phrases.intervals {
            let duration = interval.duration();
            match interval.label.as_str() {
                PHONATED_RUN => {
                    totals.speaking += duration;
                    totals.runs += 1;
                }
                WITHIN_CLAUSE_PAUSE => {
                    totals.within_pause += duration;
                    totals.within_pauses += 1;
                }
                BETWEEN_CLAUSE_PAUSE => {
                    totals.between_pause += duration;
                    totals.between_pauses += 1;
                }
                FILLED_PAUSE => {
                    totals.filled_pause += duration;
                    totals.filled_pauses += 1;
                }
                REPAIR => {
                    totals.repair += duration;
                    totals.repairs += 1;
                }
                BLANK => {}
                other => {
                    debug!("Phrases label {:?} at {} not counted", other, interval.start);
                    totals.ignored += 1;
                }
            }
        }
        totals
    }

    fn silent(&self) -> f64 {
        self.within_pause + self.between_pause
    }

    fn pauses(&self) -> usize {
        self.within_pauses + self.between_pauses
    }

    /// pr + ps + psb + fp
    fn annotated(&self) -> f64 {
        self.speaking + self.silent() + self.filled_pause
    }
}

/// Compute the speech-rate, pause and repair measures of one file.
///
/// `before_repairs` is the timeline after reconciliation passes 1 and 2, and
/// `reconciled` the timeline after pass 3 or later. Phonation, pause, filled
/// pause, SR, AR and MLoR read the Phrases tier as annotated, where a run with
/// a repair inside is still one run. The phonated totals, SRP, ARP and the
/// repair rates read the reconciled Phrases tier, where repair spans are cut
/// out of the runs. Syllables are always counted on the `before_repairs`
/// Segmental tier, so long and second-language vowels still count.
pub fn measure_fluency(
    before_repairs: &Timeline,
    reconciled: &Timeline,
) -> Result<FluencyMeasures> {
    let annotated_phrases = before_repairs.tier(TierRole::Phrases)?;
    let segmental = before_repairs.tier(TierRole::Segmental)?;
    let early = PhraseTotals::scan(annotated_phrases);
    let late = PhraseTotals::scan(reconciled.tier(TierRole::Phrases)?);

    if late.ignored > 0 {
        warn!("Ignored {} unknown Phrases labels in fluency totals", late.ignored);
    }

    let count = |label: &str| {
        segmental
            .intervals
            .iter()
            .filter(|i| i.label == label)
            .count()
    };
    let nsyll = count(VOWEL);
    let nsyll_rp = count(REPAIR);
    let nsyll_fp = count(FILLED_PAUSE);

    // Vowels per run, over runs holding at least one vowel
    let mut run_vowels = 0;
    let mut voiced_runs = 0;
    for run in annotated_phrases
        .intervals
        .iter()
        .filter(|i| i.label == PHONATED_RUN)
    {
        let vowels = segmental
            .intervals
            .iter()
            .filter(|s| s.label == VOWEL && run.contains(s))
            .count();
        if vowels > 0 {
            run_vowels += vowels;
            voiced_runs += 1;
        }
    }

    let annotated = early.annotated();
    let pruned_annotated = late.annotated();
    let durs = pruned_annotated + late.repair;
    let syllables = (nsyll + nsyll_rp) as f64;
    let per_minute = |n: usize| ratio(n as f64, annotated) * 60.0;

    debug!(
        "Fluency totals: annotated {:.3}s ({:.3}s after repairs), speaking {:.3}s, {} vowels, {} repaired",
        annotated, pruned_annotated, late.speaking, nsyll, nsyll_rp
    );

    Ok(FluencyMeasures {
        nsyll,
        silenttot: late.silent(),
        silenttot_ps: late.within_pause,
        silenttot_psb: late.between_pause,
        speakingtot: late.speaking,
        asd: ratio(late.speaking, nsyll as f64),
        nsounding: late.runs,
        npause: late.pauses(),
        npause_ps: late.within_pauses,
        npause_psb: late.between_pauses,
        nr_fp: late.filled_pauses,
        t_fp: late.filled_pause,
        nr_rp: late.repairs,
        t_rp: late.repair,
        durs,
        speech_rate: ratio(syllables, annotated) * 60.0,
        speech_rate_pruned: ratio(nsyll as f64, pruned_annotated) * 60.0,
        articulation_rate: ratio(syllables, early.speaking) * 60.0,
        articulation_rate_pruned: ratio(nsyll as f64, late.speaking) * 60.0,
        mean_length_of_run: ratio(run_vowels as f64, voiced_runs as f64),
        phonation_rate: ratio(early.speaking, annotated) * 100.0,
        silent_pause_freq: per_minute(early.pauses()),
        silent_pause_dur: ratio(early.silent(), early.pauses() as f64),
        filled_pause_freq: per_minute(early.filled_pauses),
        filled_pause_dur: ratio(early.filled_pause, early.filled_pauses as f64),
        repair_freq: ratio(nsyll_rp as f64, durs) * 60.0,
        repair_dur: ratio(late.repair, durs) * 60.0,
        between_clause_pause_freq: per_minute(early.between_pauses),
        between_clause_pause_dur: ratio(early.between_pause, early.between_pauses as f64),
        within_clause_pause_freq: per_minute(early.within_pauses),
        within_clause_pause_dur: ratio(early.within_pause, early.within_pauses as f64),
        nsyll_rp,
        nsyll_fp,
        ignored_labels: late.ignored,
    })
}
