use tracing::debug;

use super::stage2_fluency::{mean, ratio};
use crate::error::{FluencyError, Result};
use crate::models::labels::{is_plain_vowel, FILLED_PAUSE, PHONATED_RUN};
use crate::models::{Interval, ProsodyMeasures, Reading, Tier, TierRole, Timeline};

/// Convert a frequency in Hz to the Mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Per-interval acoustic record for one labeled Segmental interval
#[derive(Debug, Clone, PartialEq)]
struct VowelRecord {
    duration: f64,
    mel: Option<f64>,
    intensity: Option<f64>,
    is_vowel: bool,
    /// Index of the containing `pr` interval in the Phrases tier
    run: Option<usize>,
    run_followed_by_fp: bool,
    last_vowel_in_run: bool,
    /// Pair (i, i+1) counts toward the pairwise duration measures
    duration_valid: bool,
    /// Record counts toward the variability and range measures
    others_valid: bool,
    /// Pair (i, i+1) has a defined pitch on both sides
    pitch_pair_valid: bool,
}

/// Pairwise differences between record `i` and `i + 1`
#[derive(Debug, Clone, Copy)]
struct Pair {
    duration_ratio: Option<f64>,
    mel_diff: Option<f64>,
    intensity_diff: Option<f64>,
}

/// Compute rhythm, pitch and intensity variability of a reconciled timeline
pub fn measure_prosody(timeline: &Timeline, undefined: &str) -> Result<ProsodyMeasures> {
    let mut records = build_records(timeline, undefined)?;
    let undefined_count = mark_validity(&mut records);
    let pairs = pair_differences(&records);

    let mut measures = ProsodyMeasures {
        undefined: undefined_count,
        ..Default::default()
    };

    let duration_pairs: Vec<&Pair> = pairs
        .iter()
        .zip(&records)
        .filter(|(_, r)| r.duration_valid)
        .map(|(p, _)| p)
        .collect();

    let ratios: Vec<f64> = duration_pairs.iter().filter_map(|p| p.duration_ratio).collect();
    measures.npvi = mean(&ratios) * 100.0;
    measures.npvi_n = ratios.len();

    let mel_diffs: Vec<f64> = duration_pairs.iter().filter_map(|p| p.mel_diff).collect();
    measures.ppd = mean(&mel_diffs);
    measures.ppd_n = mel_diffs.len();

    let intensity_diffs: Vec<f64> = duration_pairs
        .iter()
        .filter_map(|p| p.intensity_diff)
        .collect();
    measures.pid = mean(&intensity_diffs);
    measures.pid_n = intensity_diffs.len();

    let valid: Vec<&VowelRecord> = records.iter().filter(|r| r.others_valid).collect();

    let durations: Vec<f64> = valid.iter().map(|r| r.duration).collect();
    measures.nvar_dco = coefficient_of_variation(&durations);
    measures.nvar_dco_n = durations.len();
    measures.dur_all_av = mean(&durations);

    let mels: Vec<f64> = valid.iter().filter_map(|r| r.mel).collect();
    measures.nvar_pco = coefficient_of_variation(&mels);
    measures.nvar_pco_n = mels.len();
    measures.pit_all_av = mean(&mels);

    let intensities: Vec<f64> = valid.iter().filter_map(|r| r.intensity).collect();
    measures.nvar_ico = coefficient_of_variation(&intensities);
    measures.nvar_ico_n = intensities.len();
    measures.int_all_av = mean(&intensities);

    measures.dur_range_av = range_average(&valid, |r| Some(r.duration));
    measures.pit_range_av = range_average(&valid, |r| r.mel);
    measures.int_range_av = range_average(&valid, |r| r.intensity);

    debug!(
        "Prosody: {} records, {} duration pairs, {} undefined pitch",
        records.len(),
        measures.npvi_n,
        measures.undefined
    );

    Ok(measures)
}

fn build_records(timeline: &Timeline, undefined: &str) -> Result<Vec<VowelRecord>> {
    let phrases = timeline.tier(TierRole::Phrases)?;
    let segmental = timeline.tier(TierRole::Segmental)?;
    let pitch = timeline.tier(TierRole::Pitch)?;
    let intensity = timeline.tier(TierRole::Intensity)?;

    let mut records = Vec::new();
    for (index, interval) in segmental.intervals.iter().enumerate() {
        if interval.is_blank() {
            continue;
        }

        let run = phrases
            .intervals
            .iter()
            .position(|p| p.label == PHONATED_RUN && p.contains(interval));
        let run_followed_by_fp = run
            .and_then(|r| phrases.intervals.get(r + 1))
            .is_some_and(|next| next.label == FILLED_PAUSE);

        records.push(VowelRecord {
            duration: interval.duration(),
            mel: aligned_reading(pitch, TierRole::Pitch, interval, index, undefined)?
                .map(hz_to_mel),
            intensity: aligned_reading(intensity, TierRole::Intensity, interval, index, undefined)?,
            is_vowel: is_plain_vowel(&interval.label),
            run,
            run_followed_by_fp,
            last_vowel_in_run: false,
            duration_valid: true,
            others_valid: true,
            pitch_pair_valid: true,
        });
    }

    // last plain vowel of every run
    let mut last_in_run: Vec<(usize, usize)> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        if let (true, Some(run)) = (record.is_vowel, record.run) {
            match last_in_run.iter_mut().find(|(r, _)| *r == run) {
                Some(entry) => entry.1 = i,
                None => last_in_run.push((run, i)),
            }
        }
    }
    for (_, i) in last_in_run {
        records[i].last_vowel_in_run = true;
    }

    Ok(records)
}

/// Reading of the measurement interval at `index`, which must share the
/// Segmental interval's span. Blank and undefined readings are `None`.
fn aligned_reading(
    tier: &Tier,
    role: TierRole,
    segment: &Interval,
    index: usize,
    undefined: &str,
) -> Result<Option<f64>> {
    let measured = tier
        .intervals
        .get(index)
        .filter(|m| m.same_span(segment))
        .ok_or(FluencyError::Misaligned { role, index })?;

    match measured.reading(undefined) {
        Some(Reading::Value(v)) => Ok(Some(v)),
        Some(Reading::Undefined | Reading::Blank) => Ok(None),
        None => Err(FluencyError::InvalidNumber {
            role,
            time: measured.start,
            value: measured.label.clone(),
        }),
    }
}

/// Derive the validity flags from the per-record facts. Returns the number of
/// records with undefined pitch.
fn mark_validity(records: &mut [VowelRecord]) -> usize {
    let n = records.len();
    let mut undefined = 0;

    for i in 0..n {
        if !records[i].is_vowel {
            records[i].duration_valid = false;
            records[i].others_valid = false;
            if i > 0 {
                records[i - 1].duration_valid = false;
            }
        }

        if records[i].run.is_none() {
            records[i].duration_valid = false;
            records[i].others_valid = false;
        }

        if i > 0 && records[i].last_vowel_in_run {
            records[i].duration_valid = false;
            if !records[i].run_followed_by_fp && records[i - 1].run.is_some() {
                records[i - 1].duration_valid = false;
                records[i].others_valid = false;
            }
        }

        if records[i].mel.is_none() {
            undefined += 1;
            if i > 0 {
                records[i - 1].pitch_pair_valid = false;
            }
        }
    }

    if let Some(last) = records.last_mut() {
        last.duration_valid = false;
        last.others_valid = false;
    }
    if n >= 2 {
        records[n - 2].duration_valid = false;
    }

    undefined
}

fn pair_differences(records: &[VowelRecord]) -> Vec<Pair> {
    records
        .windows(2)
        .map(|w| {
            let (a, b) = (&w[0], &w[1]);
            let average = (a.duration + b.duration) / 2.0;
            let duration_ratio =
                (average != 0.0).then(|| (b.duration - a.duration).abs() / average);
            let mel_diff = match (a.pitch_pair_valid, a.mel, b.mel) {
                (true, Some(x), Some(y)) => Some((y - x).abs()),
                _ => None,
            };
            let intensity_diff = match (a.intensity, b.intensity) {
                (Some(x), Some(y)) => Some((y - x).abs()),
                _ => None,
            };
            Pair {
                duration_ratio,
                mel_diff,
                intensity_diff,
            }
        })
        .collect()
}

/// Sample standard deviation over mean, as a percentage. Fewer than two
/// values give 0.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    ratio(variance.sqrt(), m) * 100.0
}

/// Mean over runs of (max - min) of a measure, skipping runs with fewer than
/// two defined values
fn range_average(records: &[&VowelRecord], measure: impl Fn(&VowelRecord) -> Option<f64>) -> f64 {
    let mut runs: Vec<usize> = records.iter().filter_map(|r| r.run).collect();
    runs.dedup();

    let ranges: Vec<f64> = runs
        .into_iter()
        .filter_map(|run| {
            let values: Vec<f64> = records
                .iter()
                .filter(|r| r.run == Some(run))
                .filter_map(|r| measure(r))
                .collect();
            if values.len() < 2 {
                return None;
            }
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            Some(max - min)
        })
        .collect();

    mean(&ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TierLayout;

    const UNDEFINED: &str = "--undefined--";

    fn tier(name: &str, spans: &[(f64, f64, &str)]) -> Tier {
        Tier::new(
            name,
            spans
                .iter()
                .map(|(s, e, l)| Interval::new(*s, *e, *l))
                .collect(),
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    /// Segmental spans with their pitch and intensity labels
    fn timeline(phrases: &[(f64, f64, &str)], vowels: &[(f64, f64, &str, &str, &str)]) -> Timeline {
        let segmental: Vec<_> = vowels.iter().map(|v| (v.0, v.1, v.2)).collect();
        let pitch: Vec<_> = vowels.iter().map(|v| (v.0, v.1, v.3)).collect();
        let intensity: Vec<_> = vowels.iter().map(|v| (v.0, v.1, v.4)).collect();
        Timeline::new(
            0.0,
            10.0,
            vec![
                tier("Phrases", phrases),
                tier("DFauto (English)", &segmental),
                tier("Pitch", &pitch),
                tier("Intensity", &intensity),
            ],
            TierLayout::default(),
        )
    }

    /// One run of four vowels followed by a pause
    fn single_run() -> Timeline {
        timeline(
            &[(0.0, 1.0, ""), (1.0, 3.0, "pr"), (3.0, 4.0, "ps"), (4.0, 10.0, "")],
            &[
                (0.0, 1.0, "", "", ""),
                (1.0, 1.2, "v", "200", "70"),
                (1.2, 1.6, "v", "220", "72"),
                (1.6, 1.8, "v", "180", "68"),
                (1.8, 2.2, "v", "210", "71"),
                (2.2, 10.0, "", "", ""),
            ],
        )
    }

    #[test]
    fn test_hz_to_mel() {
        assert_close(hz_to_mel(700.0), 2595.0 * 2f64.log10());
        assert!((hz_to_mel(700.0) - 781.17).abs() < 0.01);
        assert_eq!(hz_to_mel(0.0), 0.0);
    }

    #[test]
    fn test_validity_flags_single_run() {
        let t = single_run();
        let mut records = build_records(&t, UNDEFINED).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records[3].last_vowel_in_run);
        assert!(!records[2].last_vowel_in_run);

        mark_validity(&mut records);
        let duration: Vec<bool> = records.iter().map(|r| r.duration_valid).collect();
        let others: Vec<bool> = records.iter().map(|r| r.others_valid).collect();
        assert_eq!(duration, vec![true, true, false, false]);
        assert_eq!(others, vec![true, true, true, false]);
    }

    #[test]
    fn test_run_followed_by_filled_pause_keeps_last_vowel() {
        let t = timeline(
            &[
                (0.0, 1.0, ""),
                (1.0, 2.0, "pr"),
                (2.0, 2.5, "fp"),
                (2.5, 4.0, "pr"),
                (4.0, 10.0, ""),
            ],
            &[
                (0.0, 1.2, "", "", ""),
                (1.2, 1.4, "v", "200", "70"),
                (1.4, 1.7, "v", "210", "70"),
                (1.7, 2.1, "", "", ""),
                (2.1, 2.3, "fp", "150", "60"),
                (2.3, 3.0, "", "", ""),
                (3.0, 3.2, "v", "190", "66"),
                (3.2, 3.5, "v", "205", "69"),
                (3.5, 3.7, "v", "215", "67"),
                (3.7, 10.0, "", "", ""),
            ],
        );
        let mut records = build_records(&t, UNDEFINED).unwrap();
        assert!(records[1].run_followed_by_fp);
        assert_eq!(records[2].run, None);
        mark_validity(&mut records);

        // last vowel of the first run stays usable for the variability measures
        assert!(records[1].others_valid);
        assert!(!records[1].duration_valid);
        // filled pause outside every run
        assert!(!records[2].others_valid && !records[2].duration_valid);
        assert!(records[3].duration_valid);
    }

    #[test]
    fn test_single_run_measures() {
        let m = measure_prosody(&single_run(), UNDEFINED).unwrap();

        // pairs (0,1) and (1,2): |0.2-0.4|/0.3 and |0.4-0.2|/0.3
        assert_eq!(m.npvi_n, 2);
        assert_close(m.npvi, 2.0 / 3.0 * 100.0);

        assert_eq!(m.nvar_dco_n, 3);
        assert_close(m.dur_all_av, 0.8 / 3.0);
        assert_eq!(m.nvar_ico_n, 3);
        assert_close(m.int_all_av, 70.0);
        assert_close(m.int_range_av, 4.0);
        assert_close(m.nvar_ico, 2.0 / 70.0 * 100.0);

        let mels = [hz_to_mel(200.0), hz_to_mel(220.0), hz_to_mel(180.0)];
        assert_eq!(m.nvar_pco_n, 3);
        assert_close(m.pit_range_av, mels[1] - mels[2]);
        assert_eq!(m.ppd_n, 2);
        assert_close(m.ppd, ((mels[1] - mels[0]) + (mels[1] - mels[2])) / 2.0);
        assert_eq!(m.pid_n, 2);
        assert_close(m.pid, 3.0);
        assert_eq!(m.undefined, 0);
    }

    #[test]
    fn test_undefined_pitch_invalidates_previous_pair() {
        let mut t = single_run();
        t.tiers[2].intervals[2].label = UNDEFINED.to_string();

        let mut records = build_records(&t, UNDEFINED).unwrap();
        assert_eq!(records[1].mel, None);
        assert_eq!(mark_validity(&mut records), 1);
        assert!(!records[0].pitch_pair_valid);

        let m = measure_prosody(&t, UNDEFINED).unwrap();
        assert_eq!(m.undefined, 1);
        // neither pair touching the undefined reading has a pitch difference
        assert_eq!(m.ppd_n, 0);
        assert_eq!(m.ppd, 0.0);
        assert_eq!(m.nvar_pco_n, 2);
        // duration measures are unaffected
        assert_eq!(m.npvi_n, 2);
    }

    #[test]
    fn test_empty_segmental_falls_back_to_zero() {
        let t = timeline(&[(0.0, 10.0, "")], &[(0.0, 10.0, "", "", "")]);
        let m = measure_prosody(&t, UNDEFINED).unwrap();
        assert_eq!(m, ProsodyMeasures::default());
    }

    #[test]
    fn test_single_vowel_record() {
        let t = timeline(
            &[(0.0, 1.0, ""), (1.0, 2.0, "pr"), (2.0, 10.0, "")],
            &[(0.0, 1.2, "", "", ""), (1.2, 1.5, "v", "200", "70"), (1.5, 10.0, "", "", "")],
        );
        let m = measure_prosody(&t, UNDEFINED).unwrap();
        assert_eq!(m.npvi_n, 0);
        assert_eq!(m.nvar_dco_n, 0);
        assert_eq!(m.nvar_dco, 0.0);
    }

    #[test]
    fn test_misaligned_pitch_is_an_error() {
        let mut t = single_run();
        t.tiers[2].intervals[1].end = 1.1;
        let err = measure_prosody(&t, UNDEFINED).unwrap_err();
        assert!(matches!(
            err,
            FluencyError::Misaligned {
                role: TierRole::Pitch,
                index: 1
            }
        ));
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[5.0]), 0.0);
        assert_close(coefficient_of_variation(&[1.0, 3.0]), 2f64.sqrt() / 2.0 * 100.0);
    }
}
