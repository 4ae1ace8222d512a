use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the metrics record layout
pub const RECORD_VERSION: u32 = 1;

/// Identifying fields parsed from the annotation file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub filename: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "RECN")]
    pub recn: String,
    #[serde(rename = "Date")]
    pub date: String,
}

impl FileIdentity {
    /// Parse by fixed character offsets: ID = 0..3, RECN = 3..6, Date = 6..12
    /// rendered as `MM-DD-YY`. Short names yield short or empty fields.
    pub fn from_filename(filename: &str) -> Self {
        let chars: Vec<char> = filename.chars().collect();
        let slice = |from: usize, to: usize| -> String {
            chars
                .iter()
                .skip(from)
                .take(to.saturating_sub(from))
                .collect()
        };

        let date = format!("{}-{}-{}", slice(6, 8), slice(8, 10), slice(10, 12));
        if chrono::NaiveDate::parse_from_str(&date, "%m-%d-%y").is_err() {
            tracing::debug!("{}: date field {:?} is not a calendar date", filename, date);
        }

        Self {
            filename: filename.to_string(),
            id: slice(0, 3),
            recn: slice(3, 6),
            date,
        }
    }
}

/// Phrase- and Segmental-tier counts, durations and rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluencyMeasures {
    /// Segmental `v` count
    pub nsyll: usize,
    /// Summed `ps` + `psb` duration
    pub silenttot: f64,
    pub silenttot_ps: f64,
    pub silenttot_psb: f64,
    /// Summed `pr` duration
    pub speakingtot: f64,
    /// Average syllable duration (speakingtot / nsyll)
    pub asd: f64,
    /// `pr` count
    pub nsounding: usize,
    pub npause: usize,
    pub npause_ps: usize,
    pub npause_psb: usize,
    #[serde(rename = "nrFP")]
    pub nr_fp: usize,
    #[serde(rename = "tFP")]
    pub t_fp: f64,
    #[serde(rename = "nrRP")]
    pub nr_rp: usize,
    #[serde(rename = "tRP")]
    pub t_rp: f64,
    /// Annotated duration including repairs
    pub durs: f64,
    #[serde(rename = "SR")]
    pub speech_rate: f64,
    #[serde(rename = "SRP")]
    pub speech_rate_pruned: f64,
    #[serde(rename = "AR")]
    pub articulation_rate: f64,
    #[serde(rename = "ARP")]
    pub articulation_rate_pruned: f64,
    #[serde(rename = "MLoR")]
    pub mean_length_of_run: f64,
    #[serde(rename = "PhonRat")]
    pub phonation_rate: f64,
    #[serde(rename = "SPauseFreq")]
    pub silent_pause_freq: f64,
    #[serde(rename = "SPauseDur")]
    pub silent_pause_dur: f64,
    #[serde(rename = "FPauseFreq")]
    pub filled_pause_freq: f64,
    #[serde(rename = "FPauseDur")]
    pub filled_pause_dur: f64,
    #[serde(rename = "RpFreq")]
    pub repair_freq: f64,
    #[serde(rename = "RpDur")]
    pub repair_dur: f64,
    #[serde(rename = "SBPauseFreq")]
    pub between_clause_pause_freq: f64,
    #[serde(rename = "SBPauseDur")]
    pub between_clause_pause_dur: f64,
    #[serde(rename = "SWPauseFreq")]
    pub within_clause_pause_freq: f64,
    #[serde(rename = "SWPauseDur")]
    pub within_clause_pause_dur: f64,
    /// Segmental `rp` count (syllables inside repairs)
    pub nsyll_rp: usize,
    /// Segmental `fp` count
    pub nsyll_fp: usize,
    /// Phrase-tier labels skipped by the aggregate scan
    pub ignored_labels: usize,
}

/// Vowel-level duration, pitch and intensity variability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProsodyMeasures {
    #[serde(rename = "nPVI")]
    pub npvi: f64,
    #[serde(rename = "nPVIn")]
    pub npvi_n: usize,
    #[serde(rename = "nVarDco")]
    pub nvar_dco: f64,
    #[serde(rename = "nVarDcon")]
    pub nvar_dco_n: usize,
    #[serde(rename = "DurAllAv")]
    pub dur_all_av: f64,
    #[serde(rename = "DurRangeAv")]
    pub dur_range_av: f64,
    #[serde(rename = "PPD")]
    pub ppd: f64,
    #[serde(rename = "PPDn")]
    pub ppd_n: usize,
    #[serde(rename = "nVarPco")]
    pub nvar_pco: f64,
    #[serde(rename = "nVarPcon")]
    pub nvar_pco_n: usize,
    #[serde(rename = "PitAllAv")]
    pub pit_all_av: f64,
    #[serde(rename = "PitRangeAv")]
    pub pit_range_av: f64,
    #[serde(rename = "Undefined")]
    pub undefined: usize,
    #[serde(rename = "PID")]
    pub pid: f64,
    #[serde(rename = "PIDn")]
    pub pid_n: usize,
    #[serde(rename = "nVarIco")]
    pub nvar_ico: f64,
    #[serde(rename = "nVarIcon")]
    pub nvar_ico_n: usize,
    #[serde(rename = "IntAllAv")]
    pub int_all_av: f64,
    #[serde(rename = "IntRangeAv")]
    pub int_range_av: f64,
}

/// Complete per-file metrics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyMetrics {
    pub version: u32,
    pub fluency: FluencyMeasures,
    pub prosody: ProsodyMeasures,
}

impl FluencyMetrics {
    pub fn new(fluency: FluencyMeasures, prosody: ProsodyMeasures) -> Self {
        Self {
            version: RECORD_VERSION,
            fluency,
            prosody,
        }
    }

    /// Metric columns in table order
    pub fn columns(&self) -> Vec<(&'static str, Cell)> {
        let f = &self.fluency;
        let p = &self.prosody;
        vec![
            ("nsyll", Cell::Count(f.nsyll)),
            ("silenttot", Cell::Value(f.silenttot)),
            ("silenttot_ps", Cell::Value(f.silenttot_ps)),
            ("silenttot_psb", Cell::Value(f.silenttot_psb)),
            ("speakingtot", Cell::Value(f.speakingtot)),
            ("asd", Cell::Value(f.asd)),
            ("nsounding", Cell::Count(f.nsounding)),
            ("npause", Cell::Count(f.npause)),
            ("npause_ps", Cell::Count(f.npause_ps)),
            ("npause_psb", Cell::Count(f.npause_psb)),
            ("nrFP", Cell::Count(f.nr_fp)),
            ("tFP", Cell::Value(f.t_fp)),
            ("nrRP", Cell::Count(f.nr_rp)),
            ("tRP", Cell::Value(f.t_rp)),
            ("durs", Cell::Value(f.durs)),
            ("SR", Cell::Value(f.speech_rate)),
            ("SRP", Cell::Value(f.speech_rate_pruned)),
            ("AR", Cell::Value(f.articulation_rate)),
            ("ARP", Cell::Value(f.articulation_rate_pruned)),
            ("MLoR", Cell::Value(f.mean_length_of_run)),
            ("PhonRat", Cell::Value(f.phonation_rate)),
            ("SPauseFreq", Cell::Value(f.silent_pause_freq)),
            ("SPauseDur", Cell::Value(f.silent_pause_dur)),
            ("FPauseFreq", Cell::Value(f.filled_pause_freq)),
            ("FPauseDur", Cell::Value(f.filled_pause_dur)),
            ("RpFreq", Cell::Value(f.repair_freq)),
            ("RpDur", Cell::Value(f.repair_dur)),
            ("SBPauseFreq", Cell::Value(f.between_clause_pause_freq)),
            ("SBPauseDur", Cell::Value(f.between_clause_pause_dur)),
            ("SWPauseFreq", Cell::Value(f.within_clause_pause_freq)),
            ("SWPauseDur", Cell::Value(f.within_clause_pause_dur)),
            ("nPVI", Cell::Value(p.npvi)),
            ("nPVIn", Cell::Count(p.npvi_n)),
            ("nVarDco", Cell::Value(p.nvar_dco)),
            ("nVarDcon", Cell::Count(p.nvar_dco_n)),
            ("DurAllAv", Cell::Value(p.dur_all_av)),
            ("DurRangeAv", Cell::Value(p.dur_range_av)),
            ("PPD", Cell::Value(p.ppd)),
            ("PPDn", Cell::Count(p.ppd_n)),
            ("nVarPco", Cell::Value(p.nvar_pco)),
            ("nVarPcon", Cell::Count(p.nvar_pco_n)),
            ("PitAllAv", Cell::Value(p.pit_all_av)),
            ("PitRangeAv", Cell::Value(p.pit_range_av)),
            ("Undefined", Cell::Count(p.undefined)),
            ("PID", Cell::Value(p.pid)),
            ("PIDn", Cell::Count(p.pid_n)),
            ("nVarIco", Cell::Value(p.nvar_ico)),
            ("nVarIcon", Cell::Count(p.nvar_ico_n)),
            ("IntAllAv", Cell::Value(p.int_all_av)),
            ("IntRangeAv", Cell::Value(p.int_range_av)),
        ]
    }
}

/// One table cell: counts print as integers, values with two decimals
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Count(usize),
    Value(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Count(n) => write!(f, "{}", n),
            Cell::Value(v) => write!(f, "{:.2}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_filename() {
        let identity = FileIdentity::from_filename("S01R02041523_task.TextGrid");
        assert_eq!(identity.id, "S01");
        assert_eq!(identity.recn, "R02");
        assert_eq!(identity.date, "04-15-23");
    }

    #[test]
    fn test_identity_from_short_filename() {
        let identity = FileIdentity::from_filename("ab");
        assert_eq!(identity.id, "ab");
        assert_eq!(identity.recn, "");
        assert_eq!(identity.date, "--");
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(Cell::Count(3).to_string(), "3");
        assert_eq!(Cell::Value(75.0).to_string(), "75.00");
        assert_eq!(Cell::Value(1.0 / 3.0).to_string(), "0.33");
    }

    #[test]
    fn test_columns_are_fixed() {
        let metrics = FluencyMetrics::new(FluencyMeasures::default(), ProsodyMeasures::default());
        let columns = metrics.columns();
        assert_eq!(columns.len(), 50);
        assert_eq!(columns[0].0, "nsyll");
        assert_eq!(columns[columns.len() - 1].0, "IntRangeAv");
    }
}
