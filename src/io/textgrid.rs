use std::fs;
use std::io::Write as _;
use std::path::Path;

use ::textgrid::{Interval as GridInterval, TextGrid, Tier as GridTier, TierType};
use tracing::debug;

use crate::error::{FluencyError, Result};
use crate::models::{Interval, Tier, TierLayout, Timeline};

/// Read an interval-tier TextGrid.
///
/// Praat saves files with non-ASCII labels as UTF-16; those, and UTF-8 files
/// with a byte order mark, are parsed from a plain UTF-8 copy.
pub fn read_textgrid(path: &Path, layout: &TierLayout) -> Result<Timeline> {
    let bytes = fs::read(path).map_err(|e| FluencyError::io("reading TextGrid", e))?;

    let grid = match transcode(&bytes).map_err(|e| FluencyError::textgrid(path, e))? {
        Some(text) => {
            debug!("{}: parsing a UTF-8 copy", path.display());
            let mut copy = tempfile::NamedTempFile::new()
                .map_err(|e| FluencyError::io("creating UTF-8 copy of TextGrid", e))?;
            copy.write_all(text.as_bytes())
                .map_err(|e| FluencyError::io("writing UTF-8 copy of TextGrid", e))?;
            TextGrid::from_file(copy.path())
        }
        None => TextGrid::from_file(path),
    }
    .map_err(|err| FluencyError::textgrid(path, err))?;

    timeline_from_grid(grid, layout)
}

/// Write a timeline with every interval, blank ones included
pub fn write_textgrid(timeline: &Timeline, path: &Path) -> Result<()> {
    let mut grid = TextGrid::new(timeline.xmin, timeline.xmax)
        .map_err(|err| FluencyError::textgrid(path, err))?;
    for tier in &timeline.tiers {
        grid.add_tier(grid_tier(tier))
            .map_err(|err| FluencyError::textgrid(path, format!("tier {:?}: {err}", tier.name)))?;
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| FluencyError::io("creating TextGrid output directory", e))?;
        }
    }
    grid.to_file(path, false)
        .map_err(|err| FluencyError::textgrid(path, err))
}

fn timeline_from_grid(grid: TextGrid, layout: &TierLayout) -> Result<Timeline> {
    let mut tiers = Vec::with_capacity(grid.tiers.len());
    for tier in grid.tiers {
        if !matches!(tier.tier_type, TierType::IntervalTier) {
            return Err(FluencyError::PointTier(tier.name));
        }
        let intervals = tier
            .intervals
            .into_iter()
            .map(|i| Interval::new(i.xmin, i.xmax, i.text))
            .collect();
        tiers.push(Tier::with_bounds(tier.name, tier.xmin, tier.xmax, intervals));
    }

    Ok(Timeline::new(grid.xmin, grid.xmax, tiers, layout.clone()))
}

fn grid_tier(tier: &Tier) -> GridTier {
    GridTier {
        name: tier.name.clone(),
        tier_type: TierType::IntervalTier,
        xmin: tier.xmin,
        xmax: tier.xmax,
        intervals: tier
            .intervals
            .iter()
            .map(|i| GridInterval {
                xmin: i.start,
                xmax: i.end,
                text: i.label.clone(),
            })
            .collect(),
        points: Vec::new(),
    }
}

/// UTF-8 text of a UTF-16 or BOM-prefixed file; `None` when the bytes can be
/// parsed as they are
fn transcode(bytes: &[u8]) -> std::result::Result<Option<String>, String> {
    let utf16 = |rest: &[u8], unit: fn([u8; 2]) -> u16| {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| unit([c[0], c[1]]))
            .collect();
        String::from_utf16(&units)
            .map(Some)
            .map_err(|e| e.to_string())
    };

    match bytes {
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => std::str::from_utf8(rest)
            .map(|text| Some(text.to_string()))
            .map_err(|e| e.to_string()),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 3
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "Phrases"
        xmin = 0
        xmax = 3
        intervals: size = 3
        intervals [1]:
            xmin = 0
            xmax = 1
            text = ""
        intervals [2]:
            xmin = 1
            xmax = 2.5
            text = "pr"
        intervals [3]:
            xmin = 2.5
            xmax = 3
            text = ""
    item [2]:
        class = "IntervalTier"
        name = "Pitch"
        xmin = 0
        xmax = 3
        intervals: size = 1
        intervals [1]:
            xmin = 0
            xmax = 3
            text = "210"
"#;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_read_long_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "long.TextGrid", LONG.as_bytes());
        let timeline = read_textgrid(&path, &TierLayout::default()).unwrap();

        assert_eq!(timeline.xmin, 0.0);
        assert_eq!(timeline.xmax, 3.0);
        assert_eq!(timeline.tier_count(), 2);
        assert_eq!(timeline.tiers[0].name, "Phrases");
        assert_eq!(timeline.tiers[0].intervals[1], Interval::new(1.0, 2.5, "pr"));
        assert_eq!(timeline.tiers[0].intervals[0].label, "");
        assert_eq!(timeline.tiers[1].intervals[0].label, "210");
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "long.TextGrid", LONG.as_bytes());
        let timeline = read_textgrid(&source, &TierLayout::default()).unwrap();

        let path = dir.path().join("nested").join("out.TextGrid");
        write_textgrid(&timeline, &path).unwrap();
        let back = read_textgrid(&path, &TierLayout::default()).unwrap();

        assert_eq!(back, timeline);
    }

    #[test]
    fn test_tier_bounds_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.TextGrid");
        let timeline = Timeline::new(
            0.0,
            4.0,
            vec![
                Tier::new(
                    "Phrases",
                    vec![Interval::new(0.0, 1.0, ""), Interval::new(1.0, 4.0, "")],
                ),
                Tier::with_bounds(
                    "Japanese",
                    0.5,
                    3.5,
                    vec![Interval::new(0.5, 2.0, "jp"), Interval::new(2.0, 3.5, "")],
                ),
            ],
            TierLayout::default(),
        );

        write_textgrid(&timeline, &path).unwrap();
        let back = read_textgrid(&path, &TierLayout::default()).unwrap();

        assert_eq!(back.tiers[1].xmin, 0.5);
        assert_eq!(back.tiers[1].xmax, 3.5);
        assert_eq!(back.tiers[0].xmax, 4.0);
        assert_eq!(back, timeline);
    }

    #[test]
    fn test_rejects_point_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let text = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 3
tiers? <exists>
size = 1
item []:
    item [1]:
        class = "TextTier"
        name = "events"
        xmin = 0
        xmax = 3
        points: size = 1
        points [1]:
            number = 1.5
            mark = "click"
"#;
        let path = write(dir.path(), "points.TextGrid", text.as_bytes());

        let err = read_textgrid(&path, &TierLayout::default()).unwrap_err();
        assert!(matches!(err, FluencyError::PointTier(ref name) if name == "events"));
    }

    #[test]
    fn test_not_a_textgrid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.TextGrid", b"just some notes\n");

        let err = read_textgrid(&path, &TierLayout::default()).unwrap_err();
        assert!(matches!(err, FluencyError::TextGrid { .. }));
        assert!(err.to_string().contains("notes.TextGrid"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_textgrid(Path::new("/nonexistent/a.TextGrid"), &TierLayout::default())
            .unwrap_err();
        assert!(matches!(err, FluencyError::Io { .. }));
    }

    #[test]
    fn test_reads_utf16le_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in LONG.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let utf16 = write(dir.path(), "utf16.TextGrid", &bytes);
        let utf8 = write(dir.path(), "utf8.TextGrid", LONG.as_bytes());

        let layout = TierLayout::default();
        assert_eq!(
            read_textgrid(&utf16, &layout).unwrap(),
            read_textgrid(&utf8, &layout).unwrap()
        );
    }

    #[test]
    fn test_transcode_leaves_plain_utf8_alone() {
        assert_eq!(transcode(b"File type").unwrap(), None);
        assert_eq!(
            transcode(&[0xEF, 0xBB, 0xBF, b'o', b'k']).unwrap(),
            Some("ok".to_string())
        );
        assert!(transcode(&[0xFF, 0xFE, 0x00, 0xD8]).is_err());
    }
}
