use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::models::{FileIdentity, FluencyMetrics, FluencyMeasures, ProsodyMeasures};

const IDENTITY_COLUMNS: [&str; 4] = ["filename", "ID", "RECN", "Date"];
const DUPLICATE_COLUMN: &str = "duplicate";

/// Data columns in table order (the trailing `duplicate` flag is not included)
pub fn data_columns() -> Vec<&'static str> {
    let template = FluencyMetrics::new(FluencyMeasures::default(), ProsodyMeasures::default());
    IDENTITY_COLUMNS
        .iter()
        .copied()
        .chain(template.columns().into_iter().map(|(name, _)| name))
        .collect()
}

/// One row of the aggregate table, already rendered to text
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    cells: Vec<String>,
}

impl TableRow {
    pub fn from_metrics(identity: &FileIdentity, metrics: &FluencyMetrics) -> Self {
        let mut cells = vec![
            identity.filename.clone(),
            identity.id.clone(),
            identity.recn.clone(),
            identity.date.clone(),
        ];
        cells.extend(metrics.columns().into_iter().map(|(_, cell)| cell.to_string()));
        Self { cells }
    }

    pub fn filename(&self) -> &str {
        &self.cells[0]
    }

    pub fn id(&self) -> &str {
        &self.cells[1]
    }

    pub fn recn(&self) -> &str {
        &self.cells[2]
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// Accumulated metric rows, new and historical
#[derive(Debug, Clone, Default)]
pub struct MetricsTable {
    rows: Vec<TableRow>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append the rows of an existing table file. Columns are matched by
    /// header name; columns the file lacks are left empty.
    pub fn append_csv(&mut self, path: &Path) -> Result<usize> {
        let columns = data_columns();
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let positions: HashMap<&str, usize> =
            headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

        let mut appended = 0;
        for record in reader.records() {
            let record = record?;
            let cells = columns
                .iter()
                .map(|column| {
                    positions
                        .get(column)
                        .and_then(|&i| record.get(i))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            self.rows.push(TableRow { cells });
            appended += 1;
        }

        Ok(appended)
    }

    /// Stable sort by (ID, RECN) ascending
    pub fn sort(&mut self) {
        self.rows
            .sort_by(|a, b| (a.id(), a.recn()).cmp(&(b.id(), b.recn())));
    }

    /// `true` for every row sharing its (ID, RECN) with another row
    pub fn duplicate_flags(&self) -> Vec<bool> {
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for row in &self.rows {
            *counts.entry((row.id(), row.recn())).or_default() += 1;
        }
        self.rows
            .iter()
            .map(|row| counts[&(row.id(), row.recn())] > 1)
            .collect()
    }

    /// Write the table with the fixed column order and the `duplicate` flag
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = data_columns();
        header.push(DUPLICATE_COLUMN);
        writer.write_record(&header)?;

        for (row, duplicate) in self.rows.iter().zip(self.duplicate_flags()) {
            let flag = if duplicate { "1" } else { "0" };
            writer.write_record(row.cells.iter().map(String::as_str).chain([flag]))?;
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(filename: &str) -> TableRow {
        let metrics = FluencyMetrics::new(
            FluencyMeasures {
                nsyll: 2,
                phonation_rate: 75.0,
                ..Default::default()
            },
            ProsodyMeasures::default(),
        );
        TableRow::from_metrics(&FileIdentity::from_filename(filename), &metrics)
    }

    #[test]
    fn test_data_columns_order() {
        let columns = data_columns();
        assert_eq!(&columns[..5], &["filename", "ID", "RECN", "Date", "nsyll"]);
        assert_eq!(columns.last(), Some(&"IntRangeAv"));
    }

    #[test]
    fn test_sort_and_duplicates() {
        let mut table = MetricsTable::new();
        table.push(row("002001010123.TextGrid"));
        table.push(row("001002010123.TextGrid"));
        table.push(row("001001010123.TextGrid"));
        table.push(row("001002020223.TextGrid"));
        table.sort();

        let keys: Vec<_> = table.rows().iter().map(|r| (r.id(), r.recn())).collect();
        assert_eq!(
            keys,
            vec![("001", "001"), ("001", "002"), ("001", "002"), ("002", "001")]
        );
        assert_eq!(table.duplicate_flags(), vec![false, true, true, false]);
        // stable: insertion order kept for equal keys
        assert_eq!(table.rows()[1].filename(), "001002010123.TextGrid");
    }

    #[test]
    fn test_write_then_merge_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.csv");

        let mut first = MetricsTable::new();
        first.push(row("001001010123.TextGrid"));
        first.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("filename,ID,RECN,Date,nsyll"));
        assert!(header.ends_with("IntRangeAv,duplicate"));
        assert!(content.contains("75.00"));

        let mut second = MetricsTable::new();
        second.push(row("001001020223.TextGrid"));
        assert_eq!(second.append_csv(&path).unwrap(), 1);
        second.sort();
        assert_eq!(second.len(), 2);
        assert_eq!(second.duplicate_flags(), vec![true, true]);
        assert_eq!(second.rows()[1].cells()[4], "2");
    }
}
