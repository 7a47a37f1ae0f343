use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::info;

use crate::db::Database;
use crate::models::{NewWeightEntry, validate_weight};

/// A single row parsed from a weight CSV.
#[derive(Debug, Clone)]
pub struct WeightRow {
    pub date: NaiveDate,
    pub weight_lbs: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WeightImportSummary {
    pub rows_parsed: usize,
    pub imported: usize,
    pub dates_spanned: usize,
}

/// Parse a weight log CSV from any reader.
///
/// Expected header: `Date,Weight[,Notes]`, matched case-insensitively.
/// Weights are pounds. Rows with an empty date are skipped.
pub fn parse_weight_csv<R: Read>(reader: R) -> Result<Vec<WeightRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing required column: Date")?;
    let idx_weight = col("Weight").context("Missing required column: Weight")?;
    let idx_notes = col("Notes");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let raw_date = record.get(idx_date).unwrap_or("").trim();
        if raw_date.is_empty() {
            continue;
        }
        let date = normalize_date(raw_date).with_context(|| format!("Row {line}"))?;

        let raw_weight = record.get(idx_weight).unwrap_or("").trim();
        let weight_lbs: f64 = raw_weight
            .parse()
            .with_context(|| format!("Row {line}: invalid weight '{raw_weight}'"))?;
        validate_weight(weight_lbs).with_context(|| format!("Row {line}"))?;

        let notes = idx_notes
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        rows.push(WeightRow {
            date,
            weight_lbs,
            notes,
        });
    }

    Ok(rows)
}

/// Accepts `YYYY-MM-DD`, then `M/D/YYYY`, then `D/M/YYYY`.
fn normalize_date(raw: &str) -> Result<NaiveDate> {
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Ok(d);
        }
    }
    bail!("Cannot parse date: '{raw}'")
}

/// Upsert parsed rows for `username`. A later row for the same date
/// replaces an earlier one. When `dry_run` is true, nothing is written.
pub fn import_weights(
    db: &Database,
    username: &str,
    rows: &[WeightRow],
    dry_run: bool,
) -> Result<WeightImportSummary> {
    let mut imported = 0;
    let mut dates: HashSet<NaiveDate> = HashSet::new();

    for row in rows {
        dates.insert(row.date);
        if !dry_run {
            db.upsert_weight(&NewWeightEntry {
                username: username.to_string(),
                date: row.date,
                weight_lbs: row.weight_lbs,
                notes: row.notes.clone(),
            })?;
        }
        imported += 1;
    }

    if !dry_run {
        info!(username, imported, dates = dates.len(), "imported weight entries");
    }

    Ok(WeightImportSummary {
        rows_parsed: rows.len(),
        imported,
        dates_spanned: dates.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE_CSV: &str = "\
Date,Weight,Notes
2024-06-01,165.2,start
2024-06-02,164.8,
6/3/2024,164.0,after long run
2024-06-03,163.6,re-weighed
";

    #[test]
    fn test_parse_weight_csv_basic() {
        let rows = parse_weight_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!((rows[0].weight_lbs - 165.2).abs() < f64::EPSILON);
        assert_eq!(rows[0].notes.as_deref(), Some("start"));
        assert!(rows[1].notes.is_none());
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    }

    #[test]
    fn test_parse_headers_case_insensitive_without_notes() {
        let csv = "date,WEIGHT\n2024-06-01,170\n";
        let rows = parse_weight_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].notes.is_none());
    }

    #[test]
    fn test_parse_missing_weight_column() {
        let err = parse_weight_csv("Date,Notes\n2024-06-01,x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Weight"));
    }

    #[test]
    fn test_parse_skips_blank_rows() {
        let csv = "Date,Weight\n2024-06-01,170\n,\n2024-06-02,169\n";
        assert_eq!(parse_weight_csv(csv.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_weight_csv("Date,Weight\n2024-06-01,0\n".as_bytes()).is_err());
        assert!(parse_weight_csv("Date,Weight\n2024-06-01,heavy\n".as_bytes()).is_err());
        assert!(parse_weight_csv("Date,Weight\nyesterday,170\n".as_bytes()).is_err());
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_weight_csv(SAMPLE_CSV.as_bytes()).unwrap();

        let summary = import_weights(&db, "alex", &rows, true).unwrap();
        assert_eq!(summary.rows_parsed, 4);
        assert_eq!(summary.imported, 4);
        assert_eq!(summary.dates_spanned, 3);
        assert!(db.get_weight_history("alex", None).unwrap().is_empty());
    }

    #[test]
    fn test_import_from_file_last_row_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let db = Database::open_in_memory().unwrap();
        let rows = parse_weight_csv(std::fs::File::open(file.path()).unwrap()).unwrap();
        let summary = import_weights(&db, "alex", &rows, false).unwrap();
        assert_eq!(summary.dates_spanned, 3);

        let history = db.get_weight_history("alex", None).unwrap();
        assert_eq!(history.len(), 3);
        assert!((history[0].weight_lbs - 163.6).abs() < f64::EPSILON);
        assert_eq!(history[0].notes.as_deref(), Some("re-weighed"));
        assert!(db.get_weight_history("sam", None).unwrap().is_empty());
    }
}
