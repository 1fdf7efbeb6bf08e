//! Sales CSV loading.
//!
//! Turns a CSV file into a [`SalesDataset`]. Loading is strict: a missing
//! required column, an unparseable date or a bad value aborts the load with
//! [`InsightError::MalformedDataset`] naming the offending line.

use crate::error::{InsightError, Result};
use crate::models::{KeyColumns, SalesDataset, SalesRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Column names and date formats used while loading.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub date_column: String,
    pub product_column: String,
    pub value_column: String,
    pub date_formats: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self::from(&crate::config::DatasetConfig::default())
    }
}

impl From<&crate::config::DatasetConfig> for LoadConfig {
    fn from(config: &crate::config::DatasetConfig) -> Self {
        Self {
            date_column: config.date_column.clone(),
            product_column: config.product_column.clone(),
            value_column: config.value_column.clone(),
            date_formats: config.date_formats.clone(),
        }
    }
}

/// Positions of the required columns in the header row.
struct ColumnIndex {
    date: usize,
    product: usize,
    value: usize,
}

/// Load a dataset from a CSV file.
pub fn load_dataset(path: &Path, config: &LoadConfig) -> Result<SalesDataset> {
    let file = File::open(path).map_err(|e| {
        InsightError::MalformedDataset(format!("cannot open {}: {}", path.display(), e))
    })?;

    let dataset = load_from_reader(file, config)?;
    info!(
        "Loaded {} sales records from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Load a dataset from any CSV source.
pub fn load_from_reader<R: Read>(reader: R, config: &LoadConfig) -> Result<SalesDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| InsightError::MalformedDataset(format!("cannot read header row: {}", e)))?
        .clone();

    let index = resolve_columns(&headers, config)?;
    let columns: Vec<String> = headers.iter().map(String::from).collect();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, lines are 1-based
        let line = idx + 2;
        let row = result
            .map_err(|e| InsightError::MalformedDataset(format!("line {}: {}", line, e)))?;
        records.push(parse_row(&row, &headers, &index, config, line)?);
    }

    if records.is_empty() {
        return Err(InsightError::MalformedDataset(
            "dataset has no rows".to_string(),
        ));
    }

    let key_columns = KeyColumns {
        date: columns[index.date].clone(),
        product: columns[index.product].clone(),
        value: columns[index.value].clone(),
    };

    debug!("Parsed {} rows with columns {:?}", records.len(), columns);
    Ok(SalesDataset::new(columns, records).with_key_columns(key_columns))
}

fn resolve_columns(headers: &StringRecord, config: &LoadConfig) -> Result<ColumnIndex> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                InsightError::MalformedDataset(format!(
                    "missing required column '{}' (found: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
    };

    Ok(ColumnIndex {
        date: find(config.date_column.as_str())?,
        product: find(config.product_column.as_str())?,
        value: find(config.value_column.as_str())?,
    })
}

fn parse_row(
    row: &StringRecord,
    headers: &StringRecord,
    index: &ColumnIndex,
    config: &LoadConfig,
    line: usize,
) -> Result<SalesRecord> {
    let field = |i: usize| row.get(i).unwrap_or("");

    let date = parse_date(field(index.date), &config.date_formats).ok_or_else(|| {
        InsightError::MalformedDataset(format!(
            "line {}: unparseable date '{}'",
            line,
            field(index.date)
        ))
    })?;

    let value = parse_value(field(index.value)).ok_or_else(|| {
        InsightError::MalformedDataset(format!(
            "line {}: invalid value '{}'",
            line,
            field(index.value)
        ))
    })?;
    if value < 0.0 {
        return Err(InsightError::MalformedDataset(format!(
            "line {}: negative value {}",
            line, value
        )));
    }

    let product = field(index.product);
    if product.is_empty() {
        return Err(InsightError::MalformedDataset(format!(
            "line {}: empty product identifier",
            line
        )));
    }

    let extra: BTreeMap<String, String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index.date && *i != index.product && *i != index.value)
        .map(|(i, name)| (name.to_string(), field(i).to_string()))
        .collect();

    let mut record = SalesRecord::new(date, product, value);
    record.extra = extra;
    Ok(record)
}

/// Parse a date using the configured formats, then RFC 3339.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Symbols accepted in front of a value.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '¢'];

/// Parse a monetary cell such as `1,234.50`, `$ 99` or `R$ 12.5`.
///
/// Only an optional currency prefix and `,` thousands separators are
/// stripped. Whatever remains must parse as a finite `f64`.
pub fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let start = raw.find(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))?;
    let (prefix, number) = raw.split_at(start);
    if !is_currency_prefix(prefix.trim()) {
        return None;
    }

    strip_thousands(number.trim())?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// A symbol with up to two code letters (`$`, `R$`, `US$`) or a bare
/// three-letter code (`USD`).
fn is_currency_prefix(prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }

    let code = prefix.trim_end_matches(CURRENCY_SYMBOLS);
    if !code.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }

    let has_symbol = code.len() < prefix.len();
    if has_symbol {
        code.len() <= 2
    } else {
        code.len() == 3
    }
}

/// Remove `,` separators, which must group the integer part by thousands.
fn strip_thousands(number: &str) -> Option<String> {
    if !number.contains(',') {
        return Some(number.to_string());
    }

    let (integer, fraction) = match number.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (number, None),
    };
    if matches!(fraction, Some(f) if f.contains(',')) {
        return None;
    }

    let mut groups = integer.trim_start_matches(|c| c == '-' || c == '+').split(',');
    let leading = groups.next()?;
    if !(1..=3).contains(&leading.len()) || !groups.all(|g| g.len() == 3) {
        return None;
    }

    Some(number.replace(',', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;
    use std::io::Write;

    fn load(csv_text: &str) -> Result<SalesDataset> {
        load_from_reader(csv_text.as_bytes(), &LoadConfig::default())
    }

    #[test]
    fn test_load_basic_csv() {
        let dataset = load(
            "date,product,value,region\n\
             2024-01-15,Model A,1000.50,North\n\
             2024-02-01,Model B,\"2,000\",South\n",
        )
        .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns, vec!["date", "product", "value", "region"]);
        let first = &dataset.records[0];
        assert_eq!(first.product, "Model A");
        assert_eq!(first.value, 1000.50);
        assert_eq!(first.year_month, YearMonth::new(2024, 1));
        assert_eq!(first.extra.get("region").map(String::as_str), Some("North"));
        assert_eq!(dataset.records[1].value, 2000.0);
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let dataset = load("Date,PRODUCT,Value\n2024-01-01,A,1\n").unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_key_columns_use_source_headers() {
        let config = LoadConfig {
            date_column: "data".to_string(),
            product_column: "modelo".to_string(),
            value_column: "valor".to_string(),
            ..LoadConfig::default()
        };
        let dataset =
            load_from_reader("Modelo,Data,Valor
X1,2024-01-01,3
".as_bytes(), &config).unwrap();
        assert_eq!(dataset.key_columns.date, "Data");
        assert_eq!(dataset.key_columns.product, "Modelo");
        assert_eq!(dataset.key_columns.value, "Valor");
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let err = load("date,model,value\n2024-01-01,A,1\n").unwrap_err();
        assert!(matches!(err, InsightError::MalformedDataset(_)));
        assert!(err.to_string().contains("'product'"));
    }

    #[test]
    fn test_bad_date_reports_line() {
        let err = load("date,product,value\n2024-01-01,A,1\nnot-a-date,B,2\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_negative_value_rejected() {
        let err = load("date,product,value\n2024-01-01,A,-5\n").unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert!(load("date,product,value\n").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let formats = LoadConfig::default().date_formats;
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09", &formats), Some(expected));
        assert_eq!(parse_date("09/03/2024", &formats), Some(expected));
        assert_eq!(parse_date("2024-03-09 13:45:00", &formats), Some(expected));
        assert_eq!(parse_date("2024-03-09T10:00:00Z", &formats), Some(expected));
        assert_eq!(parse_date("", &formats), None);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1,234.50"), Some(1234.5));
        assert_eq!(parse_value("1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_value("$ 99"), Some(99.0));
        assert_eq!(parse_value("R$ 12.5"), Some(12.5));
        assert_eq!(parse_value("USD 40"), Some(40.0));
        assert_eq!(parse_value("1e3"), Some(1000.0));
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn test_parse_value_rejects_junk() {
        assert_eq!(parse_value("12abc34"), None);
        assert_eq!(parse_value("N/A 5"), None);
        assert_eq!(parse_value("1.500,00"), None);
        assert_eq!(parse_value("12,34"), None);
        assert_eq!(parse_value("5 units"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("-inf"), None);
    }

    #[test]
    fn test_junk_value_is_malformed() {
        let err = load("date,product,value\n2024-01-01,A,12abc34\n").unwrap_err();
        assert!(matches!(err, InsightError::MalformedDataset(_)));
        assert!(err.to_string().contains("line 2"));

        let dataset = load("date,product,value\n2024-01-01,A,1e3\n").unwrap();
        assert_eq!(dataset.records[0].value, 1000.0);
    }

    #[test]
    fn test_load_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,product,value").unwrap();
        writeln!(file, "2024-05-01,Z,10").unwrap();

        let dataset = load_dataset(file.path(), &LoadConfig::default()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let err = load_dataset(Path::new("/no/such/file.csv"), &LoadConfig::default())
            .unwrap_err();
        assert!(matches!(err, InsightError::MalformedDataset(_)));
    }
}
