use crate::core::{CsvTable, RawRow};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::validate_csv_char;
use std::collections::HashSet;

pub const DEFAULT_DELIMITER: char = ';';
pub const DEFAULT_QUOTE_CHAR: char = '"';

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
}

impl CsvOptions {
    pub fn new(delimiter: char, quote: char) -> Result<Self> {
        Self::from_strs(&delimiter.to_string(), &quote.to_string())
    }

    pub fn from_strs(delimiter: &str, quote: &str) -> Result<Self> {
        let delimiter_byte = validate_csv_char("csv.delimiter", delimiter)?;
        let quote_byte = validate_csv_char("csv.quote_char", quote)?;

        if delimiter_byte == quote_byte {
            return Err(ImportError::InvalidConfigValueError {
                field: "csv.quote_char".to_string(),
                value: quote.to_string(),
                reason: "Quote character must differ from the delimiter".to_string(),
            });
        }

        Ok(Self {
            delimiter: delimiter_byte,
            quote: quote_byte,
        })
    }
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER as u8,
            quote: DEFAULT_QUOTE_CHAR as u8,
        }
    }
}

/// 將 CSV 原始內容切成表頭與資料列，不理會欄位語意
pub fn tokenize(bytes: &[u8], options: &CsvOptions) -> Result<CsvTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ImportError::parse("CSV file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::parse(format!("Could not read header row: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::parse("Could not determine CSV headers"));
    }

    if let Some(position) = headers.iter().position(|h| h.is_empty()) {
        return Err(ImportError::parse(format!(
            "Header in column {} is empty",
            position + 1
        )));
    }

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(ImportError::parse(format!("Duplicate header '{}'", header)));
        }
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ImportError::parse(format!("Invalid CSV data: {}", e)))?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);

        let row = RawRow {
            line,
            cells: headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
                .collect(),
        };

        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    tracing::debug!(
        "Tokenized CSV: {} column(s), {} row(s)",
        headers.len(),
        rows.len()
    );

    Ok(CsvTable { headers, rows })
}
