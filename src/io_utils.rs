//! File loading for the command-line wrapper.
//!
//! The library itself performs no I/O. Datasets arrive as CSV (every cell read
//! as text, the cleaner infers types later) or as a JSON array of objects;
//! schemas and engine options arrive as JSON or YAML. The `-` path reads CSV
//! from stdin.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    config::EngineOptions,
    data::{Row, Value},
    schema::Schema,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected))
}

fn is_yaml(path: &Path) -> bool {
    has_extension(path, "yaml") || has_extension(path, "yml")
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or(if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

/// Reads every record as a [`Row`] of text cells keyed by header.
pub fn read_csv_rows<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Row>> {
    let mut csv_reader = open_csv_reader(reader, delimiter);
    let headers = csv_reader
        .headers()
        .context("Reading CSV headers")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading CSV record {}", idx + 1))?;
        let mut row = Row::with_capacity(headers.len());
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), Value::Text(cell.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn load_dataset(path: &Path, delimiter: Option<u8>) -> Result<Vec<Row>> {
    let rows = if has_extension(path, "json") {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Reading dataset {path:?}"))?;
        serde_json::from_str::<Vec<Row>>(&contents)
            .with_context(|| format!("Parsing JSON dataset {path:?}"))?
    } else if is_dash(path) {
        read_csv_rows(std::io::stdin().lock(), resolve_input_delimiter(path, delimiter))
            .context("Reading CSV from stdin")?
    } else {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        read_csv_rows(BufReader::new(file), resolve_input_delimiter(path, delimiter))
            .with_context(|| format!("Reading CSV dataset {path:?}"))?
    };
    debug!("Loaded {} row(s) from {path:?}", rows.len());
    Ok(rows)
}

pub fn load_schema(path: &Path) -> Result<Schema> {
    let contents = fs::read_to_string(path).with_context(|| format!("Reading schema {path:?}"))?;
    if is_yaml(path) {
        serde_yaml::from_str(&contents).with_context(|| format!("Parsing YAML schema {path:?}"))
    } else {
        serde_json::from_str(&contents).with_context(|| format!("Parsing JSON schema {path:?}"))
    }
}

/// Loads and validates engine options; no path yields the defaults.
pub fn load_options(path: Option<&Path>) -> Result<EngineOptions> {
    let options = match path {
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("Reading config {path:?}"))?;
            EngineOptions::from_yaml_str(&contents)
                .with_context(|| format!("Parsing config {path:?}"))?
        }
        None => EngineOptions::default(),
    };
    options.validate()?;
    Ok(options)
}

/// Table name used when a schema is derived from a dataset file.
pub fn table_name(path: &Path) -> String {
    if is_dash(path) {
        return "stdin".to_string();
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("data")
        .to_string()
}
