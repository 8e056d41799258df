//! Schema descriptors handed over by database and file connectors.
//!
//! Connectors describe either relational tables (`tables` / `columns`) or
//! document collections (`collections` / `fields`). A column entry may be a
//! bare name or an object with a `name` and an optional declared `type`; both
//! shapes deserialize into [`ColumnDescriptor`].

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{clean::ColumnKind, data::Row};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnEntry")]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(rename = "type", default)]
        declared_type: Option<String>,
    },
}

impl From<ColumnEntry> for ColumnDescriptor {
    fn from(entry: ColumnEntry) -> Self {
        match entry {
            ColumnEntry::Name(name) => ColumnDescriptor {
                name,
                declared_type: None,
            },
            ColumnEntry::Detailed {
                name,
                declared_type,
            } => ColumnDescriptor {
                name,
                declared_type,
            },
        }
    }
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
        }
    }

    pub fn declared_kind(&self) -> Option<ColumnKind> {
        self.declared_type
            .as_deref()
            .map(ColumnKind::from_declared)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(alias = "collection")]
    pub name: String,
    #[serde(alias = "fields", default)]
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(alias = "collections", default)]
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn single_table<I, S>(name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema {
            tables: vec![Table {
                name: name.to_string(),
                columns: columns.into_iter().map(ColumnDescriptor::new).collect(),
            }],
        }
    }

    /// Derives a one-table schema from the keys seen across `rows`.
    pub fn from_rows(name: &str, rows: &[Row]) -> Self {
        let columns = rows
            .iter()
            .flat_map(|row| row.columns())
            .unique()
            .map(str::to_string)
            .collect::<Vec<_>>();
        Schema::single_table(name, columns)
    }

    /// Column names across every table, first declaration wins.
    pub fn flat_columns(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(|table| table.columns.iter())
            .map(|column| column.name.clone())
            .unique()
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.tables
            .iter()
            .flat_map(|table| table.columns.iter())
            .find(|column| column.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|table| table.columns.is_empty())
    }
}
