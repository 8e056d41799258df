#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use nl_analytics::{
    Value,
    data::Row,
    schema::Schema,
};
use tempfile::{TempDir, tempdir};

/// Product reviews spanning a year boundary, as a connector would export them.
pub const REVIEWS_CSV: &str = "\
id,product,category,rating,comment,created_at
1,Kettle,kitchen,5,Works great,2023-11-03
2,Toaster,kitchen,2,Broke after a week,2023-11-20
3,Lamp,home,4,Nice light,2023-12-05
4,Blender,kitchen,1,Terrible noise,2023-12-18
5,Rug,home,3,OK,2024-01-09
6,Mixer,kitchen,5,Love it,2024-01-22
7,Chair,home,4,Comfortable,2024-02-14
8,Kettle,kitchen,N/A,,2024-02-28
";

pub fn review_rows() -> Vec<Row> {
    let mut lines = REVIEWS_CSV.lines();
    let headers = lines
        .next()
        .map(|line| line.split(',').collect::<Vec<_>>())
        .unwrap_or_default();
    lines
        .map(|line| {
            Row::from_pairs(
                headers
                    .iter()
                    .zip(line.split(','))
                    .map(|(header, cell)| (header.to_string(), Value::from(cell))),
            )
        })
        .collect()
}

pub fn review_schema() -> Schema {
    Schema::single_table(
        "reviews",
        ["id", "product", "category", "rating", "comment", "created_at"],
    )
}

/// Builds rows holding a single numeric column.
pub fn numeric_rows(column: &str, values: &[f64]) -> Vec<Row> {
    values
        .iter()
        .map(|value| Row::from_pairs([(column, Value::Float(*value))]))
        .collect()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
