use std::fs::File;
use std::path::Path;

use anyhow::Context as _;

use crate::model::StudentRecord;

pub const DEFAULT_NAME_COLUMN: &str = "User Name";
pub const DEFAULT_PROFILE_URL_COLUMN: &str = "Google Cloud Skills Boost Profile URL";

/// Header labels identifying the roster columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterColumns {
    pub name: String,
    pub profile_url: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME_COLUMN.to_string(),
            profile_url: DEFAULT_PROFILE_URL_COLUMN.to_string(),
        }
    }
}

/// Lazily yields roster rows in file order.
pub struct RosterReader {
    records: csv::StringRecordsIntoIter<File>,
    name_idx: usize,
    url_idx: usize,
    line: u64,
}

/// Opens the roster and checks its header row.
///
/// A missing column is a configuration error for the whole roster, never a
/// per-row skip.
pub fn read_roster(path: &Path, columns: &RosterColumns) -> anyhow::Result<RosterReader> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open roster: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read roster header: {}", path.display()))?
        .clone();
    let find = |label: &str| -> anyhow::Result<usize> {
        headers.iter().position(|h| h == label).ok_or_else(|| {
            anyhow::anyhow!(
                "roster {} has no {label:?} column (found: {})",
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", ")
            )
        })
    };
    let name_idx = find(&columns.name)?;
    let url_idx = find(&columns.profile_url)?;

    Ok(RosterReader {
        records: reader.into_records(),
        name_idx,
        url_idx,
        line: 1,
    })
}

impl Iterator for RosterReader {
    type Item = anyhow::Result<StudentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.line += 1;

        let line = self.line;
        let record = match record.with_context(|| format!("read roster row at line {line}")) {
            Ok(record) => record,
            Err(err) => return Some(Err(err)),
        };

        let field = |idx: usize| record.get(idx).unwrap_or_default().to_owned();
        Some(Ok(StudentRecord {
            name: field(self.name_idx),
            profile_url: field(self.url_idx),
        }))
    }
}
