//! Electrode name → channel index lookup.
//!
//! The table file has a header row of electrode names and a single data row
//! with the matching channel indices:
//!
//! ```text
//! A1,A2,A3,...,D32
//! 0,1,2,...,127
//! ```
//!
//! The BioSemi 128 table ships with the crate, so no path is needed for the
//! common case; [`ElectrodeTable::from_path`] loads any other table.
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default table file name, kept for error messages and CLI help.
pub const DEFAULT_TABLE_NAME: &str = "biosemi_electrodes_names.txt";

const BIOSEMI_TABLE: &str = include_str!("../resources/biosemi_electrodes_names.txt");

/// Ordered mapping from electrode names to channel indices.
#[derive(Debug, Clone)]
pub struct ElectrodeTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ElectrodeTable {
    /// The built-in BioSemi 128 table (`A1..D32 → 0..127`).
    pub fn biosemi() -> Result<Self> {
        Self::parse(BIOSEMI_TABLE.as_bytes(), Path::new(DEFAULT_TABLE_NAME))
    }

    /// Load a comma-separated table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Self::parse(file, path)
    }

    fn parse<R: Read>(reader: R, path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let record = rdr
            .records()
            .next()
            .ok_or_else(|| parse_error(path, 2, "missing index row".into()))??;

        if record.len() != names.len() {
            return Err(parse_error(
                path,
                2,
                format!("{} names but {} indices", names.len(), record.len()),
            ));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (name, field) in names.iter().zip(record.iter()) {
            let idx: usize = field
                .parse()
                .map_err(|_| parse_error(path, 2, format!("invalid index {field:?} for {name}")))?;
            index.insert(name.clone(), idx);
        }
        Ok(Self { names, index })
    }

    /// Electrode names in table order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Translate `names` into channel indices, preserving request order.
    ///
    /// Fails with [`Error::UnknownElectrode`] on the first name that is not in
    /// the table.
    pub fn resolve_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                let n = n.as_ref();
                self.index
                    .get(n)
                    .copied()
                    .ok_or_else(|| Error::UnknownElectrode(n.to_string()))
            })
            .collect()
    }
}

/// Resolve names against the built-in BioSemi table.
pub fn resolve_biosemi_indices<S: AsRef<str>>(names: &[S]) -> Result<Vec<usize>> {
    ElectrodeTable::biosemi()?.resolve_indices(names)
}

fn parse_error(path: &Path, line: usize, reason: String) -> Error {
    Error::Parse { path: PathBuf::from(path), line, reason }
}
