//! Instrument directory: which codes to scan, with display names and the
//! sector/segment attributes used for filtering.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed directory file: {0}")]
    Csv(#[from] csv::Error),
}

/// One listed equity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub segment: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            sector: String::new(),
            segment: String::new(),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = segment.into();
        self
    }
}

/// Sector and segment restrictions.
///
/// An empty list places no restriction on that attribute. Values within one
/// list are alternatives; both lists must match when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentFilter {
    pub sectors: Vec<String>,
    pub segments: Vec<String>,
}

impl InstrumentFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.sectors.is_empty() && self.segments.is_empty()
    }

    pub fn matches(&self, instrument: &Instrument) -> bool {
        let allowed = |list: &[String], value: &str| list.is_empty() || list.iter().any(|v| v == value);
        allowed(&self.sectors, &instrument.sector) && allowed(&self.segments, &instrument.segment)
    }
}

/// Source of instruments and of the distinct filter values.
pub trait InstrumentDirectory: Send + Sync {
    /// All instruments passing `filter`, in directory order.
    fn instruments(&self, filter: &InstrumentFilter) -> Vec<Instrument>;

    /// Distinct non-empty sectors, sorted.
    fn sectors(&self) -> Vec<String>;

    /// Distinct non-empty segments, sorted.
    fn segments(&self) -> Vec<String>;
}

/// In-memory directory backed by a `code,name,sector,segment` CSV file.
#[derive(Debug, Clone, Default)]
pub struct CsvDirectory {
    instruments: Vec<Instrument>,
}

impl CsvDirectory {
    pub fn from_instruments(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), count = dir.len(), "loaded instrument directory");
        Ok(dir)
    }

    /// Parse rows from any reader. Blank codes are skipped, and a leading
    /// byte-order mark on the header row is tolerated.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectoryError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: csv::StringRecord = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();
        rdr.set_headers(headers);

        let mut instruments = Vec::new();
        for row in rdr.deserialize::<Instrument>() {
            let instrument = row?;
            if !instrument.code.is_empty() {
                instruments.push(instrument);
            }
        }
        Ok(Self { instruments })
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    fn distinct(&self, field: impl Fn(&Instrument) -> &str) -> Vec<String> {
        self.instruments
            .iter()
            .map(field)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl InstrumentDirectory for CsvDirectory {
    fn instruments(&self, filter: &InstrumentFilter) -> Vec<Instrument> {
        self.instruments.iter().filter(|i| filter.matches(i)).cloned().collect()
    }

    fn sectors(&self) -> Vec<String> {
        self.distinct(|i| i.sector.as_str())
    }

    fn segments(&self) -> Vec<String> {
        self.distinct(|i| i.segment.as_str())
    }
}

/// Append the exchange suffix to a bare code (`7203` → `7203.T`).
pub fn to_symbol(code: &str, suffix: &str) -> String {
    if suffix.is_empty() || code.ends_with(suffix) {
        code.to_string()
    } else {
        format!("{code}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}Code,Name,Sector,Segment\n\
        7203,Toyota Motor,Transportation Equipment,Prime\n\
        6758,Sony Group,Electric Appliances,Prime\n\
        4385,Mercari,Information & Communication,Growth\n\
        7267,Honda Motor,Transportation Equipment,Prime\n\
        ,Nameless,,\n";

    fn sample() -> CsvDirectory {
        CsvDirectory::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_skips_blank_codes() {
        let dir = sample();
        assert_eq!(dir.len(), 4);
    }

    #[test]
    fn test_filter_or_within_and_across() {
        let dir = sample();
        let filter = InstrumentFilter {
            sectors: vec!["Transportation Equipment".into(), "Information & Communication".into()],
            segments: vec!["Prime".into()],
        };
        let codes: Vec<_> = dir.instruments(&filter).into_iter().map(|i| i.code).collect();
        assert_eq!(codes, vec!["7203", "7267"]);
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let dir = sample();
        assert!(InstrumentFilter::default().is_unrestricted());
        assert_eq!(dir.instruments(&InstrumentFilter::default()).len(), 4);
    }

    #[test]
    fn test_distinct_values_sorted() {
        let dir = sample();
        assert_eq!(dir.segments(), vec!["Growth", "Prime"]);
        assert_eq!(dir.sectors().len(), 3);
        assert_eq!(dir.sectors()[0], "Electric Appliances");
    }

    #[test]
    fn test_symbol_suffix() {
        assert_eq!(to_symbol("7203", ".T"), "7203.T");
        assert_eq!(to_symbol("7203.T", ".T"), "7203.T");
        assert_eq!(to_symbol("AAPL", ""), "AAPL");
    }
}
