//! Flat result rows and CSV output.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::scan::ScanResult;

/// Separator between labels in one CSV cell
pub const LABEL_SEPARATOR: &str = "; ";
/// Cell value when no label triggered
pub const NO_LABELS: &str = "-";

/// One scan result as a flat, serializable row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub code: String,
    pub name: String,
    pub total_score: f64,
    pub shape_detected: bool,
    pub shape_score: f64,
    pub technical_score: u32,
    pub technical_signals: String,
    pub pattern_score: u32,
    pub pattern_signals: String,
}

pub fn join_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        NO_LABELS.to_string()
    } else {
        labels.join(LABEL_SEPARATOR)
    }
}

impl From<&ScanResult> for ScanRecord {
    fn from(r: &ScanResult) -> Self {
        let b = &r.breakdown;
        Self {
            code: r.code.clone(),
            name: r.name.clone(),
            total_score: b.total_score,
            shape_detected: b.shape_detected,
            shape_score: b.shape_score,
            technical_score: b.technical_score,
            technical_signals: join_labels(&b.technical_signals),
            pattern_score: b.pattern_score,
            pattern_signals: join_labels(&b.pattern_signals),
        }
    }
}

/// Write `records` as comma-separated UTF-8 with one header row.
///
/// With `bom` set, a UTF-8 byte-order mark is written first so spreadsheet
/// applications pick the right encoding. An empty slice still produces the
/// header.
pub fn write_csv<W: Write>(mut writer: W, records: &[ScanRecord], bom: bool) -> csv::Result<()> {
    if bom {
        writer.write_all(b"\xEF\xBB\xBF")?;
    }
    let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    out.write_record([
        "code",
        "name",
        "total_score",
        "shape_detected",
        "shape_score",
        "technical_score",
        "technical_signals",
        "pattern_score",
        "pattern_signals",
    ])?;
    for record in records {
        out.serialize(record)?;
    }
    out.flush()?;
    Ok(())
}
