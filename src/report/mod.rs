//! Reports projecting a built index to CSV and XML.
//!
//! Rendering is pure; the `write_*` functions only touch the filesystem on
//! the coordinating worker, so every rank of a partitioned run may call them.

mod csv;
mod xml;

pub use self::csv::render_csv;
pub use self::xml::render_xml;

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::accessor::Accessor;
use crate::error::Result;
use crate::index::{DatasetIndex, WorkerPartition};

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Time by variable location table.
    Csv,
    /// CDML-style dataset description.
    Xml,
}

impl ReportFormat {
    /// Pick a format from the output path: `.csv` means CSV, anything else XML.
    pub fn from_path(path: &Path) -> Self {
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            ReportFormat::Csv
        } else {
            ReportFormat::Xml
        }
    }

    /// Render a report in this format.
    pub fn render<A: Accessor>(self, index: &DatasetIndex<A>) -> Result<String> {
        match self {
            ReportFormat::Csv => render_csv(index),
            ReportFormat::Xml => render_xml(index),
        }
    }
}

/// Write a report, on the coordinator only.
pub fn write_report<A: Accessor>(
    index: &DatasetIndex<A>,
    format: ReportFormat,
    path: &Path,
    partition: &WorkerPartition,
) -> Result<()> {
    if !partition.is_coordinator() {
        debug!("Rank {} skips report {}", partition.rank(), path.display());
        return Ok(());
    }
    info!("Writing {:?} report to {}", format, path.display());
    fs::write(path, format.render(index)?)?;
    Ok(())
}

/// Write the CSV time/variable index.
pub fn write_csv<A: Accessor>(
    index: &DatasetIndex<A>,
    path: &Path,
    partition: &WorkerPartition,
) -> Result<()> {
    write_report(index, ReportFormat::Csv, path, partition)
}

/// Write the XML dataset description.
pub fn write_xml<A: Accessor>(
    index: &DatasetIndex<A>,
    path: &Path,
    partition: &WorkerPartition,
) -> Result<()> {
    write_report(index, ReportFormat::Xml, path, partition)
}

/// Format a value with at most `digits` significant digits, in the style of
/// C's `%g`: trailing zeros are dropped and very large or small magnitudes
/// switch to exponent notation.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let digits = digits.max(1);
    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .map(|(m, e)| (m.to_string(), e.parse::<i32>().unwrap_or(0)))
        .unwrap_or((scientific.clone(), 0));

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(&mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
