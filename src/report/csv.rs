//! Time by variable location table.

use std::iter;

use csv::Writer;

use crate::accessor::Accessor;
use crate::catalog::{TimeSlot, VariableDescriptor};
use crate::error::{CurateError, Result};
use crate::index::DatasetIndex;

/// Render the CSV index.
///
/// The header row lists the variables; the `NONE` row marks time-invariant
/// variables with `X`; every following row holds one global time and the
/// `file:local` location of each variable at that time. A table of file
/// indices closes the report, after one blank line.
pub fn render_csv<A: Accessor>(index: &DatasetIndex<A>) -> Result<String> {
    let variables: Vec<&VariableDescriptor> = index.variables().iter().collect();

    let mut table = Writer::from_writer(Vec::new());
    table.write_record(iter::once("time").chain(variables.iter().map(|v| v.name())))?;
    table.write_record(
        iter::once("NONE").chain(
            variables
                .iter()
                .map(|v| if v.has_record_dim() { "" } else { "X" }),
        ),
    )?;

    for (t, time) in index.time_axis().times().iter().enumerate() {
        let locations = variables.iter().map(|v| {
            v.location(TimeSlot::At(t))
                .map(|l| format!("{}:{}", l.file, l.local))
                .unwrap_or_default()
        });
        table.write_record(iter::once(time.to_string()).chain(locations))?;
    }

    // The two tables differ in width, so each gets its own writer.
    let mut out = table.into_inner().map_err(|e| e.into_error())?;
    out.push(b'\n');

    let mut files = Writer::from_writer(out);
    files.write_record(["file_ix", "filename"])?;
    for (ix, name) in index.filenames().iter().enumerate() {
        files.write_record([ix.to_string(), format!("{}{}", index.base_dir(), name)])?;
    }

    let out = files.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(out).map_err(|e| CurateError::Report(e.to_string()))
}
