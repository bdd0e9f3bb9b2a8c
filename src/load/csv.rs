use std::{fs::File, io::BufWriter, path::Path};

use crate::error::{EtlError, Result};
use crate::table::Table;

/// Write one table as a headered CSV file. `Null` cells become empty fields.
pub(super) fn write_table(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| EtlError::Artifact {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = ::csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record(table.schema().column_names())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
