use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::table::{ExportBundle, Table, Value};

/// Write the bundle as one workbook: one sheet per table, with the summary
/// table (when present) as a trailing sheet.
pub(super) fn write_workbook(bundle: &ExportBundle, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    for table in bundle.tables.iter().chain(bundle.summary.iter()) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(table.entity().sheet_name())?;
        write_sheet(sheet, table, &header_format)?;
    }
    workbook.save(path)?;
    Ok(())
}

fn write_sheet(sheet: &mut Worksheet, table: &Table, header_format: &Format) -> Result<()> {
    for (col, name) in table.schema().column_names().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header_format)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Value::Null => {}
                Value::Int(v) => {
                    sheet.write_number(r, c, *v as f64)?;
                }
                Value::Float(v) => {
                    sheet.write_number(r, c, *v)?;
                }
                other => {
                    sheet.write_string(r, c, other.to_string())?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Schema, Value};
    use tempfile::tempdir;

    #[test]
    fn test_workbook_one_sheet_per_table_plus_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        let mut bundle = ExportBundle::new("mailchimp");
        bundle.tables.push(Table::new(Schema::lists()));
        bundle.tables.push(Table::new(Schema::campaigns()));
        let mut dash = Table::new(Schema::dashboard());
        dash.push(vec![Value::str("Total Lists"), Value::str("0")])
            .unwrap();
        bundle.summary = Some(dash);

        write_workbook(&bundle, &path).unwrap();
        assert!(path.is_file());
        assert!(path.metadata().unwrap().len() > 0);

        let names: Vec<String> = bundle
            .tables
            .iter()
            .chain(bundle.summary.iter())
            .map(|t| t.entity().sheet_name())
            .collect();
        assert_eq!(names, vec!["Lists", "Campaigns", "Dashboard"]);
    }

    #[test]
    fn test_empty_table_still_gets_header_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let mut bundle = ExportBundle::new("ga");
        bundle.tables.push(Table::new(Schema::members()));
        write_workbook(&bundle, &path).unwrap();
        assert!(path.is_file());
    }
}
