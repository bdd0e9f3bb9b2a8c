use std::{fs, path::Path};

use crate::error::{EtlError, Result};
use crate::table::ExportBundle;

/// Record-oriented document: `{ table_name: [ {column: value, ...}, ... ] }`.
pub(super) fn bundle_to_json(bundle: &ExportBundle) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for table in &bundle.tables {
        let records: Vec<serde_json::Value> = table
            .rows()
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for (column, cell) in table.schema().columns.iter().zip(row) {
                    record.insert(column.name.clone(), cell.to_json());
                }
                serde_json::Value::Object(record)
            })
            .collect();
        root.insert(
            table.entity().name().to_string(),
            serde_json::Value::Array(records),
        );
    }
    serde_json::Value::Object(root)
}

pub(super) fn write_document(bundle: &ExportBundle, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(&bundle_to_json(bundle))?;
    fs::write(path, text).map_err(|e| EtlError::Artifact {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Schema, Table, Value};

    #[test]
    fn test_bundle_to_json_shape() {
        let mut lists = Table::new(Schema::lists());
        let schema = lists.schema().clone();
        let mut b = crate::table::RowBuilder::new(&schema);
        b.set("list_id", Value::str("l1"));
        b.set("member_count", Value::Int(12));
        b.set("unsubscribe_rate", Value::Float(0.25));
        lists.push_row(b);

        let mut bundle = ExportBundle::new("mailchimp");
        bundle.tables.push(lists);

        let doc = bundle_to_json(&bundle);
        let records = doc["lists"].as_array().unwrap();
        assert_eq!(records.len(), 1);
        // typed values survive: numbers stay numbers, absent fields are null
        assert_eq!(records[0]["member_count"], serde_json::json!(12));
        assert_eq!(records[0]["unsubscribe_rate"], serde_json::json!(0.25));
        assert!(records[0]["date_created"].is_null());
    }
}
