//! Materializes an [`ExportBundle`] as on-disk artifacts. Every artifact is
//! staged to a `.tmp` sibling and renamed into place, so a failed run never
//! leaves a partial file under the final name. For multi-file CSV output all
//! tables are staged before the first rename.

mod csv;
mod excel;
mod json;

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use tracing::info;

use crate::config::OutputFormat;
use crate::error::{EtlError, Result};
use crate::table::ExportBundle;

/// Write the bundle in the requested format and return the artifact paths.
/// The output directory is created if missing.
pub fn write_bundle(
    bundle: &ExportBundle,
    format: OutputFormat,
    out_dir: &Path,
    stamp: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(|e| EtlError::Artifact {
        path: out_dir.to_path_buf(),
        source: e,
    })?;
    let stamp = stamp.format("%Y%m%d_%H%M%S").to_string();

    match format {
        OutputFormat::Csv => write_csv_artifacts(bundle, out_dir, &stamp),
        OutputFormat::Excel => {
            let path = out_dir.join(format!("{}_data_{}.xlsx", bundle.source, stamp));
            stage_and_commit(&path, |tmp| excel::write_workbook(bundle, tmp))?;
            Ok(vec![path])
        }
        OutputFormat::Json => {
            let path = out_dir.join(format!("{}_data_{}.json", bundle.source, stamp));
            stage_and_commit(&path, |tmp| json::write_document(bundle, tmp))?;
            Ok(vec![path])
        }
    }
}

/// One CSV file per table, named `{source}_data_{entity}_{stamp}.csv`.
fn write_csv_artifacts(bundle: &ExportBundle, out_dir: &Path, stamp: &str) -> Result<Vec<PathBuf>> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(bundle.tables.len());
    let result: Result<()> = (|| {
        for table in &bundle.tables {
            let final_path = out_dir.join(format!(
                "{}_data_{}_{}.csv",
                bundle.source,
                table.entity().name(),
                stamp
            ));
            let tmp = stage_path(&final_path);
            self::csv::write_table(table, &tmp)?;
            staged.push((tmp, final_path));
        }
        Ok(())
    })();
    if let Err(e) = result {
        for (tmp, _) in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(e);
    }

    let mut paths = Vec::with_capacity(staged.len());
    for (tmp, final_path) in staged {
        commit(&tmp, &final_path)?;
        info!(path = %final_path.display(), "wrote artifact");
        paths.push(final_path);
    }
    Ok(paths)
}

/// Dotted sibling so the rename stays on one filesystem.
fn stage_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.tmp", name))
}

fn commit(tmp: &Path, final_path: &Path) -> Result<()> {
    fs::rename(tmp, final_path).map_err(|e| EtlError::Artifact {
        path: final_path.to_path_buf(),
        source: e,
    })
}

fn stage_and_commit(final_path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let tmp = stage_path(final_path);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    commit(&tmp, final_path)?;
    info!(path = %final_path.display(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Schema, Table, Value};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap()
    }

    fn lists_table(rows: usize) -> Table {
        let schema = Schema::lists();
        let mut table = Table::new(schema.clone());
        for i in 0..rows {
            let mut b = crate::table::RowBuilder::new(&schema);
            b.set("list_id", Value::Str(format!("l{}", i)));
            b.set("member_count", Value::Int(10 * i as i64));
            table.push_row(b);
        }
        table
    }

    #[test]
    fn test_csv_round_trip_and_naming() {
        let dir = tempdir().unwrap();
        let mut bundle = ExportBundle::new("mailchimp");
        bundle.tables.push(lists_table(2));

        let paths = write_bundle(&bundle, OutputFormat::Csv, dir.path(), stamp()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].file_name().unwrap().to_str().unwrap(),
            "mailchimp_data_lists_20240601_102030.csv"
        );

        // round-trip: same column set and row count
        let mut reader = ::csv::Reader::from_path(&paths[0]).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let expected: Vec<String> = Schema::lists().column_names().map(String::from).collect();
        assert_eq!(headers, expected);
        assert_eq!(reader.records().count(), 2);

        // nothing staged left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_csv_one_file_per_table() {
        let dir = tempdir().unwrap();
        let mut bundle = ExportBundle::new("mailchimp");
        bundle.tables.push(lists_table(1));
        bundle.tables.push(Table::new(Schema::campaigns()));

        let paths = write_bundle(&bundle, OutputFormat::Csv, dir.path(), stamp()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1]
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .contains("_campaigns_"));
        // empty table still yields a headers-only artifact
        let mut reader = ::csv::Reader::from_path(&paths[1]).unwrap();
        assert_eq!(reader.headers().unwrap().len(), Schema::campaigns().len());
        assert_eq!(reader.records().count(), 0);
    }

    #[test]
    fn test_json_single_artifact() {
        let dir = tempdir().unwrap();
        let mut bundle = ExportBundle::new("ga");
        bundle.tables.push(lists_table(3));

        let paths = write_bundle(&bundle, OutputFormat::Json, dir.path(), stamp()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].file_name().unwrap().to_str().unwrap(),
            "ga_data_20240601_102030.json"
        );
        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(doc["lists"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_excel_single_artifact() {
        let dir = tempdir().unwrap();
        let mut bundle = ExportBundle::new("mailchimp");
        bundle.tables.push(lists_table(1));
        bundle.summary = Some(Table::new(Schema::dashboard()));

        let paths = write_bundle(&bundle, OutputFormat::Excel, dir.path(), stamp()).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_file());
        assert_eq!(
            paths[0].file_name().unwrap().to_str().unwrap(),
            "mailchimp_data_20240601_102030.xlsx"
        );
    }

    #[test]
    fn test_output_directory_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/out");
        let mut bundle = ExportBundle::new("ga");
        bundle.tables.push(lists_table(1));
        let paths = write_bundle(&bundle, OutputFormat::Csv, &nested, stamp()).unwrap();
        assert!(paths[0].starts_with(&nested));
    }

    #[test]
    fn test_stage_path_is_hidden_sibling() {
        let staged = stage_path(Path::new("/out/ga_data_x.csv"));
        assert_eq!(staged, Path::new("/out/.ga_data_x.csv.tmp"));
    }
}
