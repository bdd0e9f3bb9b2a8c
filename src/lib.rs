//! Batch ETL pipelines for outreach reporting: pull metrics from an analytics
//! reporting API and audience data from a marketing API, reshape the nested
//! vendor payloads into flat typed tables, and export them as CSV, workbook
//! or JSON artifacts.

pub mod config;
pub mod error;
pub mod etl;
pub mod fetch;
pub mod load;
pub mod summary;
pub mod table;
pub mod transform;

pub use error::{EtlError, Result};
