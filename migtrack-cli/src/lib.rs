//! Spreadsheet import and validation for migration-tracking workbooks

pub mod cli;
pub mod config;
pub mod import;
pub mod store;
