//! Spreadsheet import core: grid extraction, structure location, row
//! decoding, validation and duplicate detection for migration-tracking workbooks

pub mod column;
pub mod date;
pub mod decode;
pub mod dedup;
pub mod error;
pub mod grid;
pub mod kind;
pub mod locator;
pub mod pipeline;
pub mod progress;
pub mod records;
pub mod schema;
pub mod validate;
pub mod workbook;

pub use error::ImportError;
pub use kind::ImportKind;
pub use pipeline::{
    Classified, DEFAULT_PROGRESS_INTERVAL, DuplicateRow, ImportOptions, ImportOutcome, ImportReport, InvalidRow,
    run_import,
};
pub use progress::{ImportContext, ImportStage, Progress, ProgressReporter};
pub use records::{
    ClusterRecord, ClusterSchema, IdentityGroupRecord, IdentityGroupSchema, MigrationRecord, MigrationSchema,
    PackagingRecord, PackagingSchema, PersonnelRecord, PersonnelSchema, TestingRecord, TestingSchema,
};
pub use schema::{ImportRecord, ImportStamp, Schema};
