//! `tally-recon`: weekly payout reconciliation engine.
//!
//! Pure engine crate. Receives loaded statement books and a template
//! grid, segments the month into weeks, allocates spillover and writes
//! the report cells. File formats live in `tally-io`.

pub mod additions;
pub mod aggregate;
pub mod block;
pub mod calc;
pub mod cellref;
pub mod classify;
pub mod config;
pub mod dates;
pub mod detail;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod model;
pub mod profiles;
pub mod receipts;
pub mod source;
pub mod weeks;
pub mod workbook;

pub use cellref::{CellRef, SheetCell};
pub use config::{Flow, InputKind, Profile};
pub use diagnostics::Diagnostics;
pub use engine::{run, JobInputs, JobParams, RunReport};
pub use error::ReconError;
pub use model::RawValue;
pub use source::{RawSheet, SourceBook};
pub use weeks::{build_week_structure, WeekBoundaries, WeekDescriptor, WeekStructure};
pub use workbook::{CellValue, GridSheet, ReportWorkbook};
