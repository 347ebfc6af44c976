// src/db/models/mod.rs

//! Data models for engine database entities
//!
//! Each file defines a Rust struct corresponding to a database table
//! and methods for creating, reading, and updating records. The PREMIS
//! event log deliberately has no update or delete methods.

mod checksum;
mod digital_object;
mod event;
mod fixity_check;
mod format;
mod format_identification;
mod package;
mod package_object;
mod run;
mod schedule;
mod virus_scan;

pub use checksum::{Checksum, VerificationStatus};
pub use digital_object::DigitalObject;
pub use event::{EventOutcome, EventType, PreservationEvent};
pub use fixity_check::{FixityCheck, FixityStatus};
pub use format::{FormatEntry, RiskLevel};
pub use format_identification::{Confidence, FormatIdentification};
pub use package::{Package, PackageStatus, PackageType};
pub use package_object::PackageObject;
pub use run::{RunStatus, TriggeredBy, WorkflowRun};
pub use schedule::WorkflowSchedule;
pub use virus_scan::{ScanStatus, VirusScan};

/// Convert an enum parse failure into a rusqlite conversion error so
/// `from_row` closures can use `?` on status columns.
pub(crate) fn column_parse_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
