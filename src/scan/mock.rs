// src/scan/mock.rs

//! Canned scanner for tests and offline development.

use crate::db::models::ScanStatus;
use crate::error::Result;
use crate::scan::{ScanOutcome, Scanner};
use std::path::Path;

/// A scanner that returns a pre-configured outcome
pub struct MockScanner {
    pub available: bool,
    pub outcome: ScanOutcome,
}

impl MockScanner {
    pub fn clean() -> Self {
        Self {
            available: true,
            outcome: ScanOutcome {
                status: ScanStatus::Clean,
                threat_name: None,
                engine_version: Some("mock 1.0".to_string()),
                error_message: None,
            },
        }
    }

    pub fn infected(threat: &str) -> Self {
        Self {
            available: true,
            outcome: ScanOutcome {
                status: ScanStatus::Infected,
                threat_name: Some(threat.to_string()),
                engine_version: Some("mock 1.0".to_string()),
                error_message: None,
            },
        }
    }

    pub fn engine_error(message: &str) -> Self {
        Self {
            available: true,
            outcome: ScanOutcome {
                status: ScanStatus::Error,
                threat_name: None,
                engine_version: Some("mock 1.0".to_string()),
                error_message: Some(message.to_string()),
            },
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            outcome: ScanOutcome {
                status: ScanStatus::Error,
                threat_name: None,
                engine_version: None,
                error_message: None,
            },
        }
    }
}

impl Scanner for MockScanner {
    fn name(&self) -> &str {
        "mock-scanner"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn scan(&self, _path: &Path) -> Result<ScanOutcome> {
        Ok(self.outcome.clone())
    }
}
