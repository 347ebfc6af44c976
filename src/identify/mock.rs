// src/identify/mock.rs

//! Canned identifier for tests and offline development.

use crate::error::Result;
use crate::identify::{Identifier, ToolIdentification, ToolMatch};
use std::path::Path;

/// An identifier that returns pre-configured matches
pub struct MockIdentifier {
    pub available: bool,
    pub matches: Vec<ToolMatch>,
}

impl MockIdentifier {
    /// One confident signature match
    pub fn single(puid: &str, format_name: &str, mime_type: &str) -> Self {
        Self {
            available: true,
            matches: vec![ToolMatch {
                puid: Some(puid.to_string()),
                format_name: format_name.to_string(),
                format_version: None,
                mime_type: Some(mime_type.to_string()),
                basis: Some("byte match at 0, 14".to_string()),
                warning: None,
            }],
        }
    }

    /// Two competing PUIDs for the same bytes
    pub fn ambiguous() -> Self {
        Self {
            available: true,
            matches: vec![
                ToolMatch {
                    puid: Some("fmt/17".to_string()),
                    format_name: "Acrobat PDF 1.3".to_string(),
                    format_version: Some("1.3".to_string()),
                    mime_type: Some("application/pdf".to_string()),
                    basis: Some("byte match at 0, 8".to_string()),
                    warning: None,
                },
                ToolMatch {
                    puid: Some("fmt/18".to_string()),
                    format_name: "Acrobat PDF 1.4".to_string(),
                    format_version: Some("1.4".to_string()),
                    mime_type: Some("application/pdf".to_string()),
                    basis: Some("byte match at 0, 8".to_string()),
                    warning: None,
                },
            ],
        }
    }

    /// A tool that is not installed
    pub fn unavailable() -> Self {
        Self {
            available: false,
            matches: Vec::new(),
        }
    }
}

impl Identifier for MockIdentifier {
    fn name(&self) -> &str {
        "mock-identifier"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn identify(&self, _path: &Path) -> Result<ToolIdentification> {
        Ok(ToolIdentification {
            tool: "mock-identifier 1.0".to_string(),
            matches: self.matches.clone(),
        })
    }
}
