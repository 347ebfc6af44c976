// src/identify/siegfried.rs

//! Siegfried signature identification.
//!
//! Invokes `sf -json <file>` as a subprocess with a deadline and stdin
//! nulled, then maps its matches into [`ToolIdentification`]. Siegfried
//! reports PRONOM identifiers in the `id` field.

use crate::error::{Error, Result};
use crate::identify::{Identifier, ToolIdentification, ToolMatch};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

pub struct SiegfriedIdentifier {
    binary: Option<PathBuf>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SfOutput {
    #[serde(default)]
    files: Vec<SfFile>,
}

#[derive(Deserialize)]
struct SfFile {
    #[serde(default)]
    matches: Vec<SfMatch>,
}

#[derive(Deserialize)]
struct SfMatch {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default)]
    basis: Option<String>,
    #[serde(default)]
    warning: Option<String>,
}

impl SiegfriedIdentifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: which::which("sf").ok(),
            timeout,
        }
    }

    /// Point at an explicit binary, bypassing the PATH probe
    pub fn with_binary(binary: PathBuf, timeout: Duration) -> Self {
        Self {
            binary: Some(binary),
            timeout,
        }
    }

    /// Tool label including the installed version when obtainable
    fn tool_label(&self) -> String {
        let Some(binary) = &self.binary else {
            return "siegfried".to_string();
        };

        let version = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .ok()
            .and_then(|out| {
                let text = String::from_utf8_lossy(&out.stdout).to_string();
                // First line is "siegfried 1.11.0"
                text.lines().next().map(|l| l.trim().to_string())
            })
            .filter(|l| !l.is_empty());

        version.unwrap_or_else(|| "siegfried".to_string())
    }

    fn parse_output(&self, raw: &str) -> Result<ToolIdentification> {
        let output: SfOutput = serde_json::from_str(raw)?;

        let file = output
            .files
            .into_iter()
            .next()
            .ok_or_else(|| Error::ToolUnavailable("siegfried returned no file entries".into()))?;

        let matches = file
            .matches
            .into_iter()
            .map(|m| {
                // Siegfried reports "UNKNOWN" when no signature matched
                let puid = m.id.filter(|id| !id.is_empty() && id != "UNKNOWN");
                ToolMatch {
                    puid,
                    format_name: m
                        .format
                        .filter(|f| !f.is_empty())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    format_version: m.version.filter(|v| !v.is_empty()),
                    mime_type: m.mime.filter(|v| !v.is_empty()),
                    basis: m.basis.filter(|v| !v.is_empty()),
                    warning: m.warning.filter(|v| !v.is_empty()),
                }
            })
            .collect();

        Ok(ToolIdentification {
            tool: self.tool_label(),
            matches,
        })
    }
}

impl Identifier for SiegfriedIdentifier {
    fn name(&self) -> &str {
        "siegfried"
    }

    fn is_available(&self) -> bool {
        self.binary.as_ref().is_some_and(|b| b.exists())
    }

    fn identify(&self, path: &Path) -> Result<ToolIdentification> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("sf not found in PATH".into()))?;

        debug!(file = %path.display(), "running siegfried");

        let mut child = Command::new(binary)
            .arg("-json")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ToolUnavailable(format!("failed to spawn sf: {e}")))?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();

                if !status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::ToolUnavailable(format!(
                        "sf exited with {}: {}",
                        status.code().unwrap_or(-1),
                        stderr.trim()
                    )));
                }

                self.parse_output(&stdout)
            }
            None => {
                let _ = child.kill();
                Err(Error::Timeout(format!(
                    "sf did not finish within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
