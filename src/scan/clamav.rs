// src/scan/clamav.rs

//! ClamAV scanner adapter.
//!
//! Runs `clamscan --no-summary <file>` (or `clamdscan` when the daemon
//! client is the only binary present) with a deadline. Exit codes:
//! 0 clean, 1 infected, anything else is an engine error. Threat names
//! are parsed from `<path>: <name> FOUND` lines.

use crate::db::models::ScanStatus;
use crate::error::{Error, Result};
use crate::scan::{ScanOutcome, Scanner};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

pub struct ClamAvScanner {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl ClamAvScanner {
    pub fn new(timeout: Duration) -> Self {
        let binary = which::which("clamscan")
            .or_else(|_| which::which("clamdscan"))
            .ok();
        Self { binary, timeout }
    }

    /// Point at an explicit binary, bypassing the PATH probe
    pub fn with_binary(binary: PathBuf, timeout: Duration) -> Self {
        Self {
            binary: Some(binary),
            timeout,
        }
    }

    /// Engine version from `clamscan --version`, e.g. "ClamAV 1.3.1"
    fn engine_version(&self) -> Option<String> {
        let binary = self.binary.as_ref()?;
        let output = Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }

    /// Extract the threat name from `<path>: <name> FOUND`
    fn parse_threat(output: &str) -> Option<String> {
        for line in output.lines() {
            if let Some(rest) = line.trim().strip_suffix("FOUND")
                && let Some((_, name)) = rest.rsplit_once(':')
            {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}

impl Scanner for ClamAvScanner {
    fn name(&self) -> &str {
        "clamav"
    }

    fn is_available(&self) -> bool {
        self.binary.as_ref().is_some_and(|b| b.exists())
    }

    fn scan(&self, path: &Path) -> Result<ScanOutcome> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("clamscan not found in PATH".into()))?;

        debug!(file = %path.display(), "running clamav");

        let mut child = Command::new(binary)
            .arg("--no-summary")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ToolUnavailable(format!("failed to spawn clamscan: {e}")))?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                let outcome = match status.code() {
                    Some(0) => ScanOutcome {
                        status: ScanStatus::Clean,
                        threat_name: None,
                        engine_version: self.engine_version(),
                        error_message: None,
                    },
                    Some(1) => ScanOutcome {
                        status: ScanStatus::Infected,
                        threat_name: Self::parse_threat(&stdout),
                        engine_version: self.engine_version(),
                        error_message: None,
                    },
                    code => ScanOutcome {
                        status: ScanStatus::Error,
                        threat_name: None,
                        engine_version: self.engine_version(),
                        error_message: Some(format!(
                            "clamscan exited with {}: {}",
                            code.map_or("signal".to_string(), |c| c.to_string()),
                            if stderr.trim().is_empty() {
                                stdout.trim()
                            } else {
                                stderr.trim()
                            }
                        )),
                    },
                };

                Ok(outcome)
            }
            None => {
                let _ = child.kill();
                Ok(ScanOutcome {
                    status: ScanStatus::Error,
                    threat_name: None,
                    engine_version: None,
                    error_message: Some(format!(
                        "clamscan did not finish within {}s",
                        self.timeout.as_secs()
                    )),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threat_name() {
        let output = "/uploads/evil.bin: Eicar-Test-Signature FOUND\n";
        assert_eq!(
            ClamAvScanner::parse_threat(output),
            Some("Eicar-Test-Signature".to_string())
        );
    }

    #[test]
    fn test_parse_threat_handles_colons_in_path() {
        let output = "/uploads/odd:name.bin: Win.Test.EICAR_HDB-1 FOUND";
        assert_eq!(
            ClamAvScanner::parse_threat(output),
            Some("Win.Test.EICAR_HDB-1".to_string())
        );
    }

    #[test]
    fn test_parse_threat_none_on_clean_output() {
        assert_eq!(ClamAvScanner::parse_threat(""), None);
        assert_eq!(ClamAvScanner::parse_threat("/uploads/ok.bin: OK\n"), None);
    }

    #[test]
    fn test_unavailable_without_binary() {
        let scanner = ClamAvScanner {
            binary: None,
            timeout: Duration::from_secs(5),
        };
        assert!(!scanner.is_available());
        assert!(scanner.scan(Path::new("/tmp/x")).is_err());
    }
}
