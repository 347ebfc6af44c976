// src/identify/registry.rs

//! Format risk registry maintenance.
//!
//! Identifications are normalized against `formats` rows keyed by PUID.
//! Unknown formats are added with an assessed risk level so the
//! dashboards can surface at-risk holdings without manual curation.

use crate::db::models::{FormatEntry, RiskLevel};
use crate::error::Result;
use rusqlite::Connection;

/// MIME types considered stable preservation formats
const PRESERVATION_MIMES: &[&str] = &[
    "image/tiff",
    "image/png",
    "application/pdf",
    "audio/x-wav",
    "audio/wav",
    "audio/flac",
    "text/plain",
    "text/xml",
    "application/xml",
];

/// MIME types with no meaningful preservation risk
const LOW_RISK_MIMES: &[&str] = &[
    "image/tiff",
    "image/png",
    "application/pdf",
    "audio/x-wav",
    "audio/wav",
    "audio/flac",
    "text/plain",
    "text/xml",
    "application/xml",
    "image/jpeg",
    "audio/mpeg",
    "video/mp4",
];

/// Proprietary or legacy format name fragments
const HIGH_RISK_PATTERNS: &[&str] = &[
    "msword",
    "ms-excel",
    "ms-powerpoint",
    "lotus",
    "wordperfect",
    "corel",
];

/// Obsolete format name fragments
const CRITICAL_PATTERNS: &[&str] = &["macpaint", "pict", "superpaint", "clarisworks"];

/// Assess the preservation risk of a format
pub fn assess_risk(mime_type: Option<&str>, format_name: &str) -> RiskLevel {
    if let Some(mime) = mime_type
        && LOW_RISK_MIMES.contains(&mime)
    {
        return RiskLevel::Low;
    }

    let name = format_name.to_lowercase();

    if CRITICAL_PATTERNS.iter().any(|p| name.contains(p)) {
        return RiskLevel::Critical;
    }

    if HIGH_RISK_PATTERNS.iter().any(|p| name.contains(p)) {
        return RiskLevel::High;
    }

    RiskLevel::Medium
}

/// Whether a MIME type is an accepted preservation format
pub fn is_preservation_format(mime_type: Option<&str>) -> bool {
    mime_type.is_some_and(|m| PRESERVATION_MIMES.contains(&m))
}

/// Find the registry entry for an identification, creating one when the
/// format is new. Returns the registry row id, or `None` when there is
/// nothing usable to key on.
pub fn find_or_create(
    conn: &Connection,
    puid: Option<&str>,
    mime_type: Option<&str>,
    format_name: &str,
    format_version: Option<&str>,
) -> Result<Option<i64>> {
    // Normalize unusable values away
    let puid = puid.filter(|p| !p.is_empty() && *p != "UNKNOWN");
    let mime_type = mime_type.filter(|m| !m.is_empty());

    if puid.is_none() && mime_type.is_none() {
        return Ok(None);
    }

    if let Some(p) = puid
        && let Some(existing) = FormatEntry::find_by_puid(conn, p)?
    {
        return Ok(existing.id);
    }

    if let Some(m) = mime_type
        && let Some(mut existing) = FormatEntry::find_by_mime(conn, m)?
    {
        // Backfill the PUID when this identification supplies one
        if let Some(p) = puid
            && existing.puid.is_none()
        {
            existing.set_puid(conn, p)?;
        }
        return Ok(existing.id);
    }

    // A registry entry without a MIME type is not useful to dashboards
    if mime_type.is_none() {
        return Ok(None);
    }

    let risk_level = assess_risk(mime_type, format_name);
    let mut entry = FormatEntry {
        id: None,
        puid: puid.map(String::from),
        format_name: format_name.to_string(),
        format_version: format_version.map(String::from),
        mime_type: mime_type.map(String::from),
        risk_level,
        is_preservation_format: is_preservation_format(mime_type),
        preservation_action: Some(
            if risk_level == RiskLevel::Low { "none" } else { "monitor" }.to_string(),
        ),
    };
    let id = entry.insert(conn)?;
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_conn() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        db::init(db_path.to_str().unwrap()).unwrap();
        let conn = db::open(db_path.to_str().unwrap()).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_risk_assessment() {
        assert_eq!(assess_risk(Some("image/tiff"), "TIFF"), RiskLevel::Low);
        assert_eq!(assess_risk(Some("image/jpeg"), "JPEG"), RiskLevel::Low);
        assert_eq!(
            assess_risk(Some("application/msword"), "Microsoft Word (msword)"),
            RiskLevel::High
        );
        assert_eq!(
            assess_risk(None, "MacPaint Image"),
            RiskLevel::Critical
        );
        assert_eq!(
            assess_risk(Some("application/x-custom"), "Custom Format"),
            RiskLevel::Medium
        );
    }

    #[test]
    fn test_preservation_format_flag() {
        assert!(is_preservation_format(Some("image/tiff")));
        assert!(!is_preservation_format(Some("image/jpeg")));
        assert!(!is_preservation_format(None));
    }

    #[test]
    fn test_find_or_create_by_puid() {
        let (_dir, conn) = test_conn();

        let first = find_or_create(&conn, Some("fmt/43"), Some("image/jpeg"), "JPEG", None)
            .unwrap()
            .unwrap();
        let second = find_or_create(&conn, Some("fmt/43"), Some("image/jpeg"), "JPEG", None)
            .unwrap()
            .unwrap();
        assert_eq!(first, second);

        let entry = FormatEntry::find_by_puid(&conn, "fmt/43").unwrap().unwrap();
        assert_eq!(entry.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_puid_backfilled_on_mime_match() {
        let (_dir, conn) = test_conn();

        // First seen without a PUID
        find_or_create(&conn, None, Some("image/png"), "PNG", None).unwrap();
        assert!(FormatEntry::find_by_mime(&conn, "image/png")
            .unwrap()
            .unwrap()
            .puid
            .is_none());

        // Later identification supplies one
        find_or_create(&conn, Some("fmt/13"), Some("image/png"), "PNG", None).unwrap();
        let entry = FormatEntry::find_by_mime(&conn, "image/png").unwrap().unwrap();
        assert_eq!(entry.puid.as_deref(), Some("fmt/13"));
    }

    #[test]
    fn test_nothing_to_key_on() {
        let (_dir, conn) = test_conn();
        assert!(find_or_create(&conn, None, None, "Mystery", None).unwrap().is_none());
        assert!(
            find_or_create(&conn, Some("UNKNOWN"), Some(""), "Mystery", None)
                .unwrap()
                .is_none()
        );
    }
}
