//! Output name derivation.
//!
//! Camera files are named `<deviceId>_<YYYYMMDD>_<...>.<ext>`. The published
//! artifact drops the device and capture date and is re-stamped with the day
//! of processing: `VID_<today>_<...>`.

use chrono::{Local, NaiveDate};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Prefix of every canonical base name.
pub const BASE_PREFIX: &str = "VID";

/// Prefix of the per-run comment token.
pub const TOKEN_PREFIX: &str = "processed";

const MIN_SEGMENTS: usize = 4;
const DATE_SEGMENT_LEN: usize = 8;

/// The filename does not have the camera's naming shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("expected at least {} '_'-separated segments, found {0}", MIN_SEGMENTS)]
    TooFewSegments(usize),

    #[error("date segment '{0}' is not {} characters long", DATE_SEGMENT_LEN)]
    BadDateSegment(String),
}

/// Canonical output identity derived from a source filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalName {
    /// Output file stem, also written as the container title.
    pub base: String,
    /// Written as the container comment so reruns never share metadata.
    pub unique_token: String,
}

impl CanonicalName {
    /// `<base>.<ext>`
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.base, extension)
    }
}

/// Derive the canonical name using the local calendar date and system clock.
pub fn derive(file_name: &str) -> Result<CanonicalName, NameError> {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    derive_at(file_name, Local::now().date_naive(), unix_secs)
}

/// Derive the canonical name for an explicit date and timestamp.
pub fn derive_at(
    file_name: &str,
    today: NaiveDate,
    unix_secs: u64,
) -> Result<CanonicalName, NameError> {
    let segments: Vec<&str> = file_name.split('_').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(NameError::TooFewSegments(segments.len()));
    }
    if segments[1].chars().count() != DATE_SEGMENT_LEN {
        return Err(NameError::BadDateSegment(segments[1].to_string()));
    }

    let rest = segments[2..].join("_");
    let stamped = format!("{}_{}_{}", BASE_PREFIX, today.format("%Y%m%d"), rest);
    let base = match stamped.rsplit_once('.') {
        Some((stem, _ext)) => stem.to_string(),
        None => stamped,
    };

    Ok(CanonicalName {
        base,
        unique_token: format!("{}_{}", TOKEN_PREFIX, unix_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_derive_typical_camera_file() {
        let name = derive_at("IMG_20240101_093000_00_012.insv", day(), 1_700_000_000).unwrap();

        assert_eq!(name.base, "VID_20240309_093000_00_012");
        assert_eq!(name.unique_token, "processed_1700000000");
        assert_eq!(name.file_name("insv"), "VID_20240309_093000_00_012.insv");
    }

    #[test]
    fn test_only_last_extension_is_stripped() {
        let name = derive_at("CAM_20240101_a.b_c.insv", day(), 1).unwrap();
        assert_eq!(name.base, "VID_20240309_a.b_c");
    }

    #[test]
    fn test_name_without_extension_is_kept_whole() {
        let name = derive_at("CAM_20240101_001_002", day(), 1).unwrap();
        assert_eq!(name.base, "VID_20240309_001_002");
    }

    #[test]
    fn test_too_few_segments_rejected() {
        assert_eq!(
            derive_at("CAM_20240101_001.insv", day(), 1),
            Err(NameError::TooFewSegments(3))
        );
        assert_eq!(derive_at("video.insv", day(), 1), Err(NameError::TooFewSegments(1)));
    }

    #[test]
    fn test_bad_date_segment_rejected() {
        assert_eq!(
            derive_at("CAM_2024011_001_002.insv", day(), 1),
            Err(NameError::BadDateSegment("2024011".to_string()))
        );
        assert!(derive_at("CAM_202401011_001_002.insv", day(), 1).is_err());
    }

    #[test]
    fn test_wall_clock_derivation_has_todays_date() {
        let name = derive("CAM_20240101_001_002.insv").unwrap();

        assert!(name.base.starts_with("VID_"));
        assert!(name.base.ends_with("_001_002"));
        assert_eq!(name.base.len(), "VID_20240101_001_002".len());
        assert!(name.base[4..12].chars().all(|c| c.is_ascii_digit()));
        assert!(name.unique_token.starts_with("processed_"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Fewer than four segments never derive.
        #[test]
        fn prop_short_names_invalid(segments in prop::collection::vec("[a-zA-Z0-9.]{1,10}", 1..4)) {
            let file_name = segments.join("_");
            prop_assert!(derive_at(&file_name, day(), 0).is_err());
        }

        // A second segment of any length other than eight never derives.
        #[test]
        fn prop_date_segment_length_enforced(
            device in "[A-Z0-9]{1,8}",
            date in "[0-9]{1,16}",
            rest in "[a-z0-9]{1,6}_[a-z0-9]{1,6}\\.insv",
        ) {
            let file_name = format!("{}_{}_{}", device, date, rest);
            let result = derive_at(&file_name, day(), 0);
            prop_assert_eq!(result.is_ok(), date.len() == DATE_SEGMENT_LEN);
        }

        // Same day and same second give identical names; a second later gives
        // the same base but a different token.
        #[test]
        fn prop_deterministic_within_second(
            device in "[A-Z0-9]{1,8}",
            date in "[0-9]{8}",
            rest in "[a-z0-9]{1,6}_[a-z0-9]{1,6}\\.insv",
            secs in 0u64..4_000_000_000,
        ) {
            let file_name = format!("{}_{}_{}", device, date, rest);
            let a = derive_at(&file_name, day(), secs).unwrap();
            let b = derive_at(&file_name, day(), secs).unwrap();
            let c = derive_at(&file_name, day(), secs + 1).unwrap();

            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a.base, &c.base);
            prop_assert_ne!(&a.unique_token, &c.unique_token);
        }
    }
}
