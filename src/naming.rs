//! File naming grammar for backup artifacts
//!
//! Every fact a run needs about a past backup is stored in its file name:
//!
//! - data: `{YYYYMMDD}_{FULL|INCR}_{base}_{checkpoint}.xb.zst`
//! - logs: `{YYYYMMDD}_LOGS_{source}.zst`
//!
//! The date comes first and is fixed width, so sorting names lexically sorts
//! artifacts of one kind chronologically.

use chrono::NaiveDate;

use crate::error::{BackupError, BackupResult};
use crate::models::{BackupKind, DataArtifact, LogArtifact};

/// Date format used in file names
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Encoding and decoding of one artifact kind to and from file names
pub trait NamingScheme {
    type Artifact;

    /// Extension every file of this kind carries
    const SUFFIX: &'static str;

    /// Canonical file name for an artifact
    fn encode(artifact: &Self::Artifact) -> String;

    /// Parse a file name back into an artifact
    fn decode(file_name: &str) -> BackupResult<Self::Artifact>;

    /// Whether a directory entry belongs to this kind
    fn matches(file_name: &str) -> bool {
        Self::decode(file_name).is_ok()
    }
}

/// Naming for compressed xbstream snapshots
pub struct DataNaming;

impl NamingScheme for DataNaming {
    type Artifact = DataArtifact;

    const SUFFIX: &'static str = ".xb.zst";

    fn encode(artifact: &DataArtifact) -> String {
        format!(
            "{}_{}_{}_{}{}",
            artifact.date.format(DATE_FORMAT),
            artifact.kind.tag(),
            artifact.base_checkpoint,
            artifact.checkpoint,
            Self::SUFFIX
        )
    }

    fn decode(file_name: &str) -> BackupResult<DataArtifact> {
        let fields = split_fields(file_name, Self::SUFFIX, 4)?;
        let date = parse_date(file_name, fields[0])?;
        let kind = parse_kind(file_name, fields[1])?;
        if !kind.is_data() {
            return Err(BackupError::invalid_name(
                file_name,
                format!("{} is not a data backup kind", kind),
            ));
        }

        DataArtifact::new(date, kind, fields[2], fields[3])
            .map_err(|e| BackupError::invalid_name(file_name, e.to_string()))
    }
}

/// Naming for compressed binlog segments
pub struct LogNaming;

impl NamingScheme for LogNaming {
    type Artifact = LogArtifact;

    const SUFFIX: &'static str = ".zst";

    fn encode(artifact: &LogArtifact) -> String {
        format!(
            "{}_{}_{}{}",
            artifact.date.format(DATE_FORMAT),
            BackupKind::Logs.tag(),
            artifact.source_log_name,
            Self::SUFFIX
        )
    }

    fn decode(file_name: &str) -> BackupResult<LogArtifact> {
        let fields = split_fields(file_name, Self::SUFFIX, 3)?;
        let date = parse_date(file_name, fields[0])?;
        if parse_kind(file_name, fields[1])? != BackupKind::Logs {
            return Err(BackupError::invalid_name(file_name, "not a log backup"));
        }

        LogArtifact::new(date, fields[2])
            .map_err(|e| BackupError::invalid_name(file_name, e.to_string()))
    }
}

/// Format a date the way it appears in file names
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYYMMDD` date
pub fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn split_fields<'a>(file_name: &'a str, suffix: &str, count: usize) -> BackupResult<Vec<&'a str>> {
    let stem = file_name
        .strip_suffix(suffix)
        .ok_or_else(|| BackupError::invalid_name(file_name, format!("expected suffix {}", suffix)))?;

    let fields: Vec<&str> = stem.split('_').collect();
    if fields.len() != count {
        return Err(BackupError::invalid_name(
            file_name,
            format!("expected {} fields, found {}", count, fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_date(file_name: &str, value: &str) -> BackupResult<NaiveDate> {
    parse_compact_date(value)
        .ok_or_else(|| BackupError::invalid_name(file_name, format!("bad date '{}'", value)))
}

fn parse_kind(file_name: &str, value: &str) -> BackupResult<BackupKind> {
    value
        .parse()
        .map_err(|e: BackupError| BackupError::invalid_name(file_name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_encode_data() {
        let artifact = DataArtifact::incremental(date(2025, 3, 4), "18844", "19210").unwrap();
        assert_eq!(
            DataNaming::encode(&artifact),
            "20250304_INCR_18844_19210.xb.zst"
        );
    }

    #[test]
    fn test_encode_logs() {
        let artifact = LogArtifact::new(date(2025, 3, 4), "mysql-bin.000042").unwrap();
        assert_eq!(
            LogNaming::encode(&artifact),
            "20250304_LOGS_mysql-bin.000042.zst"
        );
    }

    #[test]
    fn test_round_trip() {
        let start = date(2024, 12, 28);
        for offset in 0..10 {
            let day = start + Duration::days(offset);
            let checkpoint = (1000 + offset * 37).to_string();

            let full = DataArtifact::full(day, checkpoint.clone()).unwrap();
            assert_eq!(DataNaming::decode(&DataNaming::encode(&full)).unwrap(), full);

            let incr = DataArtifact::incremental(day, "1000", checkpoint).unwrap();
            assert_eq!(DataNaming::decode(&DataNaming::encode(&incr)).unwrap(), incr);

            let log = LogArtifact::new(day, format!("binlog.{:06}", offset + 1)).unwrap();
            assert_eq!(LogNaming::decode(&LogNaming::encode(&log)).unwrap(), log);
        }
    }

    #[test]
    fn test_lexical_order_is_chronological() {
        let dates = [
            date(2025, 1, 9),
            date(2024, 12, 31),
            date(2025, 10, 1),
            date(2025, 2, 28),
        ];
        let mut names: Vec<String> = dates
            .iter()
            .map(|d| DataNaming::encode(&DataArtifact::full(*d, "5").unwrap()))
            .collect();
        names.sort();

        let decoded: Vec<NaiveDate> = names
            .iter()
            .map(|n| DataNaming::decode(n).unwrap().date)
            .collect();
        let mut sorted = dates.to_vec();
        sorted.sort();
        assert_eq!(decoded, sorted);
    }

    #[test]
    fn test_matches_rejects_unrelated_files() {
        assert!(DataNaming::matches("20250304_FULL_0_19210.xb.zst"));
        assert!(!DataNaming::matches("tmp_backup.xb.zst"));
        assert!(!DataNaming::matches("notes.txt"));
        assert!(!DataNaming::matches("20250304_FULL_0.xb.zst"));
        assert!(!DataNaming::matches("20250304_LOGS_0_1.xb.zst"));
        assert!(!DataNaming::matches("20251304_FULL_0_1.xb.zst"));
        assert!(!DataNaming::matches("2025034_FULL_0_1.xb.zst"));

        assert!(LogNaming::matches("20250304_LOGS_mysql-bin.000042.zst"));
        assert!(!LogNaming::matches("20250304_FULL_0_19210.xb.zst"));
        assert!(!LogNaming::matches("20250304_INCR_mysql-bin.000042.zst"));
        assert!(!LogNaming::matches("mysql-bin.000042"));
    }

    #[test]
    fn test_decode_reports_reason() {
        let err = DataNaming::decode("20250304_FULL_0.xb.zst").unwrap_err();
        assert!(err.to_string().contains("expected 4 fields"));
    }
}
