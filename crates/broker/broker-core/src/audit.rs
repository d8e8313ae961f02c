use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tsdb_format::{Error, Slug};

pub fn csv_path(base_path: &Path, slug: &Slug) -> PathBuf {
    base_path.join("csv").join(format!("{slug}.csv"))
}

/// Appends one line per reading to the series' audit CSV: an ISO-8601
/// timestamp (UTC) followed by the value. Readings are assumed to already
/// be filtered to those strictly after the series' last recorded timestamp.
pub fn append_readings(base_path: &Path, slug: &Slug, readings: &[(i64, f64)]) -> Result<(), Error> {
    let path = csv_path(base_path, slug);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    for &(timestamp, value) in readings {
        let instant: DateTime<Utc> = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| Error::Internal(format!("timestamp {timestamp} out of range")))?;
        writer
            .write_record([instant.to_rfc3339(), value.to_string()])
            .map_err(|e| Error::Internal(format!("writing audit CSV: {e}")))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_lines_in_iso8601() {
        let dir = tempfile::tempdir().unwrap();
        let slug = Slug::parse("audit_test").unwrap();
        append_readings(dir.path(), &slug, &[(0, 1.5), (60, 2.5)]).unwrap();
        let contents = std::fs::read_to_string(csv_path(dir.path(), &slug)).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().ends_with(",1.5"));
    }
}
