//! Newline-delimited JSON output format.

use ducat_types::{Record, RecordKind};
use std::io::Write;

use crate::{FormatError, Formatter};

/// NDJSON formatter.
///
/// One object per line with the same fields as the CSV columns. Decimal
/// values are written as strings so no precision is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Creates a new NDJSON formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Formatter for JsonFormatter {
    fn write_header(&self, _kind: RecordKind, _writer: &mut dyn Write) -> Result<(), FormatError> {
        Ok(())
    }

    fn write_record(&self, record: &Record, mut writer: &mut dyn Write) -> Result<(), FormatError> {
        match record {
            Record::Tick(tick) => serde_json::to_writer(&mut writer, tick)?,
            Record::Candle(bar) => serde_json::to_writer(&mut writer, bar)?,
        }
        writeln!(writer)?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "ndjson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ducat_types::{Decimal, Tick};

    fn create_test_tick() -> Record {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
        Record::Tick(Tick::new(
            timestamp,
            Decimal::new(110_010, 5),
            Decimal::new(110_000, 5),
            Decimal::from(100),
            Decimal::from(200),
        ))
    }

    #[test]
    fn test_ndjson() {
        let formatter = JsonFormatter::new();
        let mut output = Vec::new();
        formatter.write_header(RecordKind::Tick, &mut output).unwrap();
        assert!(output.is_empty());

        formatter.write_record(&create_test_tick(), &mut output).unwrap();
        formatter.write_record(&create_test_tick(), &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        let lines: Vec<_> = result.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["ask"], "1.10010");
        assert_eq!(value["bid_volume"], "200");
    }
}
