//! CSV output format.

use ducat_types::{Record, RecordKind};
use std::io::Write;

use crate::{FormatError, Formatter};

/// CSV formatter.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    /// Field delimiter (default: comma).
    delimiter: char,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvFormatter {
    /// Creates a new CSV formatter with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: ',' }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Creates a tab-separated values (TSV) formatter.
    #[must_use]
    pub const fn tsv() -> Self {
        Self { delimiter: '\t' }
    }
}

impl Formatter for CsvFormatter {
    fn write_header(&self, kind: RecordKind, writer: &mut dyn Write) -> Result<(), FormatError> {
        let d = self.delimiter;
        match kind {
            RecordKind::Tick => {
                writeln!(writer, "timestamp{d}ask{d}bid{d}ask_volume{d}bid_volume")?;
            }
            RecordKind::Candle => {
                writeln!(writer, "timestamp{d}open{d}high{d}low{d}close{d}volume")?;
            }
        }
        Ok(())
    }

    fn write_record(&self, record: &Record, writer: &mut dyn Write) -> Result<(), FormatError> {
        let d = self.delimiter;
        match record {
            Record::Tick(tick) => writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}",
                tick.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                tick.ask,
                tick.bid,
                tick.ask_volume,
                tick.bid_volume
            )?,
            Record::Candle(bar) => writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                bar.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            )?,
        }
        Ok(())
    }

    fn extension(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ducat_types::{Candle, Decimal, Tick, Timeframe};

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

    fn render(formatter: &CsvFormatter, kind: RecordKind, records: &[Record]) -> String {
        let mut output = Vec::new();
        formatter.write_header(kind, &mut output).unwrap();
        for record in records {
            formatter.write_record(record, &mut output).unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_csv_ticks() {
        let result = render(&CsvFormatter::new(), RecordKind::Tick, &[create_test_tick()]);
        assert_eq!(
            result,
            "timestamp,ask,bid,ask_volume,bid_volume\n\
             2024-01-15T12:30:45.000Z,1.10010,1.10000,100,200\n"
        );
    }

    #[test]
    fn test_csv_candles_keep_precision() {
        let candle = Record::Candle(Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            open: Decimal::new(15_120, 2),
            high: Decimal::new(15_130, 2),
            low: Decimal::new(15_100, 2),
            close: Decimal::new(15_110, 2),
            volume: Decimal::new(1_250, 2),
            timeframe: Timeframe::Hour1,
        });
        let result = render(&CsvFormatter::new(), RecordKind::Candle, &[candle]);
        let lines: Vec<_> = result.lines().collect();
        assert_eq!(lines[0], "timestamp,open,high,low,close,volume");
        assert_eq!(lines[1], "2024-01-15T12:00:00Z,151.20,151.30,151.00,151.10,12.50");
    }

    #[test]
    fn test_tsv() {
        let result = render(&CsvFormatter::tsv(), RecordKind::Tick, &[create_test_tick()]);
        assert!(result.starts_with("timestamp\task\tbid"));
        assert_eq!(
            CsvFormatter::new().with_delimiter(';').delimiter,
            ';'
        );
    }
}
