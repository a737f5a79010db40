//! Binary record parsing from the bi5 format.

use byteorder::{BigEndian, ByteOrder};
use ducat_types::{RawCandle, RawTick};
use thiserror::Error;

/// Errors that can occur during record parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid data length (not a multiple of the record size).
    #[error("Invalid data length: {0} bytes (expected multiple of {1})")]
    InvalidLength(usize, usize),
}

/// Parses raw ticks from decompressed bi5 data.
///
/// The bi5 format stores ticks as 20 bytes in big-endian order:
/// - `u32`: milliseconds offset from hour start (bytes 0-3)
/// - `u32`: ask price raw (bytes 4-7)
/// - `u32`: bid price raw (bytes 8-11)
/// - `f32`: ask volume (bytes 12-15)
/// - `f32`: bid volume (bytes 16-19)
///
/// # Errors
///
/// Returns an error if the data length is invalid.
pub fn parse_ticks(data: &[u8]) -> Result<impl Iterator<Item = RawTick> + '_, ParseError> {
    if !data.len().is_multiple_of(RawTick::SIZE) {
        return Err(ParseError::InvalidLength(data.len(), RawTick::SIZE));
    }

    Ok(data.chunks_exact(RawTick::SIZE).map(parse_single_tick))
}

/// Parses raw one-minute candles from a decompressed native candle file.
///
/// Each record is 24 bytes: `u32` seconds offset, then `u32` open, close,
/// low and high, then an `f32` volume.
///
/// # Errors
///
/// Returns an error if the data length is invalid.
pub fn parse_candles(data: &[u8]) -> Result<impl Iterator<Item = RawCandle> + '_, ParseError> {
    if !data.len().is_multiple_of(RawCandle::SIZE) {
        return Err(ParseError::InvalidLength(data.len(), RawCandle::SIZE));
    }

    Ok(data.chunks_exact(RawCandle::SIZE).map(|chunk| RawCandle {
        sec_offset: BigEndian::read_u32(&chunk[0..4]),
        open_raw: BigEndian::read_u32(&chunk[4..8]),
        close_raw: BigEndian::read_u32(&chunk[8..12]),
        low_raw: BigEndian::read_u32(&chunk[12..16]),
        high_raw: BigEndian::read_u32(&chunk[16..20]),
        volume: BigEndian::read_f32(&chunk[20..24]),
    }))
}

/// Parses a single tick from a 20-byte chunk.
#[inline]
fn parse_single_tick(data: &[u8]) -> RawTick {
    RawTick::new(
        BigEndian::read_u32(&data[0..4]),
        BigEndian::read_u32(&data[4..8]),
        BigEndian::read_u32(&data[8..12]),
        BigEndian::read_f32(&data[12..16]),
        BigEndian::read_f32(&data[16..20]),
    )
}
