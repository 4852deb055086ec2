//! Seven-byte wall-clock timestamps: `year:2 LE, month, day, hour, minute, second`

use bytes::{BufMut, BytesMut};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};

use crate::error::{ProtocolError, Result};

/// Encoded size of a timestamp
pub(crate) const TIMESTAMP_LEN: usize = 7;

fn read_naive(bytes: &[u8]) -> Result<NaiveDateTime> {
    if bytes.len() < TIMESTAMP_LEN {
        return Err(ProtocolError::TooShort {
            need: TIMESTAMP_LEN,
            got: bytes.len(),
        });
    }
    let year = u16::from_le_bytes([bytes[0], bytes[1]]);
    let (month, day, hour, minute, second) = (bytes[2], bytes[3], bytes[4], bytes[5], bytes[6]);

    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|d| d.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .ok_or(ProtocolError::InvalidTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
}

/// Timestamp stored in UTC
pub(crate) fn read_utc(bytes: &[u8]) -> Result<DateTime<Utc>> {
    read_naive(bytes).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Wall-clock timestamp at a fixed offset given in minutes
pub(crate) fn read_local(bytes: &[u8], offset_minutes: i16) -> Result<DateTime<FixedOffset>> {
    let naive = read_naive(bytes)?;
    let invalid = || ProtocolError::InvalidTimestamp {
        year: u16::from_le_bytes([bytes[0], bytes[1]]),
        month: bytes[2],
        day: bytes[3],
        hour: bytes[4],
        minute: bytes[5],
        second: bytes[6],
    };
    let offset = FixedOffset::east_opt(i32::from(offset_minutes) * 60).ok_or_else(invalid)?;
    offset.from_local_datetime(&naive).single().ok_or_else(invalid)
}

/// Append a timestamp; years outside `u16` are clamped
pub(crate) fn put_timestamp<T: Datelike + Timelike>(buf: &mut BytesMut, t: &T) {
    let year = u16::try_from(t.year().max(0)).unwrap_or(u16::MAX);
    buf.put_u16_le(year);
    // chrono guarantees these ranges
    buf.put_u8(t.month() as u8);
    buf.put_u8(t.day() as u8);
    buf.put_u8(t.hour() as u8);
    buf.put_u8(t.minute() as u8);
    buf.put_u8(t.second() as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_utc() {
        let t = read_utc(&[0xE4, 0x07, 3, 14, 15, 9, 26]).unwrap();
        assert_eq!(t.to_rfc3339(), "2020-03-14T15:09:26+00:00");
    }

    #[test]
    fn test_read_local_applies_minute_offset() {
        let t = read_local(&[0xE4, 0x07, 3, 14, 15, 9, 26], 60).unwrap();
        assert_eq!(t.to_rfc3339(), "2020-03-14T15:09:26+01:00");
        assert_eq!(t.with_timezone(&Utc).hour(), 14);

        let t = read_local(&[0xE4, 0x07, 3, 14, 15, 9, 26], -330).unwrap();
        assert_eq!(t.offset().local_minus_utc(), -330 * 60);
    }

    #[test]
    fn test_impossible_date_is_an_error() {
        let err = read_utc(&[0xE4, 0x07, 2, 30, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTimestamp { month: 2, day: 30, .. }));
        assert!(read_utc(&[0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_short_input() {
        assert!(matches!(
            read_utc(&[0xE4, 0x07, 1]),
            Err(ProtocolError::TooShort { need: 7, got: 3 })
        ));
    }

    #[test]
    fn test_put_timestamp() {
        let t = Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 58).unwrap();
        let mut buf = BytesMut::new();
        put_timestamp(&mut buf, &t);
        assert_eq!(&buf[..], &[0xE5, 0x07, 12, 31, 23, 59, 58]);
        assert_eq!(read_utc(&buf).unwrap(), t);
    }
}
