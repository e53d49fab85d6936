//! Conversions between plant wall-clock time and stored UTC instants.
//!
//! Planners and operators think in the plant's local time; the database
//! stores UTC. The plant offset is a fixed UTC offset from configuration.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};

use crate::errors::ServiceError;

/// UTC instant for `date` at `hour`:00 plant time
pub fn local_hour_to_utc(
    date: NaiveDate,
    hour: u32,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, ServiceError> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| {
        ServiceError::InvalidInput(format!("start_hour must be between 0 and 23, got {}", hour))
    })?;
    local_to_utc(date.and_time(time), offset)
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>, ServiceError> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid local time {}", naive)))
}

/// `[start, end)` in UTC covering the plant-local day `day`
pub fn local_day_bounds(
    day: NaiveDate,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    local_days_bounds(day, 1, offset)
}

/// `[start, end)` in UTC covering `days` plant-local days from `first`
pub fn local_days_bounds(
    first: NaiveDate,
    days: i64,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let midnight = first
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid date {}", first)))?;
    let start = local_to_utc(midnight, offset)?;
    Ok((start, start + Duration::days(days)))
}

pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Plant-local weekday (0 = Monday) and hour of a stored instant
pub fn weekday_and_hour(instant: DateTime<Utc>, offset: FixedOffset) -> (u32, u32) {
    let local = instant.with_timezone(&offset);
    (local.weekday().num_days_from_monday(), local.hour())
}

/// Parses an operator-entered timestamp.
///
/// RFC 3339 input carries its own offset. A bare `YYYY-MM-DDTHH:MM[:SS]`
/// (as sent by `datetime-local` inputs) is read as plant time.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ServiceError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ServiceError::ValidationError(format!("Invalid timestamp '{}'", raw)))
        .and_then(|naive| local_to_utc(naive, offset))
}

/// Parses a `YYYY-MM-DD` date
pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(format!("{} must be a date in YYYY-MM-DD format", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn local_hour_is_stored_in_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let start = local_hour_to_utc(date, 22, brt()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 5, 1, 0, 0).unwrap());
        assert_eq!(weekday_and_hour(start, brt()), (0, 22));
    }

    #[test]
    fn hour_out_of_range_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(matches!(
            local_hour_to_utc(date, 24, brt()),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn day_bounds_follow_plant_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let (start, end) = local_day_bounds(day, brt()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 3, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn timestamps_accept_rfc3339_and_local_forms() {
        let rfc = parse_timestamp("2024-03-04T10:00:00Z", brt()).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap());

        let local = parse_timestamp("2024-03-04T07:00", brt()).unwrap();
        assert_eq!(local, rfc);

        assert!(parse_timestamp("yesterday", brt()).is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date("2024-03-04", "start_date").is_ok());
        assert!(matches!(
            parse_date("04/03/2024", "start_date"),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
