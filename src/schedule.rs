//! Picks a publish time inside business hours.

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday,
};

const OPENING_HOUR: u32 = 9;
const CLOSING_HOUR: u32 = 18;

/// Next good publish time for `now`, in local wall-clock time.
///
/// Inside weekday business hours the post goes out in five minutes. Before
/// opening on a weekday it waits for 09:00 the same day; after closing or at
/// the weekend it waits for 09:00 on the next weekday.
pub fn smart_time(now: NaiveDateTime) -> NaiveDateTime {
    let date = now.date();
    if is_weekday(date) {
        let hour = now.hour();
        if (OPENING_HOUR..CLOSING_HOUR).contains(&hour) {
            return now + Duration::minutes(5);
        }
        if hour < OPENING_HOUR {
            return opening(date);
        }
    }
    opening(next_weekday(date))
}

/// [`smart_time`] evaluated against the local clock, returned in UTC.
pub fn smart_time_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local).naive_local();
    let picked = smart_time(local);
    picked
        .and_local_timezone(Local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now)
}

fn opening(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(OPENING_HOUR as i64)
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_weekday(next) {
        next += Duration::days(1);
    }
    next
}
