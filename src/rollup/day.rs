use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::prelude::*;

/// Local calendar day resolved to the absolute half-open interval `[start, end)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LocalDay {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LocalDay {
    pub fn new(timezone: Tz, day: NaiveDate) -> Result<Self> {
        let next_day = day.succ_opt().with_context(|| format!("{day} has no next day"))?;
        let start = local_midnight(timezone, day)?;
        let end = local_midnight(timezone, next_day)?;
        Ok(Self { day, start, end })
    }
}

/// Start of the local day as an absolute instant.
///
/// Where the midnight falls into a DST gap, the day starts at the first existing local time.
pub fn local_midnight(timezone: Tz, day: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|hours| {
            timezone.from_local_datetime(&(midnight + TimeDelta::hours(hours))).earliest()
        })
        .map(|instant| instant.with_timezone(&Utc))
        .with_context(|| format!("{day} has no local midnight in {timezone}"))
}

pub fn local_day(timezone: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&timezone).date_naive()
}

/// Days in `[since, until]`, oldest first.
pub fn days_since(since: NaiveDate, until: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    since.iter_days().take_while(move |day| *day <= until)
}

#[cfg(test)]
mod tests {
    use chrono_tz::{America::Santiago, Europe::Amsterdam};

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn winter_day_ok() -> Result {
        let day = LocalDay::new(Amsterdam, date(2025, 12, 20))?;
        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 12, 19, 23, 0, 0).unwrap());
        assert_eq!(day.end - day.start, TimeDelta::hours(24));
        Ok(())
    }

    #[test]
    fn dst_start_day_is_shorter() -> Result {
        let day = LocalDay::new(Amsterdam, date(2025, 3, 30))?;
        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 3, 29, 23, 0, 0).unwrap());
        assert_eq!(day.end, Utc.with_ymd_and_hms(2025, 3, 30, 22, 0, 0).unwrap());
        Ok(())
    }

    #[test]
    fn dst_end_day_is_longer() -> Result {
        let day = LocalDay::new(Amsterdam, date(2025, 10, 26))?;
        assert_eq!(day.end - day.start, TimeDelta::hours(25));
        Ok(())
    }

    #[test]
    fn midnight_in_dst_gap_ok() -> Result {
        assert_eq!(
            local_midnight(Santiago, date(2024, 9, 8))?,
            Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap(),
        );
        Ok(())
    }

    #[test]
    fn local_day_ok() {
        let instant = Utc.with_ymd_and_hms(2025, 12, 19, 23, 30, 0).unwrap();
        assert_eq!(local_day(Amsterdam, instant), date(2025, 12, 20));
    }

    #[test]
    fn days_since_ok() {
        let days: Vec<_> = days_since(date(2025, 12, 20), date(2025, 12, 22)).collect();
        assert_eq!(days, [date(2025, 12, 20), date(2025, 12, 21), date(2025, 12, 22)]);
        assert_eq!(days_since(date(2025, 12, 22), date(2025, 12, 22)).count(), 1);
        assert_eq!(days_since(date(2025, 12, 23), date(2025, 12, 22)).count(), 0);
    }
}
