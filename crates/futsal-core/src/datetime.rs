use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "FUTSAL_TIMEZONE";
pub const DEFAULT_FACILITY_TIMEZONE:
  &str = "Asia/Jakarta";

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A local calendar day: year, month and
/// day, with no time-of-day and no
/// offset. This is the only join key
/// between selected dates and booking
/// dates.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
  #[must_use]
  pub fn from_ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> Option<Self> {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Self)
  }

  #[must_use]
  pub fn from_naive(
    date: NaiveDate
  ) -> Self {
    Self(date)
  }

  /// Takes the year/month/day as seen
  /// on the wall clock of `dt`'s own
  /// zone, never the UTC components.
  #[must_use]
  pub fn from_local<Z: TimeZone>(
    dt: &DateTime<Z>
  ) -> Self {
    Self(dt.date_naive())
  }

  #[must_use]
  pub fn today_in(tz: Tz) -> Self {
    Self::from_local(
      &Utc::now().with_timezone(&tz)
    )
  }

  #[must_use]
  pub fn naive(self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month(self) -> u32 {
    self.0.month()
  }

  #[must_use]
  pub fn day(self) -> u32 {
    self.0.day()
  }

  #[must_use]
  pub fn weekday(self) -> Weekday {
    self.0.weekday()
  }

  #[must_use]
  pub fn key(self) -> String {
    self
      .0
      .format(DAY_KEY_FORMAT)
      .to_string()
  }

  /// Stays on `self` if the result would
  /// leave the supported date range.
  #[must_use]
  pub fn add_days(
    self,
    days: i64
  ) -> Self {
    self.checked_add_days(days).unwrap_or(self)
  }

  #[must_use]
  pub fn checked_add_days(
    self,
    days: i64
  ) -> Option<Self> {
    checked_add_days(self.0, days).map(Self)
  }
}

impl fmt::Display for CalendarDay {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format(DAY_KEY_FORMAT)
    )
  }
}

impl FromStr for CalendarDay {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    NaiveDate::parse_from_str(
      s.trim(),
      DAY_KEY_FORMAT
    )
    .map(Self)
    .map_err(|err| {
      anyhow!(
        "invalid date {s:?} (expected \
         YYYY-MM-DD): {err}"
      )
    })
  }
}

#[must_use]
pub fn to_day_key(
  day: CalendarDay
) -> String {
  day.key()
}

/// Reads a request timestamp. RFC 3339
/// values keep their offset; naive ones
/// and bare dates are taken as UTC.
#[must_use]
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Some(dt.with_timezone(&Utc));
  }

  for format in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Some(ndt.and_utc());
    }
  }

  NaiveDate::parse_from_str(
    trimmed,
    DAY_KEY_FORMAT
  )
  .ok()
  .and_then(|date| date.and_hms_opt(0, 0, 0))
  .map(|ndt| ndt.and_utc())
}

/// Normalizes a booking date as sent by
/// the backend. Timestamps keep the date
/// written in the string; their offset
/// is not applied, so a midnight UTC
/// stamp never slides to the previous
/// day.
#[must_use]
pub fn parse_booking_date(
  raw: &str
) -> Option<CalendarDay> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed,
      DAY_KEY_FORMAT
    )
  {
    return Some(CalendarDay(date));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(CalendarDay(
      dt.date_naive()
    ));
  }

  for format in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Some(CalendarDay(
        ndt.date()
      ));
    }
  }

  NaiveDate::parse_from_str(
    trimmed, "%b %d, %Y"
  )
  .ok()
  .map(CalendarDay)
}

/// Start hour of a slot, from either a
/// `HH:00` value or a `h:00 AM - h:00 PM`
/// range label.
#[must_use]
pub fn hour_of_slot(
  raw: &str
) -> Option<u32> {
  let start = raw.split('-').next()?;
  let (hour, _minute) =
    parse_clock_time(start)?;
  Some(hour)
}

fn clock_regex() -> Option<&'static Regex>
{
  static CLOCK_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
      )
      .ok()
    })
    .as_ref()
}

pub(crate) fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let captures = clock_regex()?
    .captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm_match
      .as_str()
      .to_ascii_lowercase()
      .as_str()
    {
      | "am" => raw_hour % 12,
      | "pm" => raw_hour % 12 + 12,
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  Some((hour, minute))
}

/// Resolves the facility time zone used
/// to decide what "today" is. The env
/// var wins over the configured value.
#[must_use]
pub fn resolve_facility_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_FACILITY_TIMEZONE,
    "DEFAULT_FACILITY_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved facility timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone id"
      );
      None
    }
  }
}

/// Parses a day argument: `today`,
/// `tomorrow`, `yesterday`, a weekday
/// name (next occurrence) or
/// `YYYY-MM-DD`.
pub fn parse_day_expr(
  raw: &str,
  today: CalendarDay
) -> anyhow::Result<CalendarDay> {
  let token =
    raw.trim().to_ascii_lowercase();
  match token.as_str() {
    | "today" | "now" => Ok(today),
    | "tomorrow" => Ok(today.add_days(1)),
    | "yesterday" => {
      Ok(today.add_days(-1))
    }
    | other => {
      if let Some(weekday) =
        parse_weekday_name(other)
      {
        return Ok(CalendarDay(
          next_weekday_date(
            today.naive(),
            weekday
          )
        ));
      }
      other.parse::<CalendarDay>()
    }
  }
}

/// Parses a month argument: `this`,
/// `next`, `prev`, `YYYY-MM` or a month
/// name in `today`'s year.
pub fn parse_month_expr(
  raw: &str,
  today: CalendarDay
) -> anyhow::Result<(i32, u32)> {
  let token =
    raw.trim().to_ascii_lowercase();
  let relative = match token.as_str() {
    | "this" | "now" => Some(0),
    | "next" => Some(1),
    | "prev" | "last" => Some(-1),
    | _ => None
  };
  if let Some(step) = relative {
    let day = shift_months(today, step)
      .ok_or_else(|| {
        anyhow!("month {raw:?} is out of range")
      })?;
    return Ok((day.year(), day.month()));
  }
  if let Some(month) =
    parse_month_name(&token)
  {
    return Ok((today.year(), month));
  }

  let (year, month) = token
    .split_once('-')
    .ok_or_else(|| {
      anyhow!(
        "invalid month {raw:?} \
         (expected YYYY-MM)"
      )
    })?;
  let year =
    year.parse::<i32>().map_err(|err| {
      anyhow!(
        "invalid year in {raw:?}: {err}"
      )
    })?;
  let month =
    month.parse::<u32>().map_err(|err| {
      anyhow!(
        "invalid month in {raw:?}: {err}"
      )
    })?;
  if !(1..=12).contains(&month) {
    return Err(anyhow!(
      "month out of range in {raw:?}"
    ));
  }
  Ok((year, month))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  checked_add_days(from, delta)
    .unwrap_or(from)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Option<CalendarDay> {
  CalendarDay::from_ymd(year, month, 1)
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(0)
}

/// Moves by whole months, clamping the
/// day to the target month's length.
/// `None` past the supported date range.
pub(crate) fn shift_months(
  date: CalendarDay,
  months: i64
) -> Option<CalendarDay> {
  let current = i64::from(date.year())
    .checked_mul(12)?
    .checked_add(i64::from(date.month()) - 1)?;
  let target = current.checked_add(months)?;

  let year =
    i32::try_from(target.div_euclid(12))
      .ok()?;
  let month =
    u32::try_from(target.rem_euclid(12))
      .ok()?
      + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  CalendarDay::from_ymd(year, month, day)
}

pub(crate) fn start_of_week(
  day: CalendarDay,
  week_start: Weekday
) -> CalendarDay {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  day.add_days(-diff)
}

fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  Duration::try_days(days).and_then(
    |delta| date.checked_add_signed(delta)
  )
}
