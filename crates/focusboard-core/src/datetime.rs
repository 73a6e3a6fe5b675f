use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use regex::Regex;

/// Parses a due-date expression. Calendar words resolve to midnight UTC.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "" => {
      return Err(anyhow!(
        "due date cannot be empty"
      ));
    }
    | "now" => return Ok(now),
    | "today" => {
      return midnight(now.date_naive());
    }
    | "tomorrow" => {
      return Ok(
        midnight(now.date_naive())?
          + Duration::days(1)
      );
    }
    | "yesterday" => {
      return Ok(
        midnight(now.date_naive())?
          - Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some(offset) =
    parse_offset(&lower)?
  {
    return now
      .checked_add_signed(offset)
      .ok_or_else(|| {
        anyhow!(
          "due date offset out of \
           range: {token}"
        )
      });
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    let today = now.date_naive();
    return midnight(next_weekday_date(
      today, target
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return midnight(date);
  }

  focusboard_shared::timestamp::parse(
    token
  )
  .map_err(|_| {
    anyhow!(
      "unrecognized due date: \
       {token}"
    )
  })
}

/// `in 3d`, `2h ago`, `just now`.
pub fn format_relative(
  target: DateTime<Utc>,
  now: DateTime<Utc>
) -> String {
  let diff = target - now;
  let abs = diff.abs();
  let days = abs.num_days();
  let hours = abs.num_hours();
  let minutes = abs.num_minutes();

  if diff < Duration::zero() {
    if days > 0 {
      format!("{days}d ago")
    } else if hours > 0 {
      format!("{hours}h ago")
    } else if minutes > 0 {
      format!("{minutes}m ago")
    } else {
      "just now".to_string()
    }
  } else if days > 0 {
    format!("in {days}d")
  } else if hours > 0 {
    format!("in {hours}h")
  } else if minutes > 0 {
    format!("in {minutes}m")
  } else {
    "now".to_string()
  }
}

/// `MM:SS` for the Pomodoro countdown.
pub fn format_clock(secs: u32) -> String {
  format!(
    "{:02}:{:02}",
    secs / 60,
    secs % 60
  )
}

fn midnight(
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  date
    .and_hms_opt(0, 0, 0)
    .map(|ndt| ndt.and_utc())
    .ok_or_else(|| {
      anyhow!(
        "failed to construct midnight \
         for {date}"
      )
    })
}

fn parse_offset(
  lower: &str
) -> anyhow::Result<Option<Duration>> {
  let rel_re = Regex::new(
    r"^(?P<sign>[+-])?(?P<num>\d+)(?P<unit>[mhdw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let Some(caps) = rel_re.captures(lower)
  else {
    return Ok(None);
  };

  let amount: i64 = caps["num"]
    .parse()
    .context("invalid offset amount")?;
  let offset = match &caps["unit"] {
    | "m" => Duration::try_minutes(amount),
    | "h" => Duration::try_hours(amount),
    | "d" => Duration::try_days(amount),
    | _ => Duration::try_weeks(amount)
  }
  .ok_or_else(|| {
    anyhow!(
      "offset too large: {lower}"
    )
  })?;
  if caps.name("sign").is_some_and(
    |sign| sign.as_str() == "-"
  ) {
    return Ok(Some(-offset));
  }
  Ok(Some(offset))
}

fn parse_weekday_name(
  lower: &str
) -> Option<Weekday> {
  match lower {
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

/// The next occurrence strictly after
/// `today`.
fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let wanted =
    target.num_days_from_monday() as i64;
  let mut delta =
    (wanted - current).rem_euclid(7);
  if delta == 0 {
    delta = 7;
  }
  today + Duration::days(delta)
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    TimeZone,
    Utc
  };

  use super::{
    format_clock,
    format_relative,
    parse_due_expr
  };

  fn now() -> DateTime<Utc> {
    // A Tuesday.
    Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  fn day(expr: &str) -> String {
    parse_due_expr(expr, now())
      .expect("parse")
      .format("%Y-%m-%d %H:%M")
      .to_string()
  }

  #[test]
  fn parses_calendar_words() {
    assert_eq!(
      day("today"),
      "2026-02-17 00:00"
    );
    assert_eq!(
      day("Tomorrow"),
      "2026-02-18 00:00"
    );
    assert_eq!(
      day("yesterday"),
      "2026-02-16 00:00"
    );
  }

  #[test]
  fn parses_weekday_name_strictly_ahead()
  {
    assert_eq!(
      day("wednesday"),
      "2026-02-18 00:00"
    );
    assert_eq!(
      day("tue"),
      "2026-02-24 00:00"
    );
  }

  #[test]
  fn parses_offsets_and_iso_forms() {
    assert_eq!(
      day("+3d"),
      "2026-02-20 12:00"
    );
    assert_eq!(day("2h"), "2026-02-17 14:00");
    assert_eq!(
      day("2026-03-01"),
      "2026-03-01 00:00"
    );
    assert_eq!(
      day("2026-03-01T09:15:00"),
      "2026-03-01 09:15"
    );
    assert!(
      parse_due_expr("someday", now())
        .is_err()
    );
  }

  #[test]
  fn rejects_offsets_beyond_the_calendar()
  {
    for expr in [
      "+99999999d",
      "9999999999999d",
      "-99999999w",
      "99999999999999999999h"
    ] {
      assert!(
        parse_due_expr(expr, now())
          .is_err(),
        "{expr} should be rejected"
      );
    }
  }

  #[test]
  fn formats_relative_times() {
    let now = now();
    assert_eq!(
      format_relative(
        now + Duration::days(3),
        now
      ),
      "in 3d"
    );
    assert_eq!(
      format_relative(
        now - Duration::hours(2),
        now
      ),
      "2h ago"
    );
    assert_eq!(
      format_relative(
        now - Duration::seconds(20),
        now
      ),
      "just now"
    );
  }

  #[test]
  fn formats_clock() {
    assert_eq!(format_clock(1500), "25:00");
    assert_eq!(format_clock(61), "01:01");
    assert_eq!(format_clock(0), "00:00");
  }
}
