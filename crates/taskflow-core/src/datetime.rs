use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "TASKFLOW_TIMEZONE";

/// The zone whose calendar decides what
/// "today" is.
#[derive(
  Debug, Clone, Copy, PartialEq, Default,
)]
pub enum Zone {
  #[default]
  Local,
  Named(Tz)
}

impl Zone {
  /// The environment variable wins over
  /// the configured value. A bad env
  /// value is logged and skipped; a bad
  /// configured value is an error.
  #[tracing::instrument]
  pub fn resolve(
    configured: Option<&str>
  ) -> anyhow::Result<Self> {
    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) = parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
    {
      return Ok(Zone::Named(tz));
    }

    match configured {
      | Some(raw)
        if !raw.trim().is_empty() =>
      {
        let tz = parse_timezone(
          raw, "config"
        )
        .ok_or_else(|| {
          anyhow!(
            "invalid timezone in \
             config: {raw}"
          )
        })?;
        Ok(Zone::Named(tz))
      }
      | _ => Ok(Zone::Local)
    }
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Zone::Local => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | Zone::Named(tz) => {
        now.with_timezone(tz).date_naive()
      }
    }
  }
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
        "using configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Display form for due dates, e.g.
/// `16 Oct`.
#[must_use]
pub fn format_due_date(
  date: NaiveDate
) -> String {
  date.format("%d %b").to_string()
}

/// Parses a due-date expression relative
/// to `today`. An empty input (or `none`)
/// clears the due date.
pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>> {
  let token = input.trim();
  let lower = token.to_lowercase();

  match lower.as_str() {
    | "" | "none" => return Ok(None),
    | "today" => return Ok(Some(today)),
    | "tomorrow" => {
      return shift(today, 1).map(Some);
    }
    | "yesterday" => {
      return shift(today, -1).map(Some);
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(Some(date));
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(Some(next_weekday_date(
      today, weekday
    )));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => num * 7,
      | _ => num
    };
    let signed = match caps
      .name("sign")
      .map(|m| m.as_str())
    {
      | Some("-") => -days,
      | _ => days
    };
    return shift(today, signed)
      .map(Some);
  }

  Err(anyhow!(
    "unrecognized due date: {input}"
  ))
  .with_context(|| {
    "supported formats: YYYY-MM-DD, \
     today/tomorrow/yesterday, weekday \
     names (e.g. friday), +Nd/-Nd, \
     +Nw/-Nw, or empty to clear"
  })
}

fn shift(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {date} \
         shifted by {days} days"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
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
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
