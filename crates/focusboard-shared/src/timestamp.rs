//! Serde adapters for task timestamps.
//!
//! Written as RFC 3339. Read leniently: RFC 3339 with an offset, or a
//! zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` which is taken as UTC.

use chrono::{
  DateTime,
  NaiveDateTime,
  SecondsFormat,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serializer
};

const NAIVE_FORMATS: [&str; 2] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f"
];

pub fn parse(
  raw: &str
) -> Result<DateTime<Utc>, String> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for fmt in NAIVE_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        raw, fmt
      )
    {
      return Ok(ndt.and_utc());
    }
  }

  Err(format!(
    "invalid timestamp: {raw}"
  ))
}

pub fn format(
  dt: &DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::AutoSi,
    true
  )
}

pub fn serialize<S>(
  dt: &DateTime<Utc>,
  serializer: S
) -> Result<S::Ok, S::Error>
where
  S: Serializer
{
  serializer.serialize_str(&format(dt))
}

pub fn deserialize<'de, D>(
  deserializer: D
) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>
{
  let raw =
    String::deserialize(deserializer)?;
  parse(&raw)
    .map_err(serde::de::Error::custom)
}

pub mod option {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &Option<DateTime<Utc>>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match dt {
      | Some(value) => {
        super::serialize(
          value, serializer
        )
      }
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<
    Option<DateTime<Utc>>,
    D::Error
  >
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    match opt {
      | Some(raw)
        if raw.trim().is_empty() =>
      {
        Ok(None)
      }
      | Some(raw) => {
        super::parse(&raw)
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
      }
      | None => Ok(None)
    }
  }
}

/// For patch fields where `Some(None)`
/// means "clear".
pub mod double_option {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &Option<Option<DateTime<Utc>>>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match dt {
      | Some(inner) => {
        super::option::serialize(
          inner, serializer
        )
      }
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<
    Option<Option<DateTime<Utc>>>,
    D::Error
  >
  where
    D: Deserializer<'de>
  {
    super::option::deserialize(
      deserializer
    )
    .map(Some)
  }
}
