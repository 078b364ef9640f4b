//! Author, committer and tagger identities.

use crate::{Result, StorageError};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// A git identity with a timestamp, e.g. `Alice <alice@example.com> 1700000000 +0000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Time of the signature, including the original UTC offset.
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Creates a signature at a given time.
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Creates a signature stamped with the current time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Utc::now().fixed_offset())
    }

    /// Returns the signature time in UTC.
    pub fn time(&self) -> DateTime<Utc> {
        self.when.with_timezone(&Utc)
    }

    /// Encodes the signature in git header form.
    ///
    /// Angle brackets and newlines cannot appear inside a git identity and
    /// are dropped.
    pub fn encode(&self) -> String {
        format!(
            "{} <{}> {} {}",
            clean(&self.name),
            clean(&self.email),
            self.when.timestamp(),
            self.when.format("%z")
        )
    }

    /// Parses a signature from git header form.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || StorageError::InvalidObject(format!("invalid signature: {s}"));

        let open = s.find('<').ok_or_else(invalid)?;
        let close = s[open..].find('>').map(|i| open + i).ok_or_else(invalid)?;
        let name = s[..open].trim_end().to_string();
        let email = s[open + 1..close].to_string();

        let mut rest = s[close + 1..].split_whitespace();
        let seconds: i64 = rest
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        let offset = parse_offset(rest.next().unwrap_or("+0000"))?;
        let when = offset
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(invalid)?;

        Ok(Self { name, email, when })
    }
}

fn clean(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\n' | '\r'))
        .collect()
}

/// Parses a `+hhmm` / `-hhmm` offset.
fn parse_offset(tz: &str) -> Result<FixedOffset> {
    let invalid = || StorageError::InvalidObject(format!("invalid timezone offset: {tz}"));
    if tz.len() != 5 {
        return Err(invalid());
    }
    let sign = match &tz[..1] {
        "+" => 1,
        "-" => -1,
        _ => return Err(invalid()),
    };
    let hours: i32 = tz[1..3].parse().map_err(|_| invalid())?;
    let minutes: i32 = tz[3..5].parse().map_err(|_| invalid())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
