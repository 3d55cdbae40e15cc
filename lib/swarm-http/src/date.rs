/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use chrono::{DateTime, NaiveDateTime, Utc};

const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format(RFC1123_FORMAT).to_string()
}

/// Parse RFC 1123, RFC 850 or asctime dates.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, RFC1123_FORMAT) {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, RFC850_FORMAT) {
        return Some(dt.and_utc());
    }
    // asctime pads the day with space
    let collapsed = s.split_ascii_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&collapsed, ASCTIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// The value of If-Modified-Since like headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpDateOrRaw {
    Date(DateTime<Utc>),
    Raw(String),
}

impl HttpDateOrRaw {
    pub fn parse(s: &str) -> Self {
        match parse_http_date(s) {
            Some(dt) => HttpDateOrRaw::Date(dt),
            None => HttpDateOrRaw::Raw(s.to_string()),
        }
    }

    pub fn date(&self) -> Option<&DateTime<Utc>> {
        match self {
            HttpDateOrRaw::Date(dt) => Some(dt),
            HttpDateOrRaw::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 784111777;

    #[test]
    fn rfc1123() {
        let dt = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(dt.timestamp(), TS);
        assert_eq!(format_http_date(&dt), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn rfc850() {
        let dt = parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        assert_eq!(dt.timestamp(), TS);
    }

    #[test]
    fn asctime() {
        let dt = parse_http_date("Sun Nov  6 08:49:37 1994").unwrap();
        assert_eq!(dt.timestamp(), TS);
    }

    #[test]
    fn date_or_raw() {
        let v = HttpDateOrRaw::parse("Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(v.date().unwrap().timestamp(), TS);

        let v = HttpDateOrRaw::parse("\"etag-like\"");
        assert_eq!(v, HttpDateOrRaw::Raw("\"etag-like\"".to_string()));
        assert!(v.date().is_none());
    }
}
