use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve the `"auto"` sentinel to the system timezone; pass anything else
/// through unchanged.
pub fn resolve_timezone_name(name: &str) -> String {
    if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    }
}

/// The current year on the local system calendar.
pub fn local_year() -> i32 {
    Local::now().year()
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Interprets the offset-less timestamps written by smbd and syslog.
///
/// Both log formats record wall-clock time without a zone, so every parsed
/// value is localised in `default_tz` and then stored as UTC.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { default_tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name as the default.
    ///
    /// `"auto"` resolves to the system timezone. If the name is not a
    /// recognised IANA timezone, falls back to UTC and logs a warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = resolve_timezone_name(tz_name);
        let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                resolved
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Returns `true` when `tz_name` is a valid IANA timezone name.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }

    /// Localise a naive wall-clock value and convert it to UTC.
    ///
    /// A time that falls into a DST fold resolves to the earlier instant; a
    /// time inside a DST gap does not exist and yields `None`.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        self.default_tz
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parse the smbd debug header form `YYYY/MM/DD HH:MM:SS`.
    ///
    /// Any sub-second part must already be stripped by the caller.
    pub fn parse_samba_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        match NaiveDateTime::parse_from_str(s.trim(), "%Y/%m/%d %H:%M:%S") {
            Ok(naive) => self.localize(&naive),
            Err(e) => {
                debug!("could not parse smbd timestamp \"{}\": {}", s, e);
                None
            }
        }
    }

    /// Parse a syslog prefix `Mon D HH:MM:SS`, which carries no year, by
    /// attaching `year`.
    pub fn parse_syslog_timestamp(&self, s: &str, year: i32) -> Option<DateTime<Utc>> {
        // syslog pads single-digit days with a space ("Sep  9").
        let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let with_year = format!("{} {}", year, normalised);
        match NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S") {
            Ok(naive) => self.localize(&naive),
            Err(e) => {
                debug!("could not parse syslog timestamp \"{}\": {}", s, e);
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────────

    #[test]
    fn test_validate_timezone_valid() {
        assert!(TimezoneHandler::validate_timezone("UTC"));
        assert!(TimezoneHandler::validate_timezone("Europe/Moscow"));
    }

    #[test]
    fn test_validate_timezone_invalid() {
        assert!(!TimezoneHandler::validate_timezone("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_new_invalid_timezone_falls_back_to_utc() {
        let handler = TimezoneHandler::new("Not/AZone");
        assert_eq!(handler.default_tz(), Tz::UTC);
    }

    #[test]
    fn test_default_is_utc() {
        assert_eq!(TimezoneHandler::default().default_tz(), Tz::UTC);
    }

    #[test]
    fn test_resolve_timezone_name_passthrough() {
        assert_eq!(resolve_timezone_name("Asia/Tokyo"), "Asia/Tokyo");
        assert!(!resolve_timezone_name("auto").is_empty());
    }

    // ── parse_samba_timestamp ─────────────────────────────────────────────────

    #[test]
    fn test_parse_samba_timestamp_utc() {
        let handler = TimezoneHandler::default();
        let ts = handler.parse_samba_timestamp("2025/09/09 13:01:08").unwrap();
        assert_eq!(ts, utc(2025, 9, 9, 13, 1, 8));
    }

    #[test]
    fn test_parse_samba_timestamp_localised() {
        let handler = TimezoneHandler::new("Europe/Moscow");
        let ts = handler.parse_samba_timestamp("2025/09/09 13:01:08").unwrap();
        // Moscow is UTC+3 year-round.
        assert_eq!(ts, utc(2025, 9, 9, 10, 1, 8));
    }

    #[test]
    fn test_parse_samba_timestamp_invalid_date() {
        let handler = TimezoneHandler::default();
        assert!(handler.parse_samba_timestamp("2025/13/40 25:61:61").is_none());
        assert!(handler.parse_samba_timestamp("").is_none());
    }

    // ── parse_syslog_timestamp ────────────────────────────────────────────────

    #[test]
    fn test_parse_syslog_timestamp_single_digit_day() {
        let handler = TimezoneHandler::default();
        let ts = handler.parse_syslog_timestamp("Sep  9 13:01:08", 2025).unwrap();
        assert_eq!(ts, utc(2025, 9, 9, 13, 1, 8));
    }

    #[test]
    fn test_parse_syslog_timestamp_two_digit_day() {
        let handler = TimezoneHandler::default();
        let ts = handler.parse_syslog_timestamp("Oct 17 08:30:00", 2026).unwrap();
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts, utc(2026, 10, 17, 8, 30, 0));
    }

    #[test]
    fn test_parse_syslog_timestamp_feb_29_non_leap_year() {
        let handler = TimezoneHandler::default();
        assert!(handler.parse_syslog_timestamp("Feb 29 00:00:00", 2025).is_none());
        assert!(handler.parse_syslog_timestamp("Feb 29 00:00:00", 2024).is_some());
    }

    #[test]
    fn test_local_year_is_plausible() {
        let year = local_year();
        assert!(year >= 2024);
        assert!((Utc::now().year() - year).abs() <= 1);
    }
}
