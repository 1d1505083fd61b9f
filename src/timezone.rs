use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;

/// Zone applied whenever a stored or submitted zone name is unknown.
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// Lookup table from IANA zone name to a fixed UTC offset.
///
/// The product is Russia-only and every listed zone has observed a fixed
/// offset since 2014, so no tzdata rules are consulted. Unknown names are
/// coerced to [`DEFAULT_TIMEZONE`] rather than rejected.
#[derive(Debug, Clone)]
pub struct TimezoneTable {
    zones: HashMap<String, FixedOffset>,
    default_zone: String,
}

impl TimezoneTable {
    /// Build a table from explicit entries. `default_zone` should be one of
    /// the entries; it is the coercion target for unknown names.
    pub fn new<I, S>(default_zone: &str, zones: I) -> Self
    where
        I: IntoIterator<Item = (S, FixedOffset)>,
        S: Into<String>,
    {
        Self {
            zones: zones.into_iter().map(|(n, o)| (n.into(), o)).collect(),
            default_zone: default_zone.to_string(),
        }
    }

    /// The production allow-list: the eleven Russian zones.
    pub fn russian() -> Self {
        Self::new(
            DEFAULT_TIMEZONE,
            [
                ("Europe/Kaliningrad", hours(2)),
                ("Europe/Moscow", hours(3)),
                ("Europe/Samara", hours(4)),
                ("Asia/Yekaterinburg", hours(5)),
                ("Asia/Omsk", hours(6)),
                ("Asia/Krasnoyarsk", hours(7)),
                ("Asia/Irkutsk", hours(8)),
                ("Asia/Yakutsk", hours(9)),
                ("Asia/Vladivostok", hours(10)),
                ("Asia/Magadan", hours(11)),
                ("Asia/Kamchatka", hours(12)),
            ],
        )
    }

    /// The coercion target for unknown zone names.
    pub fn default_zone(&self) -> &str {
        &self.default_zone
    }

    /// Return `name` if it is in the allow-list, the default zone otherwise.
    pub fn canonicalize<'a>(&'a self, name: &'a str) -> &'a str {
        if self.zones.contains_key(name) {
            name
        } else {
            &self.default_zone
        }
    }

    fn offset(&self, name: &str) -> FixedOffset {
        self.zones
            .get(self.canonicalize(name))
            .copied()
            .unwrap_or_else(|| hours(0))
    }

    /// Render a millisecond UTC instant as local wall-clock time in the
    /// given zone (coerced); format matches the reminder messages.
    pub fn format_ms(&self, timestamp_ms: i64, name: &str) -> String {
        let utc = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or(DateTime::<Utc>::MAX_UTC);
        utc.with_timezone(&self.offset(name))
            .format("%d.%m.%Y %H:%M")
            .to_string()
    }
}

fn hours(h: i32) -> FixedOffset {
    FixedOffset::east_opt(h * 3600).expect("offset within +/-24h")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_zone_is_kept() {
        let table = TimezoneTable::russian();
        assert_eq!(table.canonicalize("Asia/Kamchatka"), "Asia/Kamchatka");
    }

    #[test]
    fn unknown_zone_falls_back_to_default() {
        let table = TimezoneTable::russian();
        assert_eq!(table.canonicalize("Invalid/Zone"), DEFAULT_TIMEZONE);
        assert_eq!(table.canonicalize(""), DEFAULT_TIMEZONE);
    }

    #[test]
    fn formats_in_moscow_time() {
        let table = TimezoneTable::russian();
        // 2024-03-01 12:00:00 UTC == 15:00 in Moscow (+3).
        assert_eq!(
            table.format_ms(1_709_294_400_000, "Europe/Moscow"),
            "01.03.2024 15:00"
        );
    }

    #[test]
    fn unknown_zone_formats_as_default() {
        let table = TimezoneTable::russian();
        assert_eq!(
            table.format_ms(1_709_294_400_000, "America/New_York"),
            "01.03.2024 15:00"
        );
    }

    #[test]
    fn synthetic_table_for_tests() {
        let table = TimezoneTable::new(
            "Test/Base",
            [("Test/Base", hours(0)), ("Test/East", hours(1))],
        );
        assert_eq!(table.canonicalize("Test/East"), "Test/East");
        assert_eq!(table.canonicalize("Test/Unknown"), "Test/Base");
        assert_eq!(table.format_ms(0, "Test/East"), "01.01.1970 01:00");
    }
}
