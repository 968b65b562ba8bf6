// ABOUTME: Mapping conventions shared by all adapters when filling the canonical schema
// ABOUTME: Degradation defaults, substitution classification, and Untis-style date/time parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Canonical-Schema Mapping Conventions
//!
//! Adapters degrade unknown or missing upstream fields to the defaults here
//! instead of failing a category. The substitution classifier is a deliberate
//! substring heuristic over vendor vocabulary; exact terminology differs per
//! platform and tightening the match would misclassify more, not less.

use crate::models::SubstitutionType;

/// Subject fallback when a platform omits the subject entirely
pub const DEFAULT_SUBJECT: &str = "Unbekannt";
/// Start-time fallback for lessons without usable time information
pub const DEFAULT_START_TIME: &str = "08:00";
/// End-time fallback, one standard 45-minute period after the default start
pub const DEFAULT_END_TIME: &str = "08:45";

/// Classify a platform's textual substitution status onto the canonical vocabulary
///
/// Case-insensitive substring match against known German and English vendor
/// terms; anything unmatched is [`SubstitutionType::Other`].
#[must_use]
pub fn classify_substitution(raw: &str) -> SubstitutionType {
    let text = raw.to_lowercase();
    if text.contains("entfall")
        || text.contains("ausfall")
        || text.contains("frei")
        || text.contains("cancel")
    {
        SubstitutionType::Cancelled
    } else if text.contains("vertret") || text.contains("subst") {
        SubstitutionType::Substituted
    } else if text.contains("raum") || text.contains("room") {
        SubstitutionType::RoomChange
    } else {
        SubstitutionType::Other
    }
}

/// Convert an Untis-style integer clock value (`755`, `1310`) to "HH:MM"
///
/// Out-of-range values fall back to [`DEFAULT_START_TIME`].
#[must_use]
pub fn untis_time(value: u32) -> String {
    let hours = value / 100;
    let minutes = value % 100;
    if hours > 23 || minutes > 59 {
        return DEFAULT_START_TIME.to_owned();
    }
    format!("{hours:02}:{minutes:02}")
}

/// Convert an Untis-style integer date (`20260302`) to "YYYY-MM-DD"
#[must_use]
pub fn untis_date(value: u32) -> String {
    let year = value / 10_000;
    let month = (value / 100) % 100;
    let day = value % 100;
    format!("{year:04}-{month:02}-{day:02}")
}

/// ISO weekday (1 = Monday) for a "YYYY-MM-DD" date, clamped to the school week
///
/// Weekend dates and unparseable input map to 1; callers that care filter
/// weekend entries before mapping.
#[must_use]
pub fn school_day_of_week(date: &str) -> u8 {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| {
            let weekday = d.format("%u").to_string().parse::<u8>().unwrap_or(1);
            if weekday > 5 {
                1
            } else {
                weekday
            }
        })
        .unwrap_or(1)
}

/// Unix timestamp (seconds) to "YYYY-MM-DD", empty input degrades to epoch day
#[must_use]
pub fn date_from_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_german_vocabulary() {
        assert_eq!(classify_substitution("Entfall"), SubstitutionType::Cancelled);
        assert_eq!(
            classify_substitution("Stunde fällt aus (Ausfall)"),
            SubstitutionType::Cancelled
        );
        assert_eq!(
            classify_substitution("Vertretung"),
            SubstitutionType::Substituted
        );
        assert_eq!(
            classify_substitution("Raumänderung"),
            SubstitutionType::RoomChange
        );
        assert_eq!(classify_substitution("Klausur"), SubstitutionType::Other);
        assert_eq!(classify_substitution(""), SubstitutionType::Other);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify_substitution("ENTFALL"), SubstitutionType::Cancelled);
        assert_eq!(
            classify_substitution("room change"),
            SubstitutionType::RoomChange
        );
    }

    #[test]
    fn test_untis_time_conversion() {
        assert_eq!(untis_time(755), "07:55");
        assert_eq!(untis_time(1310), "13:10");
        assert_eq!(untis_time(0), "00:00");
        // 99:99 is not a clock value
        assert_eq!(untis_time(9999), DEFAULT_START_TIME);
    }

    #[test]
    fn test_untis_date_conversion() {
        assert_eq!(untis_date(20_260_302), "2026-03-02");
    }

    #[test]
    fn test_school_day_of_week() {
        // 2026-03-02 is a Monday
        assert_eq!(school_day_of_week("2026-03-02"), 1);
        assert_eq!(school_day_of_week("2026-03-06"), 5);
        // Saturday clamps into the school week
        assert_eq!(school_day_of_week("2026-03-07"), 1);
        assert_eq!(school_day_of_week("not a date"), 1);
    }
}
