use chrono::{Datelike, NaiveDate};

const ISO_DATE: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` calendar date. Blank strings count as absent.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, ISO_DATE).ok()
}

/// Whole years between `birth` and `release`, counting a year only once the
/// birthday has passed in the release year.
pub fn age_on(birth: NaiveDate, release: NaiveDate) -> i32 {
    let mut age = release.year() - birth.year();
    if (release.month(), release.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Age at release, or `None` when the release date is missing or not a valid ISO date.
pub fn age_at_release(birthdate: NaiveDate, release_date: Option<&str>) -> Option<i32> {
    let release = parse_iso_date(release_date?)?;
    Some(age_on(birthdate, release))
}
