//! Folder-name parsing for the `YYYY-MM-DD - Title` convention.
//!
//! Photo folders are commonly named after the day they were taken, followed
//! by a short title. When a descriptor is scaffolded for such a folder the
//! album title and date are taken from its name:
//!
//! - `2019-07-14 - Summer at the lake` → date 2019-07-14, title "Summer at the lake"
//! - `2019.07.14 - Summer` → date 2019-07-14, title "Summer"
//! - `Summer` → no date, empty title
//!
//! The separator is exactly `" - "` and must appear once: names with several
//! separators are ambiguous and parse to nothing.

use chrono::NaiveDate;

/// Accepted date spellings in a folder name prefix.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y_%m_%d", "%Y%m%d"];

/// Result of parsing a folder name like `2019-07-14 - Summer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFolder {
    /// Date prefix, if it parsed.
    pub date: Option<NaiveDate>,
    /// Title part after the separator, trimmed. Empty when absent.
    pub title: String,
}

/// Parse a folder name following the `YYYY-MM-DD - Title` convention.
pub fn parse_folder_name(name: &str) -> ParsedFolder {
    let mut parts = name.split(" - ");
    let (Some(prefix), Some(title), None) = (parts.next(), parts.next(), parts.next()) else {
        return ParsedFolder {
            date: None,
            title: String::new(),
        };
    };
    ParsedFolder {
        date: parse_date(prefix.trim()),
        title: title.trim().to_string(),
    }
}

/// Parse a calendar date in any of the accepted spellings.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn dated_folder_with_title() {
        let p = parse_folder_name("2019-07-14 - Summer at the lake");
        assert_eq!(p.date, date(2019, 7, 14));
        assert_eq!(p.title, "Summer at the lake");
    }

    #[test]
    fn dotted_date() {
        let p = parse_folder_name("2019.07.14 - Summer");
        assert_eq!(p.date, date(2019, 7, 14));
        assert_eq!(p.title, "Summer");
    }

    #[test]
    fn compact_date() {
        assert_eq!(parse_date("20190714"), date(2019, 7, 14));
    }

    #[test]
    fn title_is_trimmed() {
        let p = parse_folder_name("2020-01-01 -   New year  ");
        assert_eq!(p.title, "New year");
    }

    #[test]
    fn no_separator() {
        let p = parse_folder_name("Summer");
        assert_eq!(p.date, None);
        assert_eq!(p.title, "");
    }

    #[test]
    fn several_separators_are_ambiguous() {
        let p = parse_folder_name("2019-07-14 - Lake - Day two");
        assert_eq!(p.date, None);
        assert_eq!(p.title, "");
    }

    #[test]
    fn unparseable_date_keeps_title() {
        let p = parse_folder_name("last summer - Lake");
        assert_eq!(p.date, None);
        assert_eq!(p.title, "Lake");
    }

    #[test]
    fn invalid_calendar_date() {
        assert_eq!(parse_date("2019-02-30"), None);
    }
}
