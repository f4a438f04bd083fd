//! Fiscal document numbering: `<prefix><seq:03>/<yy>/<yy+1>`

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Direct olive sale at intake
    Sale,
    BulkExit,
    PomaceExit,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Sale => "VD",
            DocumentKind::BulkExit => "SG",
            DocumentKind::PomaceExit => "SO",
        }
    }
}

/// First calendar year of the campaign a date falls in
pub fn campaign_year(date: NaiveDate, start_month: u32) -> i32 {
    if date.month() >= start_month {
        date.year()
    } else {
        date.year() - 1
    }
}

/// Campaign suffix such as `25/26`
pub fn campaign_suffix(date: NaiveDate, start_month: u32) -> String {
    let year = campaign_year(date, start_month);
    format!("{:02}/{:02}", year.rem_euclid(100), (year + 1).rem_euclid(100))
}

pub fn format_document_number(kind: DocumentKind, sequence: u32, suffix: &str) -> String {
    format!("{}{:03}/{}", kind.prefix(), sequence, suffix)
}

/// Next number for a document kind: count of the campaign's documents + 1,
/// stepping past any number already taken.
pub fn next_document_number<'a, I>(
    kind: DocumentKind,
    date: NaiveDate,
    start_month: u32,
    existing: I,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = campaign_suffix(date, start_month);
    let tail = format!("/{}", suffix);
    let same_campaign: Vec<&str> = existing
        .into_iter()
        .filter(|n| n.starts_with(kind.prefix()) && n.ends_with(&tail))
        .collect();

    let mut sequence = same_campaign.len() as u32 + 1;
    loop {
        let candidate = format_document_number(kind, sequence, &suffix);
        if !same_campaign.contains(&candidate.as_str()) {
            return candidate;
        }
        sequence += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_campaign_boundaries() {
        assert_eq!(campaign_suffix(date(2025, 11, 10), 10), "25/26");
        assert_eq!(campaign_suffix(date(2026, 2, 1), 10), "25/26");
        assert_eq!(campaign_suffix(date(2026, 10, 1), 10), "26/27");
        assert_eq!(campaign_suffix(date(2099, 12, 1), 10), "99/00");
    }

    #[test]
    fn test_first_document() {
        let number = next_document_number(DocumentKind::BulkExit, date(2025, 11, 10), 10, []);
        assert_eq!(number, "SG001/25/26");
    }

    #[test]
    fn test_counts_only_same_kind_and_campaign() {
        let existing = ["SG001/25/26", "SG002/25/26", "SO001/25/26", "SG014/24/25"];
        let number = next_document_number(
            DocumentKind::BulkExit,
            date(2025, 12, 1),
            10,
            existing.iter().copied(),
        );
        assert_eq!(number, "SG003/25/26");
    }

    #[test]
    fn test_skips_taken_numbers_after_gaps() {
        let existing = ["VD002/25/26"];
        let number =
            next_document_number(DocumentKind::Sale, date(2025, 11, 2), 10, existing.iter().copied());
        assert_eq!(number, "VD003/25/26");
    }
}
