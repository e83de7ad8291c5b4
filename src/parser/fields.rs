//! Field-level extraction from survey cell text
//!
//! Each function takes already-collected cell text and returns `None` when
//! the value is missing or unparsable, so a bad field never fails a row.

use crate::parser::record::{DegreeLevel, Decision};
use chrono::NaiveDate;

/// Date format used by the survey, e.g. `10 Mar 2021`
const DATE_FORMAT: &str = "%d %b %Y";

/// Collapses runs of whitespace (including CR/LF) into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims text and maps empty strings to `None`
pub fn non_empty(text: &str) -> Option<String> {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Decision cell summary line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionLine {
    pub decision: Option<Decision>,
    pub medium: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Splits `"<decision> via <medium> on <date>"`
///
/// The ` on ` separator is taken from the right so decisions containing the
/// word still parse; either separator may be missing.
pub fn parse_decision_line(text: &str) -> DecisionLine {
    let text = collapse_whitespace(text);

    let (head, date) = match text.rfind(" on ") {
        Some(i) => (&text[..i], parse_date(&text[i + 4..])),
        None => (text.as_str(), None),
    };

    let (decision, medium) = match head.find(" via ") {
        Some(i) => (&head[..i], non_empty(&head[i + 5..])),
        None => (head, None),
    };

    DecisionLine {
        decision: Decision::from_text(decision),
        medium,
        date,
    }
}

/// Program cell split into its parts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInfo {
    pub program: Option<String>,
    pub degree: Option<DegreeLevel>,
    pub season: Option<String>,
}

/// Splits `"<program>, <degree> (<season>)"`
///
/// The trailing part is only treated as degree information when it names a
/// known degree or carries a parenthesised season; otherwise the whole text
/// is the program name.
pub fn parse_program(text: &str) -> ProgramInfo {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return ProgramInfo::default();
    }

    let Some(i) = text.rfind(", ") else {
        return ProgramInfo {
            program: Some(text),
            ..ProgramInfo::default()
        };
    };

    let (name, tail) = (text[..i].trim(), text[i + 2..].trim());
    let (degree_text, season) = match (tail.rfind('('), tail.ends_with(')')) {
        (Some(open), true) => (tail[..open].trim(), non_empty(&tail[open + 1..tail.len() - 1])),
        _ => (tail, None),
    };

    let degree = DegreeLevel::recognize(degree_text).or_else(|| {
        season
            .as_ref()
            .and_then(|_| non_empty(degree_text))
            .map(DegreeLevel::Other)
    });

    if degree.is_none() && season.is_none() {
        return ProgramInfo {
            program: Some(text),
            ..ProgramInfo::default()
        };
    }

    ProgramInfo {
        program: non_empty(name),
        degree,
        season,
    }
}

/// Applicant statistics from the decision cell popup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicantStats {
    pub gpa: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_writing: Option<f64>,
    pub gre_subject: Option<String>,
}

/// Interprets `(label, value)` pairs such as `("Undergrad GPA", "3.06")`
pub fn parse_stats(pairs: &[(String, String)]) -> ApplicantStats {
    let mut stats = ApplicantStats::default();

    for (label, value) in pairs {
        let label = label.to_ascii_lowercase();
        if label.contains("gpa") {
            stats.gpa = parse_score(value);
        } else if label.starts_with("gre general") {
            let mut parts = value.split('/');
            stats.gre_verbal = parts.next().and_then(parse_score);
            stats.gre_quant = parts.next().and_then(parse_score);
            stats.gre_writing = parts.next().and_then(parse_score);
        } else if label.starts_with("gre subject") {
            stats.gre_subject = non_empty(value).filter(|v| !is_not_available(v));
        } else {
            tracing::debug!("Ignoring unknown applicant stat '{}'", label);
        }
    }

    stats
}

/// Parses a numeric score; `n/a` and zero both mean unreported
fn parse_score(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || is_not_available(text) {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() > f64::EPSILON)
}

fn is_not_available(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("n/a")
}

/// Extracts the post id from a reply link such as `/result/802698`
pub fn parse_post_id(href: &str) -> Option<u64> {
    let (_, rest) = href.split_once("/result/")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Total results and pages from `Showing 497 results over 20 pages`
///
/// Earlier text that merely contains "Showing" (a comment, say) is passed
/// over; the first occurrence followed by the full phrase wins.
pub fn parse_counts(text: &str) -> Option<(u64, u32)> {
    text.match_indices("Showing")
        .find_map(|(start, _)| counts_at(&text[start..]))
}

fn counts_at(text: &str) -> Option<(u64, u32)> {
    let tokens: Vec<&str> = text.split_whitespace().take(6).collect();
    match tokens.as_slice() {
        ["Showing", results, "results", "over", pages, "pages", ..] => {
            let results = results.replace(',', "").parse().ok()?;
            let pages = pages.replace(',', "").parse().ok()?;
            Some((results, pages))
        }
        _ => None,
    }
}
