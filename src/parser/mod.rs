//! Survey results page parser
//!
//! Extracts [`AdmissionRecord`]s from a fetched results page. The expected
//! layout is a `.submission-table` whose result rows carry a `row*` class
//! and six cells:
//!
//! | # | Cell |
//! |---|------|
//! | 0 | institution |
//! | 1 | `<program>, <degree> (<season>)` |
//! | 2 | `<decision> via <medium> on <date>` plus an optional stats popup |
//! | 3 | applicant status code |
//! | 4 | post date |
//! | 5 | comment with a `/result/<id>` reply link |
//!
//! Parsing is pure: the same page always yields the same records.

mod fields;
mod record;

pub use fields::{parse_decision_line, parse_program, parse_stats, ApplicantStats};
pub use record::{AdmissionRecord, ApplicantStatus, Decision, DegreeLevel};

use crate::crawler::RawPage;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;

/// Number of cells in a result row
pub const NUM_COLUMNS: usize = 6;

/// Length of the body excerpt carried by structure errors
const SNIPPET_LEN: usize = 200;

/// Errors raised when a page cannot be interpreted at all
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unrecognized page structure for seed '{seed}' at {url}: {snippet}")]
    UnrecognizedStructure {
        seed: String,
        url: String,
        snippet: String,
    },

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// "Showing N results over P pages"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCounts {
    pub results: u64,
    pub pages: u32,
}

/// Everything extracted from one results page
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub records: Vec<AdmissionRecord>,
    pub counts: Option<ResultCounts>,
    /// Rows dropped because they did not have the expected cell count
    pub skipped_rows: usize,
}

/// Parses a fetched results page
///
/// # Returns
///
/// * `Ok(ParsedPage)` - possibly with no records when the search matched nothing
/// * `Err(ParseError::UnrecognizedStructure)` - the results table is missing
///
/// # Example
///
/// ```no_run
/// use gradcafe_scraper::crawler::RawPage;
/// use gradcafe_scraper::parse_page;
///
/// # fn demo(page: RawPage) {
/// let parsed = parse_page(&page).unwrap();
/// println!("{} records", parsed.records.len());
/// # }
/// ```
pub fn parse_page(page: &RawPage) -> Result<ParsedPage, ParseError> {
    let document = Html::parse_document(&page.body);
    let table_selector = css(".submission-table")?;
    let link_selector = css("a[href]")?;
    let span_selector = css("span")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Err(ParseError::UnrecognizedStructure {
            seed: page.seed.to_string(),
            url: page.url.to_string(),
            snippet: snippet(&page.body),
        });
    };

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for (row_num, row) in result_rows(table).enumerate() {
        let cells: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .collect();

        if cells.len() != NUM_COLUMNS {
            tracing::warn!(
                "Skipping row #{} on {} with {} columns (expected {})",
                row_num + 1,
                page.url,
                cells.len(),
                NUM_COLUMNS
            );
            skipped_rows += 1;
            continue;
        }

        records.push(parse_row(
            &cells,
            &link_selector,
            &span_selector,
            page.url.as_str(),
        ));
    }

    let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");
    let counts = fields::parse_counts(&page_text)
        .map(|(results, pages)| ResultCounts { results, pages });

    tracing::debug!(
        "Parsed {} records from {} ({} rows skipped, counts: {:?})",
        records.len(),
        page.url,
        skipped_rows,
        counts
    );

    Ok(ParsedPage {
        records,
        counts,
        skipped_rows,
    })
}

fn css(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Table rows whose class list has an entry starting with `row`
fn result_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .filter(|el| el.value().classes().any(|class| class.starts_with("row")))
}

fn parse_row(
    cells: &[ElementRef],
    link_selector: &Selector,
    span_selector: &Selector,
    source_url: &str,
) -> AdmissionRecord {
    let institution = fields::non_empty(&element_text(cells[0]));
    let program = fields::parse_program(&element_text(cells[1]));
    let decision = fields::parse_decision_line(&direct_text(cells[2], true));
    let stats = cells[2]
        .select(span_selector)
        .next()
        .map(|span| fields::parse_stats(&stat_pairs(span)))
        .unwrap_or_default();
    let applicant_status = ApplicantStatus::from_code(&element_text(cells[3]));
    let posted_on = fields::parse_date(&element_text(cells[4]));
    let comment = fields::non_empty(&direct_text(cells[5], false));
    let post_id = cells[5]
        .select(link_selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(fields::parse_post_id);

    let natural_key = AdmissionRecord::derive_natural_key(
        post_id,
        institution.as_deref(),
        program.program.as_deref(),
        decision.decision.as_ref(),
        decision.date,
        posted_on,
        comment.as_deref(),
    );

    AdmissionRecord {
        natural_key,
        post_id,
        institution,
        program: program.program,
        degree: program.degree,
        season: program.season,
        decision: decision.decision,
        decision_medium: decision.medium,
        decision_date: decision.date,
        applicant_status,
        posted_on,
        comment,
        gpa: stats.gpa,
        gre_verbal: stats.gre_verbal,
        gre_quant: stats.gre_quant,
        gre_writing: stats.gre_writing,
        gre_subject: stats.gre_subject,
        source_url: source_url.to_string(),
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Text of the element's own text nodes, optionally including direct
/// `<strong>` children (the survey sometimes bolds the decision)
fn direct_text(el: ElementRef, include_strong: bool) -> String {
    let mut parts = Vec::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                parts.push(text.to_string());
            }
            Node::Element(element) if include_strong && element.name() == "strong" => {
                if let Some(strong) = ElementRef::wrap(child) {
                    parts.push(element_text(strong));
                }
            }
            _ => {}
        }
    }
    fields::collapse_whitespace(&parts.join(" ").replace("\r\n", " "))
}

/// Splits the stats popup into `(label, value)` pairs
///
/// The popup is a run of `<strong>Label</strong>: value<br/>` groups.
fn stat_pairs(span: ElementRef) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut label = String::new();
    let mut value = String::new();

    let mut flush = |label: &mut String, value: &mut String| {
        if !label.trim().is_empty() {
            pairs.push((label.trim().to_string(), value.trim().to_string()));
        }
        label.clear();
        value.clear();
    };

    for child in span.children() {
        match child.value() {
            Node::Element(element) if element.name() == "br" => flush(&mut label, &mut value),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    label.push_str(&element_text(el));
                }
            }
            Node::Text(text) => {
                let text: &str = text;
                let text = match text.split_once(": ") {
                    Some((_, after)) => after,
                    None => text.trim_start_matches(':'),
                };
                value.push_str(text);
            }
            _ => {}
        }
    }
    flush(&mut label, &mut value);

    pairs
}

fn snippet(body: &str) -> String {
    fields::collapse_whitespace(body)
        .chars()
        .take(SNIPPET_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::Seed;
    use chrono::{NaiveDate, Utc};
    use url::Url;

    const SAMPLE_ROW: &str = r##"
<tr class="row0">
  <td class="instcol">Carnegie Mellon University (CMU)</td>
  <td class="">Software Engineering (MSE-SS), Masters (F21)</td>
  <td class="">
    Wait listed via E-mail on 10 Mar 2021
    <a class="extinfo" href="#">
      <span>
        <strong>Undergrad GPA</strong>: 3.06<br/>
        <strong>GRE General (V/Q/W)</strong>: 153/169/3.00<br/>
        <strong>GRE Subject</strong>: n/a<br/>
      </span>
      &diams;
    </a>
  </td>
  <td class="">I</td>
  <td class="datecol">10 Mar 2021</td>
  <td class="">
    Did anyone get the status of this program?
    <div class="text-end">
      <a class="text-danger controlspam me-2" href="javascript:vote(802698);">report spam</a>
      <a href="/result/802698">reply</a>
    </div>
  </td>
</tr>"##;

    fn page(body: String) -> RawPage {
        RawPage {
            seed: Seed::Query("cmu".to_string()),
            url: Url::parse("https://thegradcafe.com/survey/index.php?q=cmu").unwrap(),
            status: 200,
            fetched_at: Utc::now(),
            body,
        }
    }

    fn table(rows: &str, footer: &str) -> String {
        format!(
            r#"<html><body>
            <table class="table submission-table"><tbody>{}</tbody></table>
            <div class="col-auto align-self-center pe-3">{}</div>
            </body></html>"#,
            rows, footer
        )
    }

    #[test]
    fn test_parse_full_row() {
        let parsed = parse_page(&page(table(
            SAMPLE_ROW,
            "Showing <strong>497</strong> results over <strong>20</strong> pages",
        )))
        .unwrap();

        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.natural_key, "gradcafe:802698");
        assert_eq!(record.post_id, Some(802698));
        assert_eq!(
            record.institution.as_deref(),
            Some("Carnegie Mellon University (CMU)")
        );
        assert_eq!(record.program.as_deref(), Some("Software Engineering (MSE-SS)"));
        assert_eq!(record.degree, Some(DegreeLevel::Masters));
        assert_eq!(record.season.as_deref(), Some("F21"));
        assert_eq!(record.decision, Some(Decision::WaitListed));
        assert_eq!(record.decision_medium.as_deref(), Some("E-mail"));
        assert_eq!(record.decision_date, NaiveDate::from_ymd_opt(2021, 3, 10));
        assert_eq!(record.applicant_status, Some(ApplicantStatus::International));
        assert_eq!(record.posted_on, NaiveDate::from_ymd_opt(2021, 3, 10));
        assert_eq!(
            record.comment.as_deref(),
            Some("Did anyone get the status of this program?")
        );
        assert_eq!(record.gpa, Some(3.06));
        assert_eq!(record.gre_verbal, Some(153.0));
        assert_eq!(record.gre_quant, Some(169.0));
        assert_eq!(record.gre_writing, Some(3.0));
        assert_eq!(record.gre_subject, None);

        assert_eq!(
            parsed.counts,
            Some(ResultCounts {
                results: 497,
                pages: 20
            })
        );
    }

    #[test]
    fn test_counts_found_after_comment_mentioning_showing() {
        let row = SAMPLE_ROW.replace(
            "Did anyone get the status of this program?",
            "Showing my stats below",
        );
        let parsed = parse_page(&page(table(
            &row,
            "Showing <strong>497</strong> results over <strong>20</strong> pages",
        )))
        .unwrap();

        assert_eq!(parsed.records[0].comment.as_deref(), Some("Showing my stats below"));
        assert_eq!(
            parsed.counts,
            Some(ResultCounts {
                results: 497,
                pages: 20
            })
        );
    }

    #[test]
    fn test_missing_optional_fields_are_unknown() {
        let row = r#"
<tr class="row1">
  <td class="instcol">MIT</td>
  <td></td>
  <td><strong>Accepted</strong></td>
  <td></td>
  <td>not a date</td>
  <td></td>
</tr>"#;
        let parsed = parse_page(&page(table(row, ""))).unwrap();
        assert_eq!(parsed.records.len(), 1);

        let record = &parsed.records[0];
        assert!(record.natural_key.starts_with("sha256:"));
        assert_eq!(record.institution.as_deref(), Some("MIT"));
        assert_eq!(record.program, None);
        assert_eq!(record.decision, Some(Decision::Accepted));
        assert_eq!(record.decision_date, None);
        assert_eq!(record.applicant_status, None);
        assert_eq!(record.posted_on, None);
        assert_eq!(record.comment, None);
        assert_eq!(record.gpa, None);
        assert_eq!(parsed.counts, None);
    }

    #[test]
    fn test_rows_with_wrong_column_count_are_skipped() {
        let rows = format!(
            r#"{}<tr class="row1"><td>only</td><td>two</td></tr>"#,
            SAMPLE_ROW
        );
        let parsed = parse_page(&page(table(&rows, ""))).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped_rows, 1);
    }

    #[test]
    fn test_non_result_rows_are_ignored() {
        let rows = format!(
            r#"<tr class="header"><td>a</td><td>b</td></tr>{}"#,
            SAMPLE_ROW
        );
        let parsed = parse_page(&page(table(&rows, ""))).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped_rows, 0);
    }

    #[test]
    fn test_empty_table_is_no_results() {
        let parsed = parse_page(&page(table("", "Showing 0 results over 0 pages"))).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(
            parsed.counts,
            Some(ResultCounts {
                results: 0,
                pages: 0
            })
        );
    }

    #[test]
    fn test_unrecognized_structure() {
        let body = "<html><body><h1>Service   temporarily\n unavailable</h1></body></html>";
        let err = parse_page(&page(body.to_string())).unwrap_err();
        match err {
            ParseError::UnrecognizedStructure { seed, snippet, .. } => {
                assert_eq!(seed, "cmu");
                assert!(snippet.contains("Service temporarily unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_snippet_is_bounded() {
        let body = format!("<html><body>{}</body></html>", "x".repeat(1000));
        let err = parse_page(&page(body)).unwrap_err();
        if let ParseError::UnrecognizedStructure { snippet, .. } = err {
            assert_eq!(snippet.chars().count(), SNIPPET_LEN);
        }
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let raw = page(table(
            &format!("{}{}", SAMPLE_ROW, SAMPLE_ROW.replace("802698", "802699")),
            "Showing 2 results over 1 pages",
        ));
        let first = parse_page(&raw).unwrap();
        let second = parse_page(&raw).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.records.len(), 2);
    }
}
