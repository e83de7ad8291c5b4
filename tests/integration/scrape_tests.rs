//! End-to-end scrape tests
//!
//! These tests use wiremock to create mock survey servers and test the full
//! fetch, parse, and write cycle.

use async_trait::async_trait;
use chrono::Utc;
use gradcafe_scraper::config::Config;
use gradcafe_scraper::crawler::{scrape, Coordinator, FetchError, PageFetcher, RawPage, SharedStore};
use gradcafe_scraper::output::ErrorKind;
use gradcafe_scraper::parser::Decision;
use gradcafe_scraper::state::{RunState, SeedStatus};
use gradcafe_scraper::storage::{RecordStore, SqliteStore};
use gradcafe_scraper::Seed;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SURVEY_PATH: &str = "/survey/index.php";

/// Builds a results page with one row per `(post id, decision)` pair
fn results_page(rows: &[(u64, &str)]) -> String {
    let count = rows.len();
    let rows: String = rows
        .iter()
        .map(|(id, decision)| {
            format!(
                r#"<tr class="row{parity}">
                  <td class="instcol">University {id}</td>
                  <td>Computer Science, PhD (F24)</td>
                  <td>{decision} via E-mail on 15 Feb 2024</td>
                  <td>I</td>
                  <td class="datecol">16 Feb 2024</td>
                  <td>Posting {id} <div><a href="/result/{id}">reply</a></div></td>
                </tr>"#,
                parity = id % 2,
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <table class="table submission-table"><tbody>{}</tbody></table>
        <div>Showing <strong>{}</strong> results over <strong>1</strong> pages</div>
        </body></html>"#,
        rows, count
    )
}

/// Creates a test configuration pointed at the mock server
fn create_test_config(server: &MockServer, seeds: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.seeds = seeds.to_string();
    config.scraper.base_url = format!("{}{}", server.uri(), SURVEY_PATH);
    config.scraper.rate_limit_interval_ms = 1;
    config.scraper.max_retries = 3;
    config.scraper.backoff_base_ms = 1;
    config.scraper.max_backoff_ms = 10;
    config.output.database_path = db_path.display().to_string();
    config
}

fn open_store(path: &Path) -> SqliteStore {
    SqliteStore::new(path).expect("Failed to open database")
}

#[tokio::test]
async fn test_end_to_end_with_failing_seed() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .and(query_param("q", "alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[
            (101, "Accepted"),
            (102, "Rejected"),
            (103, "Wait listed"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .and(query_param("q", "beta"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "alpha, beta", &db_path);
    let report = scrape(config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.seeds_attempted, 2);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.records_parsed, 3);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].seed, "beta");
    assert_eq!(report.errors[0].kind, ErrorKind::Fetch);
    assert_eq!(report.exit_code(), 0);

    let store = open_store(&db_path);
    assert_eq!(store.count_records().unwrap(), 3);
    let stored = store.get_record("gradcafe:103").unwrap().unwrap();
    assert_eq!(stored.record.decision, Some(Decision::WaitListed));
    assert_eq!(stored.record.institution.as_deref(), Some("University 103"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&[(1, "Accepted"), (2, "Rejected")])),
        )
        .mount(&server)
        .await;

    let first = scrape(
        create_test_config(&server, "alpha", &db_path),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(first.records_written, 2);

    let second = scrape(
        create_test_config(&server, "alpha", &db_path),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(second.records_parsed, 2);
    assert_eq!(second.records_written, 0);
    assert_eq!(second.records_unchanged, 2);

    assert_eq!(open_store(&db_path).count_records().unwrap(), 2);
}

#[tokio::test]
async fn test_changed_record_is_updated_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    for decision in ["Wait listed", "Accepted"] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SURVEY_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(results_page(&[(42, decision)])),
            )
            .mount(&server)
            .await;

        let report = scrape(
            create_test_config(&server, "alpha", &db_path),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.records_written, 1);
    }

    let store = open_store(&db_path);
    assert_eq!(store.count_records().unwrap(), 1);
    let stored = store.get_record("gradcafe:42").unwrap().unwrap();
    assert_eq!(stored.record.decision, Some(Decision::Accepted));
    assert_eq!(stored.revision, 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    // Mocks are matched in mount order; this one stops matching after two hits
    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[(7, "Accepted")])))
        .expect(1)
        .mount(&server)
        .await;

    let report = scrape(
        create_test_config(&server, "alpha", &db_path),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.records_written, 1);
}

#[tokio::test]
async fn test_unparsable_page_is_a_parse_error() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Maintenance</body></html>"),
        )
        .mount(&server)
        .await;

    let report = scrape(
        create_test_config(&server, "alpha", &db_path),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.records_parsed, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::Parse);
    assert!(report.errors[0].detail.contains("Maintenance"));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_requests_respect_rate_limit() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("results.db");

    Mock::given(method("GET"))
        .and(path(SURVEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[(1, "Accepted")])))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, "a, b, c", &db_path);
    config.scraper.rate_limit_interval_ms = 150;
    config.scraper.concurrency = 3;

    let started = Instant::now();
    let report = scrape(config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.pages_fetched, 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_unopenable_database_fails_to_start() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("missing").join("results.db");

    let config = create_test_config(&server, "alpha", &db_path);
    let result = scrape(config, CancellationToken::new()).await;
    assert!(result.is_err());
}

/// Serves one record per seed and cancels the run while fetching `trigger`
struct CancellingFetcher {
    trigger: String,
    cancel: CancellationToken,
}

#[async_trait]
impl PageFetcher for CancellingFetcher {
    async fn fetch(&self, seed: &Seed, url: &Url) -> Result<RawPage, FetchError> {
        if seed.as_str() == self.trigger {
            self.cancel.cancel();
        }
        let id = seed.as_str().trim_start_matches('s').parse::<u64>().unwrap_or(0);
        Ok(RawPage {
            seed: seed.clone(),
            url: url.clone(),
            status: 200,
            fetched_at: Utc::now(),
            body: results_page(&[(id, "Accepted")]),
        })
    }
}

#[tokio::test]
async fn test_cancellation_skips_remaining_seeds() {
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(CancellingFetcher {
        trigger: "s2".to_string(),
        cancel: cancel.clone(),
    });
    let store = Arc::new(Mutex::new(SqliteStore::new_in_memory().unwrap()));
    let shared: SharedStore = store.clone();

    let mut config = Config::default();
    config.seeds = "s1 s2 s3 s4 s5".to_string();
    config.scraper.concurrency = 1;

    let mut coordinator = Coordinator::new(config, fetcher, shared);
    let report = coordinator.run(cancel).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.seeds_attempted, 2);
    assert_eq!(report.records_written, 2);
    for seed in ["s1", "s2"] {
        assert_eq!(
            report.status_of(&Seed::Query(seed.to_string())),
            Some(SeedStatus::Completed)
        );
    }
    for seed in ["s3", "s4", "s5"] {
        assert_eq!(
            report.status_of(&Seed::Query(seed.to_string())),
            Some(SeedStatus::Skipped)
        );
    }
    assert_eq!(report.exit_code(), 0);
    assert_eq!(store.lock().unwrap().count_records().unwrap(), 2);
}
