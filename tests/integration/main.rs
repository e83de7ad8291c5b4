//! Integration tests for the scraper
//!
//! These tests drive whole runs against wiremock servers and scripted
//! fetchers, with results written to temporary SQLite databases.

mod scrape_tests;
