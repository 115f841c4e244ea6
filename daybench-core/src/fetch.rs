//! Input Fetching
//!
//! The pipeline never reaches into ambient credentials: the session token is
//! handed to `HttpFetcher` explicitly, and tests inject their own `Fetcher`.

use crate::DayId;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("daybench/", env!("CARGO_PKG_VERSION"));

/// Errors returned by fetchers
#[derive(Debug, Error)]
pub enum FetchError {
    /// No session token was configured
    #[error("No session token configured (pass --session or set AOC_SESSION)")]
    MissingSession,

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Request for day {day} failed with status {status}")]
    Status {
        /// Day being fetched
        day: DayId,
        /// HTTP status code
        status: u16,
    },

    /// The puzzle page did not show two answers
    #[error("Expected 2 answers for day {day}, found {found}")]
    AnswersNotFound {
        /// Day being fetched
        day: DayId,
        /// Answers found on the page
        found: usize,
    },
}

/// Source of puzzle inputs and reference answers
pub trait Fetcher {
    /// Raw input text for a day
    fn fetch_input(&self, day: DayId) -> Result<String, FetchError>;

    /// The two reference answers for a day
    fn fetch_expected(&self, day: DayId) -> Result<(i64, i64), FetchError>;
}

/// Fetcher backed by the puzzle website, authenticated with a session cookie
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
    year: u32,
    session: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher for the given site and event year
    pub fn new(
        base_url: impl Into<String>,
        year: u32,
        session: Option<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            year,
            session: session.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }

    fn get(&self, day: DayId, url: &str) -> Result<String, FetchError> {
        let session = self.session.as_deref().ok_or(FetchError::MissingSession)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::COOKIE, format!("session={}", session))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                day,
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }

    fn day_url(&self, day: DayId) -> String {
        format!("{}/{}/day/{}", self.base_url, self.year, day.get())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_input(&self, day: DayId) -> Result<String, FetchError> {
        let body = self.get(day, &format!("{}/input", self.day_url(day)))?;
        // Units expect exactly one trailing newline
        Ok(format!("{}\n", body.trim_end()))
    }

    fn fetch_expected(&self, day: DayId) -> Result<(i64, i64), FetchError> {
        let body = self.get(day, &self.day_url(day))?;
        parse_expected_answers(day, &body)
    }
}

/// Extract the two submitted answers from a puzzle page
pub fn parse_expected_answers(day: DayId, page: &str) -> Result<(i64, i64), FetchError> {
    let re = Regex::new(r"Your puzzle answer was[^\d-]*(-?\d+)").expect("static pattern is valid");
    let answers: Vec<i64> = re
        .captures_iter(page)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    match answers.as_slice() {
        [a, b] => Ok((*a, *b)),
        other => Err(FetchError::AnswersNotFound {
            day,
            found: other.len(),
        }),
    }
}
