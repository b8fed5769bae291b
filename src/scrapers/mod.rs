pub mod baanbrug;
pub mod fetcher;
pub mod flexfeed;
pub mod talentbank;
pub mod uitzendnet;
pub mod werkpost;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};

pub use fetcher::{DocumentFetcher, FetchedPage, FetcherConfig};

use baanbrug::BaanbrugScraper;
use flexfeed::FlexfeedScraper;
use talentbank::{TalentbankCredentials, TalentbankScraper};
use uitzendnet::UitzendnetScraper;
use werkpost::WerkpostScraper;

/// One vacancy as produced by a source adapter, reduced to the shared shape
/// the reconciliation step works with. `source_url` doubles as the identity
/// of the posting across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedVacancy {
    pub source_url: String,
    pub title: String,
    pub broker_name: String,
    pub posting_number: Option<String>,
    pub work_hours: Option<String>,
    pub salary: Option<String>,
    pub posting_date: Option<DateTime<Utc>>,
    pub about: String,
    pub company_name: Option<String>,
    pub raw_location: Option<String>,
}

/// Runtime bounds applied while walking a source.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeLimits {
    pub max_list_pages: usize,
    pub detail_concurrency: usize,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            max_list_pages: 50,
            detail_concurrency: 8,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VacancyScraper: Send + Sync {
    /// Identity stamped on every vacancy this adapter produces.
    fn broker_name(&self) -> &str;

    /// Entry URL of the source's listing, mainly for logging.
    fn search_url(&self) -> String;

    fn fetcher(&self) -> &DocumentFetcher;

    /// Walks the source and returns every vacancy currently advertised.
    /// Individual postings that fail to load or parse are skipped; an error
    /// here means the source as a whole was unreachable.
    async fn produce_vacancies(&self) -> Result<Vec<ScrapedVacancy>>;

    /// Whether the posting behind `url` is still published. Only a
    /// definitive gone-signal yields `Ok(false)`; transient trouble is an
    /// error so callers keep the record. Sources that keep dead postings
    /// reachable override this with their own check.
    async fn is_vacancy_live(&self, url: &str) -> Result<bool> {
        let page = self.fetcher().fetch(url).await?;
        if page.status.is_success() {
            return Ok(true);
        }
        if page.status == StatusCode::NOT_FOUND || page.status == StatusCode::GONE {
            return Ok(false);
        }
        Err(Error::Fetch(format!(
            "{} returned status {}",
            url, page.status
        )))
    }
}

/// Builds every adapter the current configuration enables.
pub fn build_scrapers(config: &Config) -> Result<Vec<Arc<dyn VacancyScraper>>> {
    let limits = ScrapeLimits {
        max_list_pages: config.max_list_pages,
        detail_concurrency: config.detail_concurrency,
    };
    let http = FetcherConfig {
        user_agent: config.scraper_user_agent.clone(),
        timeout: config.fetch_timeout(),
        follow_redirects: true,
    };

    let mut scrapers: Vec<Arc<dyn VacancyScraper>> = vec![
        Arc::new(WerkpostScraper::new(
            config.werkpost_base_url.clone(),
            http.clone(),
            limits,
        )?),
        Arc::new(BaanbrugScraper::new(
            config.baanbrug_base_url.clone(),
            http.clone(),
            limits,
        )?),
        Arc::new(FlexfeedScraper::new(
            config.flexfeed_base_url.clone(),
            http.clone(),
        )?),
        Arc::new(UitzendnetScraper::new(
            config.uitzendnet_base_url.clone(),
            http.clone(),
            limits,
        )?),
    ];

    match (&config.talentbank_username, &config.talentbank_password) {
        (Some(username), Some(password)) => {
            scrapers.push(Arc::new(TalentbankScraper::new(
                config.talentbank_base_url.clone(),
                TalentbankCredentials {
                    username: username.clone(),
                    password: password.clone(),
                },
                http,
                limits,
            )?));
        }
        _ => info!("Talentbank credentials not configured, adapter disabled"),
    }

    Ok(scrapers)
}

/// Returns the fixed-length token that follows `marker`, or `None` when the
/// marker is absent or the remainder is shorter than `len`.
pub fn extract_after<'a>(haystack: &'a str, marker: &str, len: usize) -> Option<&'a str> {
    let start = haystack.find(marker)? + marker.len();
    haystack.get(start..start + len)
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub(crate) fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
