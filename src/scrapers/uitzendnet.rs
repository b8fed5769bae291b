use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::utils::dates;

use super::fetcher::{DocumentFetcher, FetcherConfig};
use super::{clean_text, non_empty, ScrapeLimits, ScrapedVacancy, VacancyScraper};

const BROKER: &str = "Uitzendnet";
const PAGE_SIZE: usize = 50;

/// Shown on detail pages of postings that were taken offline; the server
/// still answers 200 for them.
const OFFLINE_BANNER: &str = "Deze vacature is niet meer actief";

const LOCATION_PLACEHOLDER: &str = "diverse locaties";
const LOCATION_MARKER: &str = "Standplaats:";

/// Uitzendnet serves fixed-size JSON pages (`/api/v2/jobs?page=N&size=50`).
/// Its location field often holds a placeholder; the real place then hides
/// behind a marker inside the description.
pub struct UitzendnetScraper {
    base_url: String,
    fetcher: DocumentFetcher,
    limits: ScrapeLimits,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "totalPages")]
    total_pages: usize,
    #[serde(default)]
    jobs: Vec<UitzendnetJob>,
}

#[derive(Debug, Deserialize)]
struct UitzendnetJob {
    url: Option<String>,
    functie: Option<String>,
    kenmerk: Option<String>,
    uren: Option<String>,
    salaris: Option<String>,
    datum: Option<String>,
    omschrijving: Option<String>,
    bedrijf: Option<String>,
    plaats: Option<String>,
}

impl UitzendnetScraper {
    pub fn new(base_url: String, http: FetcherConfig, limits: ScrapeLimits) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            fetcher: DocumentFetcher::new(http)?,
            limits,
        })
    }

    fn page_api_url(&self, page: usize) -> String {
        format!("{}/api/v2/jobs?page={}&size={}", self.base_url, page, PAGE_SIZE)
    }

    async fn fetch_page(&self, page: usize) -> Result<SearchResponse> {
        let fetched = self
            .fetcher
            .fetch(&self.page_api_url(page))
            .await?
            .require_success()?;
        serde_json::from_str(&fetched.body)
            .map_err(|e| Error::Extraction(format!("Uitzendnet page {}: {}", page, e)))
    }
}

#[async_trait]
impl VacancyScraper for UitzendnetScraper {
    fn broker_name(&self) -> &str {
        BROKER
    }

    fn search_url(&self) -> String {
        self.page_api_url(1)
    }

    fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    async fn produce_vacancies(&self) -> Result<Vec<ScrapedVacancy>> {
        info!(broker = BROKER, url = %self.search_url(), "starting scrape");
        let first = self.fetch_page(1).await?;
        let last_page = first.total_pages.min(self.limits.max_list_pages).max(1);
        if first.total_pages > last_page {
            warn!(
                broker = BROKER,
                total_pages = first.total_pages,
                cap = last_page,
                "page count exceeds cap, truncating walk"
            );
        }

        let mut jobs = first.jobs;
        for page in 2..=last_page {
            match self.fetch_page(page).await {
                Ok(mut response) => jobs.append(&mut response.jobs),
                Err(e) => {
                    warn!(broker = BROKER, page, error = %e, "page failed, continuing");
                }
            }
        }

        let mut seen = HashSet::new();
        let vacancies: Vec<ScrapedVacancy> = jobs
            .into_iter()
            .filter_map(|job| match to_scraped(job) {
                Some(vacancy) if seen.insert(vacancy.source_url.clone()) => {
                    info!(
                        broker = BROKER,
                        url = %vacancy.source_url,
                        title = %vacancy.title,
                        "discovered vacancy"
                    );
                    Some(vacancy)
                }
                Some(_) => None,
                None => {
                    warn!(broker = BROKER, "job without url or title, skipping");
                    None
                }
            })
            .collect();
        info!(broker = BROKER, count = vacancies.len(), "finished scrape");
        Ok(vacancies)
    }

    /// Taken-down postings still answer 200 here, with a banner in the body.
    async fn is_vacancy_live(&self, url: &str) -> Result<bool> {
        let page = self.fetcher.fetch(url).await?;
        if page.status.is_success() {
            return Ok(!page.body.contains(OFFLINE_BANNER));
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

fn to_scraped(job: UitzendnetJob) -> Option<ScrapedVacancy> {
    let source_url = job.url.and_then(non_empty)?;
    let title = job.functie.and_then(non_empty)?;
    let about = job.omschrijving.unwrap_or_default();
    let raw_location = effective_location(job.plaats, &about);

    Some(ScrapedVacancy {
        source_url,
        title,
        broker_name: BROKER.to_string(),
        posting_number: job.kenmerk.and_then(non_empty),
        work_hours: job.uren.and_then(non_empty),
        salary: job.salaris.and_then(non_empty),
        posting_date: job
            .datum
            .as_deref()
            .and_then(dates::parse_dutch_date)
            .and_then(dates::at_midnight_utc),
        about,
        company_name: job.bedrijf.and_then(non_empty),
        raw_location,
    })
}

/// A usable place name beats the placeholder; behind the placeholder the
/// description marker is tried first.
fn effective_location(plaats: Option<String>, about: &str) -> Option<String> {
    match plaats.and_then(non_empty) {
        Some(place) if place.to_lowercase() != LOCATION_PLACEHOLDER => Some(place),
        other => location_from_description(about).or(other),
    }
}

fn location_from_description(text: &str) -> Option<String> {
    let start = text.find(LOCATION_MARKER)? + LOCATION_MARKER.len();
    let rest = &text[start..];
    let end = rest.find(|c| c == '.' || c == '\n').unwrap_or(rest.len());
    non_empty(clean_text(&rest[..end]))
}
