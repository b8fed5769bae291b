use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::utils::dates;

use super::fetcher::{DocumentFetcher, FetcherConfig};
use super::{non_empty, ScrapedVacancy, VacancyScraper};

const BROKER: &str = "Flexfeed";

/// Flexfeed exposes a JSON search API. The adapter probes with `count=1` to
/// learn how many postings exist, then fetches exactly that many in one
/// request.
pub struct FlexfeedScraper {
    base_url: String,
    fetcher: DocumentFetcher,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "totalResults")]
    total_results: usize,
    #[serde(default)]
    vacancies: Vec<FlexfeedVacancy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlexfeedVacancy {
    vacancy_url: Option<String>,
    job_title: Option<String>,
    reference: Option<String>,
    hours_per_week: Option<String>,
    gross_salary: Option<String>,
    publication_date: Option<String>,
    body: Option<String>,
    client: Option<String>,
    city: Option<String>,
}

impl FlexfeedScraper {
    pub fn new(base_url: String, http: FetcherConfig) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            fetcher: DocumentFetcher::new(http)?,
        })
    }

    fn search_api_url(&self, count: usize) -> String {
        format!("{}/api/v1/vacancies?count={}", self.base_url, count)
    }

    async fn fetch_search(&self, count: usize) -> Result<SearchResponse> {
        let page = self
            .fetcher
            .fetch(&self.search_api_url(count))
            .await?
            .require_success()?;
        serde_json::from_str(&page.body)
            .map_err(|e| Error::Extraction(format!("Flexfeed search response: {}", e)))
    }
}

#[async_trait]
impl VacancyScraper for FlexfeedScraper {
    fn broker_name(&self) -> &str {
        BROKER
    }

    fn search_url(&self) -> String {
        self.search_api_url(1)
    }

    fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    async fn produce_vacancies(&self) -> Result<Vec<ScrapedVacancy>> {
        info!(broker = BROKER, url = %self.search_url(), "starting scrape");
        let probe = self.fetch_search(1).await?;
        if probe.total_results == 0 {
            info!(broker = BROKER, count = 0, "finished scrape");
            return Ok(Vec::new());
        }

        let full = self.fetch_search(probe.total_results).await?;
        if full.vacancies.len() != probe.total_results {
            warn!(
                broker = BROKER,
                announced = probe.total_results,
                received = full.vacancies.len(),
                "result count differs from announced total"
            );
        }

        let vacancies: Vec<ScrapedVacancy> = full
            .vacancies
            .into_iter()
            .filter_map(|item| match to_scraped(item) {
                Some(vacancy) => {
                    info!(
                        broker = BROKER,
                        url = %vacancy.source_url,
                        title = %vacancy.title,
                        "discovered vacancy"
                    );
                    Some(vacancy)
                }
                None => {
                    warn!(broker = BROKER, "item without url or title, skipping");
                    None
                }
            })
            .collect();
        info!(broker = BROKER, count = vacancies.len(), "finished scrape");
        Ok(vacancies)
    }
}

fn to_scraped(item: FlexfeedVacancy) -> Option<ScrapedVacancy> {
    let source_url = item.vacancy_url.and_then(non_empty)?;
    let title = item.job_title.and_then(non_empty)?;
    let posting_date = match item.publication_date.as_deref() {
        Some(raw) => {
            let parsed = dates::from_rfc3339(raw);
            if parsed.is_none() {
                warn!(broker = BROKER, url = %source_url, raw, "unparseable publication date");
            }
            parsed
        }
        None => None,
    };

    Some(ScrapedVacancy {
        source_url,
        title,
        broker_name: BROKER.to_string(),
        posting_number: item.reference.and_then(non_empty),
        work_hours: item.hours_per_week.and_then(non_empty),
        salary: item.gross_salary.and_then(non_empty),
        posting_date,
        about: item.body.unwrap_or_default(),
        company_name: item.client.and_then(non_empty),
        raw_location: item.city.and_then(non_empty),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn test_scraper(base_url: String) -> FlexfeedScraper {
        FlexfeedScraper::new(
            base_url,
            FetcherConfig {
                user_agent: "test-agent".to_string(),
                timeout: Duration::from_secs(5),
                follow_redirects: true,
            },
        )
        .unwrap()
    }

    fn item(url: &str, title: &str) -> serde_json::Value {
        json!({
            "vacancyUrl": url,
            "jobTitle": title,
            "reference": "FF-991",
            "hoursPerWeek": "24-32",
            "grossSalary": "€14,20 per uur",
            "publicationDate": "2025-03-12T08:30:00+01:00",
            "body": "Bloemen verwerken in de veiling.",
            "client": "Bloemenveiling Aalsmeer",
            "city": "Aalsmeer"
        })
    }

    #[tokio::test]
    async fn probes_total_then_fetches_everything() {
        let mut server = mockito::Server::new_async().await;
        let _probe = server
            .mock("GET", "/api/v1/vacancies?count=1")
            .with_body(
                json!({"totalResults": 2, "vacancies": [item("https://flexfeed.nl/v/1", "Orderpicker")]})
                    .to_string(),
            )
            .create_async()
            .await;
        let _full = server
            .mock("GET", "/api/v1/vacancies?count=2")
            .with_body(
                json!({"totalResults": 2, "vacancies": [
                    item("https://flexfeed.nl/v/1", "Orderpicker"),
                    item("https://flexfeed.nl/v/2", "Heftruckchauffeur"),
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let vacancies = scraper.produce_vacancies().await.unwrap();

        assert_eq!(vacancies.len(), 2);
        let first = &vacancies[0];
        assert_eq!(first.source_url, "https://flexfeed.nl/v/1");
        assert_eq!(first.title, "Orderpicker");
        assert_eq!(first.broker_name, "Flexfeed");
        assert_eq!(first.posting_number.as_deref(), Some("FF-991"));
        assert_eq!(first.salary.as_deref(), Some("€14,20 per uur"));
        assert_eq!(first.raw_location.as_deref(), Some("Aalsmeer"));
        assert_eq!(
            first.posting_date,
            Some(Utc.with_ymd_and_hms(2025, 3, 12, 7, 30, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn empty_source_skips_the_full_fetch() {
        let mut server = mockito::Server::new_async().await;
        let _probe = server
            .mock("GET", "/api/v1/vacancies?count=1")
            .with_body(json!({"totalResults": 0, "vacancies": []}).to_string())
            .create_async()
            .await;
        let full = server
            .mock("GET", "/api/v1/vacancies?count=0")
            .expect(0)
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let vacancies = scraper.produce_vacancies().await.unwrap();

        assert!(vacancies.is_empty());
        full.assert_async().await;
    }

    #[tokio::test]
    async fn items_without_required_fields_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _probe = server
            .mock("GET", "/api/v1/vacancies?count=1")
            .with_body(json!({"totalResults": 2, "vacancies": []}).to_string())
            .create_async()
            .await;
        let _full = server
            .mock("GET", "/api/v1/vacancies?count=2")
            .with_body(
                json!({"totalResults": 2, "vacancies": [
                    {"jobTitle": "Zonder url"},
                    item("https://flexfeed.nl/v/2", "Met url"),
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let vacancies = scraper.produce_vacancies().await.unwrap();

        assert_eq!(vacancies.len(), 1);
        assert_eq!(vacancies[0].title, "Met url");
    }

    #[tokio::test]
    async fn malformed_payload_fails_the_source() {
        let mut server = mockito::Server::new_async().await;
        let _probe = server
            .mock("GET", "/api/v1/vacancies?count=1")
            .with_body("<html>niet json</html>")
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        assert!(scraper.produce_vacancies().await.is_err());
    }
}
