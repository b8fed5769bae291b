use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::utils::dates;

use super::fetcher::{DocumentFetcher, FetchedPage, FetcherConfig};
use super::{extract_after, non_empty, ScrapeLimits, ScrapedVacancy, VacancyScraper};

const BROKER: &str = "Talentbank";
const PAGE_SIZE: usize = 25;

// Tokens handed out during the sign-in flow have fixed lengths; anything
// else means the flow changed or the credentials were rejected.
const SESSION_COOKIE: &str = "TBSESSIE=";
const SESSION_LEN: usize = 32;
const FLOW_MARKER: &str = "flow=";
const FLOW_LEN: usize = 40;
const STATE_MARKER: &str = "state=";
const STATE_LEN: usize = 16;
const CODE_MARKER: &str = "code=";
const CODE_LEN: usize = 24;
const TOKEN_COOKIE: &str = "TBTOKEN=";
const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct TalentbankCredentials {
    pub username: String,
    pub password: String,
}

/// Talentbank sits behind a redirect-based sign-in flow. The client must
/// not follow redirects: the tokens travel in `Location` and `Set-Cookie`
/// headers of the intermediate responses.
pub struct TalentbankScraper {
    base_url: String,
    credentials: TalentbankCredentials,
    fetcher: DocumentFetcher,
    limits: ScrapeLimits,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "totaalPaginas")]
    total_pages: usize,
    #[serde(default)]
    resultaten: Vec<TalentbankResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TalentbankResult {
    url: Option<String>,
    titel: Option<String>,
    referentie: Option<String>,
    uren: Option<String>,
    salaris_indicatie: Option<String>,
    geplaatst_op: Option<String>,
    omschrijving: Option<String>,
    opdrachtgever: Option<String>,
    standplaats: Option<String>,
}

impl TalentbankScraper {
    pub fn new(
        base_url: String,
        credentials: TalentbankCredentials,
        http: FetcherConfig,
        limits: ScrapeLimits,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            fetcher: DocumentFetcher::new(http.without_redirects())?,
            limits,
        })
    }

    fn session_header(session: &str) -> String {
        format!("{}{}", SESSION_COOKIE, session)
    }

    /// Runs the four-hop sign-in flow and returns the bearer token for the
    /// search API. Every hop validates the marker it needs; a missing
    /// marker fails the whole adapter run.
    async fn handshake(&self) -> Result<String> {
        debug!(broker = BROKER, "starting sign-in handshake");

        let login = self
            .fetcher
            .execute(
                self.fetcher
                    .request(Method::POST, &format!("{}/auth/login", self.base_url))
                    .form(&[
                        ("gebruikersnaam", self.credentials.username.as_str()),
                        ("wachtwoord", self.credentials.password.as_str()),
                    ]),
            )
            .await?;
        let session = find_cookie_token(&login, SESSION_COOKIE, SESSION_LEN).ok_or_else(|| {
            Error::Handshake("login response carried no session cookie".to_string())
        })?;

        let start = self
            .fetcher
            .execute(
                self.fetcher
                    .request(Method::GET, &format!("{}/auth/oauth/start", self.base_url))
                    .header("cookie", Self::session_header(&session)),
            )
            .await?;
        let location = start
            .header("location")
            .ok_or_else(|| Error::Handshake("flow start did not redirect".to_string()))?;
        let flow = extract_after(location, FLOW_MARKER, FLOW_LEN)
            .ok_or_else(|| Error::Handshake("redirect carried no flow token".to_string()))?;
        let state = extract_after(location, STATE_MARKER, STATE_LEN)
            .ok_or_else(|| Error::Handshake("redirect carried no state token".to_string()))?;

        let authorize = self
            .fetcher
            .execute(
                self.fetcher
                    .request(
                        Method::POST,
                        &format!("{}/auth/oauth/authorize", self.base_url),
                    )
                    .header("cookie", Self::session_header(&session))
                    .form(&[("flow", flow), ("state", state)]),
            )
            .await?;
        let code = authorize
            .header("location")
            .and_then(|loc| extract_after(loc, CODE_MARKER, CODE_LEN))
            .ok_or_else(|| {
                Error::Handshake("authorization did not yield an exchange code".to_string())
            })?
            .to_string();

        let token_response = self
            .fetcher
            .execute(
                self.fetcher
                    .request(Method::POST, &format!("{}/auth/token", self.base_url))
                    .header("cookie", Self::session_header(&session))
                    .form(&[("code", code.as_str())]),
            )
            .await?;
        let bearer =
            find_cookie_token(&token_response, TOKEN_COOKIE, TOKEN_LEN).ok_or_else(|| {
                Error::Handshake("token exchange carried no access token".to_string())
            })?;

        debug!(broker = BROKER, "handshake complete");
        Ok(bearer)
    }

    async fn fetch_search_page(&self, bearer: &str, page: usize) -> Result<SearchResponse> {
        let url = format!(
            "{}/api/zoeken?pagina={}&aantal={}",
            self.base_url, page, PAGE_SIZE
        );
        let fetched = self
            .fetcher
            .execute(
                self.fetcher
                    .request(Method::GET, &url)
                    .header("authorization", format!("Bearer {}", bearer)),
            )
            .await?
            .require_success()?;
        serde_json::from_str(&fetched.body)
            .map_err(|e| Error::Extraction(format!("Talentbank page {}: {}", page, e)))
    }
}

#[async_trait]
impl VacancyScraper for TalentbankScraper {
    fn broker_name(&self) -> &str {
        BROKER
    }

    fn search_url(&self) -> String {
        format!(
            "{}/api/zoeken?pagina=1&aantal={}",
            self.base_url, PAGE_SIZE
        )
    }

    fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    async fn produce_vacancies(&self) -> Result<Vec<ScrapedVacancy>> {
        info!(broker = BROKER, url = %self.search_url(), "starting scrape");
        let bearer = self.handshake().await?;

        let first = self.fetch_search_page(&bearer, 1).await?;
        let last_page = first.total_pages.min(self.limits.max_list_pages).max(1);
        if first.total_pages > last_page {
            warn!(
                broker = BROKER,
                total_pages = first.total_pages,
                cap = last_page,
                "page count exceeds cap, truncating walk"
            );
        }

        let mut results = first.resultaten;
        for page in 2..=last_page {
            match self.fetch_search_page(&bearer, page).await {
                Ok(mut response) => results.append(&mut response.resultaten),
                Err(e) => {
                    warn!(broker = BROKER, page, error = %e, "page failed, continuing");
                }
            }
        }

        let vacancies: Vec<ScrapedVacancy> = results
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
                    warn!(broker = BROKER, "result without url or title, skipping");
                    None
                }
            })
            .collect();
        info!(broker = BROKER, count = vacancies.len(), "finished scrape");
        Ok(vacancies)
    }
}

fn find_cookie_token(page: &FetchedPage, marker: &str, len: usize) -> Option<String> {
    page.headers_named("set-cookie")
        .find_map(|value| extract_after(value, marker, len))
        .map(str::to_string)
}

fn to_scraped(item: TalentbankResult) -> Option<ScrapedVacancy> {
    let source_url = item.url.and_then(non_empty)?;
    let title = item.titel.and_then(non_empty)?;

    Some(ScrapedVacancy {
        source_url,
        title,
        broker_name: BROKER.to_string(),
        posting_number: item.referentie.and_then(non_empty),
        work_hours: item.uren.and_then(non_empty),
        salary: item.salaris_indicatie.and_then(non_empty),
        posting_date: item
            .geplaatst_op
            .as_deref()
            .and_then(dates::parse_iso_date)
            .and_then(dates::at_midnight_utc),
        about: item.omschrijving.unwrap_or_default(),
        company_name: item.opdrachtgever.and_then(non_empty),
        raw_location: item.standplaats.and_then(non_empty),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn test_scraper(base_url: String) -> TalentbankScraper {
        TalentbankScraper::new(
            base_url,
            TalentbankCredentials {
                username: "recruiter".to_string(),
                password: "geheim123".to_string(),
            },
            FetcherConfig {
                user_agent: "test-agent".to_string(),
                timeout: Duration::from_secs(5),
                follow_redirects: true,
            },
            ScrapeLimits {
                max_list_pages: 10,
                detail_concurrency: 4,
            },
        )
        .unwrap()
    }

    fn session() -> String {
        "a".repeat(SESSION_LEN)
    }

    fn result_item(url: &str, titel: &str) -> serde_json::Value {
        json!({
            "url": url,
            "titel": titel,
            "referentie": "TB-5521",
            "uren": "40 uur",
            "salarisIndicatie": "€3.100 bruto p/m",
            "geplaatstOp": "2025-04-03",
            "omschrijving": "Planning en klantcontact.",
            "opdrachtgever": "Bouwbedrijf Vermeer",
            "standplaats": "Utrecht"
        })
    }

    async fn mock_handshake(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
        let flow = "f".repeat(FLOW_LEN);
        let state = "s".repeat(STATE_LEN);
        let code = "c".repeat(CODE_LEN);
        let token = "t".repeat(TOKEN_LEN);

        let login = server
            .mock("POST", "/auth/login")
            .match_body("gebruikersnaam=recruiter&wachtwoord=geheim123")
            .with_status(302)
            .with_header(
                "set-cookie",
                &format!("TBSESSIE={}; Path=/; HttpOnly", session()),
            )
            .create_async()
            .await;
        let start = server
            .mock("GET", "/auth/oauth/start")
            .match_header("cookie", format!("TBSESSIE={}", session()).as_str())
            .with_status(302)
            .with_header(
                "location",
                &format!("/auth/oauth/consent?flow={}&state={}", flow, state),
            )
            .create_async()
            .await;
        let authorize = server
            .mock("POST", "/auth/oauth/authorize")
            .match_body(format!("flow={}&state={}", flow, state).as_str())
            .with_status(302)
            .with_header("location", &format!("/portaal/inloggen?code={}", code))
            .create_async()
            .await;
        let token_mock = server
            .mock("POST", "/auth/token")
            .match_body(format!("code={}", code).as_str())
            .with_status(200)
            .with_header("set-cookie", &format!("TBTOKEN={}; Path=/", token))
            .create_async()
            .await;
        vec![login, start, authorize, token_mock]
    }

    #[tokio::test]
    async fn handshake_then_authorized_search() {
        let mut server = mockito::Server::new_async().await;
        let _handshake = mock_handshake(&mut server).await;
        let token = "t".repeat(TOKEN_LEN);
        let _search = server
            .mock("GET", "/api/zoeken?pagina=1&aantal=25")
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_body(
                json!({"pagina": 1, "totaalPaginas": 1, "resultaten": [
                    result_item("https://portaal.talentbank.nl/opdracht/5521", "Werkvoorbereider")
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let vacancies = scraper.produce_vacancies().await.unwrap();

        assert_eq!(vacancies.len(), 1);
        let vacancy = &vacancies[0];
        assert_eq!(vacancy.title, "Werkvoorbereider");
        assert_eq!(vacancy.broker_name, "Talentbank");
        assert_eq!(vacancy.posting_number.as_deref(), Some("TB-5521"));
        assert_eq!(vacancy.company_name.as_deref(), Some("Bouwbedrijf Vermeer"));
        assert_eq!(vacancy.raw_location.as_deref(), Some("Utrecht"));
        assert_eq!(
            vacancy.posting_date,
            Some(Utc.with_ymd_and_hms(2025, 4, 3, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn search_walks_every_page() {
        let mut server = mockito::Server::new_async().await;
        let _handshake = mock_handshake(&mut server).await;
        let _p1 = server
            .mock("GET", "/api/zoeken?pagina=1&aantal=25")
            .with_body(
                json!({"pagina": 1, "totaalPaginas": 2, "resultaten": [
                    result_item("https://portaal.talentbank.nl/opdracht/1", "Een")
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/api/zoeken?pagina=2&aantal=25")
            .with_body(
                json!({"pagina": 2, "totaalPaginas": 2, "resultaten": [
                    result_item("https://portaal.talentbank.nl/opdracht/2", "Twee")
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let vacancies = scraper.produce_vacancies().await.unwrap();

        assert_eq!(vacancies.len(), 2);
    }

    #[tokio::test]
    async fn rejected_login_fails_the_adapter_cleanly() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body("<html>Inloggen mislukt</html>")
            .create_async()
            .await;
        let start = server
            .mock("GET", "/auth/oauth/start")
            .expect(0)
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let err = scraper.produce_vacancies().await.unwrap_err();

        assert!(matches!(err, Error::Handshake(_)));
        start.assert_async().await;
    }

    #[tokio::test]
    async fn truncated_redirect_token_fails_the_handshake() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(302)
            .with_header("set-cookie", &format!("TBSESSIE={}", session()))
            .create_async()
            .await;
        let _start = server
            .mock("GET", "/auth/oauth/start")
            .with_status(302)
            .with_header(
                "location",
                &format!("/auth/oauth/consent?flow={}&state=kort", "f".repeat(FLOW_LEN)),
            )
            .create_async()
            .await;

        let scraper = test_scraper(server.url());
        let err = scraper.produce_vacancies().await.unwrap_err();

        assert!(matches!(err, Error::Handshake(_)));
    }
}
