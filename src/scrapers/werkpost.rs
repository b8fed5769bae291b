use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::utils::dates;

use super::fetcher::{DocumentFetcher, FetchedPage, FetcherConfig};
use super::{clean_text, non_empty, ScrapeLimits, ScrapedVacancy, VacancyScraper};

const BROKER: &str = "Werkpost";

/// Werkpost lists vacancies as cards over numbered pages
/// (`/vacatures?pagina=N`); every detail lives on its own page.
pub struct WerkpostScraper {
    base_url: String,
    fetcher: DocumentFetcher,
    limits: ScrapeLimits,
}

impl WerkpostScraper {
    pub fn new(base_url: String, http: FetcherConfig, limits: ScrapeLimits) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            fetcher: DocumentFetcher::new(http)?,
            limits,
        })
    }

    fn page_url(&self, page: usize) -> String {
        format!("{}/vacatures?pagina={}", self.base_url, page)
    }

    /// Walks the numbered listing pages and returns every distinct detail
    /// URL, visiting each page at most once and never going past the cap.
    async fn collect_listing_urls(&self) -> Result<Vec<String>> {
        let first = self
            .fetcher
            .fetch(&self.page_url(1))
            .await?
            .require_success()?;
        let total_pages = parse_total_pages(&first.body);
        let last_page = total_pages.min(self.limits.max_list_pages).max(1);
        if total_pages > last_page {
            warn!(
                broker = BROKER,
                total_pages,
                cap = last_page,
                "pagination exceeds cap, truncating walk"
            );
        }

        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        let mut absorb = |page_urls: Vec<String>| {
            let mut added = 0;
            for url in page_urls {
                if seen.insert(url.clone()) {
                    urls.push(url);
                    added += 1;
                }
            }
            added
        };

        absorb(parse_listing_urls(&first.body, &self.base_url));
        for page in 2..=last_page {
            let fetched = match self
                .fetcher
                .fetch(&self.page_url(page))
                .await
                .and_then(FetchedPage::require_success)
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(broker = BROKER, page, error = %e, "listing page failed, continuing");
                    continue;
                }
            };
            if absorb(parse_listing_urls(&fetched.body, &self.base_url)) == 0 {
                debug!(broker = BROKER, page, "no new listings, ending walk early");
                break;
            }
        }
        Ok(urls)
    }

    async fn fetch_detail(&self, url: String) -> Option<ScrapedVacancy> {
        let page = match self
            .fetcher
            .fetch(&url)
            .await
            .and_then(FetchedPage::require_success)
        {
            Ok(page) => page,
            Err(e) => {
                warn!(broker = BROKER, url = %url, error = %e, "detail page failed, skipping");
                return None;
            }
        };
        match parse_detail(&page.body, url.clone()) {
            Some(vacancy) => {
                info!(broker = BROKER, url = %url, title = %vacancy.title, "discovered vacancy");
                Some(vacancy)
            }
            None => {
                warn!(broker = BROKER, url = %url, "detail page has no title, skipping");
                None
            }
        }
    }
}

#[async_trait]
impl VacancyScraper for WerkpostScraper {
    fn broker_name(&self) -> &str {
        BROKER
    }

    fn search_url(&self) -> String {
        self.page_url(1)
    }

    fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    async fn produce_vacancies(&self) -> Result<Vec<ScrapedVacancy>> {
        info!(broker = BROKER, url = %self.search_url(), "starting scrape");
        let urls = self.collect_listing_urls().await?;
        let vacancies: Vec<ScrapedVacancy> = stream::iter(urls)
            .map(|url| self.fetch_detail(url))
            .buffer_unordered(self.limits.detail_concurrency.max(1))
            .filter_map(|vacancy| async move { vacancy })
            .collect()
            .await;
        info!(broker = BROKER, count = vacancies.len(), "finished scrape");
        Ok(vacancies)
    }
}

fn parse_total_pages(html: &str) -> usize {
    static PAGE_LINK: OnceLock<Selector> = OnceLock::new();
    let selector = PAGE_LINK.get_or_init(|| Selector::parse("nav.paginering a").unwrap());

    Html::parse_document(html)
        .select(selector)
        .filter_map(|a| clean_text(&a.text().collect::<String>()).parse::<usize>().ok())
        .max()
        .unwrap_or(1)
}

fn parse_listing_urls(html: &str, base_url: &str) -> Vec<String> {
    static LINK: OnceLock<Selector> = OnceLock::new();
    let selector = LINK.get_or_init(|| Selector::parse("li.vacature-kaart h3 a[href]").unwrap());

    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|raw| base.join(raw).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .collect()
}

/// Builds a vacancy from a detail page. The title is the only hard
/// requirement; everything else degrades to `None` or an empty body.
fn parse_detail(html: &str, url: String) -> Option<ScrapedVacancy> {
    static TITLE: OnceLock<Selector> = OnceLock::new();
    static ABOUT: OnceLock<Selector> = OnceLock::new();
    let title_sel = TITLE.get_or_init(|| Selector::parse("h1.vacature-titel").unwrap());
    let about_sel = ABOUT.get_or_init(|| Selector::parse("section.vacature-omschrijving").unwrap());

    let document = Html::parse_document(html);
    let title = select_text(&document, title_sel)?;
    let about = select_text(&document, about_sel).unwrap_or_default();
    let fields = parse_detail_fields(&document);

    Some(ScrapedVacancy {
        source_url: url,
        title,
        broker_name: BROKER.to_string(),
        posting_number: fields.get("vacaturenummer").cloned(),
        work_hours: fields.get("uren per week").cloned(),
        salary: fields.get("salaris").cloned(),
        posting_date: fields
            .get("plaatsingsdatum")
            .and_then(|raw| dates::parse_day_month_year(raw))
            .and_then(dates::at_midnight_utc),
        about,
        company_name: fields.get("werkgever").cloned(),
        raw_location: fields.get("locatie").cloned(),
    })
}

/// The characteristics block is a definition list; labels and values pair
/// up positionally.
fn parse_detail_fields(document: &Html) -> HashMap<String, String> {
    static DT: OnceLock<Selector> = OnceLock::new();
    static DD: OnceLock<Selector> = OnceLock::new();
    let dt = DT.get_or_init(|| Selector::parse("dl.vacature-kenmerken dt").unwrap());
    let dd = DD.get_or_init(|| Selector::parse("dl.vacature-kenmerken dd").unwrap());

    let labels = document
        .select(dt)
        .map(|el| clean_text(&el.text().collect::<String>()).to_lowercase());
    let values = document
        .select(dd)
        .map(|el| clean_text(&el.text().collect::<String>()));
    labels
        .zip(values)
        .filter(|(label, value)| !label.is_empty() && !value.is_empty())
        .collect()
}

fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .and_then(non_empty)
}
