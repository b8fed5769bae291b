use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::utils::dates;

use super::fetcher::{DocumentFetcher, FetchedPage, FetcherConfig};
use super::{clean_text, non_empty, ScrapeLimits, ScrapedVacancy, VacancyScraper};

const BROKER: &str = "Baanbrug";

/// Baanbrug renders its listing as a table (`/banen?p=N`) with a textual
/// page counter. Rows already carry title, place and hours; the detail page
/// adds the description and a metadata line.
pub struct BaanbrugScraper {
    base_url: String,
    fetcher: DocumentFetcher,
    limits: ScrapeLimits,
}

/// What a single listing row contributes before the detail page is read.
#[derive(Debug, Clone)]
struct ListingRow {
    url: String,
    title: String,
    location: Option<String>,
    hours: Option<String>,
}

/// Fields recovered from the `p.baan-meta` line on a detail page.
#[derive(Debug, Default)]
struct DetailMeta {
    posting_date: Option<DateTime<Utc>>,
    posting_number: Option<String>,
    company_name: Option<String>,
}

impl BaanbrugScraper {
    pub fn new(base_url: String, http: FetcherConfig, limits: ScrapeLimits) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            fetcher: DocumentFetcher::new(http)?,
            limits,
        })
    }

    fn page_url(&self, page: usize) -> String {
        format!("{}/banen?p={}", self.base_url, page)
    }

    async fn collect_rows(&self) -> Result<Vec<ListingRow>> {
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
        let mut rows = Vec::new();
        let mut absorb = |page_rows: Vec<ListingRow>| {
            let mut added = 0;
            for row in page_rows {
                if seen.insert(row.url.clone()) {
                    rows.push(row);
                    added += 1;
                }
            }
            added
        };

        absorb(parse_rows(&first.body, &self.base_url));
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
            if absorb(parse_rows(&fetched.body, &self.base_url)) == 0 {
                debug!(broker = BROKER, page, "no new rows, ending walk early");
                break;
            }
        }
        Ok(rows)
    }

    /// Enriches a row with its detail page. A row survives detail *parse*
    /// trouble as a partial record; only a failed fetch drops it.
    async fn fetch_detail(&self, row: ListingRow) -> Option<ScrapedVacancy> {
        let page = match self
            .fetcher
            .fetch(&row.url)
            .await
            .and_then(FetchedPage::require_success)
        {
            Ok(page) => page,
            Err(e) => {
                warn!(broker = BROKER, url = %row.url, error = %e, "detail page failed, skipping");
                return None;
            }
        };

        let about = parse_about(&page.body).unwrap_or_default();
        let meta = parse_meta(&page.body);
        if meta.posting_number.is_none() && meta.posting_date.is_none() {
            debug!(broker = BROKER, url = %row.url, "metadata line missing, keeping partial record");
        }

        let vacancy = ScrapedVacancy {
            source_url: row.url,
            title: row.title,
            broker_name: BROKER.to_string(),
            posting_number: meta.posting_number,
            work_hours: row.hours,
            salary: None,
            posting_date: meta.posting_date,
            about,
            company_name: meta.company_name,
            raw_location: row.location,
        };
        info!(broker = BROKER, url = %vacancy.source_url, title = %vacancy.title, "discovered vacancy");
        Some(vacancy)
    }
}

#[async_trait]
impl VacancyScraper for BaanbrugScraper {
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
        let rows = self.collect_rows().await?;
        let vacancies: Vec<ScrapedVacancy> = stream::iter(rows)
            .map(|row| self.fetch_detail(row))
            .buffer_unordered(self.limits.detail_concurrency.max(1))
            .filter_map(|vacancy| async move { vacancy })
            .collect()
            .await;
        info!(broker = BROKER, count = vacancies.len(), "finished scrape");
        Ok(vacancies)
    }
}

/// Reads "Pagina X van Y" and returns Y; a missing or garbled counter
/// means a single page.
fn parse_total_pages(html: &str) -> usize {
    static COUNTER: OnceLock<Selector> = OnceLock::new();
    let selector = COUNTER.get_or_init(|| Selector::parse("span.pagina-teller").unwrap());

    Html::parse_document(html)
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .and_then(|text| text.split_whitespace().last()?.parse().ok())
        .unwrap_or(1)
}

fn parse_rows(html: &str, base_url: &str) -> Vec<ListingRow> {
    static ROW: OnceLock<Selector> = OnceLock::new();
    static LINK: OnceLock<Selector> = OnceLock::new();
    static CELL: OnceLock<Selector> = OnceLock::new();
    let row_sel = ROW.get_or_init(|| Selector::parse("table.banen-tabel tr.baan-rij").unwrap());
    let link_sel = LINK.get_or_init(|| Selector::parse("a[href]").unwrap());
    let cell_sel = CELL.get_or_init(|| Selector::parse("td").unwrap());

    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(row_sel)
        .filter_map(|row| {
            let link = row.select(link_sel).next()?;
            let url = base.join(link.value().attr("href")?).ok()?.to_string();
            let title = non_empty(clean_text(&link.text().collect::<String>()))?;
            let cells: Vec<String> = row.select(cell_sel).map(cell_text).collect();
            Some(ListingRow {
                url,
                title,
                location: cells.get(1).cloned().and_then(non_empty),
                hours: cells.get(2).cloned().and_then(non_empty),
            })
        })
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    clean_text(&cell.text().collect::<String>())
}

fn parse_about(html: &str) -> Option<String> {
    static TEXT: OnceLock<Selector> = OnceLock::new();
    let selector = TEXT.get_or_init(|| Selector::parse("section.baan-tekst").unwrap());

    Html::parse_document(html)
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .and_then(non_empty)
}

/// The metadata line packs date, reference and employer into one string:
/// "Geplaatst op 3 april 2025 · Vacature B-8841 · Werkgever: Logistiek BV".
fn parse_meta(html: &str) -> DetailMeta {
    static META: OnceLock<Selector> = OnceLock::new();
    let selector = META.get_or_init(|| Selector::parse("p.baan-meta").unwrap());

    let document = Html::parse_document(html);
    let Some(line) = document
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
    else {
        return DetailMeta::default();
    };

    let mut meta = DetailMeta::default();
    for segment in line.split('·').map(str::trim) {
        if let Some(rest) = segment.strip_prefix("Geplaatst op ") {
            meta.posting_date = dates::parse_dutch_date(rest).and_then(dates::at_midnight_utc);
        } else if let Some(rest) = segment.strip_prefix("Vacature ") {
            meta.posting_number = non_empty(rest.to_string());
        } else if let Some(rest) = segment.strip_prefix("Werkgever: ") {
            meta.company_name = non_empty(rest.to_string());
        }
    }
    meta
}
