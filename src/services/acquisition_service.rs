use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::NewVacancy;
use crate::scrapers::{ScrapedVacancy, VacancyScraper};

use super::location_service::LocationService;
use super::vacancy_store::VacancyStore;

/// Outcome counts of one acquisition cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub discovered: usize,
    pub new: usize,
    pub existing: usize,
    pub failed_sources: usize,
    pub errors: usize,
}

/// Runs every configured source adapter concurrently and reconciles the
/// produced postings against the store. Keeps no state between cycles;
/// whatever the store holds is the only cross-cycle memory.
pub struct AcquisitionService {
    store: Arc<dyn VacancyStore>,
    locations: LocationService,
    scrapers: Vec<Arc<dyn VacancyScraper>>,
}

impl AcquisitionService {
    pub fn new(
        store: Arc<dyn VacancyStore>,
        locations: LocationService,
        scrapers: Vec<Arc<dyn VacancyScraper>>,
    ) -> Self {
        Self {
            store,
            locations,
            scrapers,
        }
    }

    pub async fn run_cycle(&self) -> CycleSummary {
        info!(sources = self.scrapers.len(), "starting acquisition cycle");

        let runs = join_all(self.scrapers.iter().map(|scraper| {
            let scraper = Arc::clone(scraper);
            async move {
                let broker = scraper.broker_name().to_string();
                let result = scraper.produce_vacancies().await;
                (broker, result)
            }
        }))
        .await;

        let mut summary = CycleSummary::default();
        let mut postings = Vec::new();
        for (broker, result) in runs {
            match result {
                Ok(list) => {
                    info!(broker = %broker, count = list.len(), "source run complete");
                    postings.extend(list);
                }
                Err(e) => {
                    warn!(broker = %broker, error = %e, "source run failed");
                    summary.failed_sources += 1;
                }
            }
        }
        summary.discovered = postings.len();

        for posting in postings {
            let source_url = posting.source_url.clone();
            match self.reconcile(posting).await {
                Ok(true) => summary.new += 1,
                Ok(false) => summary.existing += 1,
                Err(e) => {
                    warn!(url = %source_url, error = %e, "persisting vacancy failed");
                    summary.errors += 1;
                }
            }
        }

        info!(
            discovered = summary.discovered,
            new = summary.new,
            existing = summary.existing,
            failed_sources = summary.failed_sources,
            errors = summary.errors,
            "acquisition cycle complete"
        );
        summary
    }

    /// `Ok(true)` when a record was created, `Ok(false)` when this URL
    /// already has one. The lookup only saves work; the store's unique
    /// constraint is the authoritative guard, so losing a check-then-insert
    /// race surfaces as [`Error::AlreadyExists`] and counts as existing.
    async fn reconcile(&self, posting: ScrapedVacancy) -> Result<bool> {
        if posting.source_url.trim().is_empty() {
            return Err(Error::Extraction("posting without source URL".to_string()));
        }
        if self
            .store
            .find_by_source_url(&posting.source_url)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let location_id = match posting.raw_location.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                self.locations.resolve(raw).await.map(|location| location.id)
            }
            _ => None,
        };

        match self.store.save(to_new_vacancy(posting, location_id)).await {
            Ok(_) => Ok(true),
            Err(Error::AlreadyExists) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn to_new_vacancy(posting: ScrapedVacancy, location_id: Option<Uuid>) -> NewVacancy {
    NewVacancy {
        source_url: posting.source_url,
        title: posting.title,
        broker_name: posting.broker_name,
        posting_number: posting.posting_number,
        work_hours: posting.work_hours,
        salary: posting.salary,
        posting_date: posting.posting_date,
        about: posting.about,
        company_name: posting.company_name,
        raw_location: posting.raw_location,
        location_id,
    }
}

#[cfg(test)]
mod tests {
    use super::super::geocoding_service::MockGeocoder;
    use super::super::vacancy_store::MockVacancyStore;
    use super::*;
    use crate::models::{Location, Vacancy};
    use crate::scrapers::MockVacancyScraper;
    use chrono::Utc;

    fn posting(url: &str) -> ScrapedVacancy {
        ScrapedVacancy {
            source_url: url.to_string(),
            title: "Orderpicker".to_string(),
            broker_name: "Werkpost".to_string(),
            posting_number: None,
            work_hours: None,
            salary: None,
            posting_date: None,
            about: "Magazijnwerk.".to_string(),
            company_name: None,
            raw_location: None,
        }
    }

    fn stored(url: &str) -> Vacancy {
        Vacancy {
            id: Uuid::new_v4(),
            source_url: url.to_string(),
            title: "Orderpicker".to_string(),
            broker_name: "Werkpost".to_string(),
            posting_number: None,
            work_hours: None,
            salary: None,
            posting_date: None,
            about: "Magazijnwerk.".to_string(),
            company_name: None,
            raw_location: None,
            location_id: None,
            created_at: Some(Utc::now()),
        }
    }

    fn saved_from(new: NewVacancy) -> Vacancy {
        Vacancy {
            id: Uuid::new_v4(),
            source_url: new.source_url,
            title: new.title,
            broker_name: new.broker_name,
            posting_number: new.posting_number,
            work_hours: new.work_hours,
            salary: new.salary,
            posting_date: new.posting_date,
            about: new.about,
            company_name: new.company_name,
            raw_location: new.raw_location,
            location_id: new.location_id,
            created_at: Some(Utc::now()),
        }
    }

    fn scraper_returning(
        broker: &str,
        result: Result<Vec<ScrapedVacancy>>,
    ) -> Arc<dyn VacancyScraper> {
        let mut scraper = MockVacancyScraper::new();
        scraper
            .expect_broker_name()
            .return_const(broker.to_string());
        let mut result = Some(result);
        scraper
            .expect_produce_vacancies()
            .returning(move || result.take().unwrap_or_else(|| Ok(Vec::new())));
        Arc::new(scraper)
    }

    fn idle_locations() -> LocationService {
        let mut store = MockVacancyStore::new();
        store.expect_find_location_by_name().times(0);
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().times(0);
        LocationService::new(Arc::new(store), Arc::new(geocoder))
    }

    #[tokio::test]
    async fn counts_new_and_existing_postings() {
        let mut store = MockVacancyStore::new();
        store
            .expect_find_by_source_url()
            .returning(|url| {
                if url == "https://a.test/v/known" {
                    Ok(Some(stored(url)))
                } else {
                    Ok(None)
                }
            });
        store.expect_save().times(2).returning(|new| Ok(saved_from(new)));

        let service = AcquisitionService::new(
            Arc::new(store),
            idle_locations(),
            vec![
                scraper_returning(
                    "Werkpost",
                    Ok(vec![posting("https://a.test/v/known"), posting("https://a.test/v/1")]),
                ),
                scraper_returning("Flexfeed", Ok(vec![posting("https://b.test/v/2")])),
            ],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.new, 2);
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.failed_sources, 0);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn failed_source_does_not_block_the_others() {
        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().returning(|_| Ok(None));
        store.expect_save().times(1).returning(|new| Ok(saved_from(new)));

        let service = AcquisitionService::new(
            Arc::new(store),
            idle_locations(),
            vec![
                scraper_returning("Baanbrug", Err(Error::Fetch("unreachable".to_string()))),
                scraper_returning("Flexfeed", Ok(vec![posting("https://b.test/v/1")])),
            ],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.failed_sources, 1);
        assert_eq!(summary.new, 1);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn lost_insert_race_counts_as_existing() {
        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().returning(|_| Ok(None));
        store.expect_save().returning(|_| Err(Error::AlreadyExists));

        let service = AcquisitionService::new(
            Arc::new(store),
            idle_locations(),
            vec![scraper_returning(
                "Werkpost",
                Ok(vec![posting("https://a.test/v/1")]),
            )],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.new, 0);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn resolved_location_is_attached_to_the_new_record() {
        let location_id = Uuid::new_v4();

        let mut locations_store = MockVacancyStore::new();
        locations_store
            .expect_find_location_by_name()
            .withf(|name| name == "Venlo")
            .returning(move |name| {
                Ok(Some(Location {
                    id: location_id,
                    name: name.to_string(),
                    longitude: 6.17,
                    latitude: 51.37,
                }))
            });
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().times(0);
        let locations =
            LocationService::new(Arc::new(locations_store), Arc::new(geocoder));

        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().returning(|_| Ok(None));
        store
            .expect_save()
            .withf(move |new| new.location_id == Some(location_id))
            .returning(|new| Ok(saved_from(new)));

        let mut with_location = posting("https://a.test/v/1");
        with_location.raw_location = Some("Venlo, Nederland".to_string());

        let service = AcquisitionService::new(
            Arc::new(store),
            locations,
            vec![scraper_returning("Werkpost", Ok(vec![with_location]))],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.new, 1);
    }

    #[tokio::test]
    async fn unresolvable_location_still_persists_the_posting() {
        let mut locations_store = MockVacancyStore::new();
        locations_store
            .expect_find_location_by_name()
            .returning(|_| Ok(None));
        locations_store.expect_save_location().times(0);
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().returning(|_| Ok(None));
        let locations =
            LocationService::new(Arc::new(locations_store), Arc::new(geocoder));

        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().returning(|_| Ok(None));
        store
            .expect_save()
            .withf(|new| new.location_id.is_none())
            .returning(|new| Ok(saved_from(new)));

        let mut with_location = posting("https://a.test/v/1");
        with_location.raw_location = Some("Nergenshuizen".to_string());

        let service = AcquisitionService::new(
            Arc::new(store),
            locations,
            vec![scraper_returning("Werkpost", Ok(vec![with_location]))],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.new, 1);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn posting_without_source_url_is_an_error() {
        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().times(0);
        store.expect_save().times(0);

        let service = AcquisitionService::new(
            Arc::new(store),
            idle_locations(),
            vec![scraper_returning("Werkpost", Ok(vec![posting("  ")]))],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.new, 0);
    }

    #[tokio::test]
    async fn store_failure_counts_as_error_not_crash() {
        let mut store = MockVacancyStore::new();
        store.expect_find_by_source_url().returning(|_| Ok(None));
        store
            .expect_save()
            .returning(|_| Err(Error::Internal("store unavailable".to_string())));

        let service = AcquisitionService::new(
            Arc::new(store),
            idle_locations(),
            vec![scraper_returning(
                "Werkpost",
                Ok(vec![posting("https://a.test/v/1")]),
            )],
        );

        let summary = service.run_cycle().await;
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.new, 0);
    }
}
