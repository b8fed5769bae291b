use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::scrapers::VacancyScraper;

use super::vacancy_store::VacancyStore;

/// Outcome counts of one staleness sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub live: usize,
    pub removed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Walks every persisted vacancy and removes the ones whose source says
/// they are gone. Liveness is asked of the adapter that produced the
/// record, since the gone-signal differs per source.
pub struct SweepService {
    store: Arc<dyn VacancyStore>,
    scrapers: Vec<Arc<dyn VacancyScraper>>,
}

impl SweepService {
    pub fn new(store: Arc<dyn VacancyStore>, scrapers: Vec<Arc<dyn VacancyScraper>>) -> Self {
        Self { store, scrapers }
    }

    fn scraper_for(&self, broker_name: &str) -> Option<&Arc<dyn VacancyScraper>> {
        self.scrapers
            .iter()
            .find(|scraper| scraper.broker_name() == broker_name)
    }

    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let vacancies = match self.store.find_all().await {
            Ok(vacancies) => vacancies,
            Err(e) => {
                error!(error = %e, "listing vacancies for sweep failed");
                summary.errors += 1;
                return summary;
            }
        };

        info!(count = vacancies.len(), "starting staleness sweep");
        summary.checked = vacancies.len();

        for vacancy in vacancies {
            let Some(scraper) = self.scraper_for(&vacancy.broker_name) else {
                debug!(
                    broker = %vacancy.broker_name,
                    url = %vacancy.source_url,
                    "no adapter configured for broker, leaving record"
                );
                summary.skipped += 1;
                continue;
            };

            match scraper.is_vacancy_live(&vacancy.source_url).await {
                Ok(true) => summary.live += 1,
                Ok(false) => match self.store.delete_by_id(vacancy.id).await {
                    Ok(()) => {
                        info!(url = %vacancy.source_url, "removed vacancy no longer live");
                        summary.removed += 1;
                    }
                    Err(e) => {
                        warn!(url = %vacancy.source_url, error = %e, "deleting vacancy failed");
                        summary.errors += 1;
                    }
                },
                Err(e) => {
                    warn!(
                        url = %vacancy.source_url,
                        error = %e,
                        "liveness check failed, keeping record"
                    );
                    summary.errors += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            live = summary.live,
            removed = summary.removed,
            skipped = summary.skipped,
            errors = summary.errors,
            "staleness sweep complete"
        );
        summary
    }
}
