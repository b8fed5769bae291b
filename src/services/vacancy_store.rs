use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Location, NewLocation, NewVacancy, Vacancy};

const VACANCY_COLUMNS: &str = "id, source_url, title, broker_name, posting_number, work_hours, \
     salary, posting_date, about, company_name, raw_location, location_id, created_at";

const LOCATION_COLUMNS: &str = "id, name, longitude, latitude";

/// Persistence boundary of the pipeline. `save` and `save_location` surface
/// a unique-key conflict as [`crate::error::Error::AlreadyExists`] so
/// callers can treat a lost check-then-insert race as a duplicate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VacancyStore: Send + Sync {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<Vacancy>>;
    async fn save(&self, vacancy: NewVacancy) -> Result<Vacancy>;
    async fn find_all(&self) -> Result<Vec<Vacancy>>;
    async fn delete_by_id(&self, id: Uuid) -> Result<()>;
    async fn find_location_by_name(&self, name: &str) -> Result<Option<Location>>;
    async fn save_location(&self, location: NewLocation) -> Result<Location>;
}

#[derive(Clone)]
pub struct PgVacancyStore {
    pool: PgPool,
}

impl PgVacancyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VacancyStore for PgVacancyStore {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<Vacancy>> {
        let query = format!(
            "SELECT {} FROM vacancies WHERE source_url = $1",
            VACANCY_COLUMNS
        );
        let vacancy = sqlx::query_as::<_, Vacancy>(&query)
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vacancy)
    }

    async fn save(&self, vacancy: NewVacancy) -> Result<Vacancy> {
        let query = format!(
            "INSERT INTO vacancies (source_url, title, broker_name, posting_number, work_hours, \
             salary, posting_date, about, company_name, raw_location, location_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {}",
            VACANCY_COLUMNS
        );
        let saved = sqlx::query_as::<_, Vacancy>(&query)
            .bind(vacancy.source_url)
            .bind(vacancy.title)
            .bind(vacancy.broker_name)
            .bind(vacancy.posting_number)
            .bind(vacancy.work_hours)
            .bind(vacancy.salary)
            .bind(vacancy.posting_date)
            .bind(vacancy.about)
            .bind(vacancy.company_name)
            .bind(vacancy.raw_location)
            .bind(vacancy.location_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Vacancy>> {
        let query = format!(
            "SELECT {} FROM vacancies ORDER BY created_at DESC",
            VACANCY_COLUMNS
        );
        let vacancies = sqlx::query_as::<_, Vacancy>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(vacancies)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM vacancies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_location_by_name(&self, name: &str) -> Result<Option<Location>> {
        let query = format!(
            "SELECT {} FROM locations WHERE name = $1",
            LOCATION_COLUMNS
        );
        let location = sqlx::query_as::<_, Location>(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    async fn save_location(&self, location: NewLocation) -> Result<Location> {
        let query = format!(
            "INSERT INTO locations (name, longitude, latitude)
             VALUES ($1, $2, $3)
             RETURNING {}",
            LOCATION_COLUMNS
        );
        let saved = sqlx::query_as::<_, Location>(&query)
            .bind(location.name)
            .bind(location.longitude)
            .bind(location.latitude)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }
}
