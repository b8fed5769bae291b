use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::vacancy::Vacancy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyResponse {
    pub id: Uuid,
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
    pub location_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyListResponse {
    pub items: Vec<VacancyResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VacancyListQuery {
    pub broker: Option<String>,
    pub limit: Option<usize>,
}

impl From<Vacancy> for VacancyResponse {
    fn from(value: Vacancy) -> Self {
        Self {
            id: value.id,
            source_url: value.source_url,
            title: value.title,
            broker_name: value.broker_name,
            posting_number: value.posting_number,
            work_hours: value.work_hours,
            salary: value.salary,
            posting_date: value.posting_date,
            about: value.about,
            company_name: value.company_name,
            raw_location: value.raw_location,
            location_id: value.location_id,
            created_at: value.created_at,
        }
    }
}
