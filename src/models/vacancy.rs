use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vacancy {
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

/// Insert payload for a vacancy; the database assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVacancy {
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
}
