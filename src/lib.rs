pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scrapers;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::error::Result;
use crate::scrapers::build_scrapers;
use crate::services::{
    AcquisitionService, LocationService, NominatimGeocoder, PgVacancyStore, SweepService,
    VacancyStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn VacancyStore>,
    pub acquisition_service: Arc<AcquisitionService>,
    pub sweep_service: Arc<SweepService>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let config = crate::config::get_config();

        let store: Arc<dyn VacancyStore> = Arc::new(PgVacancyStore::new(pool.clone()));
        let geocoder = Arc::new(NominatimGeocoder::new(
            config.geocoder_base_url.clone(),
            config.geocoder_email.clone(),
        )?);
        let locations = LocationService::new(store.clone(), geocoder);
        let scrapers = build_scrapers(config)?;

        let acquisition_service = Arc::new(AcquisitionService::new(
            store.clone(),
            locations,
            scrapers.clone(),
        ));
        let sweep_service = Arc::new(SweepService::new(store.clone(), scrapers));

        Ok(Self {
            pool,
            store,
            acquisition_service,
            sweep_service,
        })
    }
}
