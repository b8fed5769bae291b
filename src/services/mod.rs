pub mod acquisition_service;
pub mod geocoding_service;
pub mod location_service;
pub mod sweep_service;
pub mod vacancy_store;

pub use acquisition_service::{AcquisitionService, CycleSummary};
pub use geocoding_service::{great_circle_distance_km, Geocoder, NominatimGeocoder};
pub use location_service::{normalize_location_name, LocationService};
pub use sweep_service::{SweepService, SweepSummary};
pub use vacancy_store::{PgVacancyStore, VacancyStore};
