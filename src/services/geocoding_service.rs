use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Coordinates;

const GEOCODER_USER_AGENT: &str = "jobscout-backend/0.1 (vacancy aggregation)";

/// External forward-geocoding collaborator. `Ok(None)` means the service
/// answered but knows no such place; errors cover transport and malformed
/// responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>>;
}

/// Nominatim-compatible geocoder. Coordinates arrive as strings in the
/// payload and are parsed here.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: String, email: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(GEOCODER_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
        })
    }

    fn search_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );
        if let Some(email) = &self.email {
            url.push_str(&format!("&email={}", urlencoding::encode(email)));
        }
        url
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        debug!(query, "geocoding place name");
        let response = self.client.get(self.search_url(query)).send().await?;
        if !response.status().is_success() {
            return Err(Error::Geocoding(format!(
                "geocoder returned status {}",
                response.status()
            )));
        }
        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| Error::Geocoding(format!("malformed geocoder response: {}", e)))?;

        let Some(place) = places.first() else {
            debug!(query, "geocoder found no match");
            return Ok(None);
        };
        let latitude: f64 = place
            .lat
            .parse()
            .map_err(|e| Error::Geocoding(format!("invalid latitude in response: {}", e)))?;
        let longitude: f64 = place
            .lon
            .parse()
            .map_err(|e| Error::Geocoding(format!("invalid longitude in response: {}", e)))?;
        Ok(Some(Coordinates {
            longitude,
            latitude,
        }))
    }
}

/// Haversine great-circle distance in kilometers.
pub fn great_circle_distance_km(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
