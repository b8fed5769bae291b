use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::models::{Location, NewLocation};

use super::geocoding_service::Geocoder;
use super::vacancy_store::VacancyStore;

const COUNTRY_QUALIFIER: &str = "Netherlands";

const COUNTRY_SUFFIXES: &[&str] = &[", nederland", ", the netherlands", ", netherlands", ", nl"];

/// Spelling variants folded to one canonical place name.
const SPELLING_ALIASES: &[(&str, &str)] = &[
    ("'s-hertogenbosch", "Den Bosch"),
    ("'s-gravenhage", "Den Haag"),
    ("alphen a/d rijn", "Alphen aan den Rijn"),
];

const LOWERCASE_PARTICLES: &[&str] = &["aan", "bij", "de", "den", "der", "het", "op", "ter", "van"];

/// Resolves free-text place names to stored [`Location`] rows. The store
/// doubles as the cache; the geocoder is only consulted for names never
/// seen before.
#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn VacancyStore>,
    geocoder: Arc<dyn Geocoder>,
}

impl LocationService {
    pub fn new(store: Arc<dyn VacancyStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    /// `None` when the name is empty, unknown to the geocoder, or any layer
    /// fails; resolution trouble never blocks persisting the vacancy itself.
    pub async fn resolve(&self, raw_name: &str) -> Option<Location> {
        let name = normalize_location_name(raw_name);
        if name.is_empty() {
            return None;
        }

        match self.store.find_location_by_name(&name).await {
            Ok(Some(location)) => return Some(location),
            Ok(None) => {}
            Err(e) => {
                warn!(name = %name, error = %e, "location lookup failed");
                return None;
            }
        }

        let query = format!("{}, {}", name, COUNTRY_QUALIFIER);
        let coordinates = match self.geocoder.geocode(&query).await {
            Ok(Some(coordinates)) => coordinates,
            Ok(None) => {
                debug!(name = %name, "place name could not be resolved");
                return None;
            }
            Err(e) => {
                warn!(name = %name, error = %e, "geocoding failed");
                return None;
            }
        };

        let new_location = NewLocation {
            name: name.clone(),
            longitude: coordinates.longitude,
            latitude: coordinates.latitude,
        };
        match self.store.save_location(new_location).await {
            Ok(location) => Some(location),
            // Lost a race against a concurrent resolver; the winner's row
            // is the one to share.
            Err(Error::AlreadyExists) => self
                .store
                .find_location_by_name(&name)
                .await
                .ok()
                .flatten(),
            Err(e) => {
                warn!(name = %name, error = %e, "saving location failed");
                None
            }
        }
    }
}

/// Collapses whitespace, strips trailing country suffixes, folds known
/// spelling aliases and repairs all-caps or all-lower input.
pub fn normalize_location_name(raw: &str) -> String {
    let mut name = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for suffix in COUNTRY_SUFFIXES {
        if ends_with_ignore_ascii_case(&name, suffix) {
            name.truncate(name.len() - suffix.len());
            let kept = name.trim_end_matches([' ', ',']).len();
            name.truncate(kept);
            break;
        }
    }

    let key = name.to_lowercase();
    for (alias, canonical) in SPELLING_ALIASES {
        if key == *alias {
            return canonical.to_string();
        }
    }

    fix_casing(name)
}

fn ends_with_ignore_ascii_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Mixed-case names are taken as already correct; shouted or lowercased
/// feeds get title-cased with Dutch particles kept small.
fn fix_casing(name: String) -> String {
    let has_lower = name.chars().any(|c| c.is_lowercase());
    let has_upper = name.chars().any(|c| c.is_uppercase());
    if has_lower && has_upper {
        return name;
    }

    name.split(' ')
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && LOWERCASE_PARTICLES.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    // The Dutch ij digraph capitalizes as a pair.
    if let Some(rest) = word.strip_prefix("ij") {
        return format!("IJ{}", rest);
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
