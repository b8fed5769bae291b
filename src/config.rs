use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub geocoder_base_url: String,
    pub geocoder_email: Option<String>,
    pub scraper_user_agent: String,
    pub fetch_timeout_secs: u64,
    pub max_list_pages: usize,
    pub detail_concurrency: usize,
    pub cycle_deadline_secs: u64,
    pub public_rps: u32,
    pub werkpost_base_url: String,
    pub baanbrug_base_url: String,
    pub flexfeed_base_url: String,
    pub uitzendnet_base_url: String,
    pub talentbank_base_url: String,
    pub talentbank_username: Option<String>,
    pub talentbank_password: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            geocoder_base_url: get_env_or(
                "GEOCODER_BASE_URL",
                "https://nominatim.openstreetmap.org",
            ),
            geocoder_email: env::var("GEOCODER_EMAIL").ok(),
            scraper_user_agent: get_env_or("SCRAPER_USER_AGENT", DEFAULT_USER_AGENT),
            fetch_timeout_secs: get_env_parse_or("FETCH_TIMEOUT_SECS", 30)?,
            max_list_pages: get_env_parse_or("MAX_LIST_PAGES", 50)?,
            detail_concurrency: get_env_parse_or("DETAIL_CONCURRENCY", 8)?,
            cycle_deadline_secs: get_env_parse_or("CYCLE_DEADLINE_SECS", 900)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 30)?,
            werkpost_base_url: get_env_or("WERKPOST_BASE_URL", "https://www.werkpost.nl"),
            baanbrug_base_url: get_env_or("BAANBRUG_BASE_URL", "https://www.baanbrug.nl"),
            flexfeed_base_url: get_env_or("FLEXFEED_BASE_URL", "https://flexfeed.nl"),
            uitzendnet_base_url: get_env_or("UITZENDNET_BASE_URL", "https://www.uitzendnet.nl"),
            talentbank_base_url: get_env_or(
                "TALENTBANK_BASE_URL",
                "https://portaal.talentbank.nl",
            ),
            talentbank_username: env::var("TALENTBANK_USERNAME").ok(),
            talentbank_password: env::var("TALENTBANK_PASSWORD").ok(),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
