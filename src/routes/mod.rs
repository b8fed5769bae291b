pub mod health;
pub mod scrape;
pub mod vacancy;
