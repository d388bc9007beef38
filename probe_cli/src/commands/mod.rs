pub mod agent;
pub mod list;
pub mod scrape;
pub mod serve;
pub mod validate;
