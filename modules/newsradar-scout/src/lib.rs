//! Collection side of the pipeline: scrapers and the tick scheduler that
//! drives them and feeds the work queue.

pub mod scheduler;
pub mod scraper;
pub mod seeds;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use scheduler::{Scheduler, SchedulerOptions, ScraperState};
pub use scraper::{NewsScraper, RssScraper, ScrapedArticle};
pub use seeds::SEED_SOURCES;
