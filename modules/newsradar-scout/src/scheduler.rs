use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tracing::{info, warn};

use newsradar_queue::ArticlePublisher;
use newsradar_store::ArticleRepo;

use crate::scraper::NewsScraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperState {
    Idle,
    Fetching,
    Publishing,
    /// Terminal: entered after too many consecutive failures.
    Disabled,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Tick period between collection runs.
    pub interval: Duration,
    /// Deadline for a single run; scrapers still fetching at the deadline
    /// are cancelled without aborting their siblings.
    pub run_deadline: Duration,
    /// Consecutive failures before a scraper is disabled.
    pub failure_threshold: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            run_deadline: Duration::from_secs(240),
            failure_threshold: 5,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub published: usize,
    pub skipped_seen: usize,
    pub failures: usize,
}

struct Slot {
    scraper: Arc<dyn NewsScraper>,
    state: ScraperState,
    consecutive_failures: u32,
}

/// Drives every registered scraper on a fixed cadence and publishes unseen
/// articles to the work queue.
///
/// The seen-URL cache only trims queue traffic; the article store's unique
/// constraint remains the source of truth for duplicates.
pub struct Scheduler {
    slots: Vec<Slot>,
    publisher: Arc<dyn ArticlePublisher>,
    seen: HashSet<String>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(publisher: Arc<dyn ArticlePublisher>, options: SchedulerOptions) -> Self {
        Self {
            slots: Vec::new(),
            publisher,
            seen: HashSet::new(),
            options,
        }
    }

    pub fn register(&mut self, scraper: Arc<dyn NewsScraper>) {
        info!(scraper = scraper.name(), "Registered scraper");
        self.slots.push(Slot {
            scraper,
            state: ScraperState::Idle,
            consecutive_failures: 0,
        });
    }

    pub fn state_of(&self, name: &str) -> Option<ScraperState> {
        self.slots
            .iter()
            .find(|s| s.scraper.name() == name)
            .map(|s| s.state)
    }

    /// Preload the seen-URL cache from the article store.
    pub async fn bootstrap_seen(&mut self, articles: &dyn ArticleRepo) -> Result<usize> {
        let urls = articles.urls().await?;
        let count = urls.len();
        self.seen.extend(urls);
        info!(known_urls = count, "Seen-URL cache bootstrapped");
        Ok(count)
    }

    /// Run forever: one collection pass immediately, then every tick.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            scrapers = self.slots.len(),
            interval_secs = self.options.interval.as_secs(),
            "Scheduler starting"
        );

        let mut interval = tokio::time::interval(self.options.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let stats = self.run_once().await;
            info!(
                fetched = stats.fetched,
                published = stats.published,
                skipped = stats.skipped_seen,
                failures = stats.failures,
                "Collection run complete"
            );
        }
    }

    /// One collection pass: fetch all active scrapers concurrently under
    /// the run deadline, then publish their unseen articles.
    pub async fn run_once(&mut self) -> RunStats {
        let mut stats = RunStats::default();

        let active: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state != ScraperState::Disabled)
            .map(|(i, _)| i)
            .collect();

        for &i in &active {
            self.slots[i].state = ScraperState::Fetching;
        }

        let deadline = self.options.run_deadline;
        let fetches = active.iter().map(|&i| {
            let scraper = Arc::clone(&self.slots[i].scraper);
            async move {
                let result = tokio::time::timeout(deadline, scraper.fetch()).await;
                (i, result)
            }
        });
        let results = join_all(fetches).await;

        for (i, result) in results {
            let name = self.slots[i].scraper.name().to_string();
            let source_name = name.clone();

            let articles = match result {
                Ok(Ok(articles)) => articles,
                Ok(Err(e)) => {
                    warn!(scraper = %name, error = %e, "Scraper failed");
                    self.record_failure(i);
                    stats.failures += 1;
                    continue;
                }
                Err(_) => {
                    warn!(
                        scraper = %name,
                        deadline_secs = deadline.as_secs(),
                        "Scraper cancelled at run deadline"
                    );
                    self.record_failure(i);
                    stats.failures += 1;
                    continue;
                }
            };

            stats.fetched += articles.len();
            self.slots[i].state = ScraperState::Publishing;

            for article in articles {
                if self.seen.contains(&article.url) {
                    stats.skipped_seen += 1;
                    continue;
                }
                let url = article.url.clone();
                let message = article.into_message(&source_name);
                match self.publisher.publish(&message).await {
                    Ok(()) => {
                        self.seen.insert(url);
                        stats.published += 1;
                    }
                    Err(e) => {
                        // Publisher already retried with backoff; drop the
                        // rest of this scraper's batch and move on.
                        warn!(scraper = %name, error = %e, "Publish failed; dropping batch");
                        stats.failures += 1;
                        break;
                    }
                }
            }

            self.slots[i].consecutive_failures = 0;
            self.slots[i].state = ScraperState::Idle;
        }

        stats
    }

    fn record_failure(&mut self, i: usize) {
        let slot = &mut self.slots[i];
        slot.consecutive_failures += 1;
        if slot.consecutive_failures >= self.options.failure_threshold {
            warn!(
                scraper = slot.scraper.name(),
                failures = slot.consecutive_failures,
                "Scraper disabled after repeated failures"
            );
            slot.state = ScraperState::Disabled;
        } else {
            slot.state = ScraperState::Idle;
        }
    }
}
