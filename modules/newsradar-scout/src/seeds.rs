/// Initial source registry: (name, base URL, reputation). Loaded by the
/// `seed-sources` command; reputations are tuned by hand afterwards.
pub const SEED_SOURCES: &[(&str, &str, f64)] = &[
    ("Bloomberg", "https://www.bloomberg.com", 0.90),
    ("Reuters", "https://www.reuters.com", 0.90),
    ("Financial Times", "https://www.ft.com", 0.85),
    ("Wall Street Journal", "https://www.wsj.com", 0.85),
    ("CNBC", "https://www.cnbc.com", 0.75),
    ("MarketWatch", "https://www.marketwatch.com", 0.70),
    ("Yahoo Finance", "https://finance.yahoo.com", 0.65),
];

/// RSS feeds scraped by default when `run-scheduler` is not given an
/// explicit source file: (source name, site URL, feed URL).
pub const DEFAULT_FEEDS: &[(&str, &str, &str)] = &[
    (
        "CNBC",
        "https://www.cnbc.com",
        "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=10000664",
    ),
    (
        "MarketWatch",
        "https://www.marketwatch.com",
        "https://feeds.content.dowjones.io/public/rss/mw_topstories",
    ),
    (
        "Yahoo Finance",
        "https://finance.yahoo.com",
        "https://finance.yahoo.com/news/rssindex",
    ),
];
