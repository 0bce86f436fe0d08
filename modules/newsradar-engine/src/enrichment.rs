use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use llm_client::util::truncate_to_char_boundary;
use llm_client::ChatAgent;
use newsradar_common::{Article, HotnessBreakdown, SourceRef, Story, TimelineEvent};

/// Rationale substituted when the model could not be reached or parsed.
pub const FALLBACK_WHY_NOW: &str = "Analysis unavailable";

/// At most this many articles are quoted in the prompt.
const PROMPT_ARTICLES: usize = 5;
/// Per-article excerpt bound in the prompt.
const PROMPT_EXCERPT_CHARS: usize = 1000;
/// Headline length cap, applied to model output and fallbacks alike.
const HEADLINE_CHARS: usize = 100;
const MAX_ENTITIES: usize = 10;
const SUCCESS_SOURCES: usize = 5;
const FALLBACK_SOURCES: usize = 3;

const ENRICH_SYSTEM_PROMPT: &str = "You are a financial news analyst and editor. \
You are given the articles of one news cluster and produce a structured, \
publication-ready summary. Every claim must come from the articles; do not \
invent facts.";

/// Turns a scored cluster into a Story. Total: any model failure, timeout
/// or parse problem yields a fallback Story instead of an error.
pub struct Enricher {
    agent: Arc<dyn ChatAgent>,
    timeout: Duration,
}

impl Enricher {
    pub fn new(agent: Arc<dyn ChatAgent>, timeout: Duration) -> Self {
        Self { agent, timeout }
    }

    pub async fn enrich(
        &self,
        cluster_id: Uuid,
        articles: &[Article],
        hotness: HotnessBreakdown,
        learned: f64,
        score: f64,
    ) -> Story {
        debug!(cluster = %cluster_id, articles = articles.len(), "Prompting for enrichment");

        let prompt = build_prompt(articles);
        let response = tokio::time::timeout(
            self.timeout,
            self.agent.generate_json(ENRICH_SYSTEM_PROMPT, &prompt),
        )
        .await;

        let value = match response {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(cluster = %cluster_id, error = %e, "Enrichment failed; emitting fallback");
                return fallback_story(cluster_id, articles, hotness, learned, score);
            }
            Err(_) => {
                warn!(
                    cluster = %cluster_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Enrichment timed out; emitting fallback"
                );
                return fallback_story(cluster_id, articles, hotness, learned, score);
            }
        };

        debug!(cluster = %cluster_id, "Enrichment response parsed");
        story_from_value(cluster_id, articles, hotness, learned, score, &value)
    }
}

fn build_prompt(articles: &[Article]) -> String {
    let excerpts: Vec<String> = articles
        .iter()
        .take(PROMPT_ARTICLES)
        .map(|article| {
            format!(
                "Title: {}\nSource: {}\nPublished: {}\nURL: {}\nContent: {}",
                article.title,
                article.source_id,
                article.published_at.to_rfc3339(),
                article.url,
                truncate_to_char_boundary(&article.content, PROMPT_EXCERPT_CHARS),
            )
        })
        .collect();

    format!(
        "Analyze the following news articles covering one story.\n\n{}\n\n\
         Respond with a JSON object with these fields:\n\
         1. \"headline\": short, punchy headline (at most 100 characters)\n\
         2. \"why_now\": 1-2 sentences on why this matters RIGHT NOW \
         (novelty, confirmations, scale of impact)\n\
         3. \"entities\": companies, tickers, countries or sectors mentioned \
         (at most 10 strings)\n\
         4. \"timeline\": key moments as [{{\"time\": \"YYYY-MM-DD HH:MM\", \
         \"event\": \"description\"}}]\n\
         5. \"draft\": full post draft as ONE string with markdown: a 2-3 \
         sentence lead, three key bullet points, and one attributed quote or \
         reference from the articles\n\
         6. \"short_post\": a ready-to-publish short post: start with a \
         fitting emoji, then the headline, then 2-3 short paragraphs",
        excerpts.join("\n\n---\n\n")
    )
}

/// Map the model's reply onto a Story, substituting per-field defaults for
/// anything missing or mis-typed.
fn story_from_value(
    cluster_id: Uuid,
    articles: &[Article],
    hotness: HotnessBreakdown,
    learned: f64,
    score: f64,
    value: &Value,
) -> Story {
    let headline = match value.get("headline").and_then(Value::as_str) {
        Some(h) if !h.trim().is_empty() => truncate_to_char_boundary(h.trim(), HEADLINE_CHARS).to_string(),
        _ => fallback_headline(articles),
    };

    let why_now = value
        .get("why_now")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let entities: Vec<String> = value
        .get("entities")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .take(MAX_ENTITIES)
                .collect()
        })
        .unwrap_or_default();

    let timeline: Vec<TimelineEvent> = value
        .get("timeline")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let time = item.get("time").and_then(Value::as_str)?;
                    let event = item.get("event").and_then(Value::as_str)?;
                    Some(TimelineEvent {
                        time: time.to_string(),
                        event: event.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    // Some models return the draft as {lead, bullets, quote} despite the
    // instructions; flatten that shape instead of dropping it.
    let draft = match value.get("draft") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => {
            let lead = map.get("lead").and_then(Value::as_str).unwrap_or("");
            let bullets: Vec<String> = map
                .get("bullets")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(|b| format!("- {b}"))
                        .collect()
                })
                .unwrap_or_default();
            let quote = map.get("quote").and_then(Value::as_str).unwrap_or("");
            let mut out = String::new();
            if !lead.is_empty() {
                out.push_str(lead);
                out.push_str("\n\n");
            }
            out.push_str(&bullets.join("\n"));
            if !quote.is_empty() {
                out.push_str(&format!("\n\n\"{quote}\""));
            }
            out
        }
        _ => String::new(),
    };

    let short_post = match value.get("short_post").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => format!("⚡️{headline}\n\n{why_now}"),
    };

    Story {
        cluster_id,
        hotness,
        learned,
        score,
        headline,
        why_now,
        entities,
        sources: source_refs(articles, SUCCESS_SOURCES),
        timeline,
        draft,
        short_post,
        enriched: true,
    }
}

fn fallback_headline(articles: &[Article]) -> String {
    articles
        .first()
        .map(|a| truncate_to_char_boundary(&a.title, HEADLINE_CHARS).to_string())
        .unwrap_or_default()
}

fn source_refs(articles: &[Article], limit: usize) -> Vec<SourceRef> {
    articles
        .iter()
        .take(limit)
        .map(|a| SourceRef {
            url: a.url.clone(),
            title: a.title.clone(),
            published_at: Some(a.published_at),
        })
        .collect()
}

fn fallback_story(
    cluster_id: Uuid,
    articles: &[Article],
    hotness: HotnessBreakdown,
    learned: f64,
    score: f64,
) -> Story {
    let headline = fallback_headline(articles);
    Story {
        cluster_id,
        hotness,
        learned,
        score,
        headline: headline.clone(),
        why_now: FALLBACK_WHY_NOW.to_string(),
        entities: vec![],
        sources: source_refs(articles, FALLBACK_SOURCES),
        timeline: vec![],
        draft: String::new(),
        short_post: format!("📰 {headline}\n\nDetails to follow."),
        enriched: false,
    }
}
