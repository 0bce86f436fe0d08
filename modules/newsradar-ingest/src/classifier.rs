use std::sync::Arc;

use anyhow::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use llm_client::OpenAi;
use newsradar_common::NewsCategory;

/// Finance vocabulary for the prefilter stage. Lowercased substring match;
/// anything that hits none of these is definitely irrelevant.
const FINANCE_TERMS: &[&str] = &[
    // English
    "economy", "finance", "financial", "bank", "credit", "investment", "investor",
    "stock", "share", "equity", "market", "exchange", "currency", "dollar", "euro",
    "inflation", "gdp", "budget", "tax", "tariff", "bond", "fund", "dividend",
    "profit", "loss", "revenue", "earnings", "capitalization", "ipo", "merger",
    "acquisition", "sanction", "trade", "business", "company", "corporation",
    "industry", "sector", "crypto", "bitcoin", "blockchain", "token", "price",
    "rate", "index", "growth", "decline", "forecast", "mortgage", "real estate",
    "oil", "gas", "gold", "commodity", "export", "import",
    // Russian
    "экономика", "финансы", "банк", "кредит", "инвестиц", "акци", "биржа",
    "валюта", "рубль", "доллар", "евро", "центробанк", "нефть", "газ", "золото",
    "инфляция", "ввп", "бюджет", "налог", "пошлин", "облигаци", "фонд",
    "дивиденд", "прибыл", "убыток", "выручка", "капитализаци", "сделка",
    "поглощение", "слияние", "санкци", "торговля", "бизнес", "компания",
    "производство", "отрасл", "криптовалюта", "биткоин", "рынок", "цена",
    "котировк", "рост", "падение", "ипотека", "недвижимость",
];

/// What the learned model returns for one article.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Prediction {
    /// One of: economy, stock, finance, business, technology, politics,
    /// society, science, sports, entertainment, incident, other
    pub category: String,
    /// Confidence in [0,1]
    pub confidence: f32,
}

// --- RelevanceModel trait ---

#[async_trait::async_trait]
pub trait RelevanceModel: Send + Sync {
    async fn predict(&self, text: &str) -> Result<Prediction>;
}

/// Learned labelling via LLM structured output.
pub struct LlmRelevanceModel {
    agent: OpenAi,
}

const LABEL_SYSTEM_PROMPT: &str = "You label news articles with exactly one category. \
Categories: economy, stock, finance, business, technology, politics, society, \
science, sports, entertainment, incident, other. \
Pick the single best-fitting category and your confidence in [0,1].";

impl LlmRelevanceModel {
    pub fn new(agent: OpenAi) -> Self {
        Self { agent }
    }
}

#[async_trait::async_trait]
impl RelevanceModel for LlmRelevanceModel {
    async fn predict(&self, text: &str) -> Result<Prediction> {
        let text = llm_client::util::truncate_to_char_boundary(text, 2000);
        let user = format!("Categorize this article:\n\n{text}");
        let prediction: Prediction = self.agent.extract(LABEL_SYSTEM_PROMPT, &user).await?;
        Ok(prediction)
    }
}

// --- Admission policy ---

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted {
        category: NewsCategory,
        confidence: f32,
    },
    /// The model errored; articles are never lost silently.
    AdmittedFailOpen,
    RejectedPrefilter,
    RejectedCategory {
        category: NewsCategory,
        confidence: f32,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. } | Admission::AdmittedFailOpen)
    }
}

/// Two-stage gate: keyword prefilter, then learned label.
pub struct RelevanceClassifier {
    model: Arc<dyn RelevanceModel>,
    min_confidence: f32,
}

impl RelevanceClassifier {
    pub fn new(model: Arc<dyn RelevanceModel>, min_confidence: f32) -> Self {
        Self {
            model,
            min_confidence,
        }
    }

    /// Stage 1: cheap substring scan over the finance vocabulary.
    pub fn prefilter(title: &str, content: &str) -> bool {
        let text = format!("{title} {content}").to_lowercase();
        FINANCE_TERMS.iter().any(|term| text.contains(term))
    }

    /// Both stages. Model failures fail open and are logged.
    pub async fn admit(&self, title: &str, content: &str) -> Admission {
        if !Self::prefilter(title, content) {
            debug!(title, "Prefilter rejected article");
            return Admission::RejectedPrefilter;
        }

        let text = format!("{title} {content}");
        let prediction = match self.model.predict(&text).await {
            Ok(p) => p,
            Err(e) => {
                warn!(title, error = %e, "Relevance model failed; accepting article");
                return Admission::AdmittedFailOpen;
            }
        };

        let category: NewsCategory = prediction
            .category
            .parse()
            .unwrap_or(NewsCategory::Other);
        let confidence = prediction.confidence.clamp(0.0, 1.0);

        // The model is least precise on economy, so that label always
        // passes: recall over precision for the core class.
        let accepted = category == NewsCategory::Economy
            || (category.is_financial() && confidence >= self.min_confidence);

        debug!(
            title,
            category = %category,
            confidence,
            accepted,
            "Relevance label"
        );

        if accepted {
            Admission::Admitted {
                category,
                confidence,
            }
        } else {
            Admission::RejectedCategory {
                category,
                confidence,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticModel;

    #[test]
    fn prefilter_accepts_finance_text() {
        assert!(RelevanceClassifier::prefilter(
            "Fed signals rate cut",
            "Markets rallied on the news."
        ));
        assert!(RelevanceClassifier::prefilter(
            "ЦБ повысил ставку",
            "Рубль отреагировал на решение центробанка."
        ));
    }

    #[test]
    fn prefilter_rejects_off_topic_text() {
        assert!(!RelevanceClassifier::prefilter(
            "Local team wins championship",
            "The final ended after extra innings."
        ));
    }

    #[tokio::test]
    async fn confident_financial_label_is_admitted() {
        let model = Arc::new(StaticModel::new("stock", 0.9));
        let classifier = RelevanceClassifier::new(model, 0.5);
        let admission = classifier.admit("Shares jump", "The stock market rallied").await;
        assert!(matches!(
            admission,
            Admission::Admitted { category: NewsCategory::Stock, .. }
        ));
    }

    #[tokio::test]
    async fn low_confidence_financial_label_is_rejected() {
        let model = Arc::new(StaticModel::new("business", 0.3));
        let classifier = RelevanceClassifier::new(model, 0.5);
        let admission = classifier.admit("Company news", "A business update on the market").await;
        assert!(matches!(admission, Admission::RejectedCategory { .. }));
    }

    #[tokio::test]
    async fn economy_is_admitted_regardless_of_confidence() {
        let model = Arc::new(StaticModel::new("economy", 0.1));
        let classifier = RelevanceClassifier::new(model, 0.5);
        let admission = classifier.admit("GDP report", "The economy grew slowly").await;
        assert!(matches!(
            admission,
            Admission::Admitted { category: NewsCategory::Economy, .. }
        ));
    }

    #[tokio::test]
    async fn nonfinancial_label_is_rejected() {
        let model = Arc::new(StaticModel::new("sports", 0.95));
        let classifier = RelevanceClassifier::new(model, 0.5);
        let admission = classifier
            .admit("Trade deadline", "The market for players is hot")
            .await;
        assert!(matches!(admission, Admission::RejectedCategory { .. }));
    }

    #[tokio::test]
    async fn model_error_fails_open() {
        let model = Arc::new(StaticModel::failing());
        let classifier = RelevanceClassifier::new(model, 0.5);
        let admission = classifier.admit("Bank merger", "A bank announced a merger").await;
        assert_eq!(admission, Admission::AdmittedFailOpen);
    }
}
