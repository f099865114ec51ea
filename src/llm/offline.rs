//! Deterministic stand-in used when no completion endpoint is configured.
//!
//! Summaries and comparisons are built from simple text statistics so the
//! service stays usable end to end without network access.

use async_trait::async_trait;

use crate::collaborators::{ComparisonMode, LanguageModel, Passage, SummaryStyle};
use crate::error::{ServiceError, ServiceResult};

/// Offline [`LanguageModel`] producing statistics-based output
#[derive(Debug, Clone, Default)]
pub struct OfflineModel;

impl OfflineModel {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextStats {
    words: usize,
    chars: usize,
    sentences: usize,
}

impl TextStats {
    fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
            sentences: text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count(),
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} words, {} characters, ~{} sentences",
            self.words, self.chars, self.sentences
        )
    }
}

const OFFLINE_NOTE: &str = "Note: generated offline. Configure LLM_ENDPOINT_URL for model output.";

#[async_trait]
impl LanguageModel for OfflineModel {
    async fn summarize(&self, text: &str, style: SummaryStyle) -> ServiceResult<String> {
        let stats = TextStats::of(text);
        let body = match style {
            SummaryStyle::Brief => format!(
                "BRIEF SUMMARY:\n\nThis text contains {} words and {} sentences.",
                stats.words, stats.sentences
            ),
            SummaryStyle::Detailed => format!(
                "DETAILED SUMMARY:\n\nThis text contains {} words and {} characters \
                 across ~{} sentences.",
                stats.words, stats.chars, stats.sentences
            ),
            SummaryStyle::BulletPoints => format!(
                "BULLET POINT SUMMARY:\n\n• {} words\n• {} characters\n• ~{} sentences",
                stats.words, stats.chars, stats.sentences
            ),
            SummaryStyle::Micro => format!("MICRO SUMMARY:\n\nA {}-word text.", stats.words),
            SummaryStyle::AudienceGeneral | SummaryStyle::AudienceProfessional => {
                let audience = if style == SummaryStyle::AudienceGeneral {
                    "general"
                } else {
                    "professional"
                };
                format!(
                    "AUDIENCE-SPECIFIC SUMMARY:\n\nThis {}-word text was prepared \
                     for a {} audience.",
                    stats.words, audience
                )
            }
        };
        Ok(format!("{}\n\n{}", body, OFFLINE_NOTE))
    }

    async fn compare(
        &self,
        text_a: &str,
        text_b: &str,
        mode: ComparisonMode,
    ) -> ServiceResult<String> {
        let a = TextStats::of(text_a);
        let b = TextStats::of(text_b);
        let heading = match mode {
            ComparisonMode::Comprehensive => "COMPREHENSIVE TEXT COMPARISON",
            ComparisonMode::Similarities => "SIMILARITIES ANALYSIS",
            ComparisonMode::Differences => "DIFFERENCES ANALYSIS",
        };
        Ok(format!(
            "{}:\n\n- Text A: {}\n- Text B: {}\n- Length difference: {} words\n\n{}",
            heading,
            a.describe(),
            b.describe(),
            a.words.abs_diff(b.words),
            OFFLINE_NOTE
        ))
    }

    async fn classify(&self, _prompt: &str) -> ServiceResult<String> {
        Err(ServiceError::Unavailable {
            message: "no classifier endpoint configured".to_string(),
            retries: 0,
        })
    }

    async fn answer(&self, _question: &str, passages: &[Passage]) -> ServiceResult<String> {
        match passages.first() {
            Some(best) => Ok(format!(
                "The most relevant passage reads:\n\n{}\n\n{}",
                best.text.trim(),
                OFFLINE_NOTE
            )),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_stats() {
        let stats = TextStats::of("One two. Three four five! Six?");
        assert_eq!(stats.words, 6);
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.chars, 30);
    }

    #[tokio::test]
    async fn test_offline_summary_counts_words() {
        let out = OfflineModel::new()
            .summarize("alpha beta gamma.", SummaryStyle::Brief)
            .await
            .unwrap();
        assert!(out.starts_with("BRIEF SUMMARY:"));
        assert!(out.contains("3 words"));
    }

    #[tokio::test]
    async fn test_offline_compare_reports_difference() {
        let out = OfflineModel::new()
            .compare("a b c d", "a b", ComparisonMode::Differences)
            .await
            .unwrap();
        assert!(out.starts_with("DIFFERENCES ANALYSIS:"));
        assert!(out.contains("Length difference: 2 words"));
    }

    #[tokio::test]
    async fn test_offline_classify_is_unavailable() {
        let err = OfflineModel::new().classify("prompt").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_offline_answer_uses_best_passage() {
        let model = OfflineModel::new();
        let out = model
            .answer("q", &[Passage::new("  revenue grew  ", 3.0)])
            .await
            .unwrap();
        assert!(out.contains("revenue grew"));
        assert!(model.answer("q", &[]).await.unwrap().is_empty());
    }
}
