//! Centralized prompt definitions for the language-model collaborator
//!
//! Classification, summarization, comparison and answering prompts live here
//! so their wording can be versioned and tested in one place.

use crate::collaborators::{ComparisonMode, Passage, SummaryStyle};

/// Classification prompt template.
///
/// `{memory}`, `{query}` and `{context}` are substituted by
/// [`classification_prompt`].
pub const CLASSIFICATION_PROMPT: &str = concat!(
    "You are an intelligent AI assistant with exactly these capabilities:\n",
    r#"
ALLOWED TASKS:
1. summarization - condensing given text or uploaded PDFs into summaries
2. comparison - comparing two pieces of text or two PDFs
3. rag - answering questions about uploaded PDFs using retrieval

Anything else should be classified as "general".

MEMORY CONTEXT: {memory}

USER QUERY: "{query}"

ADDITIONAL CONTEXT: {context}

Respond ONLY with valid JSON:
{
    "category": "summarization|comparison|rag|general",
    "confidence": 0.0,
    "reasoning": "Your reasoning",
    "parameters": {
        "text1": "",
        "text2": "",
        "query": "",
        "summary_type": "brief|detailed|bullet_points|micro|audience",
        "comparison_type": "comprehensive|similarities|differences"
    }
}"#
);

/// Render the classification prompt for one query.
///
/// Placeholders are substituted in a single pass so user text containing a
/// placeholder is never expanded.
pub fn classification_prompt(memory_summary: &str, query: &str, context: Option<&str>) -> String {
    let slots = [
        ("{memory}", memory_summary),
        ("{query}", query),
        ("{context}", context.unwrap_or("No additional context")),
    ];
    let mut out =
        String::with_capacity(CLASSIFICATION_PROMPT.len() + query.len() + memory_summary.len());
    let mut rest = CLASSIFICATION_PROMPT;
    'scan: while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (slot, value) in slots {
            if let Some(after) = rest.strip_prefix(slot) {
                out.push_str(value);
                rest = after;
                continue 'scan;
            }
        }
        out.push('{');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

/// Summarization prompt for the given style.
pub fn summary_prompt(text: &str, style: SummaryStyle) -> String {
    let instruction = match style {
        SummaryStyle::Brief => "Summarize the following text in a concise paragraph:",
        SummaryStyle::Detailed => {
            "Summarize the following text in a detailed, clear paragraph of 150-200 words:"
        }
        SummaryStyle::BulletPoints => {
            "Summarize the following text into exactly 10 bullet points. \
             Cover all major ideas and facts:"
        }
        SummaryStyle::Micro => {
            "Summarize this text in under 75 words. Focus only on the essentials:"
        }
        SummaryStyle::AudienceGeneral => {
            "Summarize this disclosure for a general audience such as investors or journalists. \
             Use plain English, focus on functions and practices:"
        }
        SummaryStyle::AudienceProfessional => {
            "Summarize this disclosure for a finance professional. \
             Use appropriate financial terminology:"
        }
    };
    format!("{}\n\n{}", instruction, text)
}

fn comparison_instruction(mode: ComparisonMode) -> &'static str {
    match mode {
        ComparisonMode::Similarities => {
            "Focus primarily on identifying and analyzing similarities between the two texts."
        }
        ComparisonMode::Differences => {
            "Focus primarily on identifying and analyzing differences between the two texts."
        }
        ComparisonMode::Comprehensive => {
            "Provide a comprehensive analysis including both similarities and differences."
        }
    }
}

/// Comparison prompt for two texts.
pub fn comparison_prompt(text_a: &str, text_b: &str, mode: ComparisonMode) -> String {
    format!(
        r#"ROLE:
You are an expert comparative analyst trained in high-accuracy textual analysis.

TASK:
{instruction}

INSTRUCTIONS:
1. Analyze both texts carefully
2. Provide structured comparison results
3. Include specific examples and evidence
4. Be objective and thorough
5. Format your response as clear, readable text and just give the analysis.

TEXT 1:
{text_a}

TEXT 2:
{text_b}

Please provide a detailed comparison analysis."#,
        instruction = comparison_instruction(mode),
        text_a = text_a,
        text_b = text_b,
    )
}

/// Retrieval-grounded answer prompt ("stuff" style: all passages inline).
pub fn answer_prompt(question: &str, passages: &[Passage]) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
{}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}
