//! Fixed phrase tables for the greeting and scope stages.
//!
//! Matching is literal, case-insensitive substring search in table order, so
//! short phrases such as "hi" also match inside longer words.

use serde_json::{json, Map, Value};

use super::{Category, ClassificationResult};

/// Greeting sub-type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingKind {
    Hello,
    Goodbye,
    HowAreYou,
}

impl GreetingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GreetingKind::Hello => "hello",
            GreetingKind::Goodbye => "goodbye",
            GreetingKind::HowAreYou => "how_are_you",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            GreetingKind::Hello => "Greeting",
            GreetingKind::Goodbye => "Temporary Farewell",
            GreetingKind::HowAreYou => "Status Inquiry",
        }
    }

    fn response(&self) -> &'static str {
        match self {
            GreetingKind::Hello => HELLO_RESPONSE,
            GreetingKind::Goodbye => GOODBYE_RESPONSE,
            GreetingKind::HowAreYou => HOW_ARE_YOU_RESPONSE,
        }
    }
}

/// Greeting phrase sets, checked in this order.
pub const GREETING_PATTERNS: [(GreetingKind, &[&str]); 3] = [
    (
        GreetingKind::Hello,
        &[
            "hi",
            "hello",
            "hey",
            "hiya",
            "good morning",
            "good afternoon",
            "good evening",
            "hi there",
            "hello there",
        ],
    ),
    (
        GreetingKind::Goodbye,
        &[
            "goodbye",
            "bye",
            "see you",
            "farewell",
            "good night",
            "bye bye",
            "see ya",
        ],
    ),
    (
        GreetingKind::HowAreYou,
        &[
            "how are you",
            "how r u",
            "how do you do",
            "what's up",
            "how's it going",
            "how are things",
        ],
    ),
];

/// Keywords that mark a query as one of the supported tasks.
pub const ALLOWED_TASK_KEYWORDS: &[&str] = &[
    "summarize",
    "compare",
    "question",
    "what",
    "how",
    "why",
    "explain",
    "analyze",
    "upload",
    "pdf",
];

/// Keywords that mark a query as outside the supported tasks.
pub const OUT_OF_SCOPE_INDICATORS: &[&str] = &[
    "write",
    "poem",
    "story",
    "joke",
    "weather",
    "news",
    "calculate",
    "math",
    "translate",
    "code",
    "programming",
    "recipe",
    "game",
    "play",
    "sing",
    "draw",
    "create",
    "generate",
    "compose",
    "paint",
    "dance",
    "music",
    "movie",
    "book",
];

pub const OUT_OF_SCOPE_TOPIC: &str = "Out of Scope Request";

const CAPABILITIES: &str = "- Summarization: summarize text or PDF documents\n\
- Comparison: compare two texts or PDF documents\n\
- PDF Q&A: answer questions about uploaded PDFs";

const HELLO_RESPONSE: &str = "Hello! I'm your document assistant.\n\n\
I can help you with:\n\
- Summarization: summarize text or PDF documents\n\
- Comparison: compare two texts or PDF documents\n\
- PDF Q&A: answer questions about uploaded PDFs\n\n\
I politely decline requests outside these areas.\n\nHow can I assist you today?";

const GOODBYE_RESPONSE: &str = "Goodbye for now!\n\n\
I'm still here whenever you need help with:\n\
- Summarization: summarize text or PDF documents\n\
- Comparison: compare two texts or PDF documents\n\
- PDF Q&A: answer questions about uploaded PDFs\n\n\
Feel free to continue our conversation anytime!";

const HOW_ARE_YOU_RESPONSE: &str = "I'm running smoothly and ready to help!\n\n\
I specialize in:\n\
- Summarization: summarize text or PDF documents\n\
- Comparison: compare two texts or PDF documents\n\
- PDF Q&A: answer questions about uploaded PDFs\n\n\
What would you like me to help you with today?";

/// Canned refusal for out-of-scope requests.
pub fn out_of_scope_response() -> String {
    format!(
        "I can only help with these specific tasks:\n\n{}\n\n\
Your request appears to be outside my scope. Please ask me to summarize some text or a PDF, \
compare two texts or documents, or answer questions about an uploaded PDF.",
        CAPABILITIES
    )
}

/// First greeting phrase contained in `query`, in table order.
pub fn match_greeting(query: &str) -> Option<(GreetingKind, &'static str)> {
    let lower = query.trim().to_lowercase();
    GREETING_PATTERNS.iter().find_map(|(kind, patterns)| {
        patterns
            .iter()
            .find(|p| lower.contains(*p))
            .map(|p| (*kind, *p))
    })
}

/// Result for a matched greeting phrase.
pub fn greeting_result(kind: GreetingKind, pattern: &str) -> ClassificationResult {
    let mut parameters = Map::new();
    parameters.insert("greeting_type".to_string(), json!(kind.as_str()));
    parameters.insert("matched_pattern".to_string(), json!(pattern));

    ClassificationResult {
        category: Category::Greeting,
        confidence: 0.95,
        reasoning: format!(
            "Detected {} greeting pattern: '{}'",
            kind.as_str(),
            pattern
        ),
        parameters,
        response: Some(kind.response().to_string()),
    }
}

/// Scope stage. Allowed-task keywords override the deny list.
pub fn check_scope(query: &str) -> Option<ClassificationResult> {
    let lower = query.to_lowercase();
    if ALLOWED_TASK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }
    if !OUT_OF_SCOPE_INDICATORS.iter().any(|k| lower.contains(k)) {
        return None;
    }

    Some(ClassificationResult {
        category: Category::OutOfScope,
        confidence: 0.9,
        reasoning: "Request is outside allowed scope".to_string(),
        parameters: Map::<String, Value>::new(),
        response: Some(out_of_scope_response()),
    })
}
