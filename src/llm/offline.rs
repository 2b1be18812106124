//! Offline canned-reply provider.
//!
//! A provider with no network contract and no credential. The reply is
//! picked from fixed phrase tables by keyword rules against the most
//! recent user message, so it works without connectivity and is handy for
//! demos and tests.

use crate::error::ChatError;
use crate::llm::client::{ChatProvider, TextStream};
use crate::messages::{ChatMessage, GenerationParameters, MessageRole};
use async_trait::async_trait;
use futures::stream;

/// Model names reported by the offline provider.
pub const OFFLINE_MODELS: &[&str] = &["offline"];

const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "hola",
    "what's up",
    "howdy",
];

const GREETING_REPLIES: &[&str] = &[
    "Hey there! 👋 Great to see you. How are you feeling today?",
    "Hi! 😊 I'm here for you. What's on your mind?",
    "Hello! 🌟 How's your day going so far?",
    "Hey! 🤗 So good to see you here. What would you like to talk about?",
];

const MOTIVATIONAL_REPLIES: &[&str] = &[
    "You're making progress, even on the hard days. Keep pushing! 💪",
    "Small steps still move you forward. Every little bit counts. 🌱",
    "You've handled tough things before, and you'll get through this too. 🌟",
    "Your effort today matters more than perfection. Just keep going. 🔥",
    "Take a breath. You're doing better than you think. 😌",
    "Believe in yourself. The fact that you're here already shows strength! 🦁",
    "One day at a time. You've got this! ✨",
    "Progress, not perfection. You're on the right track. 🛤️",
    "You are capable of amazing things. Don't forget that! 🌠",
    "Every expert was once a beginner. Keep going! 🚀",
];

/// A topical keyword group and its replies.
struct KeywordRule {
    keywords: &'static [&'static str],
    replies: &'static [&'static str],
}

const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["sad", "down", "depressed", "unhappy", "bad day", "terrible"],
        replies: &[
            "I'm sorry you're feeling this way 💙. Want to share what's going on? I'm here to listen.",
            "That sounds really hard 😔. It's okay to feel this way. Tell me more if you'd like.",
            "Sending you warmth and kindness 🤗. You don't have to go through this alone.",
        ],
    },
    KeywordRule {
        keywords: &["anxious", "anxiety", "nervous", "stressed", "stress", "overwhelmed", "panic"],
        replies: &[
            "That sounds stressful 😤. Take one slow, deep breath with me, in through the nose and out through the mouth. 🌬️",
            "Anxiety can be overwhelming, but you're stronger than it 💪. Let's take it one small step at a time.",
            "When everything feels too much, just focus on the next 5 minutes. You've got this 🫶.",
        ],
    },
    KeywordRule {
        keywords: &["happy", "great", "awesome", "excited", "amazing", "fantastic", "good news", "celebrate"],
        replies: &[
            "That's amazing! 🎉 I'm so happy for you. You deserve it!",
            "Woohoo! 🥳 That's fantastic news! Celebrate yourself today!",
            "Love hearing this! 🌟 Keep riding that positive wave!",
        ],
    },
    KeywordRule {
        keywords: &["tired", "exhausted", "burnout", "drained", "no energy", "sleep"],
        replies: &[
            "Rest is not laziness. It's fuel 🔋. Give yourself permission to recharge.",
            "Your body is telling you something important. A short break now will help you more than pushing through 😴.",
            "Take care of yourself first 🛌. Even heroes need to rest!",
        ],
    },
    KeywordRule {
        keywords: &["motivate", "motivation", "focus", "discipline", "productive", "goal", "help me"],
        replies: &[
            "Start with one tiny task right now. Momentum beats overthinking every time 🚀.",
            "Set a 5-minute timer and just begin. You'll often find you keep going 🔥.",
            "Discipline is just doing the thing even when you don't feel like it. You've got this! 💎",
        ],
    },
    KeywordRule {
        keywords: &["lonely", "alone", "nobody", "no one", "isolated"],
        replies: &[
            "You're not alone. I'm right here with you 🤝. Tell me what's on your mind.",
            "Loneliness is so hard 💙. Remember, reaching out like this takes courage. I'm listening.",
            "Connection matters. I'm glad you're here 🌸.",
        ],
    },
    KeywordRule {
        keywords: &["angry", "frustrated", "annoyed", "mad", "rage", "upset"],
        replies: &[
            "It's okay to feel angry sometimes 😤. What happened? I'm here to listen without judgment.",
            "Anger usually signals something important. Take a breath and let's talk through it 🌬️.",
            "Your feelings are valid. Want to share what's going on? 💬",
        ],
    },
    KeywordRule {
        keywords: &["work", "job", "boss", "colleague", "office", "career"],
        replies: &[
            "Work situations can be really stressful 😅. What's going on? Tell me more.",
            "Career stuff can feel heavy. Want to talk through what's happening? I'm all ears 👂.",
            "Even small wins at work matter. Celebrate them! 🏆",
        ],
    },
    KeywordRule {
        keywords: &["love", "relationship", "partner", "boyfriend", "girlfriend", "breakup", "heart"],
        replies: &[
            "Relationships can be the most beautiful and the hardest parts of life 💕. I'm here for you.",
            "Your heart matters 💙. Share what's going on. I'm listening.",
            "Love can be complicated. You deserve kindness and understanding, from yourself too 🌸.",
        ],
    },
    KeywordRule {
        keywords: &["thank", "thanks", "appreciate", "grateful", "helpful"],
        replies: &[
            "You're so welcome! 😊 I'm always here whenever you need me.",
            "That really means a lot! 🌟 I'm rooting for you every step of the way.",
            "Happy to help! 🤗 Remember, you're doing great!",
        ],
    },
];

/// Canned-reply provider that never touches the network.
///
/// # Determinism
///
/// The same input always produces the same reply, making tests reproducible.
///
/// # Example
///
/// ```rust
/// use chatline::llm::{ChatProvider, OfflineClient};
/// use chatline::messages::{ChatMessage, GenerationParameters};
///
/// # tokio_test::block_on(async {
/// let client = OfflineClient::new();
/// let messages = vec![ChatMessage::user("I feel so tired")];
/// let params = GenerationParameters::new("offline");
///
/// let first = client.complete(&messages, &params).await.unwrap();
/// let second = client.complete(&messages, &params).await.unwrap();
/// assert_eq!(first, second);
/// # });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl OfflineClient {
    /// Creates a new offline client.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the reply for a single user input.
    #[must_use]
    pub fn reply_for(input: &str) -> &'static str {
        let normalized = input.to_lowercase();
        let words: Vec<&str> = normalized
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();
        let seed = stable_hash(&normalized);

        if GREETING_KEYWORDS.iter().any(|k| matches_keyword(&normalized, &words, k)) {
            return pick(GREETING_REPLIES, seed);
        }

        KEYWORD_RULES
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| matches_keyword(&normalized, &words, k))
            })
            .map_or_else(
                || pick(MOTIVATIONAL_REPLIES, seed),
                |rule| pick(rule.replies, seed),
            )
    }

    /// Reply for the most recent user message in the conversation.
    fn reply_to(messages: &[ChatMessage]) -> &'static str {
        let input = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map_or("", |m| m.content.as_str());
        Self::reply_for(input)
    }
}

/// Single words match whole words; phrases match as substrings.
fn matches_keyword(normalized: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') {
        normalized.contains(keyword)
    } else {
        words.contains(&keyword)
    }
}

fn pick(replies: &'static [&'static str], seed: u64) -> &'static str {
    // Tables are non-empty constants.
    let len = replies.len() as u64;
    replies[(seed % len) as usize]
}

/// FNV-1a, stable across runs and toolchains.
fn stable_hash(input: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    input
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// Splits a reply into word fragments, keeping each word's trailing space.
fn word_fragments(reply: &str) -> Vec<String> {
    reply
        .split_inclusive(' ')
        .filter(|w| !w.trim().is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl ChatProvider for OfflineClient {
    fn name(&self) -> &'static str {
        "Offline"
    }

    fn available_models(&self) -> &'static [&'static str] {
        OFFLINE_MODELS
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParameters,
    ) -> Result<String, ChatError> {
        Ok(Self::reply_to(messages).to_string())
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParameters,
    ) -> Result<TextStream, ChatError> {
        let fragments = word_fragments(Self::reply_to(messages));
        tracing::debug!(fragments = fragments.len(), "Streaming offline reply");
        Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
    }
}
