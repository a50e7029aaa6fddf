//! Assistant replies.
//!
//! [`ResponseGenerator`] is picked once from configuration: a remote
//! chat-completion model when an API key is present, canned replies
//! otherwise. Either way `generate` always yields text; a failing remote call
//! degrades to the local generator.

use journal_shared::{Conversation, Message};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CompletionConfig;

pub const SYSTEM_PROMPT: &str = "You are a warm, curious journaling companion. \
Help the user reflect on their day, thoughts and feelings in a safe, judgment-free space. \
Match their energy: playful and celebratory when they are upbeat, calm and steady when \
things are hard. Use a few fitting emojis. Listen for the feelings under the words, \
validate before suggesting, and prefer thoughtful follow-up questions over advice. \
Keep replies short and conversational, like texting a supportive friend. Never be \
preachy or judgmental. If the user describes serious distress, acknowledge your limits \
and gently suggest professional support. Close with encouragement or a question that \
invites further reflection.";

/// Reply used when the model answers with nothing.
pub const EMPTY_COMPLETION_REPLY: &str =
    "I'm not sure how to respond to that. Could you try expressing that differently?";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 150;
const TOP_P: f32 = 1.0;
const FREQUENCY_PENALTY: f32 = 0.0;
const PRESENCE_PENALTY: f32 = 0.6;

pub enum ResponseGenerator {
    Remote(RemoteGenerator),
    Fallback(LocalFallbackGenerator),
}

impl ResponseGenerator {
    pub fn from_config(config: &CompletionConfig) -> Self {
        match &config.api_key {
            Some(key) => Self::Remote(RemoteGenerator::new(
                key.clone(),
                config.base_url.clone(),
                config.model.clone(),
            )),
            None => Self::Fallback(LocalFallbackGenerator),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Reply to `user_message` given the day's conversation *before* it.
    pub async fn generate(&self, user_message: &str, history: &Conversation) -> String {
        match self {
            Self::Remote(remote) => remote.generate(user_message, history).await,
            Self::Fallback(local) => local.generate(user_message, history),
        }
    }
}

// ---------------------------------------------------------------------------
// Local fallback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Neutral,
    Challenging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyBucket {
    Positive,
    Neutral,
    Challenging,
    FollowUp,
}

const POSITIVE_WORDS: &[&str] = &[
    "happy", "good", "great", "excellent", "joy", "excited", "love", "wonderful", "amazing",
    "fantastic",
];

const CHALLENGING_WORDS: &[&str] = &[
    "sad", "bad", "terrible", "awful", "depressed", "anxious", "worried", "stress", "angry",
    "upset", "hate", "difficult", "hard", "struggle",
];

const POSITIVE_REPLIES: &[&str] = &[
    "I'm glad you're feeling good! What's been feeding that mood today?",
    "That's wonderful to hear. What made today stand out?",
    "Love this energy. How could you carry some of it into tomorrow?",
    "It's worth noticing moments like this. What brought you the most joy?",
    "That's great news! Is there anything you'd like to do to keep this feeling going?",
];

const NEUTRAL_REPLIES: &[&str] = &[
    "Thanks for sharing. How would you like to use our time today?",
    "I appreciate you taking a moment to journal. Is anything on your mind you'd like to explore?",
    "Checking in regularly is a great habit. Which part of your life would you like to reflect on?",
    "I'm here and listening. Is there a thought or feeling you'd like to dig into?",
    "Thanks for checking in. Is there something you'd like a fresh perspective on?",
];

const CHALLENGING_REPLIES: &[&str] = &[
    "I'm sorry things feel difficult right now. Would it help to talk through what's weighing on you?",
    "That sounds really hard, and it's okay to feel this way. What might help you feel a little better?",
    "I hear that you're struggling. Naming the feeling can help. How would you describe it?",
    "Thank you for sharing something difficult. Is there one small step that could bring a bit of relief today?",
    "It takes courage to face feelings like these. Would exploring some coping ideas together help?",
];

const FOLLOW_UP_REPLIES: &[&str] = &[
    "Thank you for sharing that. How does it feel to put it into words?",
    "I appreciate your openness. Is there more you'd like to explore here?",
    "That's a thoughtful observation. What feels like a good next step?",
    "Sometimes writing things down brings clarity. Has this helped so far?",
    "Thanks for trusting me with this. Is anything else on your mind today?",
];

/// Keyword-bucketed canned replies. No network, no configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFallbackGenerator;

impl LocalFallbackGenerator {
    pub fn generate(&self, user_message: &str, history: &Conversation) -> String {
        self.generate_with(&mut rand::thread_rng(), user_message, history)
    }

    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        user_message: &str,
        history: &Conversation,
    ) -> String {
        let replies = replies_for(reply_bucket(user_message, history));
        replies
            .choose(rng)
            .copied()
            .unwrap_or(EMPTY_COMPLETION_REPLY)
            .to_string()
    }
}

/// Counts distinct keyword hits (case-insensitive substring match).
pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let challenging = CHALLENGING_WORDS.iter().filter(|w| lower.contains(*w)).count();

    match positive.cmp(&challenging) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Challenging,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

pub fn reply_bucket(user_message: &str, history: &Conversation) -> ReplyBucket {
    if history.user_message_count() > 1 {
        return ReplyBucket::FollowUp;
    }
    match analyze_sentiment(user_message) {
        Sentiment::Positive => ReplyBucket::Positive,
        Sentiment::Neutral => ReplyBucket::Neutral,
        Sentiment::Challenging => ReplyBucket::Challenging,
    }
}

pub fn replies_for(bucket: ReplyBucket) -> &'static [&'static str] {
    match bucket {
        ReplyBucket::Positive => POSITIVE_REPLIES,
        ReplyBucket::Neutral => NEUTRAL_REPLIES,
        ReplyBucket::Challenging => CHALLENGING_REPLIES,
        ReplyBucket::FollowUp => FOLLOW_UP_REPLIES,
    }
}

// ---------------------------------------------------------------------------
// Remote chat completion
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub struct RemoteGenerator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    fallback: LocalFallbackGenerator,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl RemoteGenerator {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            fallback: LocalFallbackGenerator,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, user_message: &str, history: &Conversation) -> String {
        match self.complete(user_message, history).await {
            Ok(Some(reply)) => reply,
            Ok(None) => EMPTY_COMPLETION_REPLY.to_string(),
            Err(e) => {
                warn!(error = %e, "Error calling completion API, using fallback reply");
                self.fallback.generate(user_message, history)
            }
        }
    }

    async fn complete(
        &self,
        user_message: &str,
        history: &Conversation,
    ) -> Result<Option<String>, CompletionError> {
        let request = build_request(&self.model, user_message, history);

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = resp.json().await?;
        debug!(choices = response.choices.len(), "completion received");
        Ok(first_reply(response))
    }
}

fn build_request<'a>(model: &'a str, user_message: &'a str, history: &'a Conversation) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: SYSTEM_PROMPT,
    });
    messages.extend(history.iter().map(to_chat_message));
    messages.push(ChatMessage {
        role: "user",
        content: user_message,
    });

    ChatRequest {
        model,
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        top_p: TOP_P,
        frequency_penalty: FREQUENCY_PENALTY,
        presence_penalty: PRESENCE_PENALTY,
    }
}

fn to_chat_message(message: &Message) -> ChatMessage<'_> {
    ChatMessage {
        role: if message.is_user { "user" } else { "assistant" },
        content: &message.text,
    }
}

fn first_reply(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn history(user_turns: usize) -> Conversation {
        let mut conv = Conversation::new();
        conv.push(Message::assistant("Hello! How are you feeling today?"));
        for i in 0..user_turns {
            conv.push(Message::user(format!("entry {i}")));
            conv.push(Message::assistant("reply"));
        }
        conv
    }

    #[test]
    fn test_sentiment_buckets() {
        assert_eq!(analyze_sentiment("Today was GREAT, I'm so happy"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("I feel anxious and upset"), Sentiment::Challenging);
        assert_eq!(analyze_sentiment("I went to the shop"), Sentiment::Neutral);
        // one hit each
        assert_eq!(analyze_sentiment("good but sad"), Sentiment::Neutral);
    }

    #[test]
    fn test_substring_matching_counts_once_per_keyword() {
        // "goodness" contains "good"; "hard" appears twice but counts once
        assert_eq!(analyze_sentiment("goodness, hard hard day"), Sentiment::Neutral);
    }

    #[test]
    fn test_follow_up_after_two_user_messages() {
        assert_eq!(reply_bucket("I'm happy", &history(0)), ReplyBucket::Positive);
        assert_eq!(reply_bucket("I'm happy", &history(1)), ReplyBucket::Positive);
        assert_eq!(reply_bucket("I'm happy", &history(2)), ReplyBucket::FollowUp);
    }

    #[test]
    fn test_fallback_picks_from_bucket() {
        let mut rng = StdRng::seed_from_u64(7);
        let generator = LocalFallbackGenerator;
        for _ in 0..20 {
            let reply = generator.generate_with(&mut rng, "this is so hard", &history(0));
            assert!(CHALLENGING_REPLIES.contains(&reply.as_str()));
        }
    }

    #[test]
    fn test_generator_variant_follows_config() {
        let unconfigured = CompletionConfig::default();
        assert!(!ResponseGenerator::from_config(&unconfigured).is_remote());

        let configured = CompletionConfig {
            api_key: Some("sk-test".into()),
            ..CompletionConfig::default()
        };
        assert!(ResponseGenerator::from_config(&configured).is_remote());
    }

    #[tokio::test]
    async fn test_fallback_variant_always_answers() {
        let generator = ResponseGenerator::Fallback(LocalFallbackGenerator);
        let reply = generator.generate("hello", &Conversation::new()).await;
        assert!(NEUTRAL_REPLIES.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn test_unreachable_remote_degrades_to_fallback() {
        // Port 9 (discard) on localhost refuses connections.
        let remote = RemoteGenerator::new(
            "sk-test".into(),
            "http://127.0.0.1:9/v1".into(),
            "gpt-4o-mini".into(),
        );
        let reply = remote.generate("I love this", &Conversation::new()).await;
        assert!(POSITIVE_REPLIES.contains(&reply.as_str()));
    }

    #[test]
    fn test_request_maps_roles_in_order() {
        let conv: Conversation = vec![Message::assistant("hi"), Message::user("hey")].into();
        let req = build_request("gpt-4o-mini", "new entry", &conv);

        let roles: Vec<&str> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "assistant", "user", "user"]);
        assert_eq!(req.messages.last().unwrap().content, "new entry");

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_first_reply_skips_empty_content() {
        let parse = |s: &str| first_reply(serde_json::from_str(s).unwrap());
        assert_eq!(
            parse(r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#),
            Some("Hi there".to_string())
        );
        assert_eq!(parse(r#"{"choices":[{"message":{"content":""}}]}"#), None);
        assert_eq!(parse(r#"{"choices":[{"message":{"content":null}}]}"#), None);
        assert_eq!(parse(r#"{"choices":[]}"#), None);
    }
}
