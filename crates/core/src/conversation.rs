//! Chat-surface helpers that sit in front of the router: canned replies for
//! small talk, the follow-up line appended to real answers, and a capped flat
//! transcript. Nothing here feeds back into prompts.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const FOLLOW_UP_LINE: &str = "Please let me know if you require further clarification.";
pub const WELCOME_MESSAGE: &str =
    "Your document is ready for analysis. Please feel free to ask any questions about its content.";
pub const MAX_TRANSCRIPT_MESSAGES: usize = 50;

const GREETINGS: [&str; 9] = [
    "hi",
    "hello",
    "hey",
    "hii",
    "heyy",
    "helloo",
    "good morning",
    "good afternoon",
    "good evening",
];
const GOODBYES: [&str; 5] = ["bye", "goodbye", "see you", "tata", "take care"];
const QUESTION_WORDS: [&str; 5] = ["what", "how", "why", "is", "describe"];
const UNHELPFUL_MARKERS: [&str; 4] = ["not found", "error", "please upload", "no relevant"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Goodbye,
}

impl SmallTalk {
    pub fn reply(self) -> &'static str {
        match self {
            SmallTalk::Greeting => "Greetings. How may I assist you with the document today?",
            SmallTalk::Thanks => "You are welcome. Is there anything else I can help with?",
            SmallTalk::Goodbye => "Goodbye. Have a productive day.",
        }
    }
}

fn words_of(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '!' | '.' | '?'))
        .filter(|word| !word.is_empty())
        .collect()
}

/// Recognises messages that are only a greeting, a thank-you or a goodbye.
///
/// Anything carrying a real question, such as "hi, how many pages?", returns
/// `None` and goes to the router.
pub fn classify_small_talk(message: &str) -> Option<SmallTalk> {
    let lowered = message.trim().to_lowercase();
    let words = words_of(&lowered);
    if words.is_empty() {
        return None;
    }
    let phrase = words.join(" ");

    let is_greeting = GREETINGS.contains(&phrase.as_str())
        || (words.len() <= 3 && words.iter().all(|word| is_greeting_word(word, &words)));
    if is_greeting {
        return Some(SmallTalk::Greeting);
    }

    let is_thanks = words.iter().any(|word| matches!(*word, "thank" | "thanks"))
        && words.len() <= 5
        && !words.iter().any(|word| QUESTION_WORDS.contains(word));
    if is_thanks {
        return Some(SmallTalk::Thanks);
    }

    let is_goodbye = words.len() <= 4
        && (words.iter().any(|word| GOODBYES.contains(word))
            || GOODBYES.iter().any(|bye| bye.contains(' ') && phrase.contains(bye)));
    if is_goodbye {
        return Some(SmallTalk::Goodbye);
    }

    None
}

fn is_greeting_word(word: &str, words: &[&str]) -> bool {
    if GREETINGS.contains(&word) {
        return true;
    }
    // "good morning" arrives split into two words.
    let is_daypart = |w: &str| matches!(w, "morning" | "afternoon" | "evening");
    (word == "good" && words.iter().any(|other| is_daypart(*other)))
        || (is_daypart(word) && words.contains(&"good"))
}

/// Appends [`FOLLOW_UP_LINE`] unless the answer already signals a dead end.
pub fn with_follow_up(answer: &str) -> String {
    let lowered = answer.to_lowercase();
    if UNHELPFUL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return answer.to_string();
    }
    format!("{answer}\n\n{FOLLOW_UP_LINE}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Flat chat history, oldest messages dropped beyond the cap.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(MAX_TRANSCRIPT_MESSAGES)
    }
}

impl Transcript {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(Message {
            role,
            content: content.into(),
        });
    }

    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.push(Role::User, question);
        self.push(Role::Assistant, answer);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}
