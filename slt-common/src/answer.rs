//! Answer kinds and their legal value domains
//!
//! Every answer dimension in the catalog declares an [`AnswerKind`]. Values are
//! a closed [`Answer`] variant; anything outside a kind's domain is rejected at
//! the response store boundary, never coerced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared shape of one answer dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    /// Yes / No
    BinaryChoice,
    /// Yes / No / Unsure
    TernaryChoice,
    /// One of `1..=options`, or Unsure
    NWayChoice { options: u8 },
    /// Integer score in `min..=max`
    OrdinalRating { min: i64, max: i64 },
    /// One label out of a fixed set
    CategoricalClass { labels: Vec<String> },
}

/// A recorded answer value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
    Unsure,
    Choice(u8),
    Rating(i64),
    Class(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Yes => f.write_str("Yes"),
            Answer::No => f.write_str("No"),
            Answer::Unsure => f.write_str("Unsure"),
            Answer::Choice(n) => write!(f, "{}", n),
            Answer::Rating(score) => write!(f, "{}", score),
            Answer::Class(label) => f.write_str(label),
        }
    }
}

/// Spellings accepted for "Unsure" from form controls
const UNSURE_ALIASES: [&str; 3] = ["unsure", "can't say", "cant say"];

fn is_unsure(raw: &str) -> bool {
    UNSURE_ALIASES.iter().any(|alias| raw.eq_ignore_ascii_case(alias))
}

impl AnswerKind {
    /// Whether `answer` is a legal member of this kind's domain
    pub fn accepts(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (AnswerKind::BinaryChoice, Answer::Yes | Answer::No) => true,
            (AnswerKind::TernaryChoice, Answer::Yes | Answer::No | Answer::Unsure) => true,
            (AnswerKind::NWayChoice { .. }, Answer::Unsure) => true,
            (AnswerKind::NWayChoice { options }, Answer::Choice(n)) => (1..=*options).contains(n),
            (AnswerKind::OrdinalRating { min, max }, Answer::Rating(score)) => {
                (*min..=*max).contains(score)
            }
            (AnswerKind::CategoricalClass { labels }, Answer::Class(label)) => {
                labels.iter().any(|l| l == label)
            }
            _ => false,
        }
    }

    /// Parse a raw control value into an answer of this kind
    ///
    /// Returns `None` when the value is outside the domain.
    pub fn parse(&self, raw: &str) -> Option<Answer> {
        let raw = raw.trim();
        let answer = match self {
            AnswerKind::BinaryChoice | AnswerKind::TernaryChoice => {
                if raw.eq_ignore_ascii_case("yes") {
                    Answer::Yes
                } else if raw.eq_ignore_ascii_case("no") {
                    Answer::No
                } else if is_unsure(raw) {
                    Answer::Unsure
                } else {
                    return None;
                }
            }
            AnswerKind::NWayChoice { .. } => {
                if is_unsure(raw) {
                    Answer::Unsure
                } else {
                    Answer::Choice(raw.parse().ok()?)
                }
            }
            AnswerKind::OrdinalRating { .. } => Answer::Rating(raw.parse().ok()?),
            AnswerKind::CategoricalClass { labels } => {
                let label = labels.iter().find(|l| l.eq_ignore_ascii_case(raw))?;
                Answer::Class(label.clone())
            }
        };

        // Domain check catches Unsure for binary, out-of-range numbers, etc.
        self.accepts(&answer).then_some(answer)
    }

    /// Every legal answer, in presentation order
    pub fn choices(&self) -> Vec<Answer> {
        match self {
            AnswerKind::BinaryChoice => vec![Answer::Yes, Answer::No],
            AnswerKind::TernaryChoice => vec![Answer::Yes, Answer::No, Answer::Unsure],
            AnswerKind::NWayChoice { options } => (1..=*options)
                .map(Answer::Choice)
                .chain(std::iter::once(Answer::Unsure))
                .collect(),
            AnswerKind::OrdinalRating { min, max } => (*min..=*max).map(Answer::Rating).collect(),
            AnswerKind::CategoricalClass { labels } => {
                labels.iter().cloned().map(Answer::Class).collect()
            }
        }
    }

    /// Human-readable description of the legal domain, used in error messages
    pub fn describe_domain(&self) -> String {
        match self {
            AnswerKind::BinaryChoice => "expected Yes or No".to_string(),
            AnswerKind::TernaryChoice => "expected Yes, No or Unsure".to_string(),
            AnswerKind::NWayChoice { options } => {
                format!("expected a choice between 1 and {} or Unsure", options)
            }
            AnswerKind::OrdinalRating { min, max } => {
                format!("expected an integer rating between {} and {}", min, max)
            }
            AnswerKind::CategoricalClass { labels } => {
                format!("expected one of: {}", labels.join(", "))
            }
        }
    }

    /// Structural check used when a catalog is built
    pub(crate) fn check_well_formed(&self) -> std::result::Result<(), String> {
        match self {
            AnswerKind::NWayChoice { options } if *options < 2 => {
                Err(format!("n-way choice needs at least 2 options, got {}", options))
            }
            AnswerKind::OrdinalRating { min, max } if min >= max => {
                Err(format!("rating range {}..={} is empty or degenerate", min, max))
            }
            AnswerKind::CategoricalClass { labels } => {
                if labels.is_empty() {
                    return Err("categorical class needs at least one label".to_string());
                }
                for (i, label) in labels.iter().enumerate() {
                    if label.trim().is_empty() {
                        return Err("categorical class labels must not be blank".to_string());
                    }
                    if labels[..i].contains(label) {
                        return Err(format!("duplicate class label {:?}", label));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
