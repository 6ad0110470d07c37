use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single recognized word with its timing, in seconds from the start of the audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Word as it should appear in a caption (casing and punctuation applied)
    pub punctuated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Word {
    pub fn new(text: &str, start: f64, end: f64) -> Self {
        Self {
            text: text.to_string(),
            start,
            end,
            punctuated_text: text.to_string(),
            confidence: None,
        }
    }

    pub fn with_punctuation(mut self, punctuated: &str) -> Self {
        self.punctuated_text = punctuated.to_string();
        self
    }

    /// Text used in captions, falling back to the raw word.
    pub fn display_text(&self) -> &str {
        if self.punctuated_text.trim().is_empty() {
            &self.text
        } else {
            &self.punctuated_text
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end > self.start
    }
}

/// Words the recognizer considered one continuous utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub words: Vec<Word>,
}

/// Service-agnostic result of transcribing one language
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    pub confidence: f64,
    pub words: Vec<Word>,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn from_words(language: &str, words: Vec<Word>) -> Self {
        Self {
            language: language.to_string(),
            confidence: 0.0,
            words,
            utterances: Vec::new(),
        }
    }

    /// Word runs that segmentation must not merge: one per utterance, or the
    /// whole word list when the service reported no utterances.
    pub fn word_runs(&self) -> Vec<&[Word]> {
        let runs: Vec<&[Word]> = self
            .utterances
            .iter()
            .map(|u| u.words.as_slice())
            .filter(|words| !words.is_empty())
            .collect();

        if runs.is_empty() {
            vec![self.words.as_slice()]
        } else {
            runs
        }
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.display_text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Trait for converting service-specific transcription payloads to [`Transcript`]
pub trait TranscriptMapper<T> {
    fn to_transcript(service_result: T, language: &str) -> Result<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_runs_fall_back_to_all_words() {
        let transcript = Transcript::from_words("en", vec![Word::new("hi", 0.0, 0.5)]);
        let runs = transcript.word_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 1);
    }

    #[test]
    fn test_word_runs_follow_utterances() {
        let mut transcript = Transcript::from_words(
            "en",
            vec![Word::new("a", 0.0, 0.5), Word::new("b", 1.0, 1.5)],
        );
        transcript.utterances = vec![
            Utterance { words: vec![Word::new("a", 0.0, 0.5)] },
            Utterance { words: vec![] },
            Utterance { words: vec![Word::new("b", 1.0, 1.5)] },
        ];
        assert_eq!(transcript.word_runs().len(), 2);
    }

    #[test]
    fn test_display_text_prefers_punctuated() {
        let word = Word::new("hello", 0.0, 1.0).with_punctuation("Hello,");
        assert_eq!(word.display_text(), "Hello,");
        assert_eq!(Word::new("x", 0.0, 1.0).with_punctuation(" ").display_text(), "x");
    }

    #[test]
    fn test_malformed_words() {
        assert!(!Word::new("x", 1.0, 1.0).is_well_formed());
        assert!(!Word::new("x", -0.5, 1.0).is_well_formed());
        assert!(!Word::new("x", f64::NAN, 1.0).is_well_formed());
        assert!(Word::new("x", 0.0, 0.1).is_well_formed());
    }
}
