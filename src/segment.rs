//! Caption segmentation.
//!
//! Turns a word-level transcript into subtitle cues that respect broadcast
//! limits: characters per line, lines per cue, and minimum/maximum time on
//! screen. Words keep their recognized timestamps; only a cue that is too
//! short gets a synthetic end time (`start + min_duration`), which may run
//! into the following cue.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SubtrixError};
use crate::language::words_per_line_for;
use crate::subtitle::{Cue, SubtitleTrack};
use crate::transcribe::{Transcript, Word};

fn default_max_chars_per_line() -> usize {
    42
}

fn default_min_duration() -> f64 {
    0.8
}

fn default_max_duration() -> f64 {
    7.0
}

fn default_max_lines_per_cue() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Maximum characters on one subtitle line
    #[serde(default = "default_max_chars_per_line")]
    pub max_chars_per_line: usize,
    /// Minimum time a cue stays on screen (seconds)
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,
    /// Maximum time a cue stays on screen (seconds)
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,
    /// Maximum lines shown at once
    #[serde(default = "default_max_lines_per_cue")]
    pub max_lines_per_cue: usize,
    /// Words grouped into one line candidate; derived from the language when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words_per_line_hint: Option<usize>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_chars_per_line: default_max_chars_per_line(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            max_lines_per_cue: default_max_lines_per_cue(),
            words_per_line_hint: None,
        }
    }
}

impl CaptionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars_per_line == 0 {
            return Err(SubtrixError::Config("max_chars_per_line must be positive".to_string()));
        }
        if self.max_lines_per_cue == 0 {
            return Err(SubtrixError::Config("max_lines_per_cue must be positive".to_string()));
        }
        if self.words_per_line_hint == Some(0) {
            return Err(SubtrixError::Config("words_per_line_hint must be positive".to_string()));
        }
        if !(self.min_duration > 0.0 && self.min_duration <= self.max_duration) {
            return Err(SubtrixError::Config(format!(
                "Invalid cue duration bounds: min {} / max {}",
                self.min_duration, self.max_duration
            )));
        }
        Ok(())
    }
}

/// Segment a flat word sequence into a subtitle track
pub fn segment(words: &[Word], language: &str, config: &CaptionConfig) -> SubtitleTrack {
    segment_runs(std::iter::once(words), language, config)
}

/// Segment a transcript, never merging words across utterance boundaries
pub fn segment_transcript(transcript: &Transcript, config: &CaptionConfig) -> SubtitleTrack {
    segment_runs(transcript.word_runs(), &transcript.language, config)
}

fn segment_runs<'a, I>(runs: I, language: &str, config: &CaptionConfig) -> SubtitleTrack
where
    I: IntoIterator<Item = &'a [Word]>,
{
    let words_per_line = config
        .words_per_line_hint
        .unwrap_or_else(|| words_per_line_for(language))
        .max(1);
    let max_lines = config.max_lines_per_cue.max(1);

    let mut cues = Vec::new();

    for run in runs {
        let words = usable_words(run);

        for group in words.chunks(words_per_line) {
            for timed_group in split_by_duration(group, config.max_duration) {
                let lines = pack_lines(&timed_group, config.max_chars_per_line);
                for cue_lines in lines.chunks(max_lines) {
                    cues.push(build_cue(cues.len() + 1, cue_lines, config.min_duration));
                }
            }
        }
    }

    let track = SubtitleTrack::new(cues);
    debug!(
        "Segmented {} language into {} cues ({} overlapping after minimum-duration extension)",
        language,
        track.len(),
        track.overlap_count()
    );
    track
}

/// Drop words that cannot be placed on a timeline
fn usable_words(words: &[Word]) -> Vec<&Word> {
    words
        .iter()
        .enumerate()
        .filter(|(position, word)| {
            if !word.is_well_formed() {
                warn!(
                    "Dropping malformed word #{} '{}' ({} -> {})",
                    position, word.text, word.start, word.end
                );
                return false;
            }
            if caption_text(word).is_empty() {
                warn!("Dropping empty word #{} at {}", position, word.start);
                return false;
            }
            true
        })
        .map(|(_, word)| word)
        .collect()
}

fn caption_text(word: &Word) -> &str {
    word.display_text().trim()
}

/// Split a group into consecutive runs spanning at most `max_duration` each.
/// A single word longer than `max_duration` stays alone.
fn split_by_duration<'a>(group: &[&'a Word], max_duration: f64) -> Vec<Vec<&'a Word>> {
    let mut result = Vec::new();
    let mut current: Vec<&Word> = Vec::new();

    for &word in group {
        if let Some(first) = current.first() {
            if word.end - first.start > max_duration {
                result.push(std::mem::take(&mut current));
            }
        }
        current.push(word);
    }
    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// Greedily pack words left to right into lines of at most `max_chars`
/// characters. Words are never split; an over-long word gets its own line.
fn pack_lines<'a>(words: &[&'a Word], max_chars: usize) -> Vec<Vec<&'a Word>> {
    let mut lines = Vec::new();
    let mut current: Vec<&Word> = Vec::new();
    let mut current_len = 0;

    for &word in words {
        let word_len = caption_text(word).chars().count();
        let candidate_len = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if candidate_len > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_len = word_len;
        } else {
            current_len = candidate_len;
        }
        current.push(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn build_cue(index: usize, lines: &[Vec<&Word>], min_duration: f64) -> Cue {
    let start_time = lines
        .first()
        .and_then(|line| line.first())
        .map(|w| w.start)
        .unwrap_or_default();
    let mut end_time = lines
        .last()
        .and_then(|line| line.last())
        .map(|w| w.end)
        .unwrap_or(start_time);

    if end_time - start_time < min_duration {
        end_time = start_time + min_duration;
    }

    let text_lines = lines
        .iter()
        .map(|line| line.iter().map(|w| caption_text(w)).collect::<Vec<_>>().join(" "))
        .collect();

    Cue::new(index, start_time, end_time, text_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::Utterance;

    const PANGRAM: [&str; 9] = ["The", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog"];

    /// Words spoken back to back, `step` seconds each
    fn timed_words(texts: &[&str], start: f64, step: f64) -> Vec<Word> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let word_start = start + i as f64 * step;
                Word::new(text, word_start, word_start + step)
            })
            .collect()
    }

    fn all_text(track: &SubtitleTrack) -> Vec<String> {
        track
            .iter()
            .flat_map(|cue| cue.lines.iter())
            .flat_map(|line| line.split(' ').map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_empty_words_give_empty_track() {
        let track = segment(&[], "english", &CaptionConfig::default());
        assert!(track.is_empty());
    }

    #[test]
    fn test_greedy_line_packing() {
        let words = timed_words(&PANGRAM, 0.0, 0.3);
        let refs: Vec<&Word> = words.iter().collect();
        let lines: Vec<String> = pack_lines(&refs, 20)
            .iter()
            .map(|line| line.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" "))
            .collect();

        assert_eq!(lines, vec!["The quick brown fox", "jumps over the lazy", "dog"]);
    }

    #[test]
    fn test_pangram_segmentation_respects_limits() {
        let words = timed_words(&PANGRAM, 0.0, 0.3);
        let config = CaptionConfig {
            max_chars_per_line: 20,
            words_per_line_hint: Some(9),
            ..CaptionConfig::default()
        };

        let track = segment(&words, "english", &config);

        assert_eq!(track.cues[0].lines[0], "The quick brown fox");
        assert_eq!(all_text(&track), PANGRAM.to_vec());
        for cue in track.iter() {
            assert!(cue.max_line_chars() <= 20, "line too long in {:?}", cue);
            assert!(cue.lines.len() <= 2);
        }
        // Third physical line spills into a new cue timed from its own first word
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[1].lines, vec!["dog"]);
        assert_eq!(track.cues[1].start_time, words[8].start);
    }

    #[test]
    fn test_long_group_is_split_by_duration() {
        // Seven words spread over 10.5 seconds
        let words = timed_words(&["one", "two", "three", "four", "five", "six", "seven"], 0.0, 1.5);
        let track = segment(&words, "english", &CaptionConfig::default());

        assert_eq!(track.len(), 2);
        for cue in track.iter() {
            assert!(cue.duration() <= 7.0);
            assert!(cue.duration() >= 0.8);
        }
        // Original word timestamps are kept
        assert_eq!(track.cues[0].start_time, 0.0);
        assert_eq!(track.cues[0].end_time, 6.0);
        assert_eq!(track.cues[1].start_time, 6.0);
        assert_eq!(track.cues[1].end_time, 10.5);
        assert_eq!(all_text(&track).len(), 7);
    }

    #[test]
    fn test_short_cue_is_extended_to_min_duration() {
        let words = vec![Word::new("Hi", 2.0, 2.2)];
        let track = segment(&words, "english", &CaptionConfig::default());

        assert_eq!(track.len(), 1);
        assert_eq!(track.cues[0].start_time, 2.0);
        assert!((track.cues[0].duration() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_min_duration_extension_may_overlap_next_cue() {
        let mut transcript = Transcript::from_words("en", vec![]);
        transcript.utterances = vec![
            Utterance { words: vec![Word::new("Yes.", 0.0, 0.2)] },
            Utterance { words: vec![Word::new("No.", 0.5, 1.5)] },
        ];

        let track = segment_transcript(&transcript, &CaptionConfig::default());

        assert_eq!(track.len(), 2);
        assert!((track.cues[0].end_time - 0.8).abs() < 1e-9);
        assert_eq!(track.cues[1].start_time, 0.5);
        assert_eq!(track.overlap_count(), 1);
    }

    #[test]
    fn test_malformed_words_are_dropped() {
        let words = vec![
            Word::new("kept", 0.0, 0.5),
            Word::new("backwards", 1.0, 0.5),
            Word::new("zero", 1.0, 1.0),
            Word::new("   ", 1.0, 1.2),
            Word::new("also", 1.2, 1.6),
        ];
        let track = segment(&words, "english", &CaptionConfig::default());

        assert_eq!(all_text(&track), vec!["kept", "also"]);
    }

    #[test]
    fn test_punctuated_text_is_used() {
        let words = vec![
            Word::new("hello", 0.0, 0.4).with_punctuation("Hello,"),
            Word::new("world", 0.4, 0.9).with_punctuation("world."),
        ];
        let track = segment(&words, "english", &CaptionConfig::default());
        assert_eq!(track.cues[0].lines, vec!["Hello, world."]);
    }

    #[test]
    fn test_logographic_language_uses_smaller_groups() {
        let texts = ["我", "们", "今", "天", "去", "公", "园", "散", "步", "吧"];
        let words = timed_words(&texts, 0.0, 0.3);

        let track = segment(&words, "zh-CN", &CaptionConfig::default());
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0].lines, vec!["我 们 今 天 去"]);

        let english_track = segment(&words, "english", &CaptionConfig::default());
        assert_eq!(english_track.len(), 2);
        assert_eq!(english_track.cues[0].lines, vec!["我 们 今 天 去 公 园"]);
    }

    #[test]
    fn test_utterance_boundaries_are_respected() {
        let mut transcript = Transcript::from_words("en", vec![]);
        transcript.utterances = vec![
            Utterance { words: timed_words(&["Good", "morning."], 0.0, 0.5) },
            Utterance { words: timed_words(&["How", "are", "you?"], 1.0, 0.5) },
        ];

        let track = segment_transcript(&transcript, &CaptionConfig::default());
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0].lines, vec!["Good morning."]);
        assert_eq!(track.cues[1].lines, vec!["How are you?"]);
        assert_eq!(track.cues[1].index, 2);
    }

    #[test]
    fn test_overlong_word_gets_its_own_line() {
        let words = timed_words(&["a", "Donaudampfschifffahrtsgesellschaft", "b"], 0.0, 0.5);
        let config = CaptionConfig {
            max_chars_per_line: 10,
            max_lines_per_cue: 3,
            ..CaptionConfig::default()
        };
        let track = segment(&words, "german", &config);
        assert_eq!(track.cues[0].lines, vec!["a", "Donaudampfschifffahrtsgesellschaft", "b"]);
    }

    #[test]
    fn test_invariants_hold_on_a_long_transcript() {
        // Deterministic pseudo-random speech: short words, short pauses
        let vocabulary = ["so", "we", "went", "down", "to", "the", "harbour", "and", "watched", "boats,"];
        let mut seed: u64 = 42;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as f64 / (1u64 << 31) as f64
        };

        let mut words = Vec::new();
        let mut clock = 0.0;
        for i in 0..500 {
            clock += next() * 0.3;
            let length = 0.1 + next() * 0.5;
            words.push(Word::new(vocabulary[i % vocabulary.len()], clock, clock + length));
            clock += length;
        }

        let config = CaptionConfig::default();
        let track = segment(&words, "english", &config);

        let mut previous_start = f64::MIN;
        for (position, cue) in track.iter().enumerate() {
            assert_eq!(cue.index, position + 1);
            assert!(cue.start_time >= previous_start);
            assert!(cue.duration() >= config.min_duration - 1e-9);
            assert!(cue.duration() <= config.max_duration + 1e-9);
            assert!(!cue.lines.is_empty() && cue.lines.len() <= config.max_lines_per_cue);
            assert!(cue.max_line_chars() <= config.max_chars_per_line);
            previous_start = cue.start_time;
        }

        let expected: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
        assert_eq!(all_text(&track), expected);
    }

    #[test]
    fn test_config_validation() {
        assert!(CaptionConfig::default().validate().is_ok());
        assert!(CaptionConfig { max_chars_per_line: 0, ..Default::default() }.validate().is_err());
        assert!(CaptionConfig { min_duration: 8.0, ..Default::default() }.validate().is_err());
        assert!(CaptionConfig { words_per_line_hint: Some(0), ..Default::default() }.validate().is_err());
    }
}
