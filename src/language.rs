//! Language registry.
//!
//! Every language a job can be asked for is described by a [`LanguageProfile`]:
//! the name used for job keys and file names, the code and model sent to the
//! speech-recognition service, and optional caption overrides. Per-language
//! caption behaviour is plain data looked up here.

use serde::{Deserialize, Serialize};

use crate::segment::CaptionConfig;

/// Word-count hint for languages written with spaces between words.
pub const DEFAULT_WORDS_PER_LINE: usize = 7;

/// Word-count hint for logographic languages, where one recognized "word"
/// already carries more characters of meaning.
pub const LOGOGRAPHIC_WORDS_PER_LINE: usize = 5;

/// Line width used for logographic languages.
pub const LOGOGRAPHIC_MAX_CHARS_PER_LINE: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Name used as the job key and in output file names (e.g. "english")
    pub name: String,
    /// Language code understood by the transcription and translation services
    pub code: String,
    /// Speech-recognition model for this language
    pub model: String,
    /// Overrides the caption line width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars_per_line: Option<usize>,
    /// Overrides the number of words grouped into one line candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words_per_line: Option<usize>,
}

impl LanguageProfile {
    pub fn new(name: &str, code: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            model: model.to_string(),
            max_chars_per_line: None,
            words_per_line: None,
        }
    }

    pub fn is_logographic(&self) -> bool {
        is_logographic(&self.name) || is_logographic(&self.code)
    }

    /// Caption settings for this language, starting from the shared defaults.
    pub fn caption_config(&self, base: &CaptionConfig) -> CaptionConfig {
        let mut config = base.clone();

        if self.is_logographic() {
            config.max_chars_per_line = config.max_chars_per_line.min(LOGOGRAPHIC_MAX_CHARS_PER_LINE);
        }
        if let Some(max_chars) = self.max_chars_per_line {
            config.max_chars_per_line = max_chars;
        }
        if let Some(words) = self.words_per_line {
            config.words_per_line_hint = Some(words);
        }

        config
    }
}

/// Whether a language name or code belongs to a logographic script.
pub fn is_logographic(language: &str) -> bool {
    let language = language.to_lowercase();
    matches!(
        language.as_str(),
        "mandarin" | "chinese" | "cantonese" | "japanese" | "zh" | "zh-cn" | "zh-tw" | "zh-hk" | "ja"
    ) || language.starts_with("zh-")
}

/// Default word-count hint for a language name or code.
pub fn words_per_line_for(language: &str) -> usize {
    if is_logographic(language) {
        LOGOGRAPHIC_WORDS_PER_LINE
    } else {
        DEFAULT_WORDS_PER_LINE
    }
}

/// The languages a job transcribes when none are requested explicitly.
pub fn default_profiles() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile::new("english", "en", "nova-3"),
        LanguageProfile::new("malay", "ms", "nova-2"),
        LanguageProfile::new("mandarin", "zh-CN", "nova-2"),
        LanguageProfile::new("tamil", "ta", "nova-2"),
    ]
}

/// Look up a profile by name or code, case-insensitively.
pub fn find_profile<'a>(profiles: &'a [LanguageProfile], language: &str) -> Option<&'a LanguageProfile> {
    profiles.iter().find(|p| {
        p.name.eq_ignore_ascii_case(language) || p.code.eq_ignore_ascii_case(language)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_profile_by_name_or_code() {
        let profiles = default_profiles();
        assert_eq!(find_profile(&profiles, "Malay").map(|p| p.code.as_str()), Some("ms"));
        assert_eq!(find_profile(&profiles, "zh-cn").map(|p| p.name.as_str()), Some("mandarin"));
        assert!(find_profile(&profiles, "klingon").is_none());
    }

    #[test]
    fn test_logographic_languages_get_narrower_lines() {
        let base = CaptionConfig::default();
        let profiles = default_profiles();

        let mandarin = find_profile(&profiles, "mandarin").unwrap().caption_config(&base);
        assert_eq!(mandarin.max_chars_per_line, LOGOGRAPHIC_MAX_CHARS_PER_LINE);

        let english = find_profile(&profiles, "english").unwrap().caption_config(&base);
        assert_eq!(english.max_chars_per_line, 42);
        assert_eq!(english.words_per_line_hint, None);
    }

    #[test]
    fn test_profile_overrides_win() {
        let mut profile = LanguageProfile::new("tamil", "ta", "nova-2");
        profile.max_chars_per_line = Some(30);
        profile.words_per_line = Some(4);

        let config = profile.caption_config(&CaptionConfig::default());
        assert_eq!(config.max_chars_per_line, 30);
        assert_eq!(config.words_per_line_hint, Some(4));
    }

    #[test]
    fn test_words_per_line_hint() {
        assert_eq!(words_per_line_for("zh-CN"), LOGOGRAPHIC_WORDS_PER_LINE);
        assert_eq!(words_per_line_for("Mandarin"), LOGOGRAPHIC_WORDS_PER_LINE);
        assert_eq!(words_per_line_for("en"), DEFAULT_WORDS_PER_LINE);
    }
}
