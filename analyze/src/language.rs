//! Language index mapping.
//!
//! The language model emits logits in Whisper's canonical language-token
//! order; the table below maps indices to ISO 639-1 codes and display
//! names. Indices past the table fall back to a synthesized code.

use crate::types::LanguageResult;

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("zh", "Chinese"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("ja", "Japanese"),
    ("pt", "Portuguese"),
    ("tr", "Turkish"),
    ("pl", "Polish"),
    ("ca", "Catalan"),
    ("nl", "Dutch"),
    ("ar", "Arabic"),
    ("sv", "Swedish"),
    ("it", "Italian"),
    ("id", "Indonesian"),
    ("hi", "Hindi"),
    ("fi", "Finnish"),
    ("vi", "Vietnamese"),
    ("he", "Hebrew"),
    ("uk", "Ukrainian"),
    ("el", "Greek"),
    ("ms", "Malay"),
    ("cs", "Czech"),
    ("ro", "Romanian"),
    ("da", "Danish"),
    ("hu", "Hungarian"),
    ("ta", "Tamil"),
    ("no", "Norwegian"),
    ("th", "Thai"),
    ("ur", "Urdu"),
    ("hr", "Croatian"),
    ("bg", "Bulgarian"),
    ("lt", "Lithuanian"),
    ("la", "Latin"),
    ("mi", "Maori"),
    ("cy", "Welsh"),
    ("sk", "Slovak"),
    ("te", "Telugu"),
    ("fa", "Persian"),
    ("lv", "Latvian"),
    ("bn", "Bengali"),
    ("sr", "Serbian"),
    ("az", "Azerbaijani"),
    ("sl", "Slovenian"),
    ("kn", "Kannada"),
    ("et", "Estonian"),
    ("mk", "Macedonian"),
    ("br", "Breton"),
    ("eu", "Basque"),
    ("is", "Icelandic"),
    ("hy", "Armenian"),
    ("ne", "Nepali"),
    ("mn", "Mongolian"),
    ("bs", "Bosnian"),
    ("kk", "Kazakh"),
    ("sq", "Albanian"),
    ("sw", "Swahili"),
    ("gl", "Galician"),
    ("mr", "Marathi"),
    ("pa", "Punjabi"),
    ("si", "Sinhala"),
    ("km", "Khmer"),
    ("sn", "Shona"),
    ("yo", "Yoruba"),
    ("so", "Somali"),
    ("af", "Afrikaans"),
    ("oc", "Occitan"),
    ("ka", "Georgian"),
    ("be", "Belarusian"),
    ("tg", "Tajik"),
    ("sd", "Sindhi"),
    ("gu", "Gujarati"),
    ("am", "Amharic"),
    ("yi", "Yiddish"),
    ("lo", "Lao"),
    ("uz", "Uzbek"),
    ("fo", "Faroese"),
    ("ht", "Haitian Creole"),
    ("ps", "Pashto"),
    ("tk", "Turkmen"),
    ("nn", "Nynorsk"),
    ("mt", "Maltese"),
    ("sa", "Sanskrit"),
    ("lb", "Luxembourgish"),
    ("my", "Myanmar"),
    ("bo", "Tibetan"),
    ("tl", "Tagalog"),
    ("mg", "Malagasy"),
    ("as", "Assamese"),
    ("tt", "Tatar"),
    ("haw", "Hawaiian"),
    ("ln", "Lingala"),
    ("ha", "Hausa"),
    ("ba", "Bashkir"),
    ("jw", "Javanese"),
    ("su", "Sundanese"),
];

/// Builds a [`LanguageResult`] for the winning model index.
pub fn language_for_index(index: usize, confidence: f32) -> LanguageResult {
    let (code, name) = match LANGUAGES.get(index) {
        Some(&(code, name)) => (code.to_string(), name.to_string()),
        None => (format!("lang{index}"), "Unknown".to_string()),
    };
    let accent_region = if code == "zh" {
        "Mandarin".to_string()
    } else {
        name.clone()
    };
    LanguageResult {
        code,
        name,
        confidence,
        accent_score: 0.0,
        accent_region,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_languages_resolve() {
        let en = language_for_index(0, 0.9);
        assert_eq!(en.code, "en");
        assert_eq!(en.name, "English");
        assert_eq!(en.accent_region, "English");

        let zh = language_for_index(1, 0.8);
        assert_eq!(zh.code, "zh");
        assert_eq!(zh.accent_region, "Mandarin");
    }

    #[test]
    fn out_of_range_index_synthesizes_code() {
        let r = language_for_index(500, 0.1);
        assert_eq!(r.code, "lang500");
        assert_eq!(r.name, "Unknown");
    }

    #[test]
    fn table_covers_whisper_entries() {
        assert!(LANGUAGES.len() >= 98);
        // Codes are unique.
        let mut codes: Vec<&str> = LANGUAGES.iter().map(|&(c, _)| c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), LANGUAGES.len());
    }
}
