//! Per-language content for a translated field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Language;

/// One piece of content in every supported language.
///
/// This is the write shape for translated fields and the admin read shape.
/// Public reads resolve a single language instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translations {
    pub en: String,
    pub ua: String,
}

impl Translations {
    /// Content for one language.
    #[must_use]
    pub fn get(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.en,
            Language::Ua => &self.ua,
        }
    }

    /// Replace the content for one language.
    pub fn set(&mut self, lang: Language, content: String) {
        match lang {
            Language::En => self.en = content,
            Language::Ua => self.ua = content,
        }
    }

    /// Iterate `(language, content)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Language, &str)> {
        Language::ALL.into_iter().map(|lang| (lang, self.get(lang)))
    }

    /// Returns true when any language is blank.
    #[must_use]
    pub fn has_blank(&self) -> bool {
        self.iter().any(|(_, content)| content.trim().is_empty())
    }
}

impl From<BTreeMap<Language, String>> for Translations {
    /// Missing languages become empty strings.
    fn from(mut map: BTreeMap<Language, String>) -> Self {
        Self {
            en: map.remove(&Language::En).unwrap_or_default(),
            ua: map.remove(&Language::Ua).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_map_fills_missing_languages() {
        let map = BTreeMap::from([(Language::Ua, "Сукня".to_owned())]);
        let translations = Translations::from(map);
        assert_eq!(translations.ua, "Сукня");
        assert_eq!(translations.en, "");
        assert!(translations.has_blank());
    }

    #[test]
    fn test_iter_and_set() {
        let mut translations = Translations::default();
        translations.set(Language::En, "Dress".to_owned());
        translations.set(Language::Ua, "Сукня".to_owned());

        let pairs: Vec<_> = translations.iter().collect();
        assert_eq!(pairs, vec![(Language::En, "Dress"), (Language::Ua, "Сукня")]);
        assert!(!translations.has_blank());
    }
}
