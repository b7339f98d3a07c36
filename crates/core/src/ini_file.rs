//! The one INI reader used for metadata, ACL and users files.
//!
//! Files are parsed with `rust-ini` and flattened into ordered sections whose
//! keys are normalised to `(logical_key, language)`: `label/de` becomes
//! `("label", Some("de"))`, `Label` becomes `("label", None)`.

use std::path::Path;

use ::ini::Ini;

/// One `key[/lang] = value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// Lower-cased key without the language suffix.
    pub key: String,
    /// Lower-cased language suffix, if any.
    pub language: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSection {
    pub name: String,
    pub entries: Vec<ConfigEntry>,
}

impl ConfigSection {
    /// Language-neutral value of `key`, or the first value of any language.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key && e.language.is_none())
            .or_else(|| self.entries.iter().find(|e| e.key == key))
            .map(|e| e.value.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Value of `key` in `language`, falling back to the first declared
    /// variant.
    pub fn localized(&self, key: &str, language: &str) -> Option<&str> {
        select_language(
            self.entries
                .iter()
                .filter(|e| e.key == key)
                .map(|e| (e.language.as_deref(), e.value.as_str())),
            language,
        )
    }
}

/// A parsed configuration file with sections in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub sections: Vec<ConfigSection>,
}

/// Outcome of reading a configuration file from disk.
#[derive(Debug)]
pub enum ConfigRead {
    Missing,
    Unparsable(String),
    Parsed(ConfigFile),
}

impl ConfigFile {
    /// Read and parse `path`, distinguishing a missing file from a broken one.
    pub fn read(path: &Path) -> ConfigRead {
        if !path.is_file() {
            return ConfigRead::Missing;
        }

        match Ini::load_from_file(path) {
            Ok(ini) => ConfigRead::Parsed(Self::from_ini(&ini)),
            Err(e) => ConfigRead::Unparsable(e.to_string()),
        }
    }

    pub fn parse_str(source: &str) -> Result<Self, String> {
        Ini::load_from_str(source)
            .map(|ini| Self::from_ini(&ini))
            .map_err(|e| e.to_string())
    }

    fn from_ini(ini: &Ini) -> Self {
        let sections = ini
            .iter()
            .filter_map(|(name, props)| {
                let name = name?.trim().to_string();
                let entries = props
                    .iter()
                    .map(|(raw_key, value)| {
                        let (key, language) = split_localized_key(raw_key);
                        ConfigEntry {
                            key,
                            language,
                            value: value.trim().trim_matches('"').to_string(),
                        }
                    })
                    .collect();
                Some(ConfigSection { name, entries })
            })
            .collect();

        Self { sections }
    }

    /// First section named `name` (case-insensitive).
    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Sections whose name starts with `prefix` (case-insensitive), paired
    /// with the remainder of the name.
    pub fn sections_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ConfigSection)> + 'a {
        self.sections.iter().filter_map(move |s| {
            let head = s.name.get(..prefix.len())?;
            if head.eq_ignore_ascii_case(prefix) {
                Some((s.name[prefix.len()..].trim(), s))
            } else {
                None
            }
        })
    }
}

/// Split `key/lang` into a lower-cased key and language.
pub fn split_localized_key(raw: &str) -> (String, Option<String>) {
    match raw.rsplit_once('/') {
        Some((key, lang)) if !lang.trim().is_empty() => (
            key.trim().to_ascii_lowercase(),
            Some(lang.trim().to_ascii_lowercase()),
        ),
        _ => (raw.trim().to_ascii_lowercase(), None),
    }
}

/// Pick the value for `language`, else the first one declared.
pub fn select_language<'a, I>(candidates: I, language: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a str)>,
{
    let mut first = None;
    for (lang, value) in candidates {
        if lang.is_some_and(|l| l.eq_ignore_ascii_case(language)) {
            return Some(value);
        }
        first.get_or_insert(value);
    }
    first
}

/// Reduce a language tag like `de-AT` or `de_AT` to `de`.
pub fn short_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
