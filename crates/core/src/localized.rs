//! Language-tagged resource files inside a metadata directory:
//! `logo.png`, `logo_de.png`, `index_en.html`, `parts-index.html`, ...

use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::ini_file::short_language;
use crate::settings::Settings;

pub const TECH_SPEC_FILE: &str = "index.html";
pub const PARTS_INDEX_FILE: &str = "parts-index.html";

/// File names (inside the metadata directory) chosen for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalizedResources {
    pub icon: Option<String>,
    pub text_icon: Option<String>,
    pub tech_spec: Option<String>,
    pub parts_index: Option<String>,
}

impl LocalizedResources {
    pub fn scan(settings: &Settings, metadata_dir: &Path, language: &str) -> Self {
        let mut names: Vec<String> = match std::fs::read_dir(metadata_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => return Self::default(),
        };
        names.sort();

        let pick = |template: &str| select_localized(&names, template, language);
        Self {
            icon: pick(&settings.dir_icon),
            text_icon: pick(&settings.dir_text_icon),
            tech_spec: pick(TECH_SPEC_FILE),
            parts_index: pick(PARTS_INDEX_FILE),
        }
    }
}

/// Pattern matching `<stem>[_<lang>].<ext>` for a template `<stem>.<ext>`.
fn localized_pattern(template: &str) -> Option<Regex> {
    let (stem, ext) = template.rsplit_once('.')?;
    Regex::new(&format!(
        r"(?i)^{}(?:_([a-z]{{2}}(?:[-_][a-z]{{2}})?))?\.{}$",
        regex::escape(stem),
        regex::escape(ext)
    ))
    .ok()
}

/// Choose among `names` (sorted) the variant of `template` for `language`:
/// the exact language, else the language-neutral file, else the first
/// language-tagged one.
pub fn select_localized(names: &[String], template: &str, language: &str) -> Option<String> {
    let pattern = localized_pattern(template)?;
    let wanted = short_language(language);

    let mut neutral = None;
    let mut first_tagged = None;

    for name in names {
        let Some(captures) = pattern.captures(name) else {
            continue;
        };
        match captures.get(1) {
            Some(lang) if short_language(lang.as_str()) == wanted => return Some(name.clone()),
            Some(_) => {
                first_tagged.get_or_insert(name);
            }
            None => {
                neutral.get_or_insert(name);
            }
        }
    }

    neutral.or(first_tagged).cloned()
}
