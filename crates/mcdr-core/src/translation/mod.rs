//! # Translation
//!
//! Every operator-facing message goes through a [`Translator`]. The default
//! [`LanguageTable`] ships an embedded English table and formats positional
//! arguments into `{}` / `{N}` placeholders.
use std::collections::HashMap;
use std::fmt;

/// Translation capability consumed by the core
pub trait Translator: Send + Sync {
    /// Translate `key` and format `args` into the result. Unknown keys
    /// translate to the key itself.
    fn tr(&self, key: &str, args: &[&dyn fmt::Display]) -> String;
}

const EN_US: &str = include_str!("../../lang/en_us.json");

/// A key -> template table for one language
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    language: String,
    entries: HashMap<String, String>,
}

impl LanguageTable {
    /// The embedded English table
    pub fn english() -> Self {
        // The embedded file is part of the crate, a parse failure is a build defect.
        let entries: HashMap<String, String> = serde_json::from_str(EN_US).unwrap_or_else(|e| {
            log::error!("Embedded language file is malformed: {}", e);
            HashMap::new()
        });
        Self {
            language: "en_us".to_string(),
            entries,
        }
    }

    /// Pick a table by language code. Only English is embedded for now,
    /// other codes fall back to it with a warning.
    pub fn for_language(language: &str) -> Self {
        if language != "en_us" {
            log::warn!("Language {} is not available, falling back to en_us", language);
        }
        Self::english()
    }

    pub fn from_json(language: &str, data: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            language: language.to_string(),
            entries: serde_json::from_str(data)?,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Translator for LanguageTable {
    fn tr(&self, key: &str, args: &[&dyn fmt::Display]) -> String {
        match self.entries.get(key) {
            Some(template) => format_template(template, args),
            None => key.to_string(),
        }
    }
}

/// Fill `{}` (next argument) and `{N}` (argument N) placeholders. Missing
/// arguments leave the placeholder untouched.
pub fn format_template(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next_index = 0;
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let inner = &after[..close];
        let index = if inner.is_empty() {
            let i = next_index;
            next_index += 1;
            Some(i)
        } else {
            inner.parse::<usize>().ok()
        };
        match index.and_then(|i| args.get(i)) {
            Some(arg) => out.push_str(&arg.to_string()),
            None => {
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
