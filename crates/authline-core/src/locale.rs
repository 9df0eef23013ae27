//! Active interface locale, read by the request augmenter.

use parking_lot::RwLock;
use thiserror::Error;

/// Locale used when nothing else is configured
pub const DEFAULT_LOCALE: &str = "fa";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid locale code: {0:?} (expected two ASCII letters)")]
pub struct InvalidLocale(pub String);

/// Holds the two-letter locale code, lowercased.
#[derive(Debug)]
pub struct LocaleStore {
    current: RwLock<String>,
}

impl LocaleStore {
    pub fn new(code: &str) -> Result<Self, InvalidLocale> {
        Ok(Self {
            current: RwLock::new(normalize(code)?),
        })
    }

    pub fn get(&self) -> String {
        self.current.read().clone()
    }

    pub fn set(&self, code: &str) -> Result<(), InvalidLocale> {
        *self.current.write() = normalize(code)?;
        Ok(())
    }
}

impl Default for LocaleStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(DEFAULT_LOCALE.to_string()),
        }
    }
}

fn normalize(code: &str) -> Result<String, InvalidLocale> {
    let trimmed = code.trim();
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(InvalidLocale(code.to_string()))
    }
}
