use log::{debug, error};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin selector over a fixed pool of API keys.
///
/// Shared between providers behind an `Arc`; every call to
/// [`KeyRotator::next_key`] advances the cursor.
#[derive(Debug, Default)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        KeyRotator {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Next key in the pool, or an empty string when the pool is empty.
    pub fn next_key(&self) -> String {
        if self.keys.is_empty() {
            error!("No API keys configured; requests will be rejected upstream");
            return String::new();
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        let key = &self.keys[index];
        debug!(
            "Using API key {}/{} ({})",
            index + 1,
            self.keys.len(),
            mask_key(key)
        );
        key.clone()
    }
}

/// First and last four characters of a key, for logs.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
