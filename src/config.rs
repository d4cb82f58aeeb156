use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Settings for one extraction, supplied by the caller rather than read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Config {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The credential, treating an empty value as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_counts_as_missing() {
        assert_eq!(Config::new(Some(String::new())).credential(), None);
        assert_eq!(Config::default().credential(), None);
        assert_eq!(Config::new(Some("abc".into())).credential(), Some("abc"));
    }

    #[test]
    fn defaults_point_at_flash_model() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-1.5-flash-latest");
        assert!(config.base_url.starts_with("https://generativelanguage.googleapis.com"));
    }
}
