use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchLanguagesConfig,
}

/// Per-language character folding tables used when computing the searchable
/// folded form of description terms.
///
/// Constructed once and passed to the components that need it; there is no
/// process-wide mutable instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchLanguagesConfig {
    /// Fold tables keyed by language code. Each table maps a character to
    /// its folded replacement.
    #[serde(default)]
    pub character_folding: HashMap<String, HashMap<char, char>>,
}

impl SearchLanguagesConfig {
    /// Fold table for a language, or `None` when the language is not
    /// configured (callers treat that as an empty table).
    pub fn fold_rules(&self, language_code: &str) -> Option<&HashMap<char, char>> {
        self.character_folding.get(language_code)
    }

    pub fn set_language(&mut self, language_code: impl Into<String>, rules: HashMap<char, char>) {
        self.character_folding.insert(language_code.into(), rules);
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and
    /// environment variables.
    pub fn load() -> anyhow::Result<Self> {
        // Load environment variables from .env file if it exists
        dotenvy::dotenv().ok();

        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "ONTODB_"
        config = config.add_source(
            config::Environment::with_prefix("ONTODB")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_rules_for_unconfigured_language_is_none() {
        let config = SearchLanguagesConfig::default();
        assert!(config.fold_rules("sv").is_none());
    }

    #[test]
    fn fold_rules_round_trip_through_json() {
        let mut config = SearchLanguagesConfig::default();
        config.set_language("da", HashMap::from([('é', 'e'), ('ü', 'y')]));

        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchLanguagesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.fold_rules("da").unwrap().get(&'é'), Some(&'e'));
        assert_eq!(parsed.fold_rules("da").unwrap().get(&'ü'), Some(&'y'));
    }
}
