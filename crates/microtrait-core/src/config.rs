//! Microtrait Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with defaults that reproduce the standard evaluation setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::TraitKind;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Extraction settings
    pub extraction: ExtractionConfig,

    /// Evaluation settings
    pub evaluation: EvaluationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(window) = std::env::var("MICROTRAIT_COIL_WINDOW") {
            config.extraction.coil_word_window =
                window.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "MICROTRAIT_COIL_WINDOW".to_string(),
                    value: window,
                })?;
        }

        if let Ok(level) = std::env::var("MICROTRAIT_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("MICROTRAIT_LOG_JSON") {
            config.logging.json_format = parse_bool("MICROTRAIT_LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.evaluation.predicates()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.extraction.coil_word_window != ExtractionConfig::default().coil_word_window
        {
            self.extraction.coil_word_window = env_config.extraction.coil_word_window;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum number of words allowed between a coil count and the coil term
    pub coil_word_window: usize,

    /// Convert spelled-out numbers (one..ten) before coil extraction
    pub number_words: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            coil_word_window: 5,
            number_words: true,
        }
    }
}

/// How predicted and recorded values of a trait are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPredicate {
    /// Case-insensitive set membership over list items
    ExactSet,
    /// Set membership after parsing items as numeric ranges
    NumericSet,
    /// Region/subregion matching with substring containment for subregions
    HierarchicalSubstring,
}

impl std::str::FromStr for MatchPredicate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact_set" => Ok(Self::ExactSet),
            "numeric_set" => Ok(Self::NumericSet),
            "hierarchical_substring" => Ok(Self::HierarchicalSubstring),
            _ => Err(ConfigError::InvalidValue {
                key: "predicate".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Trait name -> match predicate
    pub predicates: BTreeMap<String, MatchPredicate>,
}

impl EvaluationConfig {
    /// Resolve trait names into typed keys
    pub fn predicates(&self) -> Result<BTreeMap<TraitKind, MatchPredicate>, ConfigError> {
        self.predicates
            .iter()
            .map(|(name, predicate)| Ok((name.parse::<TraitKind>()?, *predicate)))
            .collect()
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let predicates = TraitKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), default_predicate(*kind)))
            .collect();
        Self { predicates }
    }
}

/// Predicate used for a trait when the configuration does not name one
pub fn default_predicate(kind: TraitKind) -> MatchPredicate {
    match kind {
        TraitKind::Locality => MatchPredicate::HierarchicalSubstring,
        TraitKind::PolarTubeCoils | TraitKind::PolarTubeLength | TraitKind::SporeDimensions => {
            MatchPredicate::NumericSet
        }
        TraitKind::Species | TraitKind::Hosts | TraitKind::InfectionSite | TraitKind::Nucleus => {
            MatchPredicate::ExactSet
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.extraction.coil_word_window, 5);
        assert!(config.extraction.number_words);
        assert_eq!(config.logging.level, "info");

        let predicates = config.evaluation.predicates().unwrap();
        assert_eq!(predicates.len(), TraitKind::ALL.len());
        assert_eq!(
            predicates[&TraitKind::Locality],
            MatchPredicate::HierarchicalSubstring
        );
        assert_eq!(predicates[&TraitKind::Hosts], MatchPredicate::ExactSet);
        assert_eq!(
            predicates[&TraitKind::PolarTubeCoils],
            MatchPredicate::NumericSet
        );
    }

    #[test]
    fn test_predicate_parse() {
        assert_eq!(
            "exact_set".parse::<MatchPredicate>().unwrap(),
            MatchPredicate::ExactSet
        );
        assert_eq!(
            "HIERARCHICAL_SUBSTRING".parse::<MatchPredicate>().unwrap(),
            MatchPredicate::HierarchicalSubstring
        );
        assert!("fuzzy".parse::<MatchPredicate>().is_err());
    }

    #[test]
    fn test_toml_partial_override() {
        let config: AppConfig = toml::from_str(
            r#"
            [extraction]
            coil_word_window = 3

            [evaluation.predicates]
            locality = "exact_set"
            "#,
        )
        .unwrap();

        assert_eq!(config.extraction.coil_word_window, 3);
        assert!(config.extraction.number_words);
        let predicates = config.evaluation.predicates().unwrap();
        assert_eq!(predicates[&TraitKind::Locality], MatchPredicate::ExactSet);
        assert_eq!(predicates.len(), 1);
    }

    #[test]
    fn test_unknown_trait_in_predicates() {
        let mut config = EvaluationConfig::default();
        config
            .predicates
            .insert("wingspan".to_string(), MatchPredicate::ExactSet);
        assert!(config.predicates().is_err());
    }
}
