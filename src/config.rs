/// Configuration management for the pedigree engine
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub assist: AssistConfig,
    pub validation: ValidationConfig,
    pub risk_bands: RiskBands,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Confidence below which fallback-parsed fields are dropped on merge.
    pub fallback_merge_threshold: f64,
    pub recognition_timeout_seconds: u64,
    /// Replace names with stable placeholders before text leaves the process.
    pub pseudonymize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    /// Name of the environment variable holding the API key. The key itself
    /// never lands in a config file.
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub sex_role: SexRolePolicy,
    /// Extend parental checks across adoptive edges as well.
    pub include_non_biological: bool,
    /// Minimum plausible parent age in whole years at a child's birth.
    pub min_parent_age: u32,
}

/// Severity applied to parents whose recorded sex conflicts with their
/// parental role. Recorded sex is sex at birth, so disagreement is often
/// a data-entry artifact rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexRolePolicy {
    Advisory,
    Blocking,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBands {
    /// Consistency at or above this lands in the high band.
    pub high: f64,
    /// Consistency at or above this (but below `high`) is moderate.
    pub moderate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            assist: AssistConfig::default(),
            validation: ValidationConfig::default(),
            risk_bands: RiskBands::default(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fallback_merge_threshold: 0.55,
            recognition_timeout_seconds: 20,
            pseudonymize: true,
        }
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            model: String::new(),
            timeout_seconds: 30,
            api_key_env: "PEDIGREE_ASSIST_API_KEY".to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sex_role: SexRolePolicy::Advisory,
            include_non_biological: false,
            min_parent_age: 12,
        }
    }
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            high: 0.8,
            moderate: 0.5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let mut config = EngineConfig::default();

        // Override with environment variables if present
        if let Ok(timeout) = std::env::var("PEDIGREE_RECOGNITION_TIMEOUT_SECONDS") {
            config.extraction.recognition_timeout_seconds = timeout.parse()?;
        }

        if let Ok(threshold) = std::env::var("PEDIGREE_FALLBACK_MERGE_THRESHOLD") {
            config.extraction.fallback_merge_threshold = threshold.parse()?;
        }

        if let Ok(pseudonymize) = std::env::var("PEDIGREE_PSEUDONYMIZE") {
            config.extraction.pseudonymize = pseudonymize.parse()?;
        }

        if let Ok(base_url) = std::env::var("PEDIGREE_ASSIST_BASE_URL") {
            config.assist.base_url = base_url;
            config.assist.enabled = true;
        }

        if let Ok(model) = std::env::var("PEDIGREE_ASSIST_MODEL") {
            config.assist.model = model;
        }

        if let Ok(timeout) = std::env::var("PEDIGREE_ASSIST_TIMEOUT_SECONDS") {
            config.assist.timeout_seconds = timeout.parse()?;
        }

        if let Ok(policy) = std::env::var("PEDIGREE_SEX_ROLE_POLICY") {
            config.validation.sex_role = match policy.as_str() {
                "advisory" => SexRolePolicy::Advisory,
                "blocking" => SexRolePolicy::Blocking,
                "disabled" => SexRolePolicy::Disabled,
                other => {
                    return Err(anyhow::anyhow!(
                        "Unknown sex role policy '{}' (expected advisory, blocking or disabled)",
                        other
                    ))
                }
            };
        }

        if let Ok(age) = std::env::var("PEDIGREE_MIN_PARENT_AGE") {
            config.validation.min_parent_age = age.parse()?;
        }

        Ok(config)
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge_with(&mut self, other: EngineConfig) {
        // Merge extraction settings
        if other.extraction.recognition_timeout_seconds != 20 {
            self.extraction.recognition_timeout_seconds =
                other.extraction.recognition_timeout_seconds;
        }
        if other.extraction.fallback_merge_threshold != 0.55 {
            self.extraction.fallback_merge_threshold = other.extraction.fallback_merge_threshold;
        }
        self.extraction.pseudonymize = other.extraction.pseudonymize;

        // Merge assist settings
        if other.assist.enabled {
            self.assist = other.assist;
        }

        // Merge validation settings
        self.validation.sex_role = other.validation.sex_role;
        self.validation.include_non_biological = other.validation.include_non_biological;
        if other.validation.min_parent_age != 12 {
            self.validation.min_parent_age = other.validation.min_parent_age;
        }

        // Merge risk bands
        if other.risk_bands.high != 0.8 {
            self.risk_bands.high = other.risk_bands.high;
        }
        if other.risk_bands.moderate != 0.5 {
            self.risk_bands.moderate = other.risk_bands.moderate;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.recognition_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "Recognition timeout must be greater than 0"
            ));
        }

        if !(0.0..=1.0).contains(&self.extraction.fallback_merge_threshold) {
            return Err(anyhow::anyhow!(
                "Fallback merge threshold must be between 0 and 1"
            ));
        }

        if !(0.0..=1.0).contains(&self.risk_bands.high)
            || !(0.0..=1.0).contains(&self.risk_bands.moderate)
        {
            return Err(anyhow::anyhow!("Risk band cutpoints must be between 0 and 1"));
        }

        if self.risk_bands.moderate >= self.risk_bands.high {
            return Err(anyhow::anyhow!(
                "Moderate risk cutpoint must be below the high cutpoint"
            ));
        }

        if self.assist.enabled {
            if self.assist.base_url.is_empty() {
                return Err(anyhow::anyhow!(
                    "Assist base URL is required when drafting assistance is enabled"
                ));
            }
            if self.assist.model.is_empty() {
                return Err(anyhow::anyhow!(
                    "Assist model name is required when drafting assistance is enabled"
                ));
            }
            if self.assist.timeout_seconds == 0 {
                return Err(anyhow::anyhow!("Assist timeout must be greater than 0"));
            }
        }

        Ok(())
    }
}
