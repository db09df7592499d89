use std::path::Path;

use anyhow::Context as _;

use crate::{Config, Mode};

impl Config {
    /// Read, expand, parse and validate a TOML configuration file
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable, a placeholder cannot be resolved,
    /// the TOML is malformed, or any policy value is out of range
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`] minus the file read
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).context("config variable expansion failed")?;
        let config: Self = toml::from_str(&expanded).context("failed to parse config")?;

        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the orchestrator cannot run with
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_backends(self.mode)?;
        self.validate_retry()?;
        self.validate_validation()?;
        self.validate_scoring()?;
        self.validate_semantic()?;
        self.validate_telemetry()?;
        Ok(())
    }

    /// Ensure every backend the mode needs is configured
    ///
    /// # Errors
    ///
    /// Names the first missing backend
    pub fn validate_backends(&self, mode: Mode) -> anyhow::Result<()> {
        for name in mode.backends() {
            if self.backends.get(name).is_none() {
                anyhow::bail!("mode '{mode}' requires backends.{name} to be configured");
            }
        }

        for (name, backend) in self.backends.iter() {
            if backend.model.trim().is_empty() {
                anyhow::bail!("backends.{name}.model must not be empty");
            }
            if backend.timeout.is_zero() {
                anyhow::bail!("backends.{name}.timeout must be greater than zero");
            }
            if !(0.0..=2.0).contains(&backend.temperature) {
                anyhow::bail!("backends.{name}.temperature must be within 0.0..=2.0");
            }
        }

        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        if self.policy.retry.max_attempts == 0 {
            anyhow::bail!("policy.retry.max_attempts must be at least 1");
        }

        if self.policy.latency_window == 0 {
            anyhow::bail!("policy.latency_window must be at least 1");
        }

        check_unit("policy.acceptance_threshold", self.policy.acceptance_threshold)
    }

    fn validate_validation(&self) -> anyhow::Result<()> {
        let validation = &self.policy.validation;

        if validation.max_length == 0 {
            anyhow::bail!("policy.validation.max_length must be greater than zero");
        }

        if validation.min_response_length > validation.max_length {
            anyhow::bail!(
                "policy.validation.min_response_length ({}) exceeds max_length ({})",
                validation.min_response_length,
                validation.max_length
            );
        }

        if validation.max_sentences == 0 {
            anyhow::bail!("policy.validation.max_sentences must be at least 1");
        }

        for pattern in &validation.banned_patterns {
            regex::Regex::new(pattern).with_context(|| format!("invalid banned pattern '{pattern}'"))?;
        }

        Ok(())
    }

    fn validate_scoring(&self) -> anyhow::Result<()> {
        let scoring = &self.policy.scoring;

        for (name, weight) in scoring.weights.named() {
            check_unit(&format!("policy.scoring.weights.{name}"), weight)?;
        }

        check_unit("policy.scoring.relevance.min_ratio", scoring.relevance.min_ratio)?;
        check_unit("policy.scoring.type_mismatch.min_ratio", scoring.type_mismatch.min_ratio)?;
        check_unit("policy.scoring.repetition.max_word_ratio", scoring.repetition.max_word_ratio)?;
        check_unit(
            "policy.scoring.coherence.max_repeated_ratio",
            scoring.coherence.max_repeated_ratio,
        )?;

        if scoring.coherence.ngram_size == 0 {
            anyhow::bail!("policy.scoring.coherence.ngram_size must be at least 1");
        }

        if scoring.relevance.min_ratio <= 0.0 {
            anyhow::bail!("policy.scoring.relevance.min_ratio must be greater than zero");
        }

        if !scoring.technical_boost.is_finite() || scoring.technical_boost < 0.0 {
            anyhow::bail!("policy.scoring.technical_boost must be a finite, non-negative number");
        }

        Ok(())
    }

    fn validate_semantic(&self) -> anyhow::Result<()> {
        let semantic = &self.policy.semantic;

        check_unit("policy.semantic.min_threshold", semantic.min_threshold)?;
        check_unit("policy.semantic.weight", semantic.weight)?;
        check_unit("policy.semantic.context_weight", semantic.context_weight)?;

        if semantic.enabled && self.embeddings.is_none() {
            anyhow::bail!("policy.semantic.enabled requires an [embeddings] section");
        }

        if let Some(ref embeddings) = self.embeddings
            && embeddings.cache_capacity == 0
        {
            anyhow::bail!("embeddings.cache_capacity must be greater than zero");
        }

        Ok(())
    }

    fn validate_telemetry(&self) -> anyhow::Result<()> {
        let Some(ref telemetry) = self.telemetry else {
            return Ok(());
        };

        check_unit("telemetry.sampling_rate", telemetry.sampling_rate)
    }
}

fn check_unit(name: &str, value: f64) -> anyhow::Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{name} must be within 0.0..=1.0, got {value}");
    }

    Ok(())
}
