//! Configuration builder for integration tests
//!
//! Renders TOML and loads it through the regular parser, so every test
//! config also passes startup validation.

use arbiter_config::{Config, Mode};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    mode: Mode,
    local: Option<String>,
    remote: Option<String>,
    timeout: String,
    embeddings: Option<String>,
    policy: Vec<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Fallback,
            local: None,
            remote: None,
            timeout: "5s".to_owned(),
            embeddings: None,
            policy: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Point the local backend at a mock
    pub fn with_local(mut self, base_url: &str) -> Self {
        self.local = Some(base_url.to_owned());
        self
    }

    /// Point the remote backend at a mock
    pub fn with_remote(mut self, base_url: &str) -> Self {
        self.remote = Some(base_url.to_owned());
        self
    }

    /// Per-call timeout for every backend, e.g. `"200ms"`
    pub fn with_timeout(mut self, timeout: &str) -> Self {
        timeout.clone_into(&mut self.timeout);
        self
    }

    /// Enable semantic scoring against an embeddings mock
    pub fn with_semantic(mut self, base_url: &str) -> Self {
        self.embeddings = Some(base_url.to_owned());
        self.policy.push("[policy.semantic]\nenabled = true".to_owned());
        self
    }

    /// Append a raw TOML table, e.g. `"[policy.retry]\nmax_attempts = 2"`
    pub fn with_policy(mut self, table: &str) -> Self {
        self.policy.push(table.to_owned());
        self
    }

    pub fn to_toml(&self) -> String {
        let mut sections = vec![format!("mode = \"{}\"", self.mode)];

        for (name, base_url) in [("local", &self.local), ("remote", &self.remote)] {
            if let Some(base_url) = base_url {
                sections.push(format!(
                    "[backends.{name}]\nbase_url = \"{base_url}\"\napi_key = \"test-key\"\nmodel = \"mock-{name}\"\ntimeout = \"{}\"",
                    self.timeout
                ));
            }
        }

        sections.extend(self.policy.iter().cloned());

        if let Some(base_url) = &self.embeddings {
            sections.push(format!("[embeddings]\nbase_url = \"{base_url}\"\nmodel = \"mock-embed\""));
        }

        sections.join("\n\n")
    }

    pub fn build(&self) -> Config {
        Config::from_toml(&self.to_toml()).expect("test config is valid")
    }
}
