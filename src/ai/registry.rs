//! Registry of supported AI backends.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use tracing::{debug, warn};

use super::error::ProviderError;
use super::openai::OpenAiAiClient;
use super::{AiClient, AiClientMetadata};
use crate::utils::Settings;

/// Static description of one AI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Name used on the command line.
    pub name: &'static str,
    /// Name shown to users.
    pub display_name: &'static str,
    /// Base URL of the OpenAI-compatible endpoint, without `/v1`.
    pub base_url: &'static str,
    /// Environment variable holding the API key, if one is needed.
    pub credential_env: Option<&'static str>,
    /// Model used when none is given.
    pub default_model: &'static str,
    /// Whether diffs leave the machine and need user consent.
    pub requires_consent: bool,
}

/// All supported backends.
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        base_url: "https://api.openai.com",
        credential_env: Some("OPENAI_API_KEY"),
        default_model: "gpt-4o-mini",
        requires_consent: true,
    },
    ProviderSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        base_url: "https://api.deepseek.com",
        credential_env: Some("DEEPSEEK_API_KEY"),
        default_model: "deepseek-chat",
        requires_consent: true,
    },
    ProviderSpec {
        name: "ollama",
        display_name: "Ollama",
        base_url: "http://localhost:11434",
        credential_env: None,
        default_model: "llama3.2",
        requires_consent: false,
    },
];

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Looks up a backend by name, case-insensitively.
pub fn lookup(name: &str) -> Result<&'static ProviderSpec, ProviderError> {
    PROVIDERS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
}

/// Returns the names of all registered backends.
pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|spec| spec.name).collect()
}

/// User choices that select and configure a backend.
#[derive(Debug, Clone, Default)]
pub struct ProviderSelection {
    /// Backend name; defaults to [`DEFAULT_PROVIDER`].
    pub provider: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Credential environment variable override.
    pub api_key_env: Option<String>,
    /// Endpoint override.
    pub base_url: Option<String>,
}

impl ProviderSelection {
    /// Returns the registry entry for the selected backend.
    pub fn spec(&self) -> Result<&'static ProviderSpec, ProviderError> {
        lookup(self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER))
    }

    /// Returns the environment variable the API key is read from, if any.
    pub fn credential_env(&self) -> Result<Option<String>, ProviderError> {
        let spec = self.spec()?;
        Ok(self
            .api_key_env
            .clone()
            .or_else(|| spec.credential_env.map(str::to_string)))
    }

    /// Creates a client for the selected backend.
    ///
    /// The API key is read from the environment, falling back to the
    /// settings file. It is never logged. A missing key does not fail here:
    /// the returned client rejects each request with
    /// [`ProviderError::MissingCredential`], so runs that never call the
    /// provider still succeed.
    pub fn create_client(&self, settings: &Settings) -> Result<Box<dyn AiClient>> {
        let spec = self.spec()?;
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| spec.default_model.to_string());
        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| spec.base_url.to_string());

        let api_key = match self.credential_env()? {
            Some(var) => match settings.get_env_var(&var) {
                Some(key) => Some(key),
                None => {
                    warn!(provider = spec.name, credential_env = %var, "API key not set");
                    return Ok(Box::new(UnconfiguredAiClient {
                        metadata: AiClientMetadata {
                            provider: spec.display_name.to_string(),
                            model,
                            remote: spec.requires_consent,
                        },
                        credential_env: var,
                    }));
                }
            },
            None => None,
        };

        debug!(
            provider = spec.name,
            model = %model,
            base_url = %base_url,
            has_api_key = api_key.is_some(),
            "Creating AI client"
        );

        Ok(Box::new(OpenAiAiClient::new(
            spec.display_name.to_string(),
            model,
            api_key,
            base_url,
            spec.requires_consent,
        )))
    }
}

/// Stand-in for a backend whose API key is not configured.
struct UnconfiguredAiClient {
    metadata: AiClientMetadata,
    credential_env: String,
}

impl AiClient for UnconfiguredAiClient {
    fn send_request<'a>(
        &'a self,
        _system_prompt: &'a str,
        _user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            Err(ProviderError::MissingCredential(self.credential_env.clone()).into())
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        self.metadata.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn registry_entries() {
        let openai = lookup("openai").unwrap();
        assert_eq!(openai.credential_env, Some("OPENAI_API_KEY"));
        assert_eq!(openai.default_model, "gpt-4o-mini");
        assert!(openai.requires_consent);

        let deepseek = lookup("DeepSeek").unwrap();
        assert_eq!(deepseek.credential_env, Some("DEEPSEEK_API_KEY"));
        assert_eq!(deepseek.default_model, "deepseek-chat");

        let ollama = lookup("ollama").unwrap();
        assert!(ollama.credential_env.is_none());
        assert!(!ollama.requires_consent);
        assert_eq!(ollama.default_model, "llama3.2");
    }

    #[test]
    fn unknown_provider() {
        assert!(matches!(
            lookup("gemini"),
            Err(ProviderError::UnknownProvider(name)) if name == "gemini"
        ));
        assert_eq!(provider_names(), vec!["openai", "deepseek", "ollama"]);
    }

    #[test]
    fn default_provider_is_openai() {
        let selection = ProviderSelection::default();
        assert_eq!(selection.spec().unwrap().name, "openai");
        assert_eq!(
            selection.credential_env().unwrap().as_deref(),
            Some("OPENAI_API_KEY")
        );
    }

    #[test]
    fn credential_env_override() {
        let selection = ProviderSelection {
            provider: Some("deepseek".to_string()),
            api_key_env: Some("MY_DEEPSEEK_KEY".to_string()),
            ..Default::default()
        };
        assert_eq!(
            selection.credential_env().unwrap().as_deref(),
            Some("MY_DEEPSEEK_KEY")
        );
    }

    #[tokio::test]
    async fn missing_credential_fails_each_request() {
        let selection = ProviderSelection {
            provider: Some("openai".to_string()),
            api_key_env: Some("GRC_REGISTRY_TEST_UNSET_KEY".to_string()),
            ..Default::default()
        };
        let client = selection.create_client(&Settings::default()).unwrap();
        assert_eq!(client.get_metadata().provider, "OpenAI");
        assert!(client.get_metadata().remote);

        let err = client.send_request("system", "user").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::MissingCredential(var)) if var == "GRC_REGISTRY_TEST_UNSET_KEY"
        ));
        assert_eq!(
            crate::ai::retry::classify(&err),
            crate::ai::ErrorKind::Permanent
        );
    }

    #[test]
    fn ollama_needs_no_credential() {
        let selection = ProviderSelection {
            provider: Some("ollama".to_string()),
            ..Default::default()
        };
        let client = selection.create_client(&Settings::default()).unwrap();
        let metadata = client.get_metadata();
        assert_eq!(metadata.provider, "Ollama");
        assert_eq!(metadata.model, "llama3.2");
        assert!(!metadata.remote);
    }
}
