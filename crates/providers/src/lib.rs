//! Model API providers for codeclaw.
//!
//! All providers implement the `codeclaw_core::Provider` trait.

pub mod openai_compat;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use codeclaw_config::AppConfig;
use codeclaw_core::Provider;
use codeclaw_core::error::ProviderError;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};

/// Build the provider stack described by the configuration: the streaming
/// client wrapped in the retry policy.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let client = OpenAiCompatProvider::new(provider_name(&config.base_url), &config.base_url, api_key)?;

    let policy = RetryPolicy {
        max_attempts: config.retry.max_attempts,
        base_delay: Duration::from_millis(config.retry.base_delay_ms),
    };

    Ok(Arc::new(RetryProvider::new(Arc::new(client), policy)))
}

/// Short provider label derived from the endpoint host.
fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else {
        "custom"
    }
}
