//! Answer provider selection.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use answer_provider::AnswerProvider;
use answer_provider_ask_stream::{AskStreamProvider, AskStreamProviderConfig};
use answer_provider_mock::MockProvider;
use token_store::TokenStore;
use tracing::info;

use crate::config::{ProviderKind, Settings};

pub fn open_token_store(settings: &Settings) -> Result<TokenStore> {
    let store = match settings.token_file.as_deref() {
        Some(path) => TokenStore::open(path),
        None => TokenStore::open_default(),
    };
    store.context("failed to open token store")
}

pub fn build_provider(settings: &Settings) -> Result<Arc<dyn AnswerProvider>> {
    let provider: Arc<dyn AnswerProvider> = match settings.provider {
        ProviderKind::Mock => Arc::new(MockProvider::default()),
        ProviderKind::AskStream => {
            let store = open_token_store(settings)?;
            let token = store.bearer_token().ok_or_else(|| {
                anyhow!(
                    "no usable token in {}; run `acaceta-chat token set <TOKEN>` first",
                    store.path().display()
                )
            })?;

            let mut config = AskStreamProviderConfig::new(token);
            if let Some(api_url) = settings.api_url.as_deref() {
                config = config.with_base_url(api_url);
            }
            if let Some(timeout) = settings.timeout {
                config = config.with_timeout(timeout);
            }

            let provider = AskStreamProvider::new(config)
                .map_err(|error| anyhow!("failed to start answer provider: {error}"))?;
            Arc::new(provider)
        }
    };

    let profile = provider.profile();
    info!(provider = %profile.provider_id, endpoint = %profile.endpoint, "answer provider ready");
    Ok(provider)
}
