//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::auth::TokenDecoder;
use crate::services::backend::{BackendClient, BackendError};
use crate::services::catalog::CategoryCache;
use crate::store::{FallbackCatalog, Store};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the data store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Store,
    fallback: Option<FallbackCatalog>,
    categories: CategoryCache,
    tokens: TokenDecoder,
    backend: BackendClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Primary data store
    /// * `fallback` - Catalog served when `store` fails a read; `None` disables fallback
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        store: Store,
        fallback: Option<FallbackCatalog>,
    ) -> Result<Self, BackendError> {
        let backend = BackendClient::new(config.backend_url.clone())?;
        let tokens = TokenDecoder::new(config.auth.token_secret.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                fallback,
                categories: CategoryCache::new(),
                tokens,
                backend,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the primary store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// The fallback catalog, when read fallback is enabled.
    #[must_use]
    pub fn fallback(&self) -> Option<&FallbackCatalog> {
        self.inner.fallback.as_ref()
    }

    /// Get a reference to the category list cache.
    #[must_use]
    pub fn categories(&self) -> &CategoryCache {
        &self.inner.categories
    }

    /// Get a reference to the bearer-token decoder.
    #[must_use]
    pub fn tokens(&self) -> &TokenDecoder {
        &self.inner.tokens
    }

    /// Get a reference to the upstream backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }
}
