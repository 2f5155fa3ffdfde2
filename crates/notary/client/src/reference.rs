use std::{fmt, sync::Arc};

use disclosure_core::signing::VerifyingKey;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::{
    error::{ClientError, ErrorKind},
    url::NotaryUrl,
    HttpNotaryApi, NotaryApi,
};

/// A reference to a notary: its base URL and its lazily resolved public key.
///
/// The public key is fetched at most once and cached for the lifetime of the
/// reference. Clones share the cache. Sessions are requested by the engine,
/// see [`request_session_url`](crate::request_session_url).
#[derive(Clone)]
pub struct NotaryReference {
    url: NotaryUrl,
    api: Arc<dyn NotaryApi>,
    key: Arc<OnceCell<VerifyingKey>>,
}

impl fmt::Debug for NotaryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotaryReference")
            .field("url", &self.url)
            .field("key", &self.key.get())
            .finish_non_exhaustive()
    }
}

impl NotaryReference {
    /// Creates a reference to the notary at `url`, reached over HTTP(S).
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Self::with_api(url, Arc::new(HttpNotaryApi::default()))
    }

    /// Creates a reference to the notary at `url`, reached through `api`.
    pub fn with_api(url: &str, api: Arc<dyn NotaryApi>) -> Result<Self, ClientError> {
        Ok(Self {
            url: NotaryUrl::parse(url)?,
            api,
            key: Arc::new(OnceCell::new()),
        })
    }

    /// Sets the notary public key, skipping the lookup.
    pub fn with_public_key(self, key: VerifyingKey) -> Self {
        Self {
            key: Arc::new(OnceCell::new_with(Some(key))),
            ..self
        }
    }

    /// Returns the notary base URL.
    pub fn url(&self) -> &NotaryUrl {
        &self.url
    }

    /// Returns the notary public key, fetching it on first use.
    #[instrument(level = "debug", skip(self), fields(notary = %self.url), err)]
    pub async fn public_key(&self) -> Result<VerifyingKey, ClientError> {
        self.key
            .get_or_try_init(|| async {
                let info = self.api.info(&self.url).await?;

                debug!(version = %info.version, "resolved notary info");

                VerifyingKey::parse(&info.public_key)
                    .map_err(|err| ClientError::new(ErrorKind::Key, Some(Box::new(err))))
            })
            .await
            .cloned()
    }
}
