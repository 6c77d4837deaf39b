use std::sync::Arc;

use crate::alerts::{AlertSink, LogAlerts};
use crate::auth::{AuthProvider, LocalAuth};
use crate::config::AppConfig;
use crate::images::{ImageHost, S3ImageHost};
use crate::notifications::PushNotifier;
use crate::store::{DocumentStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub images: Arc<dyn ImageHost>,
    pub notifier: Option<Arc<dyn PushNotifier>>,
    pub alerts: Arc<dyn AlertSink>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?),
            None => {
                tracing::warn!("DATABASE_URL not set; documents are kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let auth = Arc::new(LocalAuth::new(
            store.clone(),
            &config.jwt,
            config.reset_code_ttl_minutes,
        )) as Arc<dyn AuthProvider>;

        let images = Arc::new(S3ImageHost::new(&config.media).await?) as Arc<dyn ImageHost>;

        Ok(Self {
            store,
            auth,
            images,
            notifier: None,
            alerts: Arc::new(LogAlerts),
        })
    }

    #[cfg(test)]
    pub fn with_notifier(mut self, notifier: Arc<dyn PushNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// In-memory wiring for tests: memory store, local auth, and an image
    /// host that accepts every valid upload without storing it.
    #[cfg(test)]
    pub fn fake() -> Self {
        use async_trait::async_trait;
        use bytes::Bytes;

        use crate::images::{object_key, UploadError, UploadRole};

        struct FakeImages;

        #[async_trait]
        impl ImageHost for FakeImages {
            async fn upload(
                &self,
                body: Bytes,
                content_type: &str,
                role: UploadRole,
            ) -> Result<String, UploadError> {
                let key = object_key(role, content_type, &body)?;
                Ok(format!("https://fake.local/{key}"))
            }
        }

        let config = AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            media: crate::config::MediaConfig {
                endpoint: "fake".into(),
                bucket: "fake".into(),
                access_key: "fake".into(),
                secret_key: "fake".into(),
                region: "us-east-1".into(),
                public_base_url: "https://fake.local".into(),
            },
            reset_code_ttl_minutes: 30,
        };

        let store = Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>;
        let auth = Arc::new(LocalAuth::new(
            store.clone(),
            &config.jwt,
            config.reset_code_ttl_minutes,
        )) as Arc<dyn AuthProvider>;
        Self {
            store,
            auth,
            images: Arc::new(FakeImages),
            notifier: None,
            alerts: Arc::new(LogAlerts),
        }
    }
}
