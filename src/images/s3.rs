use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::{debug, error};

use super::{object_key, ImageHost, UploadError, UploadRole};
use crate::config::MediaConfig;

/// Image host backed by an S3-compatible bucket (MinIO in development).
#[derive(Clone)]
pub struct S3ImageHost {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageHost {
    pub async fn new(media: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(media.region.clone()))
            .credentials_provider(Credentials::new(
                &media.access_key,
                &media.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&media.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&media.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: media.bucket.clone(),
            public_base_url: media.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }
}

#[async_trait]
impl ImageHost for S3ImageHost {
    async fn upload(
        &self,
        body: Bytes,
        content_type: &str,
        role: UploadRole,
    ) -> Result<String, UploadError> {
        let key = object_key(role, content_type, &body)?;
        self.put_object(&key, body, content_type)
            .await
            .map_err(|e| {
                error!(error = ?e, key = %key, "image upload failed");
                UploadError::Host(format!("{e:#}"))
            })?;
        debug!(key = %key, role = ?role, "image uploaded");
        Ok(self.public_url(&key))
    }
}
