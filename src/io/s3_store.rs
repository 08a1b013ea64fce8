use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::object_store::{ObjectStore, StoredObject, FALLBACK_CONTENT_TYPE};
use crate::error::IoError;

/// Default key prefix under which originals and transformed pictures live.
pub const DEFAULT_KEY_PREFIX: &str = "pictures/";

/// S3-backed implementation of `ObjectStore`.
///
/// Every logical key is stored as `{prefix}{key}` inside the bucket, so the
/// original `photo.jpg` and its derived `photo_100xauto_q85_gray0.jpeg` sit
/// next to each other under the same prefix.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
    identifier: String,
}

impl S3ObjectStore {
    /// Create a store for the given bucket with the default `pictures/` prefix.
    pub fn new(client: Client, bucket: String) -> Self {
        Self::with_prefix(client, bucket, DEFAULT_KEY_PREFIX.to_string())
    }

    /// Create a store for the given bucket and key prefix.
    ///
    /// An empty prefix stores keys at the bucket root.
    pub fn with_prefix(client: Client, bucket: String, prefix: String) -> Self {
        let identifier = format!("s3://{}/{}", bucket, prefix);
        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Map a logical key to the full S3 object key.
    pub fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Verify the bucket is reachable with the configured credentials.
    pub async fn check_bucket(&self) -> Result<(), IoError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| classify_error(&e.to_string(), &self.bucket))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, IoError> {
        let object_key = self.object_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);

                // HEAD responses have no body, so some S3-compatible services
                // only signal absence through the status code
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    return Ok(false);
                }

                match classify_error(&e.to_string(), &object_key) {
                    IoError::NotFound(_) => Ok(false),
                    other => Err(other),
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<StoredObject, IoError> {
        let object_key = self.object_key(key);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let is_no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_no_such_key || status_is_404 {
                    return IoError::NotFound(format!("s3://{}/{}", self.bucket, object_key));
                }

                classify_error(&e.to_string(), &object_key)
            })?;

        let content_type = resp
            .content_type()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

        Ok(StoredObject { data, content_type })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), IoError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| IoError::S3(e.to_string()))?;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Fallback classification from the rendered SDK error.
fn classify_error(err_str: &str, what: &str) -> IoError {
    if err_str.contains("NotFound") || err_str.contains("NoSuchKey") || err_str.contains("404") {
        return IoError::NotFound(what.to_string());
    }
    if err_str.contains("dispatch failure") || err_str.contains("timeout") {
        return IoError::Connection(err_str.to_string());
    }
    IoError::S3(err_str.to_string())
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
///
/// For AWS S3, pass `None` to use the default endpoint:
/// ```ignore
/// let client = create_s3_client(None, "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
