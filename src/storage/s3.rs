//! S3 storage backend

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, ByteStreamError};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, instrument, warn};

use super::stream::collect_body;
use super::{encode_key, required, validate_key, Storage};
use crate::types::{resolve_container, DownloadedFile, StorageTarget, UploadRequest};
use crate::{Error, Result};

const BACKEND: &str = "s3";

/// Settings for [`S3Storage`].
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket: String,
    /// S3-compatible endpoint; switches to path-style addressing.
    pub endpoint: Option<String>,
}

impl S3Settings {
    pub fn validate(&self) -> Result<()> {
        required(&self.bucket, "storage.aws.bucket")?;
        required(&self.region, "storage.aws.region")?;
        self.static_credentials().map(|_| ())
    }

    /// Explicit keys, or `None` to fall back to the SDK credential chain.
    fn static_credentials(&self) -> Result<Option<Credentials>> {
        let access_key = self.access_key_id.as_deref().filter(|k| !k.trim().is_empty());
        let secret_key = self
            .secret_access_key
            .as_deref()
            .filter(|k| !k.trim().is_empty());

        match (access_key, secret_key) {
            (Some(access), Some(secret)) => Ok(Some(Credentials::new(
                access, secret, None, None, "omnistore",
            ))),
            (None, None) => Ok(None),
            _ => Err(Error::config(
                "storage.aws.access_key_id and storage.aws.secret_access_key must be set together",
            )),
        }
    }
}

/// S3 storage backend
pub struct S3Storage {
    client: Client,
    bucket: String,
    endpoint: Option<String>,
}

impl S3Storage {
    pub async fn new(settings: S3Settings) -> Result<Self> {
        settings.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
        if let Some(credentials) = settings.static_credentials()? {
            loader = loader.credentials_provider(credentials);
        }
        let config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);

        let endpoint = settings
            .endpoint
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty());
        if let Some(endpoint_url) = &endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self::from_client(client, settings.bucket, endpoint))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            endpoint,
        }
    }

    pub fn default_bucket(&self) -> &str {
        &self.bucket
    }
}

/// Public URL of an object, virtual-hosted unless a custom endpoint is used.
pub fn object_url(endpoint: Option<&str>, bucket: &str, key: &str) -> String {
    let key = encode_key(key);
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint, bucket, key),
        None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
    }
}

fn body_chunks(body: ByteStream) -> impl Stream<Item = std::result::Result<Bytes, ByteStreamError>> {
    futures::stream::unfold(body, |mut body| async move {
        body.next().await.map(|chunk| (chunk, body))
    })
}

#[async_trait]
impl Storage for S3Storage {
    #[instrument(skip(self, file), fields(path = %file.path, size = file.data.len()))]
    async fn upload(&self, file: UploadRequest, target: Option<&StorageTarget>) -> Result<String> {
        validate_key(&file.path)?;
        let bucket = resolve_container(target, &self.bucket);

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&file.path)
            .body(ByteStream::from(file.data));
        if !file.mimetype.trim().is_empty() {
            request = request.content_type(&file.mimetype);
        }

        request.send().await.map_err(|e| {
            warn!(error = %DisplayErrorContext(&e), "S3 put failed");
            Error::backend(BACKEND, format!("put '{}' failed", file.path), e)
        })?;

        let url = object_url(self.endpoint.as_deref(), bucket, &file.path);
        debug!(%url, "uploaded object");
        Ok(url)
    }

    #[instrument(skip(self))]
    async fn download(
        &self,
        path: &str,
        target: Option<&StorageTarget>,
    ) -> Result<DownloadedFile> {
        validate_key(path)?;
        let bucket = resolve_container(target, &self.bucket);

        let response = match self.client.get_object().bucket(bucket).key(path).send().await {
            Ok(response) => response,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(Error::not_found_with(path, err));
            }
            Err(err) => {
                warn!(error = %DisplayErrorContext(&err), "S3 get failed");
                return Err(Error::backend(BACKEND, format!("get '{}' failed", path), err));
            }
        };

        let mimetype = response.content_type().map(str::to_string);
        let data = collect_body(body_chunks(response.body))
            .await
            .map_err(|e| Error::backend(BACKEND, format!("body read of '{}' failed", path), e))?;

        Ok(DownloadedFile::new(path, mimetype, data))
    }

    /// S3 deletes are idempotent, so a HEAD decides between success and `NotFound`.
    #[instrument(skip(self))]
    async fn delete(&self, path: &str, target: Option<&StorageTarget>) -> Result<()> {
        validate_key(path)?;
        let bucket = resolve_container(target, &self.bucket);

        match self.client.head_object().bucket(bucket).key(path).send().await {
            Ok(_) => {}
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                return Err(Error::not_found_with(path, err));
            }
            Err(err) => {
                warn!(error = %DisplayErrorContext(&err), "S3 head failed");
                return Err(Error::backend(BACKEND, format!("head '{}' failed", path), err));
            }
        }

        self.client
            .delete_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %DisplayErrorContext(&e), "S3 delete failed");
                Error::backend(BACKEND, format!("delete '{}' failed", path), e)
            })?;

        Ok(())
    }
}
