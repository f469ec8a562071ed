//! Azure Blob Storage backend

use std::sync::Arc;

use async_trait::async_trait;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::ObjectStore;
use percent_encoding::percent_decode_str;
use tracing::{debug, instrument};

use super::remote::{ContainerStores, StoreFactory};
use super::{encode_key, required, Storage};
use crate::types::{DownloadedFile, StorageTarget, UploadRequest};
use crate::{Error, Result};

const BACKEND: &str = "azure";
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Settings for [`AzureBlobStorage`].
#[derive(Debug, Clone, Default)]
pub struct AzureSettings {
    pub connection_string: String,
    pub container_name: String,
}

/// The parts of an Azure storage connection string this crate understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: Option<String>,
    pub protocol: String,
    pub endpoint_suffix: String,
    pub use_emulator: bool,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parsed = ConnectionString {
            account_name: String::new(),
            account_key: None,
            sas_token: None,
            blob_endpoint: None,
            protocol: "https".to_string(),
            endpoint_suffix: "core.windows.net".to_string(),
            use_emulator: false,
        };

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "malformed Azure connection string segment '{}'",
                    key_only(pair)
                ))
            })?;
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => parsed.account_name = value,
                "accountkey" => parsed.account_key = Some(value),
                "sharedaccesssignature" => parsed.sas_token = Some(value),
                "blobendpoint" => parsed.blob_endpoint = Some(value),
                "defaultendpointsprotocol" => parsed.protocol = value,
                "endpointsuffix" => parsed.endpoint_suffix = value,
                "usedevelopmentstorage" => parsed.use_emulator = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if parsed.use_emulator {
            if parsed.account_name.is_empty() {
                parsed.account_name = EMULATOR_ACCOUNT.to_string();
            }
            return Ok(parsed);
        }

        if parsed.account_name.is_empty() {
            return Err(Error::config("Azure connection string is missing AccountName"));
        }
        if parsed.account_key.is_none() && parsed.sas_token.is_none() {
            return Err(Error::config(
                "Azure connection string needs AccountKey or SharedAccessSignature",
            ));
        }
        Ok(parsed)
    }

    /// Base URL of the blob service, without a trailing slash.
    pub fn blob_endpoint(&self) -> String {
        if let Some(endpoint) = &self.blob_endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        if self.use_emulator {
            return EMULATOR_BLOB_ENDPOINT.to_string();
        }
        format!(
            "{}://{}.blob.{}",
            self.protocol, self.account_name, self.endpoint_suffix
        )
    }

    fn builder(&self, container: &str) -> MicrosoftAzureBuilder {
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);
        if self.use_emulator {
            return builder.with_use_emulator(true);
        }

        builder = builder.with_account(&self.account_name);
        if let Some(key) = &self.account_key {
            builder = builder.with_access_key(key);
        }
        if let Some(sas) = &self.sas_token {
            builder = builder.with_sas_authorization(sas_pairs(sas));
        }
        if let Some(endpoint) = &self.blob_endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        builder
    }
}

// Never echo a segment value back: it may hold the account key.
fn key_only(pair: &str) -> &str {
    pair.split('=').next().unwrap_or_default()
}

/// Query pairs of a SAS token, percent-decoded; the client encodes them again per request.
fn sas_pairs(token: &str) -> Vec<(String, String)> {
    let decode = |s: &str| percent_decode_str(s).decode_utf8_lossy().into_owned();
    token
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((decode(k), decode(v)))
        })
        .collect()
}

/// Azure Blob Storage backend
pub struct AzureBlobStorage {
    blob_endpoint: String,
    stores: ContainerStores,
}

impl AzureBlobStorage {
    pub fn new(settings: AzureSettings) -> Result<Self> {
        required(&settings.connection_string, "storage.azure.connection_string")?;
        let connection = ConnectionString::parse(&settings.connection_string)?;
        let blob_endpoint = connection.blob_endpoint();

        let factory: StoreFactory = Arc::new(move |container: &str| {
            let store = connection.builder(container).build()?;
            Ok(Arc::new(store) as Arc<dyn ObjectStore>)
        });

        Self::with_store_factory(blob_endpoint, settings.container_name, factory)
    }

    /// Build on top of caller-provided clients, one per container.
    pub fn with_store_factory(
        blob_endpoint: impl Into<String>,
        container_name: impl Into<String>,
        factory: StoreFactory,
    ) -> Result<Self> {
        let container_name = container_name.into();
        required(&container_name, "storage.azure.container_name")?;

        Ok(Self {
            blob_endpoint: blob_endpoint.into().trim_end_matches('/').to_string(),
            stores: ContainerStores::new(BACKEND, container_name, factory)?,
        })
    }

    pub fn default_container(&self) -> &str {
        self.stores.default_container()
    }

    fn blob_url(&self, container: &str, key: &str) -> String {
        format!("{}/{}/{}", self.blob_endpoint, container, encode_key(key))
    }
}

#[async_trait]
impl Storage for AzureBlobStorage {
    #[instrument(skip(self, file), fields(path = %file.path, size = file.data.len()))]
    async fn upload(&self, file: UploadRequest, target: Option<&StorageTarget>) -> Result<String> {
        let (container, store) = self.stores.resolve(target)?;
        let url = self.blob_url(container, &file.path);

        self.stores.put(store.as_ref(), file).await?;
        debug!(%url, "uploaded blob");
        Ok(url)
    }

    #[instrument(skip(self))]
    async fn download(
        &self,
        path: &str,
        target: Option<&StorageTarget>,
    ) -> Result<DownloadedFile> {
        let (_, store) = self.stores.resolve(target)?;
        self.stores.get(store.as_ref(), path).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str, target: Option<&StorageTarget>) -> Result<()> {
        let (_, store) = self.stores.resolve(target)?;
        self.stores.delete(store.as_ref(), path).await
    }
}
