use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::storage::{
    AzureSettings, GcsSettings, LocalSettings, Provider, S3Settings, StorageConfig,
};
use crate::Result;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            env::var("OMNISTORE_CONFIG").unwrap_or_else(|_| "omnistore.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("OMNISTORE")
                .prefix_separator("_")
                .separator("__"),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        config.apply_conventional_env(|name| env::var(name).ok());

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        Ok(config)
    }

    /// Overlay the widely used provider variables (`AWS_BUCKET`, `GCP_PROJECT_ID`, ...).
    pub fn apply_conventional_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let storage = &mut self.storage;

        if let Some(provider) = get("STORAGE_PROVIDER") {
            storage.provider = provider;
        }

        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            storage.aws.access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            storage.aws.secret_access_key = Some(v);
        }
        if let Some(v) = get("AWS_REGION") {
            storage.aws.region = v;
        }
        if let Some(v) = get("AWS_BUCKET") {
            storage.aws.bucket = v;
        }
        if let Some(v) = get("AWS_ENDPOINT_URL") {
            storage.aws.endpoint = Some(v);
        }

        if let Some(v) = get("GCP_PROJECT_ID") {
            storage.gcp.project_id = v;
        }
        if let Some(v) = get("GCP_KEY_FILENAME") {
            storage.gcp.key_filename = Some(v);
        }
        if let Some(v) = get("GCP_BUCKET") {
            storage.gcp.bucket = v;
        }

        if let Some(v) = get("AZURE_CONNECTION_STRING") {
            storage.azure.connection_string = v;
        }
        if let Some(v) = get("AZURE_CONTAINER_NAME") {
            storage.azure.container_name = v;
        }

        if let Some(v) = get("LOCAL_STORAGE_DIRECTORY") {
            storage.local.directory = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// One of `aws`, `gcp`, `azure`, `local`.
    pub provider: String,
    pub aws: AwsStorageSection,
    pub gcp: GcpStorageSection,
    pub azure: AzureStorageSection,
    pub local: LocalStorageSection,
}

impl StorageSection {
    /// Resolve the selected provider's settings.
    ///
    /// Sections for providers that are not selected are never inspected.
    pub fn to_runtime(&self) -> Result<StorageConfig> {
        let provider: Provider = self.provider.parse()?;

        let config = match provider {
            Provider::Aws => {
                let aws = self.aws.clone();
                let settings = S3Settings {
                    access_key_id: aws.access_key_id,
                    secret_access_key: aws.secret_access_key,
                    region: aws.region,
                    bucket: aws.bucket,
                    endpoint: aws.endpoint,
                };
                settings.validate()?;
                StorageConfig::Aws(settings)
            }
            Provider::Gcp => {
                let gcp = self.gcp.clone();
                let settings = GcsSettings {
                    project_id: gcp.project_id,
                    key_filename: gcp.key_filename,
                    bucket: gcp.bucket,
                };
                settings.validate()?;
                StorageConfig::Gcp(settings)
            }
            Provider::Azure => StorageConfig::Azure(AzureSettings {
                connection_string: self.azure.connection_string.clone(),
                container_name: self.azure.container_name.clone(),
            }),
            Provider::Local => StorageConfig::Local(LocalSettings {
                directory: self.local.directory.clone(),
            }),
        };

        Ok(config)
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            aws: AwsStorageSection::default(),
            gcp: GcpStorageSection::default(),
            azure: AzureStorageSection::default(),
            local: LocalStorageSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AwsStorageSection {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GcpStorageSection {
    pub project_id: String,
    pub key_filename: Option<String>,
    pub bucket: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AzureStorageSection {
    pub connection_string: String,
    pub container_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalStorageSection {
    pub directory: String,
}

impl Default for LocalStorageSection {
    fn default() -> Self {
        Self {
            directory: LocalSettings::default().directory,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}
