use crate::core::Storage;
use crate::utils::error::{EtlError, Result};
use bytes::Bytes;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

/// The parts of an Azure Storage connection string the blob client needs.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnection {
    pub account: Option<String>,
    pub access_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl fmt::Debug for AzureConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnection")
            .field("account", &self.account)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

fn invalid(reason: impl Into<String>) -> EtlError {
    EtlError::InvalidConfigValueError {
        field: "AZURE_CONNECTION_STRING".to_string(),
        value: "<redacted>".to_string(),
        reason: reason.into(),
    }
}

impl FromStr for AzureConnection {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let mut account = None;
        let mut access_key = None;
        let mut sas_token = None;
        let mut blob_endpoint = None;
        let mut protocol = None;
        let mut suffix = None;
        let mut use_emulator = false;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Account keys and SAS tokens contain '=', only the first one separates.
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid("expected `Key=Value` segments separated by ';'"))?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => account = Some(value),
                "accountkey" => access_key = Some(value),
                "sharedaccesssignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_string())
                }
                "blobendpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "defaultendpointsprotocol" => protocol = Some(value),
                "endpointsuffix" => suffix = Some(value),
                "usedevelopmentstorage" => use_emulator = value.eq_ignore_ascii_case("true"),
                other => tracing::debug!("Ignoring connection string key: {}", other),
            }
        }

        if use_emulator {
            return Ok(Self {
                account,
                access_key,
                sas_token,
                blob_endpoint,
                use_emulator,
            });
        }

        if account.is_none() {
            account = blob_endpoint.as_deref().and_then(account_from_endpoint);
        }
        if account.is_none() {
            return Err(invalid("AccountName is missing"));
        }
        if access_key.is_none() && sas_token.is_none() {
            return Err(invalid("neither AccountKey nor SharedAccessSignature is set"));
        }

        // Non-default protocol or suffix (sovereign clouds) needs an explicit endpoint.
        if blob_endpoint.is_none() {
            let protocol = protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
            let suffix = suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
            if protocol != DEFAULT_PROTOCOL || suffix != DEFAULT_ENDPOINT_SUFFIX {
                blob_endpoint = Some(format!(
                    "{}://{}.blob.{}",
                    protocol,
                    account.as_deref().unwrap_or_default(),
                    suffix
                ));
            }
        }

        Ok(Self {
            account,
            access_key,
            sas_token,
            blob_endpoint,
            use_emulator,
        })
    }
}

fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = url::Url::parse(endpoint).ok()?.host_str()?.to_string();
    let (account, rest) = host.split_once('.')?;
    rest.starts_with("blob.").then(|| account.to_string())
}

pub struct AzureBlobStorage {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl AzureBlobStorage {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn from_connection_string(connection_string: &str, container: &str) -> Result<Self> {
        let connection: AzureConnection = connection_string.parse()?;
        tracing::debug!("Azure connection: {:?}", connection);

        let mut builder = MicrosoftAzureBuilder::new()
            .with_container_name(container)
            .with_use_emulator(connection.use_emulator);

        if let Some(account) = &connection.account {
            builder = builder.with_account(account);
        }
        if let Some(key) = &connection.access_key {
            builder = builder.with_access_key(key);
        }
        if let Some(sas) = &connection.sas_token {
            builder = builder.with_config(AzureConfigKey::SasKey, sas);
        }
        if let Some(endpoint) = &connection.blob_endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.build()?;
        Ok(Self::new(Arc::new(store), container))
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

impl Storage for AzureBlobStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = self.store.get(&Path::from(path)).await?.bytes().await?;
        Ok(data.to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        // Plain put is an unconditional overwrite.
        let payload = PutPayload::from(Bytes::copy_from_slice(data));
        let result = self.store.put(&Path::from(path), payload).await?;
        tracing::debug!(
            "Blob {}/{} written (etag: {:?})",
            self.container,
            path,
            result.e_tag
        );
        Ok(())
    }

    fn destination(&self, path: &str) -> String {
        format!("{}/{}", self.container, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    const CONNECTION: &str = "DefaultEndpointsProtocol=https;AccountName=hempdata;\
        AccountKey=bXlrZXk=;EndpointSuffix=core.windows.net";

    #[test]
    fn test_parse_standard_connection_string() {
        let connection: AzureConnection = CONNECTION.parse().unwrap();
        assert_eq!(connection.account.as_deref(), Some("hempdata"));
        assert_eq!(connection.access_key.as_deref(), Some("bXlrZXk="));
        assert_eq!(connection.blob_endpoint, None);
        assert!(!connection.use_emulator);
    }

    #[test]
    fn test_parse_sovereign_cloud_builds_endpoint() {
        let connection: AzureConnection =
            "AccountName=hempdata;AccountKey=a2V5;EndpointSuffix=core.usgovcloudapi.net"
                .parse()
                .unwrap();
        assert_eq!(
            connection.blob_endpoint.as_deref(),
            Some("https://hempdata.blob.core.usgovcloudapi.net")
        );
    }

    #[test]
    fn test_parse_sas_connection_string() {
        let connection: AzureConnection =
            "BlobEndpoint=https://hempdata.blob.core.windows.net/;SharedAccessSignature=?sv=2022-11-02&sig=abc%3D"
                .parse()
                .unwrap();
        assert_eq!(connection.account.as_deref(), Some("hempdata"));
        assert_eq!(
            connection.sas_token.as_deref(),
            Some("sv=2022-11-02&sig=abc%3D")
        );
        assert_eq!(
            connection.blob_endpoint.as_deref(),
            Some("https://hempdata.blob.core.windows.net")
        );
    }

    #[test]
    fn test_parse_development_storage() {
        let connection: AzureConnection = "UseDevelopmentStorage=true".parse().unwrap();
        assert!(connection.use_emulator);
    }

    #[test]
    fn test_parse_rejects_incomplete_connection_strings() {
        assert!("AccountKey=a2V5".parse::<AzureConnection>().is_err());
        assert!("AccountName=hempdata".parse::<AzureConnection>().is_err());
        assert!("not a connection string".parse::<AzureConnection>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let connection: AzureConnection = CONNECTION.parse().unwrap();
        let debug = format!("{:?}", connection);
        assert!(!debug.contains("bXlrZXk="));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_blob() {
        let storage = AzureBlobStorage::new(Arc::new(InMemory::new()), "ams");
        let path = "Quick Stats/hemp_nass_data.csv";

        storage.write_file(path, b"year\n2020\n").await.unwrap();
        storage.write_file(path, b"year\n2021\n").await.unwrap();

        assert_eq!(storage.read_file(path).await.unwrap(), b"year\n2021\n");
        assert_eq!(storage.destination(path), "ams/Quick Stats/hemp_nass_data.csv");
        assert_eq!(storage.container(), "ams");
    }

    #[test]
    fn test_from_connection_string_builds_client() {
        let storage = AzureBlobStorage::from_connection_string(CONNECTION, "ams").unwrap();
        assert_eq!(storage.destination("a.csv"), "ams/a.csv");
    }
}
