use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::models::LeadRecord;
use crate::storage::{LeadStore, StoreError, TableStatus};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

/// How requests to the table service are authorized.
#[derive(Clone)]
pub enum Credentials {
    /// Account name and decoded account key, signed with Shared Key Lite.
    SharedKey { account: String, key: Vec<u8> },
    /// Shared access signature appended as the query string.
    Sas(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Credentials::Sas(_) => f.debug_tuple("Sas").field(&"<redacted>").finish(),
        }
    }
}

/// Table endpoint and credentials parsed from a storage connection string.
#[derive(Debug, Clone)]
pub struct StorageConnection {
    /// Base URL of the table service, without a trailing slash.
    pub endpoint: String,
    pub credentials: Credentials,
}

impl StorageConnection {
    /// Parses an Azure storage connection string.
    ///
    /// Accepts `AccountName`/`AccountKey`, `SharedAccessSignature`, an explicit
    /// `TableEndpoint`, and `UseDevelopmentStorage=true` for Azurite.
    pub fn parse(connection_string: &str) -> anyhow::Result<Self> {
        let settings: HashMap<String, String> = connection_string
            .split(';')
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| {
                segment
                    .split_once('=')
                    .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                    .ok_or_else(|| {
                        anyhow::anyhow!("Malformed connection string segment (expected Key=Value)")
                    })
            })
            .collect::<anyhow::Result<_>>()?;

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                endpoint: DEV_TABLE_ENDPOINT.to_string(),
                credentials: Credentials::SharedKey {
                    account: DEV_ACCOUNT_NAME.to_string(),
                    key: BASE64.decode(DEV_ACCOUNT_KEY)?,
                },
            });
        }

        let account = settings.get("accountname").filter(|v| !v.is_empty());

        let endpoint = match settings.get("tableendpoint").filter(|v| !v.is_empty()) {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => {
                let account = account.ok_or_else(|| {
                    anyhow::anyhow!("Connection string needs AccountName or TableEndpoint")
                })?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{}://{}.table.{}", protocol, account, suffix)
            }
        };
        Url::parse(&endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid table endpoint '{}': {}", endpoint, e))?;

        let credentials = match (
            account,
            settings.get("accountkey").filter(|v| !v.is_empty()),
            settings
                .get("sharedaccesssignature")
                .filter(|v| !v.is_empty()),
        ) {
            (Some(account), Some(key), _) => Credentials::SharedKey {
                account: account.clone(),
                key: BASE64
                    .decode(key)
                    .map_err(|_| anyhow::anyhow!("AccountKey is not valid base64"))?,
            },
            (_, _, Some(sas)) => Credentials::Sas(sas.trim_start_matches('?').to_string()),
            _ => anyhow::bail!("Connection string needs AccountKey or SharedAccessSignature"),
        };

        Ok(Self {
            endpoint,
            credentials,
        })
    }
}

/// Shared Key Lite signature for the Table service.
///
/// String to sign: `{x-ms-date}\n/{account}{path}`.
pub fn sign_shared_key_lite(
    account: &str,
    key: &[u8],
    ms_date: &str,
    path: &str,
) -> Result<String, StoreError> {
    let string_to_sign = format!("{}\n/{}{}", ms_date, account, path);
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::InvalidResponse(format!("Unusable account key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    code: String,
    message: ODataMessage,
}

#[derive(Debug, Deserialize)]
struct ODataMessage {
    value: String,
}

/// Client for the Azure Table Storage REST API, scoped to one table.
#[derive(Clone)]
pub struct AzureTableClient {
    client: reqwest::Client,
    connection: StorageConnection,
    table_name: String,
}

impl AzureTableClient {
    /// Creates a new `AzureTableClient`.
    ///
    /// # Arguments
    ///
    /// * `connection` - Parsed endpoint and credentials.
    /// * `table_name` - Table that receives the lead records.
    pub fn new(connection: StorageConnection, table_name: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create table storage client: {}", e))?;

        Ok(Self {
            client,
            connection,
            table_name: table_name.into(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the table.
    ///
    /// 409 `TableAlreadyExists` maps to [`TableStatus::AlreadyExisted`].
    pub async fn create_table(&self) -> Result<TableStatus, StoreError> {
        let body = json!({ "TableName": self.table_name });
        let response = self.post("Tables", &body).await?;
        let status = response.status();

        if status.is_success() {
            tracing::info!("Created table '{}'", self.table_name);
            return Ok(TableStatus::Created);
        }

        let error = rejection(response).await;
        let being_deleted = matches!(
            &error,
            StoreError::Rejected { code: Some(code), .. } if code == "TableBeingDeleted"
        );

        if status == StatusCode::CONFLICT && !being_deleted {
            tracing::debug!("Table '{}' already exists", self.table_name);
            Ok(TableStatus::AlreadyExisted)
        } else {
            Err(error)
        }
    }

    /// Inserts one entity. An existing key yields [`StoreError::EntityExists`].
    pub async fn insert_entity(&self, record: &LeadRecord) -> Result<(), StoreError> {
        let body = serde_json::to_value(record)
            .map_err(|e| StoreError::InvalidResponse(format!("Failed to encode entity: {}", e)))?;
        let response = self.post(&self.table_name, &body).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::CONFLICT {
            return Err(StoreError::EntityExists);
        }
        Err(rejection(response).await)
    }

    async fn post(
        &self,
        resource: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, StoreError> {
        let mut url = Url::parse(&format!("{}/{}", self.connection.endpoint, resource))
            .map_err(|e| StoreError::InvalidResponse(format!("Invalid request URL: {}", e)))?;

        let ms_date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let request_id = Uuid::new_v4();

        let authorization = match &self.connection.credentials {
            Credentials::SharedKey { account, key } => {
                let signature = sign_shared_key_lite(account, key, &ms_date, url.path())?;
                Some(format!("SharedKeyLite {}:{}", account, signature))
            }
            Credentials::Sas(sas) => {
                url.set_query(Some(sas));
                None
            }
        };

        tracing::debug!(
            request_id = %request_id,
            "POST {}{}",
            url.path(),
            if authorization.is_some() { "" } else { " (sas)" }
        );

        let mut request = self
            .client
            .post(url)
            .header("x-ms-date", &ms_date)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-client-request-id", request_id.to_string())
            .header("DataServiceVersion", "3.0")
            .header("MaxDataServiceVersion", "3.0;NetFx")
            .header(header::ACCEPT, ACCEPT_NO_METADATA)
            .header("Prefer", "return-no-content")
            .json(body);

        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        request.send().await.map_err(StoreError::from)
    }
}

/// Turns a non-success response into a [`StoreError::Rejected`].
async fn rejection(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match serde_json::from_str::<ODataErrorBody>(&text) {
        Ok(body) => StoreError::Rejected {
            status,
            code: Some(body.error.code),
            message: body.error.message.value,
        },
        Err(_) => StoreError::Rejected {
            status,
            code: None,
            message: text,
        },
    }
}

#[async_trait]
impl LeadStore for AzureTableClient {
    async fn ensure_table(&self) -> Result<TableStatus, StoreError> {
        self.create_table().await
    }

    async fn insert_lead(&self, lead: &LeadRecord) -> Result<(), StoreError> {
        self.insert_entity(lead).await
    }
}
