use std::env;

use chrono::Utc;
use integral_leads_api::models::{LeadRecord, LeadSubmission};
use integral_leads_api::storage::LeadStore;
use integral_leads_api::table_client::{AzureTableClient, StorageConnection};

/// Integration smoke test writing one lead to a real table service (Azurite or Azure).
/// Marked ignored to avoid writing to production by accident; set TEST_STORAGE_CONNECTION_STRING to run.
#[tokio::test]
#[ignore]
async fn store_lead_smoke_test() -> anyhow::Result<()> {
    let conn_str = env::var("TEST_STORAGE_CONNECTION_STRING").map_err(|_| {
        anyhow::anyhow!("Set TEST_STORAGE_CONNECTION_STRING (e.g. UseDevelopmentStorage=true)")
    })?;

    let client = AzureTableClient::new(StorageConnection::parse(&conn_str)?, "leadssmoketest")?;
    client.ensure_table().await?;
    // Second call must report the existing table as success
    client.ensure_table().await?;

    let lead = LeadSubmission {
        name: Some("Smoke Test".to_string()),
        email: Some("smoke@example.com".to_string()),
        phone: Some("555-0000".to_string()),
        ..Default::default()
    }
    .validate()
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let record = LeadRecord::new(lead, Utc::now(), &mut rand::thread_rng());

    client.insert_lead(&record).await?;
    Ok(())
}
