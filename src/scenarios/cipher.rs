use log::info;

use crate::config::HarnessConfig;
use crate::ingest::client::{ingest_json, IngestReport};
use crate::ingest::records::{LogBatch, ENCRYPTED_FIELD};
use crate::security::crypto::FieldEncryptor;
use crate::session::session::Session;

/// Loads the configured fixture, encrypts its `log` fields and ingests it as one batch.
pub async fn ingest_encrypted_logs(
    session: &Session,
    config: &HarnessConfig,
) -> anyhow::Result<IngestReport> {
    let encryptor = FieldEncryptor::new(&config.keyset, config.variant)?;
    let batch = LogBatch::load(&config.fixture_path)?;

    ingest_encrypted(session, &config.stream, batch, &encryptor).await
}

/// Encrypts `batch` in place and posts it; anything but 200 is an error.
pub async fn ingest_encrypted(
    session: &Session,
    stream: &str,
    mut batch: LogBatch,
    encryptor: &FieldEncryptor,
) -> anyhow::Result<IngestReport> {
    let encrypted = batch.encrypt_field(ENCRYPTED_FIELD, encryptor)?;
    info!(
        "Encrypted {} of {} records ({} variant)",
        encrypted,
        batch.len(),
        encryptor.variant()
    );

    let response = ingest_json(session, stream, &batch).await?.expect_ok()?;

    let report = IngestReport::from_response(&response);
    report.log_failures();
    info!(
        "Ingested into {}: {} successful, {} failed",
        stream,
        report.successful(),
        report.failed()
    );

    Ok(report)
}
