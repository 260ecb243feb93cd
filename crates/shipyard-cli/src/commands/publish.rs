use super::EXIT_SUCCESS;
use shipyard_core::{CoreError, PublishConfig, Publisher, Uploaded};
use shipyard_remote::S3Backend;

pub fn run(config: &PublishConfig) -> Result<u8, CoreError> {
    tracing::debug!("publishing with {:?}", config.remote);
    let backend = S3Backend::new(config.remote.clone());

    let report = Publisher::new(&backend)
        .on_upload(|event| match event {
            Uploaded::Artifact { key, bytes } => {
                println!("artifact uploaded: {key} ({bytes} bytes)");
            }
            Uploaded::Manifest { key } => println!("manifest uploaded: {key}"),
        })
        .publish_file(&config.target, &config.artifact_path)?;

    tracing::info!(
        "published {} {} for {}/{} ({})",
        config.target.app_id,
        config.target.version,
        config.target.channel,
        config.target.platform,
        report.checksum
    );
    Ok(EXIT_SUCCESS)
}
