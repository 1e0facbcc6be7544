use std::sync::Arc;

use tracing::info;

use crate::{
    application::storage::{GatewaySettings, ObjectStore, OssGateway, PersistenceGateway},
    config::{StorageBackend, StorageSettings},
};

use super::{
    error::InfraError,
    object_store::MemoryObjectStore,
    oss::{OssClient, OssClientConfig, OssCredentials},
};

/// Build the persistence gateway for the configured backend, if any.
pub fn build_gateway(
    settings: Option<&StorageSettings>,
) -> Result<Option<Arc<dyn PersistenceGateway>>, InfraError> {
    let Some(settings) = settings else {
        info!(
            target = "infra::storage",
            op = "storage::build_gateway",
            result = "disabled",
            "No object store configured; cloud uploads are disabled"
        );
        return Ok(None);
    };

    let store: Arc<dyn ObjectStore> = match &settings.backend {
        StorageBackend::Oss(oss) => Arc::new(OssClient::new(OssClientConfig {
            endpoint: oss.endpoint.clone(),
            bucket: oss.bucket.clone(),
            credentials: OssCredentials {
                access_key_id: oss.access_key_id.clone(),
                access_key_secret: oss.access_key_secret.clone(),
            },
            secure: oss.secure,
        })?),
        StorageBackend::Memory { base_url } => Arc::new(MemoryObjectStore::new(base_url.clone())),
    };

    let backend = match &settings.backend {
        StorageBackend::Oss(_) => "oss",
        StorageBackend::Memory { .. } => "memory",
    };
    info!(
        target = "infra::storage",
        op = "storage::build_gateway",
        result = "ok",
        backend,
        default_path = %settings.default_path,
        timeout_ms = settings.timeout.as_millis() as u64,
        "Object store gateway configured"
    );

    let gateway = OssGateway::new(
        store,
        GatewaySettings {
            default_path: settings.default_path.clone(),
            timeout: settings.timeout,
            url_expiry: settings.url_expiry,
        },
    );
    Ok(Some(Arc::new(gateway)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn no_settings_means_no_gateway() {
        assert!(build_gateway(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_backend_round_trips_uploads() {
        let settings = StorageSettings {
            backend: StorageBackend::Memory {
                base_url: "memory://bucket".to_string(),
            },
            default_path: "formulas".to_string(),
            timeout: Duration::from_secs(1),
            url_expiry: Duration::from_secs(60),
        };
        let gateway = build_gateway(Some(&settings)).unwrap().expect("gateway");

        let result = gateway
            .upload(bytes::Bytes::from_static(b"png"), "x", Default::default())
            .await
            .expect("upload");
        assert!(result.key.starts_with("formulas/"));
        assert!(gateway.exists(&result.key).await.unwrap());
    }
}
