use std::sync::Arc;

use tokio::sync::RwLock;

use super::{ConfigSource, GatewayError, GatewaySnapshot};

/// Holds the configuration snapshot currently served.
///
/// Readers clone the `Arc` and keep using it for the whole request; a reload swaps
/// in a new snapshot without touching the old one.
pub struct ConfigStore {
    source: Box<dyn ConfigSource>,
    current: RwLock<Arc<GatewaySnapshot>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Loads the initial snapshot; an absent or invalid configuration yields an empty one.
    pub async fn open(source: impl ConfigSource + 'static) -> Self {
        let snapshot = match source.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!("no configuration loaded; serving an empty catalog");
                GatewaySnapshot::empty()
            }
            Err(err) => {
                tracing::error!(error = %err, "configuration rejected; serving an empty catalog");
                GatewaySnapshot::empty()
            }
        };
        tracing::info!(
            providers = snapshot.providers().len(),
            api_keys = snapshot.api_keys().len(),
            "configuration loaded"
        );

        Self {
            source: Box::new(source),
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub async fn snapshot(&self) -> Arc<GatewaySnapshot> {
        self.current.read().await.clone()
    }

    /// Publishes a freshly loaded snapshot.
    ///
    /// The previous snapshot stays in service when nothing could be loaded or the
    /// new configuration is invalid.
    pub async fn reload(&self) -> Result<Arc<GatewaySnapshot>, GatewayError> {
        let loaded = self.source.load().await.map_err(|err| {
            tracing::error!(error = %err, "configuration reload rejected");
            err
        })?;

        let Some(snapshot) = loaded else {
            tracing::warn!("configuration reload found nothing; keeping current snapshot");
            return Ok(self.snapshot().await);
        };

        let snapshot = Arc::new(snapshot);
        *self.current.write().await = snapshot.clone();
        tracing::info!(
            providers = snapshot.providers().len(),
            api_keys = snapshot.api_keys().len(),
            "configuration reloaded"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Hands out queued load results, one per call.
    struct Scripted(Mutex<Vec<Result<Option<GatewaySnapshot>, GatewayError>>>);

    impl Scripted {
        fn new(mut results: Vec<Result<Option<GatewaySnapshot>, GatewayError>>) -> Self {
            results.reverse();
            Self(Mutex::new(results))
        }
    }

    #[async_trait]
    impl ConfigSource for Scripted {
        async fn load(&self) -> Result<Option<GatewaySnapshot>, GatewayError> {
            self.0.lock().unwrap().pop().unwrap_or(Ok(None))
        }
    }

    fn snapshot_with_key(key: &str) -> GatewaySnapshot {
        GatewaySnapshot::from_yaml_str(&format!("providers: []\napi_keys: [{{api: {key}}}]\n"))
            .expect("config")
    }

    fn invalid() -> GatewayError {
        GatewayError::Config {
            reason: "missing field `providers`".to_string(),
        }
    }

    #[tokio::test]
    async fn invalid_initial_config_falls_back_to_empty() {
        let store = ConfigStore::open(Scripted::new(vec![Err(invalid())])).await;
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn reload_publishes_new_snapshot_without_touching_held_one() {
        let store = ConfigStore::open(Scripted::new(vec![
            Ok(Some(snapshot_with_key("a"))),
            Ok(Some(snapshot_with_key("b"))),
        ]))
        .await;

        let held = store.snapshot().await;
        let reloaded = store.reload().await.expect("reload");

        assert!(held.contains_key("a"));
        assert!(reloaded.contains_key("b"));
        assert!(store.snapshot().await.contains_key("b"));
        assert!(!store.snapshot().await.contains_key("a"));
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_snapshot() {
        let store = ConfigStore::open(Scripted::new(vec![
            Ok(Some(snapshot_with_key("a"))),
            Err(invalid()),
            Ok(None),
        ]))
        .await;

        assert!(matches!(
            store.reload().await.unwrap_err(),
            GatewayError::Config { .. }
        ));
        assert!(store.snapshot().await.contains_key("a"));

        let kept = store.reload().await.expect("empty reload");
        assert!(kept.contains_key("a"));
    }
}
