//! UniFFI bindings for walladog-push.
//!
//! This crate lets an Android (Kotlin) or iOS (Swift) host drive the push
//! manager. The host implements the vendor collaborators as foreign traits
//! (see [`callbacks`]) and gets back an [`FfiPushManager`] object.
//!
//! # Usage
//!
//! Generate bindings using `--library` mode:
//!
//! ```bash
//! # Build the cdylib
//! cargo build -p walladog-uniffi --release
//!
//! # Generate Kotlin bindings
//! cargo run -p walladog-uniffi --features cli --bin walladog-uniffi-bindgen -- \
//!     generate --library --language kotlin \
//!     --out-dir ./bindings/kotlin target/release/libwalladog_uniffi.so
//! ```

pub mod callbacks;

pub use callbacks::{
    FfiForegroundExecutor, FfiForegroundTask, FfiMessagingRegistrar, FfiNotificationDirectory,
    FfiPushStateListener,
};

use callbacks::{DirectoryAdapter, ExecutorAdapter, ListenerAdapter, RegistrarAdapter};
use std::path::Path;
use std::sync::Arc;
use walladog_push::{
    InitialRegistrationReport, JsonFileStore, PushConfig, PushError, PushManager,
    PushStateListener, PushStateStore, SnsTopic, SqliteStore, StoreConfig,
};

/// FFI-friendly error type.
///
/// This is a simplified version of `PushError` that can cross the FFI
/// boundary. Errors with embedded `std::io::Error` or `rusqlite::Error`
/// sources are converted to string representations.
#[derive(Debug, Clone, uniffi::Error, thiserror::Error)]
pub enum FfiError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Registration failed: {message}")]
    Registration { message: String },

    #[error("Notification directory error: {message}")]
    Directory { message: String },

    #[error("Device is not registered for push notifications")]
    NotRegistered,

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("{0}")]
    Other(String),
}

impl From<PushError> for FfiError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Config { message } => FfiError::Config { message },
            PushError::Registration { message, .. } => FfiError::Registration { message },
            PushError::Directory { operation, message } => FfiError::Directory {
                message: format!("{}: {}", operation, message),
            },
            PushError::NotRegistered => FfiError::NotRegistered,
            PushError::Database { message, .. } => FfiError::Storage { message },
            PushError::Io { message, path, .. } => FfiError::Storage {
                message: match path {
                    Some(p) => format!("{}: {}", p.display(), message),
                    None => message,
                },
            },
            PushError::Json { message, .. } => FfiError::Storage {
                message: format!("JSON error: {}", message),
            },
            err @ PushError::UnsupportedSchema { .. } => FfiError::Storage {
                message: err.to_string(),
            },
            PushError::Other(message) => FfiError::Other(message),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for FfiError {
    fn from(err: uniffi::UnexpectedUniFFICallbackError) -> Self {
        FfiError::Other(format!("Unexpected callback error: {}", err.reason))
    }
}

pub type FfiResult<T> = Result<T, FfiError>;

// UniFFI scaffolding - this generates the FFI glue code
uniffi::setup_scaffolding!();

#[uniffi::export]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// `filter` uses `RUST_LOG` syntax, e.g. `"walladog_push=debug"`. Fails if
/// the filter is invalid or a subscriber is already installed.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<(), FfiError> {
    let filter = tracing_subscriber::EnvFilter::try_new(&filter).map_err(|e| FfiError::Config {
        message: format!("Invalid log filter '{}': {}", filter, e),
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| FfiError::Config {
            message: format!("Failed to install logger: {}", e),
        })
}

// =============================================================================
// FFI Records
// =============================================================================

/// Where the registration record is kept inside the state directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiStoreBackend {
    /// `push-state.json`, replaced atomically on every save.
    Json,
    /// `push-state.sqlite`.
    Sqlite,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPushConfig {
    pub sender_id: String,
    pub platform_application_arn: String,
    pub default_topic_arn: String,
    pub topic_arns: Vec<String>,
    /// Directory the registration record is stored in.
    pub state_dir: String,
    pub store_backend: FfiStoreBackend,
}

impl From<&FfiPushConfig> for PushConfig {
    fn from(config: &FfiPushConfig) -> Self {
        PushConfig::new(config.sender_id.clone(), config.platform_application_arn.clone())
            .with_default_topic(config.default_topic_arn.clone())
            .with_topics(config.topic_arns.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiSnsTopic {
    pub topic_arn: String,
    /// Empty when not subscribed.
    pub subscription_arn: String,
    pub name: String,
}

impl From<SnsTopic> for FfiSnsTopic {
    fn from(topic: SnsTopic) -> Self {
        Self {
            name: topic.name().to_string(),
            topic_arn: topic.topic_arn().to_string(),
            subscription_arn: topic.subscription_arn().to_string(),
        }
    }
}

impl From<FfiSnsTopic> for SnsTopic {
    fn from(topic: FfiSnsTopic) -> Self {
        SnsTopic::new(topic.topic_arn, topic.subscription_arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiInitialRegistrationReport {
    pub endpoint_arn: String,
    pub subscribed_topic: Option<String>,
    pub attempts: u32,
}

impl From<InitialRegistrationReport> for FfiInitialRegistrationReport {
    fn from(report: InitialRegistrationReport) -> Self {
        Self {
            endpoint_arn: report.endpoint_arn,
            subscribed_topic: report.subscribed_topic,
            attempts: report.attempts,
        }
    }
}

fn open_store(config: &FfiPushConfig) -> Result<Arc<dyn PushStateStore>, FfiError> {
    let dir = Path::new(&config.state_dir);
    let store: Arc<dyn PushStateStore> = match config.store_backend {
        FfiStoreBackend::Json => Arc::new(JsonFileStore::in_dir(dir).with_backup(true)),
        FfiStoreBackend::Sqlite => {
            Arc::new(SqliteStore::open(dir.join(StoreConfig::SQLITE_FILE_NAME))?)
        }
    };
    Ok(store)
}

// =============================================================================
// FfiPushManager - The push manager exposed to foreign languages
// =============================================================================

#[derive(uniffi::Object)]
pub struct FfiPushManager {
    inner: PushManager,
}

impl From<PushManager> for FfiPushManager {
    fn from(inner: PushManager) -> Self {
        Self { inner }
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl FfiPushManager {
    /// Create the manager.
    ///
    /// On first run the device registration starts in the background; use
    /// [`Self::wait_initial_registration`] to observe it. Without an
    /// executor, the listener is called on a dedicated Rust thread.
    #[uniffi::constructor]
    pub async fn new(
        config: FfiPushConfig,
        registrar: Arc<dyn FfiMessagingRegistrar>,
        directory: Arc<dyn FfiNotificationDirectory>,
        listener: Option<Arc<dyn FfiPushStateListener>>,
        executor: Option<Arc<dyn FfiForegroundExecutor>>,
    ) -> Result<Arc<Self>, FfiError> {
        let mut builder = PushManager::builder(PushConfig::from(&config))
            .registrar(Arc::new(RegistrarAdapter(registrar)))
            .directory(Arc::new(DirectoryAdapter(directory)))
            .store(open_store(&config)?);
        if let Some(listener) = listener {
            builder = builder.listener(Arc::new(ListenerAdapter(listener)));
        }
        if let Some(executor) = executor {
            builder = builder.foreground_executor(Arc::new(ExecutorAdapter(executor)));
        }

        let manager = builder.build().await?;
        Ok(Arc::new(Self::from(manager)))
    }

    // ========================================
    // Registration
    // ========================================

    /// Returns the endpoint ARN.
    pub async fn register_device(&self) -> Result<String, FfiError> {
        Ok(self.inner.register_device().await?)
    }

    /// Wait for the first-run registration.
    ///
    /// Returns `None` if no first-run registration was started or it was
    /// already awaited.
    pub async fn wait_initial_registration(
        &self,
    ) -> Result<Option<FfiInitialRegistrationReport>, FfiError> {
        match self.inner.take_initial_registration() {
            Some(initial) => Ok(Some(initial.wait().await?.into())),
            None => Ok(None),
        }
    }

    // ========================================
    // Topics
    // ========================================

    pub fn set_topics(&self, topic_arns: Vec<String>) {
        self.inner.set_topics(topic_arns);
    }

    /// Returns the topic with its new subscription ARN.
    pub async fn subscribe_to_topic(&self, topic: FfiSnsTopic) -> Result<FfiSnsTopic, FfiError> {
        let mut topic = SnsTopic::from(topic);
        self.inner.subscribe_to_topic(&mut topic).await?;
        Ok(topic.into())
    }

    /// Returns the topic with its subscription ARN cleared.
    pub async fn unsubscribe_from_topic(&self, topic: FfiSnsTopic) -> Result<FfiSnsTopic, FfiError> {
        let mut topic = SnsTopic::from(topic);
        self.inner.unsubscribe_from_topic(&mut topic).await?;
        Ok(topic.into())
    }

    pub fn topics(&self) -> Vec<FfiSnsTopic> {
        self.inner.topics().into_iter().map(FfiSnsTopic::from).collect()
    }

    // ========================================
    // State
    // ========================================

    pub async fn set_push_enabled(&self, enabled: bool) -> Result<(), FfiError> {
        Ok(self.inner.set_push_enabled(enabled).await?)
    }

    pub fn is_registered(&self) -> bool {
        self.inner.is_registered()
    }

    pub fn is_push_enabled(&self) -> bool {
        self.inner.is_push_enabled()
    }

    pub fn endpoint_arn(&self) -> String {
        self.inner.endpoint_arn()
    }

    pub fn device_token(&self) -> String {
        self.inner.device_token()
    }

    pub fn platform_application_arn(&self) -> String {
        self.inner.platform_application_arn().to_string()
    }

    pub fn set_state_listener(&self, listener: Option<Arc<dyn FfiPushStateListener>>) {
        let listener =
            listener.map(|l| Arc::new(ListenerAdapter(l)) as Arc<dyn PushStateListener>);
        self.inner.set_state_listener(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_ffi_error_conversion() {
        let err = PushError::Directory {
            operation: "subscribe",
            message: "throttled".to_string(),
        };
        let ffi_err: FfiError = err.into();
        assert!(matches!(ffi_err, FfiError::Directory { .. }));
        if let FfiError::Directory { message } = ffi_err {
            assert!(message.contains("subscribe"));
            assert!(message.contains("throttled"));
        }

        let ffi_err: FfiError = PushError::NotRegistered.into();
        assert!(matches!(ffi_err, FfiError::NotRegistered));
    }

    #[test]
    fn test_ffi_error_storage_variants() {
        let err = PushError::UnsupportedSchema {
            found: 3,
            supported: 1,
        };
        let ffi_err: FfiError = err.into();
        assert!(matches!(ffi_err, FfiError::Storage { ref message } if message.contains('3')));

        let err = PushError::io_with_path(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/data/push-state.json",
        );
        let ffi_err: FfiError = err.into();
        assert!(
            matches!(ffi_err, FfiError::Storage { ref message } if message.contains("push-state.json"))
        );
    }

    #[test]
    fn test_ffi_topic_conversion() {
        let topic = SnsTopic::new("arn:aws:sns:us-east-1:1:walladog_alldevices", "sub-1");
        let ffi_topic = FfiSnsTopic::from(topic.clone());

        assert_eq!(ffi_topic.name, "walladog_alldevices");
        assert_eq!(ffi_topic.subscription_arn, "sub-1");
        assert_eq!(SnsTopic::from(ffi_topic), topic);
    }

    // Foreign implementations as the host would provide them.

    struct HostRegistrar;

    impl FfiMessagingRegistrar for HostRegistrar {
        fn register(&self, _sender_id: String) -> FfiResult<String> {
            Ok("T1".to_string())
        }
    }

    struct HostDirectory;

    impl FfiNotificationDirectory for HostDirectory {
        fn create_endpoint(&self, _app: String, token: String) -> FfiResult<String> {
            Ok(format!("endpoint-for-{}", token))
        }

        fn subscribe(&self, endpoint_arn: String, topic_arn: String) -> FfiResult<String> {
            Ok(format!("{}|{}", topic_arn, endpoint_arn))
        }

        fn unsubscribe(&self, _subscription_arn: String) -> FfiResult<()> {
            Ok(())
        }

        fn set_endpoint_attribute(&self, _: String, _: String, _: String) -> FfiResult<()> {
            Ok(())
        }
    }

    struct HostListener(Mutex<mpsc::Sender<(bool, bool)>>);

    impl FfiPushStateListener for HostListener {
        fn on_push_state_change(
            &self,
            manager: Arc<FfiPushManager>,
            enabled: bool,
        ) -> FfiResult<()> {
            let registered = manager.is_registered();
            self.0.lock().unwrap().send((enabled, registered)).ok();
            Ok(())
        }
    }

    /// Runs tasks inline, the way a test host without a main looper would.
    struct InlineExecutor;

    impl FfiForegroundExecutor for InlineExecutor {
        fn execute(&self, task: Arc<FfiForegroundTask>) {
            task.run();
        }
    }

    fn test_config(dir: &TempDir, store_backend: FfiStoreBackend) -> FfiPushConfig {
        FfiPushConfig {
            sender_id: "1234".to_string(),
            platform_application_arn: "arn:app:P1".to_string(),
            default_topic_arn: "arn:topic:walladog_alldevices".to_string(),
            topic_arns: vec!["arn:topic:walladog_promo".to_string()],
            state_dir: dir.path().to_string_lossy().into_owned(),
            store_backend,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manager_through_foreign_callbacks() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();

        let manager = FfiPushManager::new(
            test_config(&temp_dir, FfiStoreBackend::Sqlite),
            Arc::new(HostRegistrar),
            Arc::new(HostDirectory),
            Some(Arc::new(HostListener(Mutex::new(tx)))),
            Some(Arc::new(InlineExecutor)),
        )
        .await
        .unwrap();

        let report = manager.wait_initial_registration().await.unwrap().unwrap();
        assert_eq!(report.endpoint_arn, "endpoint-for-T1");
        assert_eq!(
            report.subscribed_topic.as_deref(),
            Some("arn:topic:walladog_alldevices")
        );
        assert!(manager.wait_initial_registration().await.unwrap().is_none());

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), (true, true));

        let topics = manager.topics();
        assert_eq!(topics.len(), 2);
        assert!(!topics[0].subscription_arn.is_empty());

        let promo = manager.subscribe_to_topic(topics[1].clone()).await.unwrap();
        assert_eq!(promo.subscription_arn, "arn:topic:walladog_promo|endpoint-for-T1");

        let promo = manager.unsubscribe_from_topic(promo).await.unwrap();
        assert!(promo.subscription_arn.is_empty());

        manager.set_push_enabled(false).await.unwrap();
        assert!(!manager.is_push_enabled());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), (false, true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_json_store_restores_registration() {
        let temp_dir = TempDir::new().unwrap();

        let first = FfiPushManager::new(
            test_config(&temp_dir, FfiStoreBackend::Json),
            Arc::new(HostRegistrar),
            Arc::new(HostDirectory),
            None,
            None,
        )
        .await
        .unwrap();
        first.wait_initial_registration().await.unwrap();

        let second = FfiPushManager::new(
            test_config(&temp_dir, FfiStoreBackend::Json),
            Arc::new(HostRegistrar),
            Arc::new(HostDirectory),
            None,
            None,
        )
        .await
        .unwrap();

        assert!(second.wait_initial_registration().await.unwrap().is_none());
        assert!(second.is_registered());
        assert_eq!(second.endpoint_arn(), first.endpoint_arn());
        assert_eq!(second.device_token(), "T1");
    }

    #[tokio::test]
    async fn test_missing_sender_id() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir, FfiStoreBackend::Json);
        config.sender_id.clear();

        let result = FfiPushManager::new(
            config,
            Arc::new(HostRegistrar),
            Arc::new(HostDirectory),
            None,
            None,
        )
        .await;
        assert!(matches!(result, Err(FfiError::Config { .. })));
    }

    #[test]
    fn test_invalid_log_filter() {
        let result = init_logging("walladog_push=notalevel=x".to_string());
        assert!(matches!(result, Err(FfiError::Config { .. })));
    }
}
