//! Walladog Push - Headless library for device push registration.
//!
//! This crate registers a device with a messaging platform, maps the device
//! token to a notification endpoint, manages the endpoint's topic
//! subscriptions and keeps all of it across restarts. The vendor services
//! are reached through the [`MessagingRegistrar`] and
//! [`NotificationDirectory`] traits; hosts plug in their SDK clients.
//!
//! For the Kotlin/Swift surface, see the `walladog-uniffi` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use walladog_push::{JsonFileStore, PushConfig, PushManager};
//!
//! #[tokio::main]
//! async fn main() -> walladog_push::Result<()> {
//!     let config = PushConfig::from_json_file("push.json".as_ref())?;
//!     let manager = PushManager::builder(config)
//!         .registrar(registrar)
//!         .directory(directory)
//!         .store(Arc::new(JsonFileStore::in_dir("/data/walladog".as_ref())))
//!         .build()
//!         .await?;
//!
//!     // First run: registration happens in the background
//!     if let Some(initial) = manager.take_initial_registration() {
//!         let report = initial.wait().await?;
//!         println!("Registered endpoint {}", report.endpoint_arn);
//!     }
//!
//!     for mut topic in manager.topics() {
//!         if !topic.is_subscribed() {
//!             manager.subscribe_to_topic(&mut topic).await?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod services;
pub mod store;

mod builder;
mod manager;
mod notify;
mod registration;
mod topic;

// Re-export commonly used types
pub use builder::PushManagerBuilder;
pub use config::{PushConfig, RegistrationConfig, SnsConfig, StoreConfig};
pub use error::{PushError, Result};
pub use manager::PushManager;
pub use notify::{ForegroundExecutor, ForegroundTask, ForegroundThread, PushStateListener};
pub use registration::{InitialRegistration, InitialRegistrationReport};
pub use retry::{RetryConfig, RetryStats};
pub use services::{MessagingRegistrar, NotificationDirectory};
pub use store::{JsonFileStore, MemoryStore, PersistedPushState, PushStateStore, SqliteStore};
pub use topic::SnsTopic;
