//! Push state change notifications.
//!
//! A manager has at most one [`PushStateListener`]. Every notification is
//! handed to a [`ForegroundExecutor`], so the listener always runs on the
//! host's designated foreground context no matter which thread changed the
//! state. Listener failures (errors and panics) are logged and dropped.

use crate::config::RegistrationConfig;
use crate::error::{PushError, Result};
use crate::manager::PushManager;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

/// Unit of work handed to the foreground executor.
pub type ForegroundTask = Box<dyn FnOnce() + Send + 'static>;

/// Informed whenever push is enabled or disabled.
pub trait PushStateListener: Send + Sync {
    fn on_push_state_change(&self, manager: &PushManager, enabled: bool) -> anyhow::Result<()>;
}

impl<F> PushStateListener for F
where
    F: Fn(&PushManager, bool) -> anyhow::Result<()> + Send + Sync,
{
    fn on_push_state_change(&self, manager: &PushManager, enabled: bool) -> anyhow::Result<()> {
        self(manager, enabled)
    }
}

/// Runs tasks on the host's foreground (UI) context.
///
/// Implementations must run tasks in submission order.
pub trait ForegroundExecutor: Send + Sync {
    fn execute(&self, task: ForegroundTask);
}

/// Default executor: one dedicated, named thread draining a queue.
///
/// The thread exits once the executor is dropped and the queue is empty.
pub struct ForegroundThread {
    sender: mpsc::Sender<ForegroundTask>,
}

impl ForegroundThread {
    /// Spawn the `push-foreground` thread.
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<ForegroundTask>();

        std::thread::Builder::new()
            .name(RegistrationConfig::FOREGROUND_THREAD_NAME.to_string())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
                debug!("Foreground thread stopping");
            })
            .map_err(|e| PushError::Io {
                message: format!("Failed to spawn foreground thread: {}", e),
                path: None,
                source: Some(e),
            })?;

        Ok(Self { sender })
    }
}

impl ForegroundExecutor for ForegroundThread {
    fn execute(&self, task: ForegroundTask) {
        if self.sender.send(task).is_err() {
            warn!("Foreground thread is gone, dropping task");
        }
    }
}

/// Delivers state changes to the listener through the executor.
pub(crate) struct StateNotifier {
    listener: RwLock<Option<Arc<dyn PushStateListener>>>,
    executor: Arc<dyn ForegroundExecutor>,
}

impl StateNotifier {
    pub(crate) fn new(
        listener: Option<Arc<dyn PushStateListener>>,
        executor: Arc<dyn ForegroundExecutor>,
    ) -> Self {
        Self {
            listener: RwLock::new(listener),
            executor,
        }
    }

    pub(crate) fn set_listener(&self, listener: Option<Arc<dyn PushStateListener>>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub(crate) fn notify(&self, manager: &PushManager, enabled: bool) {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(listener) = listener else {
            return;
        };

        let manager = manager.clone();
        self.executor.execute(Box::new(move || {
            debug!(
                "PushStateListener: state changed to {}",
                if enabled { "PUSH ENABLED" } else { "PUSH DISABLED" }
            );
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                listener.on_push_state_change(&manager, enabled)
            }));
            match outcome {
                Ok(Ok(())) => debug!("PushStateListener: onPushStateChange ok"),
                Ok(Err(e)) => error!("PushStateListener: onPushStateChange failed: {:#}", e),
                Err(payload) => error!(
                    "PushStateListener: onPushStateChange panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_foreground_thread_runs_tasks_in_order_on_named_thread() {
        let executor = ForegroundThread::spawn().unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..3 {
            let tx = tx.clone();
            executor.execute(Box::new(move || {
                let name = std::thread::current().name().map(str::to_string);
                tx.send((i, name)).unwrap();
            }));
        }

        for expected in 0..3 {
            let (i, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(i, expected);
            assert_eq!(name.as_deref(), Some("push-foreground"));
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("listener exploded");
        assert_eq!(panic_message(payload.as_ref()), "listener exploded");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
