//! Desktop notifications via notify-rust
//!
//! The recorder keeps a single notification on screen: each new message
//! replaces the previous one, so "Recording" turns into "Saved" or an
//! error instead of piling up.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use notify_rust::{Notification, Timeout};

use crate::application::ports::{NotificationError, NotificationIcon, Notifier};

/// Application name shown on notifications
pub const APP_NAME: &str = "Sound Recorder";

/// Notifier backed by the desktop notification service
pub struct NotifyRustNotifier {
    app_name: String,
    /// Server id of the notification currently on screen
    shown: Arc<Mutex<Option<u32>>>,
}

impl NotifyRustNotifier {
    pub fn new() -> Self {
        Self::with_app_name(APP_NAME)
    }

    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            shown: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for NotifyRustNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The recording notification stays until replaced; the rest expire.
fn timeout_for(icon: NotificationIcon) -> Timeout {
    match icon {
        NotificationIcon::Recording => Timeout::Never,
        _ => Timeout::Default,
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn urgency_for(icon: NotificationIcon) -> notify_rust::Urgency {
    use notify_rust::Urgency;
    match icon {
        NotificationIcon::Error | NotificationIcon::LowStorage => Urgency::Critical,
        NotificationIcon::Recording => Urgency::Low,
        NotificationIcon::Info | NotificationIcon::Saved => Urgency::Normal,
    }
}

fn build(app_name: &str, title: &str, message: &str, icon: NotificationIcon) -> Notification {
    let mut notification = Notification::new();
    notification
        .appname(app_name)
        .summary(title)
        .body(message)
        .icon(icon.icon_name())
        .timeout(timeout_for(icon));
    #[cfg(all(unix, not(target_os = "macos")))]
    notification.urgency(urgency_for(icon));
    notification
}

#[async_trait]
impl Notifier for NotifyRustNotifier {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(unused_mut))]
        let mut notification = build(&self.app_name, title, message, icon);
        let shown = Arc::clone(&self.shown);

        // D-Bus round trip
        tokio::task::spawn_blocking(move || {
            #[cfg(all(unix, not(target_os = "macos")))]
            if let Some(id) = *shown.lock().unwrap_or_else(|e| e.into_inner()) {
                notification.id(id);
            }

            let handle = notification
                .show()
                .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

            #[cfg(all(unix, not(target_os = "macos")))]
            {
                *shown.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.id());
            }
            #[cfg(not(all(unix, not(target_os = "macos"))))]
            {
                let _ = (handle, shown);
            }

            Ok(())
        })
        .await
        .map_err(|e| NotificationError::SendFailed(format!("Task join error: {}", e)))?
    }
}
