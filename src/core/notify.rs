//! Notification delivery boundary.
//!
//! HTTP pings and email transport live outside this crate; handlers only talk
//! to a [`Notifier`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Email produced by an email extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient, or `None` to use the transport's default.
    pub to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Outbound notification transport.
///
/// Delivery is awaited from the `before`/`after`/`on_*` hooks, so a slow
/// endpoint never blocks the runtime thread.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Issue an HTTP request to `url`.
    async fn ping(&self, url: &str, method: &str) -> AppResult<()>;

    /// Send an email.
    async fn email(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Notifier that only logs what it would deliver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn ping(&self, url: &str, method: &str) -> AppResult<()> {
        tracing::info!(url, method, "ping");
        Ok(())
    }

    async fn email(&self, message: &EmailMessage) -> AppResult<()> {
        tracing::info!(
            to = message.to.as_deref().unwrap_or("<default>"),
            subject = %message.subject,
            "email"
        );
        Ok(())
    }
}
