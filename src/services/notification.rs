//! Employee notification collaborator.
//!
//! Delivery is fire-and-forget from the engine's perspective: a failed
//! notification is logged and must never roll back the mutation that
//! triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CheckoutAutoCorrected,
    OtSessionAutoClosed,
    OtDailyCapExceeded,
    OtSessionReviewed,
    AttendanceReviewed,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        payload: Value,
    ) -> anyhow::Result<()>;
}

/// Sends a notification without letting delivery failures escape.
pub async fn notify_best_effort(
    service: &dyn NotificationService,
    user_id: UserId,
    kind: NotificationKind,
    payload: Value,
) {
    if let Err(err) = service.notify(user_id, kind, payload).await {
        tracing::warn!(%user_id, ?kind, error = %err, "notification delivery failed");
    }
}

/// Discards notifications; the default for hosts that wire delivery later.
pub struct NullNotifier;

#[async_trait]
impl NotificationService for NullNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        _payload: Value,
    ) -> anyhow::Result<()> {
        tracing::debug!(%user_id, ?kind, "notification dropped (null notifier)");
        Ok(())
    }
}

/// Captures notifications for assertions in tests.
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, NotificationKind, Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(UserId, NotificationKind, Value)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        payload: Value,
    ) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((user_id, kind, payload));
        Ok(())
    }
}
