//! Core types for pgwake: the persisted queue message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A message claimed from the queue.
///
/// Records are created by enqueue, removed atomically by exactly one
/// successful claim, and never updated in place. A record is due exactly when
/// `created + delay <= now()` on the server clock.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueMessage {
    /// Server-generated unique message ID
    pub id: Uuid,
    /// The message payload, stored verbatim as JSONB
    pub message: serde_json::Value,
    /// Delay in milliseconds before the message becomes due, fixed at
    /// enqueue time
    pub delay: i64,
    /// Timestamp the row was inserted (server clock)
    pub created: DateTime<Utc>,
}

impl QueueMessage {
    /// The enqueue-time delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay.max(0) as u64)
    }
}

impl fmt::Display for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueMessage {{ id: {}, delay: {}ms, created: {}, message: {} }}",
            self.id, self.delay, self.created, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(delay: i64) -> QueueMessage {
        QueueMessage {
            id: Uuid::new_v4(),
            message: json!({"msg": "hi"}),
            delay,
            created: Utc::now(),
        }
    }

    #[test]
    fn delay_converts_to_duration() {
        assert_eq!(sample(3000).delay(), Duration::from_secs(3));
        assert_eq!(sample(0).delay(), Duration::ZERO);
    }

    #[test]
    fn negative_delay_clamps_to_zero() {
        assert_eq!(sample(-5).delay(), Duration::ZERO);
    }
}
