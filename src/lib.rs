/**
 # pgwake

A PostgreSQL-backed, delay-aware message queue for Rust applications, built
for competing consumers without a dedicated broker.

## Features

- **Durable**: messages are plain rows; a claim is an atomic
  `DELETE ... RETURNING` guarded by `FOR UPDATE SKIP LOCKED`
- **Delay-aware**: per-message delays scheduled against the server clock
- **Low-latency wake-ups**: `LISTEN`/`NOTIFY` hints with a polling fallback
  that bounds worst-case latency when a notification is missed
- **Cooperative cancellation**: listen loops stop cleanly on a
  `CancellationToken`
- **Companion KV store**: simple CRUD with TTL expiry over the same pool

Delivery is at-least-once; handlers should be idempotent.
*/

pub mod config;
pub mod error;
pub mod kv;
pub mod listen;
pub mod queue;
pub mod types;

mod constants;

pub use crate::config::{KvConfig, QueueConfig};
pub use crate::error::{HandlerError, PgwakeError, Result};
pub use crate::kv::{PgKvStore, SetOptions};
pub use crate::listen::ListenOptions;
pub use crate::queue::{EnqueueOptions, PgQueue};
pub use crate::types::QueueMessage;
