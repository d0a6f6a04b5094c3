#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod backend;
mod computed;
mod config;
mod error;
mod extract;
pub mod middleware;
mod store;
mod tracer;
mod value;
mod watcher;

pub use backend::{Listener, MemoryBackend, StateBackend, SubscriberId};
pub use computed::Computed;
pub use config::{LogLevel, ParseLogLevelError, Settings};
pub use error::StoreError;
pub use extract::StateView;
pub use middleware::{Middleware, StoreReader, Update, WriteFn, WriteOptions};
pub use store::{Store, StoreBuilder, Subscription};
pub use tracer::{ConsoleTracer, EventCollector, NoopTracer, WriteEvent, WriteTracer};
pub use value::State;

// Re-export the value type and its literal macro for downstream use.
pub use serde_json::{json, Value};
