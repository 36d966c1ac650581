//! Listeners notified whenever a factory creates a new builder.
//!
//! # Design
//! Listeners run once per `RestClientFactory::new_builder()` call, before the
//! caller sees the builder, so anything they set acts as a default the caller
//! may overwrite. Invocation order is unspecified; listeners must not depend
//! on each other.
//!
//! Failures are isolated. A listener that returns `Err` or panics is logged
//! at `warn` and skipped, and builder creation continues with the remaining
//! listeners. Setters a failed listener applied before failing stay applied.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::builder::RestClientBuilder;
use crate::error::BuilderError;

pub trait BuilderListener: Send + Sync {
    fn on_new_builder(&self, builder: &mut RestClientBuilder) -> Result<(), BuilderError>;

    /// Name used in log messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> BuilderListener for F
where
    F: Fn(&mut RestClientBuilder) -> Result<(), BuilderError> + Send + Sync,
{
    fn on_new_builder(&self, builder: &mut RestClientBuilder) -> Result<(), BuilderError> {
        self(builder)
    }
}

/// The listeners registered with a factory.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn BuilderListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn BuilderListener>) {
        self.listeners.push(listener);
    }

    /// Move every listener of `other` to the end of this registry.
    pub fn append(&mut self, other: ListenerRegistry) {
        self.listeners.extend(other.listeners);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener once on `builder`.
    ///
    /// Returns the number of listeners that failed.
    pub fn notify(&self, builder: &mut RestClientBuilder) -> usize {
        let mut failures = 0;
        for listener in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_new_builder(builder)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    warn!(listener = listener.name(), error = %err, "builder listener failed");
                }
                Err(payload) => {
                    failures += 1;
                    warn!(
                        listener = listener.name(),
                        panic = panic_message(payload.as_ref()),
                        "builder listener panicked"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
