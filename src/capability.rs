use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::CapabilityError;

/// A short-lived handle through which a single prompt is answered.
pub trait TextSession: Send + Sync {
    fn prompt<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, CapabilityError>>;
}

/// The host's text-completion capability: hands out sessions.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self) -> BoxFuture<'_, Result<Box<dyn TextSession>, CapabilityError>>;

    /// Human readable name for the status line, e.g. `ollama: gemma3:latest`.
    fn describe(&self) -> String;
}

/// Whether the host exposes a text-completion capability. Resolved once at
/// startup and never re-evaluated.
#[derive(Clone)]
pub enum Capability {
    Available(Arc<dyn SessionFactory>),
    Unavailable,
}

impl Capability {
    pub fn available(factory: impl SessionFactory + 'static) -> Self {
        Capability::Available(Arc::new(factory))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn factory(&self) -> Option<Arc<dyn SessionFactory>> {
        match self {
            Capability::Available(factory) => Some(Arc::clone(factory)),
            Capability::Unavailable => None,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(factory) => {
                f.debug_tuple("Available").field(&factory.describe()).finish()
            }
            Capability::Unavailable => f.write_str("Unavailable"),
        }
    }
}
