//! Deferred configuration values.
//!
//! Several configuration fields (`host.root`, `host.<alias>`,
//! `volumes.<alias>`, `repository`, `user`, `create_options`,
//! `host_config`, `exposes.host_port`, literal `binds` host paths,
//! `exec_commands.command`/`user`, `shares`, `client.interfaces`) may be
//! a deferred producer instead of a literal value. The engine
//! distinguishes "evaluate once, cache" from "evaluate on every access";
//! resolution happens lazily, at first use during planning, never at
//! load time (spec §4.1).

use std::fmt;
use std::sync::{Arc, Mutex};

/// A configuration value that is either a literal, a repeatable producer,
/// or a producer that runs at most once and caches its result.
#[derive(Clone)]
pub enum Value<T> {
    /// A literal, already-resolved value.
    Constant(T),
    /// Re-evaluated on every [`Value::resolve`] call.
    Lazy(Arc<dyn Fn() -> T + Send + Sync>),
    /// Evaluated on first [`Value::resolve`] call, then cached.
    LazyOnce(Arc<OnceProducer<T>>),
}

/// Backing cell for [`Value::LazyOnce`].
pub struct OnceProducer<T> {
    producer: Mutex<Option<Box<dyn FnOnce() -> T + Send>>>,
    cached: Mutex<Option<T>>,
}

impl<T: Clone> OnceProducer<T> {
    fn new(producer: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            producer: Mutex::new(Some(Box::new(producer))),
            cached: Mutex::new(None),
        }
    }

    fn get_or_init(&self) -> T {
        let mut cached = self.cached.lock().expect("lazy value cache poisoned");
        if let Some(value) = cached.as_ref() {
            return value.clone();
        }
        let producer = self
            .producer
            .lock()
            .expect("lazy value producer poisoned")
            .take()
            .expect("lazy-once producer invoked more than once internally");
        let value = producer();
        *cached = Some(value.clone());
        value
    }
}

impl<T: Clone> Value<T> {
    /// Wrap a literal value.
    pub fn constant(value: T) -> Self {
        Self::Constant(value)
    }

    /// Wrap a producer that is re-run on every resolution.
    pub fn lazy(producer: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::Lazy(Arc::new(producer))
    }

    /// Wrap a producer that runs exactly once, caching its result.
    pub fn lazy_once(producer: impl FnOnce() -> T + Send + 'static) -> Self {
        Self::LazyOnce(Arc::new(OnceProducer::new(producer)))
    }

    /// Resolve the value, running the producer if this is the first
    /// resolution of a [`Value::LazyOnce`], or on every call for
    /// [`Value::Lazy`].
    pub fn resolve(&self) -> T {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Lazy(f) => f(),
            Self::LazyOnce(cell) => cell.get_or_init(),
        }
    }

    /// True if this value is a literal (no deferred evaluation needed).
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

impl<T> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(_) => f.write_str("Value::Constant(..)"),
            Self::Lazy(_) => f.write_str("Value::Lazy(..)"),
            Self::LazyOnce(_) => f.write_str("Value::LazyOnce(..)"),
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Self::Constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn constant_resolves_to_itself() {
        let v = Value::constant(42);
        assert_eq!(v.resolve(), 42);
        assert_eq!(v.resolve(), 42);
    }

    #[test]
    fn lazy_reevaluates_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let v = Value::lazy(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            counted.load(Ordering::SeqCst)
        });
        assert_eq!(v.resolve(), 1);
        assert_eq!(v.resolve(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lazy_once_caches_after_first_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let v = Value::lazy_once(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            "resolved".to_string()
        });
        assert_eq!(v.resolve(), "resolved");
        assert_eq!(v.resolve(), "resolved");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
