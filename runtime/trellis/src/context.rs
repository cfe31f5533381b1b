//! A copy-on-write, typed key-value store threaded through middlewares and handlers.
//!
//! Writes never mutate an existing [`Context`]: [`Context::put`] returns a new handle
//! that shares every entry of the old one and adds the new value on top.
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Clone, Default)]
/// The request context.
///
/// Cloning a context is cheap: it copies a single reference-counted pointer.
pub struct Context {
    head: Option<Arc<Entry>>,
}

struct Entry {
    key: String,
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
    next: Option<Arc<Entry>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new context where `key` maps to `value`.
    ///
    /// `self` is left untouched: existing entries are shared, not copied.
    /// A later `put` for the same key shadows the earlier one.
    pub fn put<T: Send + Sync + 'static>(&self, key: &str, value: T) -> Context {
        Context {
            head: Some(Arc::new(Entry {
                key: key.to_owned(),
                value: Box::new(value),
                type_name: std::any::type_name::<T>(),
                next: self.head.clone(),
            })),
        }
    }

    /// Retrieve the most recent value stored under `key`.
    ///
    /// Returns `None` if there is no value for `key` or if the most recent value
    /// is not of type `T`.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.entry(key)?.value.downcast_ref::<T>()
    }

    /// Like [`Context::get`], but panics if the value is missing or has the wrong type.
    #[track_caller]
    pub fn must_get<T: 'static>(&self, key: &str) -> &T {
        match self.entry(key) {
            None => panic!("there is no value for `{key}` in the request context"),
            Some(entry) => match entry.value.downcast_ref::<T>() {
                Some(value) => value,
                None => panic!(
                    "the value stored for `{key}` in the request context is a `{}`, not a `{}`",
                    entry.type_name,
                    std::any::type_name::<T>()
                ),
            },
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// The keys with a value in this context, most recent first, without duplicates.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if !keys.contains(&entry.key.as_str()) {
                keys.push(&entry.key);
            }
            cursor = entry.next.as_deref();
        }
        keys
    }

    fn entry(&self, key: &str) -> Option<&Entry> {
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if entry.key == key {
                return Some(entry);
            }
            cursor = entry.next.as_deref();
        }
        None
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .finish()
    }
}

/// A capability token for a typed context entry.
///
/// Code that can name a `Key<T>` can read and write the corresponding entry without
/// repeating the key name or the value type at each call site.
pub struct Key<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Send + Sync + 'static> Key<T> {
    pub fn put(&self, ctx: &Context, value: T) -> Context {
        ctx.put(self.name, value)
    }

    pub fn get<'ctx>(&self, ctx: &'ctx Context) -> Option<&'ctx T> {
        ctx.get::<T>(self.name)
    }

    #[track_caller]
    pub fn must_get<'ctx>(&self, ctx: &'ctx Context) -> &'ctx T {
        ctx.must_get::<T>(self.name)
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> Debug for Key<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
