//! Type-erased key/value store shared by the passes of a graph.
//!
//! The dictionary lives as long as the graph. Passes read and write it
//! through [`RenderData`](super::RenderData) during execution, which lets an
//! early pass publish values (e.g. [`keys::REFRESH_FLAGS`]) for later ones.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

/// Well-known dictionary keys.
pub mod keys {
    /// [`RefreshFlags`](super::RefreshFlags) raised by passes whose output
    /// invalidates accumulated history.
    pub const REFRESH_FLAGS: &str = "refresh_flags";
    /// Number of PRNG dimensions consumed so far in the frame (`u32`).
    pub const PRNG_DIMENSION: &str = "prng_dimension";
    /// Whether the G-buffer adjusts shading normals (`bool`).
    pub const GBUFFER_ADJUST_SHADING_NORMALS: &str = "gbuffer_adjust_shading_normals";
}

bitflags! {
    /// Changes that require history-dependent passes to reset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefreshFlags: u32 {
        const LIGHTING_CHANGED = 1 << 0;
        const RENDER_OPTIONS_CHANGED = 1 << 1;
    }
}

/// String-keyed map of arbitrary values.
#[derive(Default)]
pub struct Dictionary {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under `key`.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Get a value if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Get a mutable value if it exists and has type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Get a copy of the value, or `default` if missing or of another type.
    pub fn get_or<T: Any + Clone>(&self, key: &str, default: T) -> T {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate the stored keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Dictionary").field("keys", &keys).finish()
    }
}
