//! Per-event metadata parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// String-keyed per-event metadata: integer, float, and string lists.
///
/// Parameters live for one event: the store clears them at end-of-event,
/// writers persist them alongside collections, readers reload them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParameters {
    ints: HashMap<String, Vec<i64>>,
    floats: HashMap<String, Vec<f64>>,
    strings: HashMap<String, Vec<String>>,
}

impl EventParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the integer list under a key.
    pub fn set_ints(&mut self, key: impl Into<String>, values: Vec<i64>) {
        self.ints.insert(key.into(), values);
    }

    /// Replaces the key with a single integer.
    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.set_ints(key, vec![value]);
    }

    /// Integer list under a key; empty if absent.
    #[must_use]
    pub fn ints(&self, key: &str) -> &[i64] {
        self.ints.get(key).map_or(&[], Vec::as_slice)
    }

    /// First integer under a key.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        self.ints(key).first().copied()
    }

    /// Replaces the float list under a key.
    pub fn set_floats(&mut self, key: impl Into<String>, values: Vec<f64>) {
        self.floats.insert(key.into(), values);
    }

    /// Replaces the key with a single float.
    pub fn set_float(&mut self, key: impl Into<String>, value: f64) {
        self.set_floats(key, vec![value]);
    }

    /// Float list under a key; empty if absent.
    #[must_use]
    pub fn floats(&self, key: &str) -> &[f64] {
        self.floats.get(key).map_or(&[], Vec::as_slice)
    }

    /// First float under a key.
    #[must_use]
    pub fn float(&self, key: &str) -> Option<f64> {
        self.floats(key).first().copied()
    }

    /// Replaces the string list under a key.
    pub fn set_strings(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.strings.insert(key.into(), values);
    }

    /// Replaces the key with a single string.
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set_strings(key, vec![value.into()]);
    }

    /// String list under a key; empty if absent.
    #[must_use]
    pub fn strings(&self, key: &str) -> &[String] {
        self.strings.get(key).map_or(&[], Vec::as_slice)
    }

    /// First string under a key.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings(key).first().map(String::as_str)
    }

    /// Drops every parameter.
    pub fn clear(&mut self) {
        self.ints.clear();
        self.floats.clear();
        self.strings.clear();
    }

    /// Returns true if no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.floats.is_empty() && self.strings.is_empty()
    }
}
