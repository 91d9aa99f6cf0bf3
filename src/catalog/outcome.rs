use crate::core::{CatalogError, Result, SideEffectError};

/// Result of an operation whose transaction committed.
///
/// The document state in `value` is durable. `side_effects` lists file store
/// calls that failed afterwards; when it is non-empty the outcome is a
/// degraded success and the failed calls can be replayed on their own.
#[derive(Debug)]
#[must_use]
pub struct Committed<T> {
    value: T,
    side_effects: Vec<SideEffectError>,
}

impl<T> Committed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            side_effects: Vec::new(),
        }
    }

    pub fn with_failures(value: T, side_effects: Vec<SideEffectError>) -> Self {
        Self {
            value,
            side_effects,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.side_effects.is_empty()
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn side_effects(&self) -> &[SideEffectError] {
        &self.side_effects
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (T, Vec<SideEffectError>) {
        (self.value, self.side_effects)
    }

    /// Collapse to a single tier: a degraded success becomes the first
    /// side-effect failure.
    pub fn into_strict(self) -> Result<T> {
        match self.side_effects.into_iter().next() {
            Some(failure) => Err(CatalogError::SideEffect(failure)),
            None => Ok(self.value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed {
            value: f(self.value),
            side_effects: self.side_effects,
        }
    }
}
