//! The convention trait and ordered convention sets.

use crate::event::ModelEvent;
use keystone_core::ModelResult;

/// An automatic inference pass.
///
/// `C` is the session type conventions mutate through. Conventions only see
/// events during a flush; everything they change is queued behind the
/// current event.
pub trait Convention<C: ?Sized> {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// React to an event.
    fn apply(&self, ctx: &mut C, event: &ModelEvent) -> ModelResult<()>;
}

/// Conventions in registration order.
pub struct ConventionSet<C: ?Sized> {
    conventions: Vec<Box<dyn Convention<C>>>,
}

impl<C: ?Sized> Default for ConventionSet<C> {
    fn default() -> Self {
        Self {
            conventions: Vec::new(),
        }
    }
}

impl<C: ?Sized> ConventionSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a convention; it runs after those already registered.
    pub fn add(&mut self, convention: impl Convention<C> + 'static) -> &mut Self {
        self.conventions.push(Box::new(convention));
        self
    }

    /// Apply every convention to the event, stopping at the first error.
    pub fn dispatch(&self, ctx: &mut C, event: &ModelEvent) -> ModelResult<()> {
        for convention in &self.conventions {
            tracing::trace!(
                target: "keystone::conventions",
                convention = convention.name(),
                kind = event.kind(),
                "applying convention"
            );
            convention.apply(ctx, event)?;
        }
        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.conventions.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }
}

impl<C: ?Sized> std::fmt::Debug for ConventionSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
