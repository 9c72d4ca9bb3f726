//! Dynamic content composition.
//!
//! The visible children of a container are computed on every read from
//! its persisted children plus the output of registered providers:
//!
//! ```text
//!               persisted P                injectors (in order)
//!                    │                            │
//!   ┌────────────────▼────────────────────────────▼───────────────┐
//!   │ 1. Injection: names ∉ P are inserted into P permanently      │
//!   │               (first injector to propose a name wins)        │
//!   └────────────────┬────────────────────────────────────────────┘
//!                    │ P' (persisted, after injection)
//!   ┌────────────────▼────────────────────────────────────────────┐
//!   │ 2. Extension:  copy of P', overlaid with every extender's    │
//!   │                output, marked transient, extension wins      │
//!   └────────────────┬────────────────────────────────────────────┘
//!                    ▼
//!              visible children
//! ```
//!
//! Nothing is cached: two reads without intervening mutation return the
//! same name set because injection is a no-op the second time and
//! extenders are recomputed.
//!
//! A failing provider contributes nothing to its pass. The failure is
//! logged and recorded in [`Composition::failures`]; resolution goes on.

use crate::schema::{NodeType, TypeFilter};
use crate::{ModelError, NodeRef, ProviderError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Output of a provider: name → node pairs.
pub type ProviderResult = Result<Vec<(String, NodeRef)>, ProviderError>;

/// Contributes permanent children, once per missing name.
///
/// Implemented for any `Fn(&NodeRef) -> ProviderResult`.
pub trait Injector: Send + Sync {
    /// Name used in logs and failure records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Proposes children for `container`.
    fn inject(&self, container: &NodeRef) -> ProviderResult;
}

/// Contributes transient children, recomputed on every read.
///
/// Implemented for any `Fn(&NodeRef) -> ProviderResult`.
pub trait Extender: Send + Sync {
    /// Name used in logs and failure records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Produces children for `container`.
    fn extend(&self, container: &NodeRef) -> ProviderResult;

    /// Returns `true` once the extender can never contribute again.
    /// Retired extenders are dropped at the next registration.
    fn is_retired(&self) -> bool {
        false
    }
}

impl<F> Injector for F
where
    F: Fn(&NodeRef) -> ProviderResult + Send + Sync,
{
    fn inject(&self, container: &NodeRef) -> ProviderResult {
        self(container)
    }
}

impl<F> Extender for F
where
    F: Fn(&NodeRef) -> ProviderResult + Send + Sync,
{
    fn extend(&self, container: &NodeRef) -> ProviderResult {
        self(container)
    }
}

/// Composition pass a provider failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Injection (permanent children).
    Injection,
    /// Extension (transient children).
    Extension,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Injection => f.write_str("injection"),
            Self::Extension => f.write_str("extension"),
        }
    }
}

/// A provider that failed during one composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name.
    pub provider: String,
    /// Pass it failed in.
    pub pass: Pass,
    /// Reported error.
    pub error: ProviderError,
}

/// Registered injectors and extenders.
///
/// Registration order is significant: injectors run in the order they
/// were registered and the first one to propose a name wins it;
/// extenders overlay in order, so a later extender wins a collision.
#[derive(Default)]
pub struct ProviderRegistry {
    injectors: RwLock<Vec<(TypeFilter, Arc<dyn Injector>)>>,
    extenders: RwLock<Vec<(TypeFilter, Arc<dyn Extender>)>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an injector for containers matching `filter`.
    pub fn register_injector(&self, filter: TypeFilter, provider: impl Injector + 'static) {
        tracing::debug!(provider = provider.name(), ?filter, "registered injector");
        self.injectors.write().push((filter, Arc::new(provider)));
    }

    /// Registers an extender for containers matching `filter`.
    ///
    /// Extenders reporting [`is_retired`](Extender::is_retired) are removed
    /// first.
    pub fn register_extender(&self, filter: TypeFilter, provider: impl Extender + 'static) {
        let mut extenders = self.extenders.write();
        let before = extenders.len();
        extenders.retain(|(_, p)| !p.is_retired());
        if extenders.len() != before {
            tracing::debug!(retired = before - extenders.len(), "dropped retired extenders");
        }
        tracing::debug!(provider = provider.name(), ?filter, "registered extender");
        extenders.push((filter, Arc::new(provider)));
    }

    /// Injectors applying to `kind`, in registration order.
    #[must_use]
    pub fn injectors_for(&self, kind: &NodeType) -> Vec<Arc<dyn Injector>> {
        self.injectors
            .read()
            .iter()
            .filter(|(f, _)| f.matches(kind))
            .map(|(_, p)| Arc::clone(p))
            .collect()
    }

    /// Extenders applying to `kind`, in registration order.
    #[must_use]
    pub fn extenders_for(&self, kind: &NodeType) -> Vec<Arc<dyn Extender>> {
        self.extenders
            .read()
            .iter()
            .filter(|(f, _)| f.matches(kind))
            .map(|(_, p)| Arc::clone(p))
            .collect()
    }

    /// Number of registered injectors.
    #[must_use]
    pub fn injector_count(&self) -> usize {
        self.injectors.read().len()
    }

    /// Number of registered extenders.
    #[must_use]
    pub fn extender_count(&self) -> usize {
        self.extenders.read().len()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("injectors", &self.injector_count())
            .field("extenders", &self.extender_count())
            .finish()
    }
}

/// Result of composing one container.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    /// Visible children, ordered by name.
    pub children: BTreeMap<String, NodeRef>,
    /// Providers that failed during this composition.
    pub failures: Vec<ProviderFailure>,
    /// Number of names injected permanently by this composition.
    pub injected: usize,
}

impl Composition {
    /// Visible names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }
}

/// Runs the two composition passes over a container.
#[derive(Debug, Clone)]
pub struct CompositionEngine {
    providers: Arc<ProviderRegistry>,
}

impl CompositionEngine {
    /// Creates an engine over `providers`.
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }

    /// Computes the visible children of `container`.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotAContainer`] if `container` holds no children.
    /// Provider failures are not errors.
    pub fn compose(&self, container: &NodeRef) -> Result<Composition, ModelError> {
        if !container.is_container() {
            return Err(container.not_a_container());
        }

        let kind = container.kind();
        let mut failures = Vec::new();
        let mut injected = 0;

        for provider in self.providers.injectors_for(kind) {
            let proposed = match provider.inject(container) {
                Ok(items) => items,
                Err(error) => {
                    record(&mut failures, provider.name(), Pass::Injection, error, container);
                    continue;
                }
            };
            let accepted: Vec<(String, NodeRef)> = container.with_children_mut(|children| {
                let mut accepted = Vec::new();
                for (name, node) in proposed {
                    if children.contains_key(&name) {
                        continue;
                    }
                    children.insert(name.clone(), Arc::clone(&node));
                    accepted.push((name, node));
                }
                accepted
            })?;
            for (name, node) in accepted {
                node.set_name(Some(name.clone()));
                node.set_parent(Some(container));
                tracing::debug!(
                    provider = provider.name(),
                    container = %container.id(),
                    name = %name,
                    "injected child"
                );
                injected += 1;
            }
        }

        let mut children = container.with_children(BTreeMap::clone)?;

        for provider in self.providers.extenders_for(kind) {
            match provider.extend(container) {
                Ok(items) => {
                    for (name, node) in items {
                        node.mark_transient();
                        node.set_parent(Some(container));
                        node.set_name(Some(name.clone()));
                        children.insert(name, node);
                    }
                }
                Err(error) => {
                    record(&mut failures, provider.name(), Pass::Extension, error, container);
                }
            }
        }

        Ok(Composition {
            children,
            failures,
            injected,
        })
    }
}

fn record(
    failures: &mut Vec<ProviderFailure>,
    provider: &str,
    pass: Pass,
    error: ProviderError,
    container: &NodeRef,
) {
    tracing::warn!(
        provider,
        %pass,
        container = %container.id(),
        container_type = container.type_name(),
        error = %error,
        "provider failed, skipping its contribution"
    );
    failures.push(ProviderFailure {
        provider: provider.to_string(),
        pass,
        error,
    });
}
