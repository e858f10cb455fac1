//! Declared component capabilities and the registrar that records them.
//!
//! Instances never get probed at runtime. Whoever registers an instance wraps
//! it in [`Managed`] and declares what it can do; the registrar then applies a
//! fixed table:
//!
//! | declared            | recorded as                               |
//! |---------------------|-------------------------------------------|
//! | `Lifecycle`         | the instance itself, in the lifecycle list |
//! | `Release` only      | a `{start: no-op, stop: release}` adapter  |
//! | `ContextAware`      | the instance, in the context-aware list    |
//!
//! When both `Lifecycle` and `Release` are declared, `Lifecycle` wins.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::HostContext;
use crate::error::BoxError;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Start/stop contract driven by the repository.
pub trait Lifecycle: Send + Sync {
    fn start(&self) -> Result<(), BoxError>;

    fn stop(&self) -> Result<(), BoxError>;

    /// Name used in logs and errors.
    fn label(&self) -> String {
        type_name::<Self>().to_owned()
    }
}

/// Single-shot close/shutdown of a resource.
pub trait Release: Send + Sync {
    fn release(&self) -> Result<(), BoxError>;

    fn label(&self) -> String {
        type_name::<Self>().to_owned()
    }
}

/// Needs the [`HostContext`], which only exists after registration.
pub trait ContextAware: Send + Sync {
    fn bind_context(&self, context: &HostContext);
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One declared capability of an instance.
#[derive(Clone)]
pub enum Capability {
    Lifecycle(Arc<dyn Lifecycle>),
    Release(Arc<dyn Release>),
    ContextAware(Arc<dyn ContextAware>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Lifecycle,
    Release,
    ContextAware,
}

impl Capability {
    pub fn lifecycle<L: Lifecycle + 'static>(target: Arc<L>) -> Self {
        Capability::Lifecycle(target)
    }

    pub fn release<R: Release + 'static>(target: Arc<R>) -> Self {
        Capability::Release(target)
    }

    pub fn context_aware<C: ContextAware + 'static>(target: Arc<C>) -> Self {
        Capability::ContextAware(target)
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Lifecycle(_) => CapabilityKind::Lifecycle,
            Capability::Release(_) => CapabilityKind::Release,
            Capability::ContextAware(_) => CapabilityKind::ContextAware,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Lifecycle(l) => f.debug_tuple("Lifecycle").field(&l.label()).finish(),
            Capability::Release(r) => f.debug_tuple("Release").field(&r.label()).finish(),
            Capability::ContextAware(_) => f.write_str("ContextAware"),
        }
    }
}

/// An instance together with the capabilities it declares.
///
/// For concrete types the `with_*` helpers declare the instance's own trait
/// impls. A trait-object instance (`Arc<dyn UserMaster>`) declares through
/// [`with_capability`](Self::with_capability) using the concrete `Arc`.
pub struct Managed<T: ?Sized> {
    instance: Arc<T>,
    capabilities: Vec<Capability>,
}

impl<T: ?Sized + Send + Sync + 'static> Managed<T> {
    pub fn new(instance: Arc<T>) -> Self {
        Self {
            instance,
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub(crate) fn into_parts(self) -> (Arc<T>, Vec<Capability>) {
        (self.instance, self.capabilities)
    }
}

impl<T: Lifecycle + 'static> Managed<T> {
    pub fn with_lifecycle(self) -> Self {
        let capability = Capability::lifecycle(Arc::clone(&self.instance));
        self.with_capability(capability)
    }
}

impl<T: Release + 'static> Managed<T> {
    pub fn with_release(self) -> Self {
        let capability = Capability::release(Arc::clone(&self.instance));
        self.with_capability(capability)
    }
}

impl<T: ContextAware + 'static> Managed<T> {
    pub fn with_context(self) -> Self {
        let capability = Capability::context_aware(Arc::clone(&self.instance));
        self.with_capability(capability)
    }
}

impl<T: ?Sized + Send + Sync + 'static> From<Arc<T>> for Managed<T> {
    fn from(instance: Arc<T>) -> Self {
        Self::new(instance)
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// Drives a release-only instance as a lifecycle entry.
struct ReleaseOnStop {
    target: Arc<dyn Release>,
}

impl Lifecycle for ReleaseOnStop {
    fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.target.release()
    }

    fn label(&self) -> String {
        self.target.label()
    }
}

/// A bare stop action registered for a helper object.
pub(crate) struct StopHook<F> {
    label: String,
    hook: F,
}

impl<F> StopHook<F> {
    pub(crate) fn new(label: impl Into<String>, hook: F) -> Self {
        Self {
            label: label.into(),
            hook,
        }
    }
}

impl<F> Lifecycle for StopHook<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync,
{
    fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        (self.hook)()
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

// ---------------------------------------------------------------------------
// Registrar
// ---------------------------------------------------------------------------

/// Append-only lifecycle and context-aware sequences, in registration order.
#[derive(Default)]
pub struct CapabilityRegistrar {
    lifecycles: Mutex<Vec<Arc<dyn Lifecycle>>>,
    context_aware: Mutex<Vec<Arc<dyn ContextAware>>>,
}

impl CapabilityRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the capability table to a newly stored instance and returns
    /// what was recorded.
    pub fn record(&self, capabilities: &[Capability]) -> Vec<CapabilityKind> {
        let mut recorded = Vec::new();

        let direct = capabilities.iter().find_map(|c| match c {
            Capability::Lifecycle(l) => Some(Arc::clone(l)),
            _ => None,
        });
        let adapted = || {
            capabilities.iter().find_map(|c| match c {
                Capability::Release(r) => Some(Arc::new(ReleaseOnStop {
                    target: Arc::clone(r),
                }) as Arc<dyn Lifecycle>),
                _ => None,
            })
        };
        if let Some(lifecycle) = direct {
            self.add_lifecycle(lifecycle);
            recorded.push(CapabilityKind::Lifecycle);
        } else if let Some(lifecycle) = adapted() {
            self.add_lifecycle(lifecycle);
            recorded.push(CapabilityKind::Release);
        }

        let context_aware = capabilities.iter().find_map(|c| match c {
            Capability::ContextAware(ca) => Some(Arc::clone(ca)),
            _ => None,
        });
        if let Some(context_aware) = context_aware {
            self.add_context_aware(context_aware);
            recorded.push(CapabilityKind::ContextAware);
        }

        recorded
    }

    pub fn add_lifecycle(&self, lifecycle: Arc<dyn Lifecycle>) {
        self.lifecycles.lock().push(lifecycle);
    }

    pub fn add_context_aware(&self, context_aware: Arc<dyn ContextAware>) {
        self.context_aware.lock().push(context_aware);
    }

    /// Snapshot of the lifecycle sequence.
    pub fn lifecycles(&self) -> Vec<Arc<dyn Lifecycle>> {
        self.lifecycles.lock().clone()
    }

    /// Snapshot of the context-aware sequence.
    pub fn context_aware(&self) -> Vec<Arc<dyn ContextAware>> {
        self.context_aware.lock().clone()
    }
}

impl fmt::Debug for CapabilityRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistrar")
            .field("lifecycles", &self.lifecycles.lock().len())
            .field("context_aware", &self.context_aware.lock().len())
            .finish()
    }
}
