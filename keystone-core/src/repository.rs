//! The component repository: registration, lookup, enumeration, start, stop.
//!
//! # Usage
//!
//! A bootstrap driver creates one repository, registers everything from a
//! single thread in the order startup should happen, calls [`start`], and
//! hands out `Arc<ComponentRepository>` (or a [`HostContext`] bound to it) to
//! request-handling code. [`stop`] may then be called from any number of
//! shutdown paths.
//!
//! Every `register*` call requires status `CREATING`. Any registration
//! failure, including a late call, moves the repository to `FAILED`.
//!
//! [`start`]: ComponentRepository::start
//! [`stop`]: ComponentRepository::stop

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::capability::{
    CapabilityKind, CapabilityRegistrar, ContextAware, Lifecycle, Managed, StopHook,
};
use crate::context::{HostContext, REPOSITORY_KEY};
use crate::descriptor::{Descriptor, DescriptorIndex};
use crate::error::{BoxError, RepositoryError};
use crate::identity::{Identity, TypeTag};
use crate::lifecycle::{LifecycleOrchestrator, StopOutcome};
use crate::status::Status;
use crate::store::{InstanceHandle, InstanceStore};

// ---------------------------------------------------------------------------
// Catalog: descriptor indexes plus the lower-cased name index
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Catalog {
    by_type: IndexMap<TypeTag, DescriptorIndex>,
    by_name: HashMap<String, TypeTag>,
}

impl Catalog {
    fn insert(&mut self, descriptor: Descriptor) {
        let tag = *descriptor.type_tag();
        if !self.by_type.contains_key(&tag) {
            // First type to claim a name keeps it.
            self.by_name.entry(tag.name().to_ascii_lowercase()).or_insert(tag);
            self.by_name.entry(tag.simple_name().to_ascii_lowercase()).or_insert(tag);
        }
        self.by_type
            .entry(tag)
            .or_insert_with(|| DescriptorIndex::new(tag))
            .insert(descriptor);
    }

    fn find_type(&self, name: &str) -> Option<&DescriptorIndex> {
        let tag = self.by_name.get(&name.to_ascii_lowercase())?;
        self.by_type.get(tag)
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Registry of component instances with a one-way start/stop lifecycle.
#[derive(Default)]
pub struct ComponentRepository {
    instances: InstanceStore,
    catalog: RwLock<Catalog>,
    registrar: CapabilityRegistrar,
    orchestrator: LifecycleOrchestrator,
}

impl ComponentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // -- status -------------------------------------------------------------

    pub fn status(&self) -> Status {
        self.orchestrator.status()
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    // -- registration -------------------------------------------------------

    /// Registers a published component described by `descriptor`.
    ///
    /// The descriptor's type must be the type of the managed instance.
    pub fn register_component<T>(
        &self,
        descriptor: Descriptor,
        component: Managed<T>,
    ) -> Result<(), RepositoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let identity = descriptor.identity().clone();
        let recorded = self.guarded(&identity, || {
            if descriptor.type_tag() != &TypeTag::of::<T>() {
                return Err(RepositoryError::TypeMismatch {
                    identity: identity.clone(),
                    requested: descriptor.type_tag().name(),
                    actual: type_name::<T>(),
                });
            }
            let recorded = self.store(identity.clone(), component)?;
            self.catalog.write().insert(descriptor);
            Ok(recorded)
        })?;
        tracing::info!(component = %identity, capabilities = ?recorded, "registered component");
        Ok(())
    }

    /// Registers an instance without a published descriptor.
    pub fn register_infrastructure<T>(
        &self,
        classifier: impl Into<String>,
        component: Managed<T>,
    ) -> Result<(), RepositoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let identity = Identity::of::<T>(classifier);
        let recorded = self.guarded(&identity, || self.store(identity.clone(), component))?;
        tracing::info!(infrastructure = %identity, capabilities = ?recorded, "registered infrastructure");
        Ok(())
    }

    /// Adds a lifecycle that is not itself a stored component.
    pub fn register_lifecycle(&self, lifecycle: Arc<dyn Lifecycle>) -> Result<(), RepositoryError> {
        let label = lifecycle.label();
        self.guarded(&label, || {
            self.registrar.add_lifecycle(lifecycle);
            Ok(())
        })?;
        tracing::info!(lifecycle = %label, "registered lifecycle");
        Ok(())
    }

    /// Adds a context-aware object that is not itself a stored component.
    pub fn register_context_aware(
        &self,
        context_aware: Arc<dyn ContextAware>,
    ) -> Result<(), RepositoryError> {
        self.guarded(&"context-aware", || {
            self.registrar.add_context_aware(context_aware);
            Ok(())
        })?;
        tracing::info!("registered context-aware object");
        Ok(())
    }

    /// Adds a stop-only action for a helper object, such as a pool created
    /// inside a factory that must be shut down with the repository.
    pub fn register_stop_hook<F>(&self, label: impl Into<String>, hook: F) -> Result<(), RepositoryError>
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register_lifecycle(Arc::new(StopHook::new(label, hook)))
    }

    fn store<T>(&self, identity: Identity, component: Managed<T>) -> Result<Vec<CapabilityKind>, RepositoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let (instance, capabilities) = component.into_parts();
        self.instances.register(identity, InstanceHandle::new(instance))?;
        Ok(self.registrar.record(&capabilities))
    }

    /// Runs a registration step under the `CREATING` precondition and
    /// poisons the repository if anything fails.
    fn guarded<R>(
        &self,
        subject: &dyn fmt::Display,
        step: impl FnOnce() -> Result<R, RepositoryError>,
    ) -> Result<R, RepositoryError> {
        let result = self.orchestrator.require(Status::Creating).and_then(|()| step());
        if let Err(err) = &result {
            let previous = self.orchestrator.poison();
            tracing::error!(
                subject = %subject,
                status = %previous,
                error = %err,
                "registration failed; repository is FAILED",
            );
        }
        result
    }

    // -- lookup -------------------------------------------------------------

    /// Instance registered as `T` under `classifier`.
    pub fn lookup<T>(&self, classifier: &str) -> Result<Arc<T>, RepositoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup_identity(&Identity::of::<T>(classifier))
    }

    /// Instance under an explicit identity, downcast to `T`.
    ///
    /// Fails with [`RepositoryError::TypeMismatch`] when the identity exists
    /// but the stored instance is not an `Arc<T>`.
    pub fn lookup_identity<T>(&self, identity: &Identity) -> Result<Arc<T>, RepositoryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let handle = self.handle(identity)?;
        handle
            .downcast::<T>()
            .ok_or_else(|| RepositoryError::TypeMismatch {
                identity: identity.clone(),
                requested: type_name::<T>(),
                actual: handle.type_name(),
            })
    }

    /// Type-erased instance under `identity`.
    pub fn handle(&self, identity: &Identity) -> Result<InstanceHandle, RepositoryError> {
        self.instances
            .lookup(identity)
            .ok_or_else(|| RepositoryError::UnknownComponent {
                component: identity.to_string(),
            })
    }

    /// Copy of every stored instance, infrastructure included.
    pub fn instances(&self) -> HashMap<Identity, InstanceHandle> {
        self.instances.snapshot()
    }

    // -- enumeration --------------------------------------------------------

    /// Descriptor indexes of every published type, in first-registration order.
    pub fn enumerate_types(&self) -> Vec<DescriptorIndex> {
        self.catalog.read().by_type.values().cloned().collect()
    }

    pub fn descriptors_for(&self, type_tag: &TypeTag) -> Result<DescriptorIndex, RepositoryError> {
        self.catalog
            .read()
            .by_type
            .get(type_tag)
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownType {
                name: type_tag.name().to_owned(),
            })
    }

    /// Descriptor of the component published as `T` under `classifier`.
    pub fn descriptor<T: ?Sized + 'static>(&self, classifier: &str) -> Result<Descriptor, RepositoryError> {
        self.descriptor_of(&Identity::of::<T>(classifier))
    }

    fn descriptor_of(&self, identity: &Identity) -> Result<Descriptor, RepositoryError> {
        let index = self.descriptors_for(identity.type_tag())?;
        index
            .find(identity.classifier())
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownComponent {
                component: identity.to_string(),
            })
    }

    /// Published type by full or simple name, ignoring ASCII case.
    pub fn find_type(&self, name: &str) -> Option<DescriptorIndex> {
        self.catalog.read().find_type(name).cloned()
    }

    /// Published component by type name and classifier, both ignoring ASCII case.
    pub fn find_descriptor(&self, name: &str, classifier: &str) -> Option<Descriptor> {
        self.catalog
            .read()
            .find_type(name)
            .and_then(|index| index.find_ignore_case(classifier))
            .cloned()
    }

    /// Reverse lookup of a published component's descriptor by instance.
    ///
    /// Unregistered instances and infrastructure both fail with
    /// [`RepositoryError::UnknownComponent`]. Linear in the number of
    /// instances; meant for diagnostics.
    pub fn describe<T: ?Sized>(&self, instance: &Arc<T>) -> Result<Descriptor, RepositoryError> {
        let identity = self.instances.identify(instance).ok_or_else(|| {
            RepositoryError::UnknownComponent {
                component: format!("unregistered instance of {}", type_name::<T>()),
            }
        })?;
        self.descriptor_of(&identity)
            .map_err(|_| RepositoryError::UnknownComponent {
                component: identity.to_string(),
            })
    }

    // -- lifecycle ----------------------------------------------------------

    /// Starts every lifecycle entry in registration order.
    ///
    /// The first failure is returned as [`RepositoryError::StartupFailure`];
    /// entries already started stay running and the repository is `FAILED`.
    pub fn start(&self) -> Result<(), RepositoryError> {
        self.orchestrator.start(&self.registrar.lifecycles())
    }

    /// Stops every lifecycle entry in registration order. Never fails;
    /// per-entry errors are logged and reported in the outcome.
    pub fn stop(&self) -> StopOutcome {
        self.orchestrator.stop(&self.registrar.lifecycles())
    }

    // -- host context -------------------------------------------------------

    /// Publishes this repository in `context` and hands the context to every
    /// context-aware entry in registration order.
    pub fn bind_context(self: &Arc<Self>, context: &HostContext) {
        context.set_attribute(REPOSITORY_KEY, Arc::clone(self));
        let targets = self.registrar.context_aware();
        tracing::info!(context = context.name(), targets = targets.len(), "binding host context");
        for target in targets {
            target.bind_context(context);
        }
    }

    /// The repository previously bound to `context`.
    pub fn from_context(context: &HostContext) -> Result<Arc<Self>, RepositoryError> {
        context
            .attribute::<Self>(REPOSITORY_KEY)
            .ok_or_else(|| RepositoryError::NotBound {
                context: context.name().to_owned(),
            })
    }
}

impl fmt::Display for ComponentRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identities: Vec<String> = self
            .instances
            .snapshot()
            .keys()
            .map(ToString::to_string)
            .collect();
        identities.sort();
        write!(f, "ComponentRepository[{}]", identities.join(", "))
    }
}

impl fmt::Debug for ComponentRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRepository")
            .field("status", &self.status())
            .field("instances", &self.instances.len())
            .field("registrar", &self.registrar)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait QuoteSource: Send + Sync {
        fn quote(&self) -> f64;
    }

    struct FixedQuote(f64);

    impl QuoteSource for FixedQuote {
        fn quote(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn name_index_resolves_simple_and_full_names() {
        let repo = ComponentRepository::new();
        repo.register_component(
            Descriptor::new::<dyn QuoteSource>("bloomberg"),
            Managed::new(Arc::new(FixedQuote(1.0)) as Arc<dyn QuoteSource>),
        )
        .expect("register");

        let by_simple = repo.find_type("quotesource").expect("simple name");
        assert_eq!(by_simple.len(), 1);
        let full = TypeTag::of::<dyn QuoteSource>().name().to_uppercase();
        assert!(repo.find_type(&full).is_some());
        assert!(repo.find_type("NoSuchType").is_none());
    }

    #[test]
    fn finders_fold_ascii_case_only() {
        struct Börse;

        let repo = ComponentRepository::new();
        repo.register_component(Descriptor::new::<Börse>("Zürich"), Managed::new(Arc::new(Börse)))
            .expect("register");

        assert!(repo.find_type("BöRSE").is_some());
        assert!(repo.find_type("BÖRSE").is_none());
        assert!(repo.find_descriptor("börse", "zürich").is_some());
        assert!(repo.find_descriptor("börse", "ZÜRICH").is_none());
    }

    #[test]
    fn descriptor_type_must_match_instance_type() {
        let repo = ComponentRepository::new();
        let err = repo
            .register_component(
                Descriptor::new::<dyn QuoteSource>("x"),
                Managed::new(Arc::new(FixedQuote(1.0))),
            )
            .unwrap_err();
        assert!(matches!(err, RepositoryError::TypeMismatch { .. }));
        assert_eq!(repo.status(), Status::Failed);
        assert!(repo.instances().is_empty());
    }

    #[test]
    fn display_lists_sorted_identities() {
        let repo = ComponentRepository::new();
        repo.register_infrastructure("b", Managed::new(Arc::new(FixedQuote(1.0))))
            .expect("b");
        repo.register_infrastructure("a", Managed::new(Arc::new(FixedQuote(2.0))))
            .expect("a");
        assert_eq!(repo.to_string(), "ComponentRepository[FixedQuote/a, FixedQuote/b]");
    }

    #[test]
    fn trait_object_lookup_uses_trait_type() {
        let repo = ComponentRepository::new();
        repo.register_infrastructure("", Managed::new(Arc::new(FixedQuote(4.5)) as Arc<dyn QuoteSource>))
            .expect("register");
        let source = repo.lookup::<dyn QuoteSource>("").expect("lookup");
        assert_eq!(source.quote(), 4.5);
        assert!(matches!(
            repo.lookup::<FixedQuote>(""),
            Err(RepositoryError::UnknownComponent { .. })
        ));
    }
}
