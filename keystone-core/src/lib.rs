//! Keystone core library: component registry and lifecycle orchestration.
//!
//! Public API surface:
//! - [`identity`]: [`TypeTag`] and [`Identity`]
//! - [`descriptor`]: [`Descriptor`] and the per-type [`DescriptorIndex`]
//! - [`store`]: the concurrent [`InstanceStore`]
//! - [`capability`]: [`Lifecycle`], [`Release`], [`ContextAware`], [`Managed`]
//! - [`lifecycle`]: [`LifecycleOrchestrator`] and [`StopOutcome`]
//! - [`repository`]: the [`ComponentRepository`] facade
//! - [`error`]: [`RepositoryError`], [`ShutdownError`]

pub mod capability;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod repository;
pub mod status;
pub mod store;

pub use capability::{
    Capability, CapabilityKind, CapabilityRegistrar, ContextAware, Lifecycle, Managed, Release,
};
pub use context::{HostContext, REPOSITORY_KEY};
pub use descriptor::{attributes, Attributes, Descriptor, DescriptorIndex};
pub use error::{BoxError, RepositoryError, ShutdownError};
pub use identity::{Identity, TypeTag, DEFAULT_CLASSIFIER};
pub use lifecycle::{LifecycleOrchestrator, StopOutcome};
pub use repository::ComponentRepository;
pub use status::Status;
pub use store::{InstanceHandle, InstanceStore};
