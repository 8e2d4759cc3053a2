//! Service host factory
//!
//! The [`HostFactory`] turns the published kernel into one host object per
//! service endpoint. It only keeps a weak reference to the kernel: the
//! application that created the kernel is the only party allowed to dispose it.
//!
//! The host-object contract is [`HostActivatorRef`]. When the kernel has no
//! binding for it at startup, [`register_default_host_binding`] binds
//! [`DefaultHostActivator`]; bind your own activator inside
//! [`KernelHooks::create_kernel`](crate::KernelHooks::create_kernel) to
//! supply custom hosts.

use crate::{Container, DiError, HostError, Injectable};
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Capability to publish the kernel handle to its consumers.
///
/// [`HostedApplication`](crate::HostedApplication) calls `publish` once the
/// kernel is created and `clear` before it is disposed.
pub trait KernelSlot: Send + Sync {
    /// Make `kernel` available to consumers.
    fn publish(&self, kernel: &Arc<Container>);

    /// Forget the published kernel.
    fn clear(&self);
}

/// Builds host objects for service endpoints.
pub trait HostActivator: Send + Sync {
    /// Create the host serving `endpoint`, resolving through `kernel`.
    fn activate(
        &self,
        endpoint: ServiceEndpoint,
        kernel: &Arc<Container>,
    ) -> Result<Box<dyn ServiceHost>, HostError>;

    /// Name of the activator type, for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Binding key of the host-object contract.
pub type HostActivatorRef = Arc<dyn HostActivator>;

/// Bind [`DefaultHostActivator`] unless the kernel already binds a host activator.
///
/// Returns `Ok(true)` when the default binding was added.
pub fn register_default_host_binding(kernel: &Container) -> crate::Result<bool> {
    let existing = kernel.bindings::<HostActivatorRef>();
    if !existing.is_empty() {
        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            bindings = existing.len(),
            "Host activator already bound, keeping it"
        );
        return Ok(false);
    }

    kernel.singleton::<HostActivatorRef>(Arc::new(DefaultHostActivator))?;
    Ok(true)
}

// =============================================================================
// Endpoints and hosts
// =============================================================================

type ResolveFn = fn(&Container) -> crate::Result<Arc<dyn Any + Send + Sync>>;

fn resolve_erased<S: Injectable>(kernel: &Container) -> crate::Result<Arc<dyn Any + Send + Sync>> {
    kernel
        .get::<S>()
        .map(|service| service as Arc<dyn Any + Send + Sync>)
}

/// A service declared by the hosting runtime.
///
/// ```rust
/// use hosted_injector::ServiceEndpoint;
///
/// struct Billing;
///
/// let endpoint = ServiceEndpoint::of::<Billing>()
///     .with_base_address("http://localhost:8080/billing");
/// assert!(endpoint.contract().ends_with("Billing"));
/// assert_eq!(endpoint.base_addresses().len(), 1);
/// ```
#[derive(Clone)]
pub struct ServiceEndpoint {
    contract: &'static str,
    base_addresses: Vec<String>,
    resolve: ResolveFn,
}

impl ServiceEndpoint {
    /// Endpoint serving instances of `S` resolved from the kernel.
    pub fn of<S: Injectable>() -> Self {
        Self {
            contract: std::any::type_name::<S>(),
            base_addresses: Vec::new(),
            resolve: resolve_erased::<S>,
        }
    }

    pub fn with_base_address(mut self, address: impl Into<String>) -> Self {
        self.base_addresses.push(address.into());
        self
    }

    /// Name of the served service type.
    pub fn contract(&self) -> &'static str {
        self.contract
    }

    pub fn base_addresses(&self) -> &[String] {
        &self.base_addresses
    }

    /// Resolve a fresh service instance from `kernel`.
    pub fn resolve(&self, kernel: &Container) -> crate::Result<Arc<dyn Any + Send + Sync>> {
        (self.resolve)(kernel)
    }
}

impl std::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("contract", &self.contract)
            .field("base_addresses", &self.base_addresses)
            .finish()
    }
}

/// State of a service host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostState {
    #[default]
    Created,
    Opened,
    Closed,
}

/// Host object serving one endpoint.
pub trait ServiceHost: Send + Sync {
    fn endpoint(&self) -> &ServiceEndpoint;

    fn state(&self) -> HostState;

    /// Start serving. Fails once the host has been closed.
    fn open(&self) -> Result<(), HostError>;

    /// Stop serving. Closing is final.
    fn close(&self);

    /// Produce the service instance for one incoming call.
    fn instance(&self) -> Result<Arc<dyn Any + Send + Sync>, HostError>;
}

impl dyn ServiceHost + '_ {
    /// [`instance`](ServiceHost::instance) downcast to the served type.
    pub fn instance_of<S: Injectable>(&self) -> Result<Arc<S>, HostError> {
        self.instance()?.downcast::<S>().map_err(|_| {
            HostError::Kernel(DiError::Internal(format!(
                "endpoint {} does not serve {}",
                self.endpoint().contract(),
                std::any::type_name::<S>()
            )))
        })
    }
}

/// Activator bound when the kernel supplies none; creates [`DefaultServiceHost`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHostActivator;

impl HostActivator for DefaultHostActivator {
    fn activate(
        &self,
        endpoint: ServiceEndpoint,
        kernel: &Arc<Container>,
    ) -> Result<Box<dyn ServiceHost>, HostError> {
        Ok(Box::new(DefaultServiceHost::new(endpoint, kernel)))
    }
}

/// Host resolving a fresh service instance from the kernel for every call.
pub struct DefaultServiceHost {
    endpoint: ServiceEndpoint,
    kernel: Weak<Container>,
    state: Mutex<HostState>,
}

impl DefaultServiceHost {
    pub fn new(endpoint: ServiceEndpoint, kernel: &Arc<Container>) -> Self {
        Self {
            endpoint,
            kernel: Arc::downgrade(kernel),
            state: Mutex::new(HostState::Created),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServiceHost for DefaultServiceHost {
    fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    fn state(&self) -> HostState {
        *self.lock_state()
    }

    fn open(&self) -> Result<(), HostError> {
        let mut state = self.lock_state();
        if *state == HostState::Closed {
            return Err(HostError::Closed {
                contract: self.endpoint.contract,
            });
        }
        *state = HostState::Opened;

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            contract = self.endpoint.contract,
            "Service host opened"
        );

        Ok(())
    }

    fn close(&self) {
        *self.lock_state() = HostState::Closed;

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            contract = self.endpoint.contract,
            "Service host closed"
        );
    }

    fn instance(&self) -> Result<Arc<dyn Any + Send + Sync>, HostError> {
        let contract = self.endpoint.contract;
        match self.state() {
            HostState::Created => return Err(HostError::NotOpen { contract }),
            HostState::Closed => return Err(HostError::Closed { contract }),
            HostState::Opened => {}
        }

        let kernel = self.kernel.upgrade().ok_or(HostError::KernelUnavailable)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "hosted_injector",
            contract,
            "Resolving service instance for call"
        );

        Ok(self.endpoint.resolve(&kernel)?)
    }
}

impl std::fmt::Debug for DefaultServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultServiceHost")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Host factory
// =============================================================================

static GLOBAL_FACTORY: Lazy<Arc<HostFactory>> = Lazy::new(|| Arc::new(HostFactory::new()));

/// Produces host objects for the hosting runtime from the published kernel.
///
/// ```rust
/// use hosted_injector::{register_default_host_binding, Container, HostFactory, KernelSlot, ServiceEndpoint};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Greeter;
///
/// let factory = HostFactory::new();
/// assert!(factory.create_host(ServiceEndpoint::of::<Greeter>()).is_err());
///
/// let kernel = Arc::new(Container::new());
/// kernel.transient(Greeter::default).unwrap();
/// register_default_host_binding(&kernel).unwrap();
/// factory.publish(&kernel);
///
/// let host = factory.create_host(ServiceEndpoint::of::<Greeter>()).unwrap();
/// host.open().unwrap();
/// assert!(host.instance_of::<Greeter>().is_ok());
/// ```
pub struct HostFactory {
    kernel: RwLock<Weak<Container>>,
}

impl HostFactory {
    pub fn new() -> Self {
        Self {
            kernel: RwLock::new(Weak::new()),
        }
    }

    /// The process-wide factory used by [`HostedApplication::new`](crate::HostedApplication::new).
    pub fn global() -> Arc<HostFactory> {
        Arc::clone(&GLOBAL_FACTORY)
    }

    /// The published kernel, if it is still alive.
    pub fn kernel(&self) -> Option<Arc<Container>> {
        self.kernel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Create the host object serving `endpoint`.
    ///
    /// Resolves the [`HostActivatorRef`] binding from the kernel and lets it
    /// build the host.
    pub fn create_host(&self, endpoint: ServiceEndpoint) -> Result<Box<dyn ServiceHost>, HostError> {
        let Some(kernel) = self.kernel() else {
            #[cfg(feature = "logging")]
            warn!(
                target: "hosted_injector",
                contract = endpoint.contract(),
                "Host requested while no kernel is published"
            );
            return Err(HostError::KernelUnavailable);
        };

        let activator = kernel.get::<HostActivatorRef>()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            contract = endpoint.contract(),
            addresses = endpoint.base_addresses().len(),
            activator = activator.name(),
            "Creating service host"
        );

        activator.activate(endpoint, &kernel)
    }
}

impl KernelSlot for HostFactory {
    fn publish(&self, kernel: &Arc<Container>) {
        *self.kernel.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(kernel);
    }

    fn clear(&self) {
        *self.kernel.write().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }
}

impl Default for HostFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFactory")
            .field("has_kernel", &self.kernel().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Catalog {
        id: u32,
    }

    fn kernel_with_catalog() -> Arc<Container> {
        static NEXT: AtomicU32 = AtomicU32::new(0);

        let kernel = Arc::new(Container::new());
        kernel
            .transient(|| Catalog {
                id: NEXT.fetch_add(1, Ordering::SeqCst),
            })
            .unwrap();
        kernel
    }

    #[test]
    fn test_default_binding_added_when_missing() {
        let kernel = Container::new();
        assert!(register_default_host_binding(&kernel).unwrap());
        assert_eq!(kernel.bindings::<HostActivatorRef>().len(), 1);
    }

    #[test]
    fn test_default_binding_keeps_existing() {
        struct Custom;
        impl HostActivator for Custom {
            fn activate(
                &self,
                endpoint: ServiceEndpoint,
                _kernel: &Arc<Container>,
            ) -> Result<Box<dyn ServiceHost>, HostError> {
                Err(HostError::NotOpen {
                    contract: endpoint.contract(),
                })
            }
        }

        let kernel = Arc::new(Container::new());
        kernel.singleton::<HostActivatorRef>(Arc::new(Custom)).unwrap();

        assert!(!register_default_host_binding(&kernel).unwrap());
        assert_eq!(kernel.bindings::<HostActivatorRef>().len(), 1);

        let factory = HostFactory::new();
        factory.publish(&kernel);
        let result = factory.create_host(ServiceEndpoint::of::<Catalog>());
        assert!(matches!(result, Err(HostError::NotOpen { .. })));
    }

    #[test]
    fn test_host_resolves_per_call() {
        let kernel = kernel_with_catalog();
        register_default_host_binding(&kernel).unwrap();

        let factory = HostFactory::new();
        factory.publish(&kernel);

        let host = factory.create_host(ServiceEndpoint::of::<Catalog>()).unwrap();
        assert_eq!(host.state(), HostState::Created);
        assert!(matches!(host.instance(), Err(HostError::NotOpen { .. })));

        host.open().unwrap();
        let a = host.instance_of::<Catalog>().unwrap();
        let b = host.instance_of::<Catalog>().unwrap();
        assert_ne!(a.id, b.id);

        host.close();
        assert!(matches!(host.instance(), Err(HostError::Closed { .. })));
        assert!(matches!(host.open(), Err(HostError::Closed { .. })));
    }

    #[test]
    fn test_instance_of_wrong_type() {
        let kernel = kernel_with_catalog();
        let host = DefaultServiceHost::new(ServiceEndpoint::of::<Catalog>(), &kernel);
        host.open().unwrap();

        let host: &dyn ServiceHost = &host;
        assert!(matches!(host.instance_of::<String>(), Err(HostError::Kernel(_))));
    }

    #[test]
    fn test_factory_without_activator_binding() {
        let kernel = kernel_with_catalog();
        let factory = HostFactory::new();
        factory.publish(&kernel);

        let result = factory.create_host(ServiceEndpoint::of::<Catalog>());
        assert!(matches!(
            result,
            Err(HostError::Kernel(DiError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_factory_does_not_keep_kernel_alive() {
        let kernel = kernel_with_catalog();
        let factory = HostFactory::new();
        factory.publish(&kernel);
        assert!(factory.kernel().is_some());

        drop(kernel);
        assert!(factory.kernel().is_none());
        assert!(matches!(
            factory.create_host(ServiceEndpoint::of::<Catalog>()),
            Err(HostError::KernelUnavailable)
        ));
    }

    #[test]
    fn test_clear_forgets_kernel() {
        let kernel = kernel_with_catalog();
        let factory = HostFactory::new();
        factory.publish(&kernel);
        factory.clear();
        assert!(factory.kernel().is_none());
        assert!(kernel.get::<Catalog>().is_ok());
    }

    #[test]
    fn test_host_outliving_kernel() {
        let kernel = kernel_with_catalog();
        let host = DefaultServiceHost::new(ServiceEndpoint::of::<Catalog>(), &kernel);
        host.open().unwrap();
        drop(kernel);

        assert!(matches!(host.instance(), Err(HostError::KernelUnavailable)));
    }
}
