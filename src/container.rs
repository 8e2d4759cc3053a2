//! The dependency injection kernel
//!
//! `Container` stores bindings and resolves them on demand. It exposes
//! what the application lifecycle needs from a kernel: binding, resolution,
//! enumeration of existing bindings for a contract, and disposal.

use crate::error::BoxError;
use crate::factory::AnyFactory;
use crate::storage::ServiceStorage;
use crate::{DiError, Injectable, Lifetime, ProviderRegistration, Result};
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

type Disposer = Box<dyn FnOnce() -> std::result::Result<(), BoxError> + Send>;

/// Lock, disposal flag and disposers shared by clones of one container
#[derive(Default)]
struct KernelState {
    locked: AtomicBool,
    disposed: AtomicBool,
    disposers: Mutex<Vec<Disposer>>,
    parent: Option<Arc<KernelState>>,
}

impl KernelState {
    fn child_of(parent: &Arc<KernelState>) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            ..Self::default()
        }
    }

    /// Disposed here or in any ancestor scope
    fn is_disposed(&self) -> bool {
        std::iter::successors(Some(self), |state| state.parent.as_deref())
            .any(|state| state.disposed.load(Ordering::Acquire))
    }
}

/// A binding visible from a container, as reported by [`Container::bindings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Name of the bound contract
    pub type_name: &'static str,
    /// How instances are produced
    pub lifetime: Lifetime,
    /// Depth of the scope holding the binding (0 = root)
    pub depth: u32,
}

/// Dependency injection kernel.
///
/// Cloning a `Container` yields another handle to the same bindings.
///
/// # Examples
///
/// ```rust
/// use hosted_injector::Container;
///
/// #[derive(Clone)]
/// struct Inventory { warehouse: String }
///
/// let kernel = Container::new();
/// kernel.singleton(Inventory { warehouse: "north".into() }).unwrap();
///
/// let inventory = kernel.get::<Inventory>().unwrap();
/// assert_eq!(inventory.warehouse, "north");
/// ```
#[derive(Clone)]
pub struct Container {
    storage: Arc<ServiceStorage>,
    state: Arc<KernelState>,
    depth: u32,
}

impl Container {
    /// Create a new root container.
    #[inline]
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            depth = 0,
            "Creating new root kernel"
        );

        Self {
            storage: Arc::new(ServiceStorage::new()),
            state: Arc::new(KernelState::default()),
            depth: 0,
        }
    }

    /// Create a child scope that inherits from this container.
    ///
    /// The scope sees every parent binding and may shadow them with its own.
    /// Disposing the parent also disposes the scope.
    ///
    /// ```rust
    /// use hosted_injector::Container;
    ///
    /// #[derive(Clone)]
    /// struct AppName(&'static str);
    /// #[derive(Clone)]
    /// struct RequestId(u64);
    ///
    /// let root = Container::new();
    /// root.singleton(AppName("orders")).unwrap();
    ///
    /// let request = root.scope();
    /// request.singleton(RequestId(7)).unwrap();
    ///
    /// assert!(request.contains::<AppName>());
    /// assert!(!root.contains::<RequestId>());
    /// ```
    #[inline]
    pub fn scope(&self) -> Self {
        let child_depth = self.depth + 1;

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            parent_depth = self.depth,
            child_depth = child_depth,
            parent_services = self.storage.len(),
            "Creating child scope"
        );

        Self {
            storage: Arc::new(ServiceStorage::with_parent(Arc::clone(&self.storage))),
            state: Arc::new(KernelState::child_of(&self.state)),
            depth: child_depth,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Bind `T` to a pre-built instance shared by every resolve.
    #[inline]
    pub fn singleton<T: Injectable>(&self, instance: T) -> Result<()> {
        self.bind::<T>(AnyFactory::singleton(instance))
    }

    /// Bind `T` to a factory that runs once, on first resolve.
    #[inline]
    pub fn lazy<T: Injectable, F>(&self, factory: F) -> Result<()>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.bind::<T>(AnyFactory::lazy(factory))
    }

    /// Bind `T` to a factory that runs on every resolve.
    ///
    /// ```rust
    /// use hosted_injector::Container;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// static NEXT: AtomicU64 = AtomicU64::new(0);
    ///
    /// #[derive(Clone)]
    /// struct RequestId(u64);
    ///
    /// let kernel = Container::new();
    /// kernel.transient(|| RequestId(NEXT.fetch_add(1, Ordering::SeqCst))).unwrap();
    ///
    /// let a = kernel.get::<RequestId>().unwrap();
    /// let b = kernel.get::<RequestId>().unwrap();
    /// assert_ne!(a.0, b.0);
    /// ```
    #[inline]
    pub fn transient<T: Injectable, F>(&self, factory: F) -> Result<()>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.bind::<T>(AnyFactory::transient(factory))
    }

    /// Load a module: run each registration in order, stopping at the first failure.
    pub fn register_all(&self, registrations: &[ProviderRegistration]) -> Result<()> {
        for registration in registrations {
            #[cfg(feature = "logging")]
            trace!(
                target: "hosted_injector",
                service = registration.type_name,
                "Loading module registration"
            );

            (registration.register_fn)(self)?;
        }
        Ok(())
    }

    /// Register a disposer run when the container is disposed.
    ///
    /// Disposers run in reverse registration order.
    pub fn on_dispose<F>(&self, disposer: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), BoxError> + Send + 'static,
    {
        self.check_not_disposed()?;
        self.state
            .disposers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(disposer));
        Ok(())
    }

    fn bind<T: Injectable>(&self, factory: AnyFactory) -> Result<()> {
        self.check_writable()?;

        let type_name = std::any::type_name::<T>();

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            service = type_name,
            lifetime = %factory.lifetime(),
            depth = self.depth,
            "Binding service"
        );

        #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
        let replaced = self.storage.insert(TypeId::of::<T>(), type_name, factory);

        #[cfg(feature = "logging")]
        if replaced {
            warn!(
                target: "hosted_injector",
                service = type_name,
                depth = self.depth,
                "Replaced existing binding in the same scope"
            );
        }

        Ok(())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve `T`, walking parent scopes when it is not bound locally.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.check_not_disposed()?;

        let Some(any) = self.storage.resolve_from_chain(&TypeId::of::<T>()) else {
            #[cfg(feature = "logging")]
            debug!(
                target: "hosted_injector",
                service = std::any::type_name::<T>(),
                depth = self.depth,
                "Service not found in kernel or parent chain"
            );
            return Err(DiError::not_found::<T>());
        };

        any.downcast::<T>()
            .map_err(|_| DiError::Internal(format!("binding for {} holds another type", std::any::type_name::<T>())))
    }

    /// Resolve `T`, returning `None` on any failure.
    #[inline]
    pub fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every binding for `T` visible from this scope, nearest scope first.
    ///
    /// ```rust
    /// use hosted_injector::{Container, Lifetime};
    ///
    /// let root = Container::new();
    /// assert!(root.bindings::<String>().is_empty());
    ///
    /// root.lazy(|| String::from("root")).unwrap();
    /// let child = root.scope();
    /// child.singleton(String::from("child")).unwrap();
    ///
    /// let found = child.bindings::<String>();
    /// assert_eq!(found.len(), 2);
    /// assert_eq!(found[0].depth, 1);
    /// assert_eq!(found[1].lifetime, Lifetime::Lazy);
    /// ```
    pub fn bindings<T: Injectable>(&self) -> Vec<Binding> {
        self.storage
            .bindings_in_chain(&TypeId::of::<T>())
            .into_iter()
            .map(|(type_name, lifetime, hops)| Binding {
                type_name,
                lifetime,
                depth: self.depth.saturating_sub(hops),
            })
            .collect()
    }

    /// Check whether `T` is bound here or in a parent scope.
    #[inline]
    pub fn contains<T: Injectable>(&self) -> bool {
        self.storage.contains_in_chain(&TypeId::of::<T>())
    }

    /// Number of bindings in this scope (not including parents).
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Scope depth (0 = root).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// True when both handles point at the same kernel scope.
    #[inline]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Prevent further registrations.
    pub fn lock(&self) {
        self.state.locked.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            depth = self.depth,
            service_count = self.storage.len(),
            "Kernel locked - no further registrations allowed"
        );
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.locked.load(Ordering::Acquire)
    }

    /// True once this scope or any scope above it has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Release everything the kernel owns.
    ///
    /// Disposers run in reverse registration order, then all bindings of this
    /// scope are dropped. Every disposer runs even when an earlier one fails;
    /// the failures are reported together as [`DiError::DisposeFailed`].
    /// Disposing an already disposed kernel does nothing.
    pub fn dispose(&self) -> Result<()> {
        if self.state.disposed.swap(true, Ordering::AcqRel) {
            #[cfg(feature = "logging")]
            trace!(
                target: "hosted_injector",
                depth = self.depth,
                "Kernel already disposed"
            );
            return Ok(());
        }

        let disposers = std::mem::take(
            &mut *self
                .state
                .disposers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        #[cfg(feature = "logging")]
        debug!(
            target: "hosted_injector",
            depth = self.depth,
            disposers = disposers.len(),
            service_count = self.storage.len(),
            "Disposing kernel"
        );

        let failures: Vec<String> = disposers
            .into_iter()
            .rev()
            .filter_map(|disposer| disposer().err().map(|e| e.to_string()))
            .collect();

        self.storage.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            #[cfg(feature = "logging")]
            warn!(
                target: "hosted_injector",
                depth = self.depth,
                failed = failures.len(),
                "Kernel disposers failed"
            );
            Err(DiError::DisposeFailed { failures })
        }
    }

    #[inline]
    fn check_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(DiError::Disposed);
        }
        Ok(())
    }

    #[inline]
    fn check_writable(&self) -> Result<()> {
        self.check_not_disposed()?;
        if self.state.locked.load(Ordering::Relaxed) {
            return Err(DiError::Locked);
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .field("depth", &self.depth)
            .field("locked", &self.is_locked())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
