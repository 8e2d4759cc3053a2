//! Factories behind kernel bindings
//!
//! Each binding stores one type-erased factory. The enum form avoids a
//! vtable call on every resolve and keeps the binding's [`Lifetime`]
//! available for enumeration.

use crate::{Injectable, Lifetime};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type-erased shared instance
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor
type InitFn = Arc<dyn Fn() -> AnyArc + Send + Sync>;

/// Singleton factory - stores a single pre-created instance
pub(crate) struct SingletonFactory {
    instance: AnyArc,
}

impl SingletonFactory {
    #[inline]
    fn new<T: Injectable>(instance: T) -> Self {
        Self {
            instance: Arc::new(instance) as AnyArc,
        }
    }
}

/// Lazy singleton factory - creates the instance on first access
pub(crate) struct LazyFactory {
    init: InitFn,
    instance: OnceCell<AnyArc>,
    #[cfg_attr(not(feature = "logging"), allow(dead_code))]
    type_name: &'static str,
}

impl LazyFactory {
    #[inline]
    fn new<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            init: Arc::new(move || Arc::new(factory()) as AnyArc),
            instance: OnceCell::new(),
            type_name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    fn resolve(&self) -> AnyArc {
        Arc::clone(self.instance.get_or_init(|| {
            #[cfg(feature = "logging")]
            debug!(
                target: "hosted_injector",
                service = self.type_name,
                "Lazy singleton initializing on first access"
            );

            (self.init)()
        }))
    }
}

/// Transient factory - creates a new instance every time
pub(crate) struct TransientFactory {
    factory: InitFn,
    #[cfg_attr(not(feature = "logging"), allow(dead_code))]
    type_name: &'static str,
}

impl TransientFactory {
    #[inline]
    fn new<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(move || Arc::new(factory()) as AnyArc),
            type_name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    fn create(&self) -> AnyArc {
        #[cfg(feature = "logging")]
        trace!(
            target: "hosted_injector",
            service = self.type_name,
            "Creating new transient instance"
        );

        (self.factory)()
    }
}

/// Type-erased factory wrapper for storage
pub(crate) enum AnyFactory {
    /// Eager singleton - instance already created
    Singleton(SingletonFactory),
    /// Lazy singleton - created on first access
    Lazy(LazyFactory),
    /// Transient - new instance each time
    Transient(TransientFactory),
}

impl AnyFactory {
    #[inline]
    pub fn singleton<T: Injectable>(instance: T) -> Self {
        AnyFactory::Singleton(SingletonFactory::new(instance))
    }

    #[inline]
    pub fn lazy<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        AnyFactory::Lazy(LazyFactory::new(factory))
    }

    #[inline]
    pub fn transient<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        AnyFactory::Transient(TransientFactory::new(factory))
    }

    /// Resolve the service
    #[inline]
    pub fn resolve(&self) -> AnyArc {
        match self {
            AnyFactory::Singleton(f) => Arc::clone(&f.instance),
            AnyFactory::Lazy(f) => f.resolve(),
            AnyFactory::Transient(f) => f.create(),
        }
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        match self {
            AnyFactory::Singleton(_) => Lifetime::Singleton,
            AnyFactory::Lazy(_) => Lifetime::Lazy,
            AnyFactory::Transient(_) => Lifetime::Transient,
        }
    }
}
