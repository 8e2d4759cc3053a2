//! Provider traits and module registrations
//!
//! These define what can be bound in a kernel and how groups of bindings
//! are loaded while the kernel is being created.

use std::any::TypeId;

/// Marker trait for types that can be bound in the kernel.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
///
/// # Examples
///
/// ```rust
/// // Any type that is Send + Sync + 'static works automatically
/// #[derive(Clone)]
/// struct OrderService {
///     region: String,
/// }
/// ```
pub trait Injectable: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Injectable for T {}

/// Service lifetime of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Single instance shared across all resolves
    #[default]
    Singleton,

    /// Instance created on first access, then shared
    Lazy,

    /// New instance created on every resolve
    Transient,
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Lazy => "lazy",
            Lifetime::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// One entry of a kernel module.
///
/// A module is a slice of registrations loaded in order with
/// [`Container::register_all`](crate::Container::register_all), typically
/// from inside [`KernelHooks::create_kernel`](crate::KernelHooks::create_kernel).
#[derive(Clone)]
pub struct ProviderRegistration {
    /// TypeId of the bound contract
    pub type_id: TypeId,
    /// Human-readable type name
    pub type_name: &'static str,
    /// Registration function
    pub register_fn: fn(&crate::Container) -> crate::Result<()>,
}

impl ProviderRegistration {
    /// Create a new registration for type T
    #[inline]
    pub fn new<T: Injectable>(register_fn: fn(&crate::Container) -> crate::Result<()>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            register_fn,
        }
    }
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("type_id", &self.type_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Build a [`ProviderRegistration`] for a kernel module.
///
/// ```rust
/// use hosted_injector::{provider, Container};
///
/// #[derive(Clone)]
/// struct Settings { region: &'static str }
///
/// let module = [
///     provider!(Settings, Settings { region: "eu-west" }),
///     provider!(lazy String, || String::from("lazy")),
/// ];
///
/// let kernel = Container::new();
/// kernel.register_all(&module).unwrap();
/// assert_eq!(kernel.get::<Settings>().unwrap().region, "eu-west");
/// ```
#[macro_export]
macro_rules! provider {
    ($type:ty, $value:expr) => {
        $crate::ProviderRegistration::new::<$type>(|container| container.singleton::<$type>($value))
    };
    (lazy $type:ty, $factory:expr) => {
        $crate::ProviderRegistration::new::<$type>(|container| container.lazy::<$type, _>($factory))
    };
    (transient $type:ty, $factory:expr) => {
        $crate::ProviderRegistration::new::<$type>(|container| container.transient::<$type, _>($factory))
    };
}
