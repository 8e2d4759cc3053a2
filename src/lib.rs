//! # hosted-injector - kernel lifecycle for hosted applications
//!
//! Binds a dependency injection kernel to the start and stop events of a
//! hosted application and hands it to the factory that builds one service
//! host per endpoint.
//!
//! ## Features
//!
//! - 🔁 **One kernel per process** - created once on startup, disposed once on shutdown
//! - 🔒 **Serialized transitions** - startup and shutdown never overlap
//! - ⚡ **Lock-free reads** - readers see either no kernel or a fully built one
//! - 🏭 **Host factory** - per-endpoint hosts resolve their service through the kernel
//! - 🧩 **Hooks** - customize kernel creation, host binding and startup/shutdown side effects
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use hosted_injector::prelude::*;
//!
//! #[derive(Default)]
//! struct CheckoutService;
//!
//! struct Shop;
//!
//! impl KernelHooks for Shop {
//!     fn create_kernel(&self) -> std::result::Result<Container, BoxError> {
//!         let kernel = Container::new();
//!         kernel.transient(CheckoutService::default)?;
//!         Ok(kernel)
//!     }
//! }
//!
//! static CELL: KernelCell = KernelCell::new();
//! let factory = Arc::new(HostFactory::new());
//! let app = HostedApplication::builder(Shop).cell(&CELL).slot(factory.clone()).build();
//!
//! app.application_start(&LifecycleEvent::new("runtime")).unwrap();
//!
//! let host = factory.create_host(ServiceEndpoint::of::<CheckoutService>()).unwrap();
//! host.open().unwrap();
//! let _checkout = host.instance_of::<CheckoutService>().unwrap();
//!
//! app.application_end(&LifecycleEvent::new("runtime")).unwrap();
//! assert!(app.kernel().is_none());
//! ```
//!
//! ## Lifecycle
//!
//! The kernel handle moves `absent -> present -> absent`:
//!
//! 1. `application_start` runs `create_kernel`, publishes the kernel to the
//!    [`KernelCell`] and the [`KernelSlot`], registers the default host
//!    binding, then calls `on_application_started`.
//! 2. `application_end` withdraws the kernel, disposes it, then calls
//!    `on_application_stopped` (also when there was no kernel).
//!
//! A second startup fails with [`LifecycleError::AlreadyRunning`], a startup
//! after shutdown with [`LifecycleError::AlreadyStopped`].

mod application;
mod cell;
mod container;
mod error;
mod factory;
mod host;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod storage;

pub use application::*;
pub use cell::*;
pub use container::*;
pub use error::*;
pub use host::*;
pub use provider::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ApplicationState, BoxError, Container, DiError, HostEvent, HostFactory, HostedApplication,
        Injectable, KernelCell, KernelHooks, KernelSlot, LifecycleError, LifecycleEvent, Lifetime,
        ServiceEndpoint, ServiceHost,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        created: AtomicU32,
        disposed: AtomicU32,
        started: AtomicU32,
        stopped: AtomicU32,
    }

    struct Ledger {
        entries: u32,
    }

    struct CountingHooks {
        calls: Arc<Calls>,
        build_delay: Duration,
    }

    impl KernelHooks for CountingHooks {
        fn create_kernel(&self) -> std::result::Result<Container, BoxError> {
            self.calls.created.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.build_delay);

            let kernel = Container::new();
            kernel.singleton(Ledger { entries: 3 })?;
            let calls = Arc::clone(&self.calls);
            kernel.on_dispose(move || {
                calls.disposed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
            Ok(kernel)
        }

        fn on_application_started(&self, _kernel: &Arc<Container>) {
            self.calls.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_application_stopped(&self) {
            self.calls.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hooks(build_delay: Duration) -> (CountingHooks, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let hooks = CountingHooks {
            calls: Arc::clone(&calls),
            build_delay,
        };
        (hooks, calls)
    }

    #[test]
    fn test_end_to_end_scenario() {
        static CELL: KernelCell = KernelCell::new();
        let (hooks, calls) = hooks(Duration::ZERO);
        let factory = Arc::new(HostFactory::new());
        let app = HostedApplication::builder(hooks)
            .cell(&CELL)
            .slot(factory.clone())
            .build();
        let event = LifecycleEvent::new("e2e");

        // 1. startup
        app.application_start(&event).unwrap();
        let kernel = app.kernel().unwrap();
        assert!(Arc::ptr_eq(&kernel, &factory.kernel().unwrap()));
        assert_eq!(kernel.bindings::<HostActivatorRef>().len(), 1);
        assert_eq!(calls.started.load(Ordering::SeqCst), 1);

        let host = factory.create_host(ServiceEndpoint::of::<Ledger>()).unwrap();
        host.open().unwrap();
        assert_eq!(host.instance_of::<Ledger>().unwrap().entries, 3);
        drop(kernel);

        // 2. shutdown
        app.application_end(&event).unwrap();
        assert!(app.kernel().is_none());
        assert_eq!(calls.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(calls.stopped.load(Ordering::SeqCst), 1);

        // 3. shutdown again
        app.application_end(&event).unwrap();
        assert_eq!(calls.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(calls.stopped.load(Ordering::SeqCst), 2);
        assert_eq!(calls.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_readers_never_see_partial_kernel() {
        static CELL: KernelCell = KernelCell::new();
        const READERS: usize = 8;

        let (hooks, _calls) = hooks(Duration::from_millis(20));
        let app = Arc::new(
            HostedApplication::builder(hooks)
                .cell(&CELL)
                .slot(Arc::new(HostFactory::new()))
                .build(),
        );
        let barrier = Arc::new(Barrier::new(READERS + 1));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let app = Arc::clone(&app);
                let barrier = Arc::clone(&barrier);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    barrier.wait();
                    let mut seen: Option<Arc<Container>> = None;
                    while !done.load(Ordering::Acquire) || seen.is_none() {
                        match (app.kernel(), &seen) {
                            (Some(kernel), None) => {
                                // Fully built: its bindings are already in place
                                assert_eq!(kernel.get::<Ledger>().unwrap().entries, 3);
                                seen = Some(kernel);
                            }
                            (Some(kernel), Some(previous)) => {
                                assert!(Arc::ptr_eq(&kernel, previous));
                            }
                            (None, Some(_)) => panic!("kernel disappeared while running"),
                            (None, None) => {}
                        }
                    }
                })
            })
            .collect();

        barrier.wait();
        app.application_start(&LifecycleEvent::new("main")).unwrap();
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_startups_create_one_kernel() {
        static CELL: KernelCell = KernelCell::new();
        const CALLERS: usize = 6;

        let (hooks, calls) = hooks(Duration::from_millis(5));
        let app = Arc::new(
            HostedApplication::builder(hooks)
                .cell(&CELL)
                .slot(Arc::new(HostFactory::new()))
                .build(),
        );
        let barrier = Arc::new(Barrier::new(CALLERS));

        let results: Vec<_> = (0..CALLERS)
            .map(|_| {
                let app = Arc::clone(&app);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    app.application_start(&LifecycleEvent::new("worker")).is_ok()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(calls.created.load(Ordering::SeqCst), 1);
        assert_eq!(calls.started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_shutdowns_dispose_once() {
        static CELL: KernelCell = KernelCell::new();
        const CALLERS: usize = 6;

        let (hooks, calls) = hooks(Duration::ZERO);
        let app = Arc::new(
            HostedApplication::builder(hooks)
                .cell(&CELL)
                .slot(Arc::new(HostFactory::new()))
                .build(),
        );
        app.application_start(&LifecycleEvent::new("main")).unwrap();

        let barrier = Arc::new(Barrier::new(CALLERS));
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let app = Arc::clone(&app);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    app.application_end(&LifecycleEvent::new("worker")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(calls.stopped.load(Ordering::SeqCst), CALLERS as u32);
        assert!(app.kernel().is_none());
    }

    #[test]
    fn test_global_application() {
        let (hooks, calls) = hooks(Duration::ZERO);
        let app = HostedApplication::new(hooks);

        app.application_start(&LifecycleEvent::new("global")).unwrap();
        let kernel = app.kernel().unwrap();
        assert!(Arc::ptr_eq(&kernel, &KernelCell::global().load().unwrap()));
        assert!(Arc::ptr_eq(&kernel, &HostFactory::global().kernel().unwrap()));
        drop(kernel);

        app.application_end(&LifecycleEvent::new("global")).unwrap();
        assert!(KernelCell::global().load().is_none());
        assert!(HostFactory::global().kernel().is_none());
        assert_eq!(calls.disposed.load(Ordering::SeqCst), 1);
    }
}
