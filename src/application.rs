//! Hosted application lifecycle
//!
//! [`HostedApplication`] owns the kernel of a hosted application. The hosting
//! runtime calls [`application_start`](HostedApplication::application_start)
//! once when the process initializes and
//! [`application_end`](HostedApplication::application_end) once when it
//! terminates; in between, every reader sees the same kernel.
//!
//! Behaviour is customized through [`KernelHooks`]: `create_kernel` is
//! required, every other hook defaults to a no-op (or, for
//! `register_host_binding`, to [`register_default_host_binding`]).
//!
//! ```rust
//! use hosted_injector::{
//!     BoxError, Container, HostFactory, HostedApplication, KernelCell, KernelHooks,
//!     LifecycleEvent, ServiceEndpoint,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! struct App;
//!
//! impl KernelHooks for App {
//!     fn create_kernel(&self) -> Result<Container, BoxError> {
//!         let kernel = Container::new();
//!         kernel.transient(Greeter::default)?;
//!         Ok(kernel)
//!     }
//! }
//!
//! static CELL: KernelCell = KernelCell::new();
//! let factory = Arc::new(HostFactory::new());
//!
//! let app = HostedApplication::builder(App)
//!     .cell(&CELL)
//!     .slot(factory.clone())
//!     .build();
//!
//! app.application_start(&LifecycleEvent::new("host")).unwrap();
//! let host = factory.create_host(ServiceEndpoint::of::<Greeter>()).unwrap();
//! host.open().unwrap();
//! assert!(host.instance_of::<Greeter>().is_ok());
//!
//! app.application_end(&LifecycleEvent::new("host")).unwrap();
//! assert!(app.kernel().is_none());
//! ```

use crate::error::BoxError;
use crate::host::{register_default_host_binding, HostFactory, KernelSlot};
use crate::{ApplicationState, Container, KernelCell, LifecycleError};
use std::borrow::Cow;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, error, info, warn};

/// Callbacks raised by the hosting runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEvent {
    /// Process initialized; creates and publishes the kernel
    ApplicationStart,
    /// A client session began
    SessionStart,
    /// A request arrived
    BeginRequest,
    /// A request is being authenticated
    AuthenticateRequest,
    /// The runtime caught an unhandled error
    Error,
    /// A client session ended
    SessionEnd,
    /// Process terminating; releases the kernel
    ApplicationEnd,
}

impl std::fmt::Display for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HostEvent::ApplicationStart => "application_start",
            HostEvent::SessionStart => "session_start",
            HostEvent::BeginRequest => "begin_request",
            HostEvent::AuthenticateRequest => "authenticate_request",
            HostEvent::Error => "error",
            HostEvent::SessionEnd => "session_end",
            HostEvent::ApplicationEnd => "application_end",
        };
        f.write_str(name)
    }
}

/// Payload passed along with a [`HostEvent`].
///
/// The lifecycle transitions ignore it; request and session hooks receive it as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleEvent {
    source: Cow<'static, str>,
    session_id: Option<String>,
    error: Option<String>,
}

impl LifecycleEvent {
    /// Event raised by `source`, without session or error details.
    pub fn new(source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Attach the id of the session the event belongs to.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a description of the error being reported.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Who raised the event
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Extension points of a [`HostedApplication`].
///
/// Only [`create_kernel`](KernelHooks::create_kernel) must be implemented.
/// The startup and shutdown hooks run inside the transition; they may read
/// [`HostedApplication::state`] and [`HostedApplication::kernel`], but must
/// not start or stop the application they belong to.
pub trait KernelHooks: Send + Sync {
    /// Build the kernel that will serve the application.
    ///
    /// Bind a [`HostActivatorRef`](crate::HostActivatorRef) here to replace
    /// the default service hosts.
    fn create_kernel(&self) -> Result<Container, BoxError>;

    /// Make the host-object contract resolvable.
    ///
    /// Runs after the kernel is published and before
    /// [`on_application_started`](KernelHooks::on_application_started).
    fn register_host_binding(&self, kernel: &Container) -> crate::Result<()> {
        register_default_host_binding(kernel).map(|_| ())
    }

    /// Runs once the kernel is present and the host binding is registered.
    fn on_application_started(&self, _kernel: &Arc<Container>) {}

    /// Runs at the end of every shutdown, after the kernel is released.
    fn on_application_stopped(&self) {}

    fn session_start(&self, _event: &LifecycleEvent) {}

    fn begin_request(&self, _event: &LifecycleEvent) {}

    fn authenticate_request(&self, _event: &LifecycleEvent) {}

    fn error(&self, _event: &LifecycleEvent) {}

    fn session_end(&self, _event: &LifecycleEvent) {}
}

/// Owner of the kernel for the lifetime of a hosted application.
///
/// Startup and shutdown serialize on the [`KernelCell`]'s transition lock.
/// Reads through [`kernel`](Self::kernel) and the request/session hooks are
/// not synchronized with them.
pub struct HostedApplication<H> {
    hooks: H,
    cell: &'static KernelCell,
    slot: Arc<dyn KernelSlot>,
}

impl<H: KernelHooks> HostedApplication<H> {
    /// Application using the global [`KernelCell`] and the global [`HostFactory`].
    pub fn new(hooks: H) -> Self {
        Self::builder(hooks).build()
    }

    pub fn builder(hooks: H) -> ApplicationBuilder<H> {
        ApplicationBuilder {
            hooks,
            cell: None,
            slot: None,
        }
    }

    /// The live kernel, or `None` before startup and after shutdown.
    #[inline]
    pub fn kernel(&self) -> Option<Arc<Container>> {
        self.cell.load()
    }

    /// Current lifecycle state. Never blocks.
    pub fn state(&self) -> ApplicationState {
        self.cell.state()
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Create, publish and prepare the kernel.
    ///
    /// Fails with [`LifecycleError::AlreadyRunning`] or
    /// [`LifecycleError::AlreadyStopped`] outside the `Idle` state. When
    /// `create_kernel` fails the kernel stays absent, nothing is published and
    /// the application remains `Idle`.
    pub fn application_start(&self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        let _transition = self.cell.lock_transition();
        match self.cell.state() {
            ApplicationState::Idle => {}
            ApplicationState::Running => return Err(LifecycleError::AlreadyRunning),
            ApplicationState::Stopped => return Err(LifecycleError::AlreadyStopped),
        }

        #[cfg(feature = "logging")]
        info!(
            target: "hosted_injector",
            source = event.source(),
            "Application starting"
        );
        #[cfg(not(feature = "logging"))]
        let _ = event;

        let kernel = match self.hooks.create_kernel() {
            Ok(kernel) => Arc::new(kernel),
            Err(e) => {
                #[cfg(feature = "logging")]
                error!(
                    target: "hosted_injector",
                    error = %e,
                    "Kernel creation failed"
                );
                return Err(LifecycleError::KernelCreation(e));
            }
        };

        self.cell.publish(Arc::clone(&kernel));
        self.slot.publish(&kernel);
        self.cell.set_state(ApplicationState::Running);

        self.hooks.register_host_binding(&kernel)?;
        self.hooks.on_application_started(&kernel);

        #[cfg(feature = "logging")]
        info!(
            target: "hosted_injector",
            services = kernel.len(),
            "Application started"
        );

        Ok(())
    }

    /// Release the kernel and run the stopped hook.
    ///
    /// The kernel is withdrawn from the cell and the slot before it is
    /// disposed. Without a kernel there is nothing to dispose, but the stopped
    /// hook still runs. A disposal failure is returned after the kernel has
    /// been withdrawn, and the stopped hook is skipped.
    pub fn application_end(&self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        let _transition = self.cell.lock_transition();
        self.cell.set_state(ApplicationState::Stopped);

        #[cfg(feature = "logging")]
        info!(
            target: "hosted_injector",
            source = event.source(),
            "Application stopping"
        );
        #[cfg(not(feature = "logging"))]
        let _ = event;

        if let Some(kernel) = self.cell.take() {
            self.slot.clear();
            if let Err(e) = kernel.dispose() {
                #[cfg(feature = "logging")]
                error!(
                    target: "hosted_injector",
                    error = %e,
                    "Kernel disposal failed"
                );
                return Err(LifecycleError::Dispose(e));
            }
        } else {
            #[cfg(feature = "logging")]
            debug!(
                target: "hosted_injector",
                "No kernel to dispose"
            );
        }

        self.hooks.on_application_stopped();

        #[cfg(feature = "logging")]
        info!(target: "hosted_injector", "Application stopped");

        Ok(())
    }

    pub fn session_start(&self, event: &LifecycleEvent) {
        self.hooks.session_start(event);
    }

    pub fn begin_request(&self, event: &LifecycleEvent) {
        self.hooks.begin_request(event);
    }

    pub fn authenticate_request(&self, event: &LifecycleEvent) {
        self.hooks.authenticate_request(event);
    }

    pub fn error(&self, event: &LifecycleEvent) {
        #[cfg(feature = "logging")]
        warn!(
            target: "hosted_injector",
            source = event.source(),
            error = event.error().unwrap_or("unknown"),
            "Application error raised by host"
        );

        self.hooks.error(event);
    }

    pub fn session_end(&self, event: &LifecycleEvent) {
        self.hooks.session_end(event);
    }

    /// Route a runtime callback to the matching method.
    pub fn dispatch(&self, kind: HostEvent, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        match kind {
            HostEvent::ApplicationStart => return self.application_start(event),
            HostEvent::ApplicationEnd => return self.application_end(event),
            HostEvent::SessionStart => self.session_start(event),
            HostEvent::BeginRequest => self.begin_request(event),
            HostEvent::AuthenticateRequest => self.authenticate_request(event),
            HostEvent::Error => self.error(event),
            HostEvent::SessionEnd => self.session_end(event),
        }
        Ok(())
    }
}

impl<H> std::fmt::Debug for HostedApplication<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedApplication")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HostedApplication`].
pub struct ApplicationBuilder<H> {
    hooks: H,
    cell: Option<&'static KernelCell>,
    slot: Option<Arc<dyn KernelSlot>>,
}

impl<H: KernelHooks> ApplicationBuilder<H> {
    /// Hold the kernel in `cell` instead of [`KernelCell::global`].
    pub fn cell(mut self, cell: &'static KernelCell) -> Self {
        self.cell = Some(cell);
        self
    }

    /// Publish the kernel to `slot` instead of [`HostFactory::global`].
    pub fn slot(mut self, slot: Arc<dyn KernelSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn build(self) -> HostedApplication<H> {
        HostedApplication {
            hooks: self.hooks,
            cell: self.cell.unwrap_or_else(KernelCell::global),
            slot: self
                .slot
                .unwrap_or_else(|| HostFactory::global() as Arc<dyn KernelSlot>),
        }
    }
}
