//! Example demonstrating logging output of a full application lifecycle
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use hosted_injector::prelude::*;

#[allow(dead_code)]
#[derive(Clone)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct ReportService {
    db: Arc<Database>,
}

struct Reports;

impl KernelHooks for Reports {
    fn create_kernel(&self) -> std::result::Result<Container, BoxError> {
        let kernel = Container::new();

        // logs: "Binding service"
        kernel.singleton(Database {
            url: "postgres://localhost/reports".into(),
        })?;

        let db = kernel.get::<Database>()?;
        kernel.lazy(move || ReportService { db: Arc::clone(&db) })?;
        Ok(kernel)
    }
}

fn main() {
    hosted_injector::logging::init();

    println!("=== hosted-injector Logging Demo ===\n");

    let app = HostedApplication::new(Reports);

    // logs: "Application starting", "Application started"
    app.application_start(&LifecycleEvent::new("demo"))
        .expect("application starts");

    // logs: "Creating service host", "Service host opened", "Lazy singleton initializing"
    let host = HostFactory::global()
        .create_host(ServiceEndpoint::of::<ReportService>())
        .expect("host created");
    host.open().expect("host opens");
    let _report = host.instance_of::<ReportService>().expect("service resolves");

    // logs: "Service not found in kernel or parent chain"
    if let Some(kernel) = app.kernel() {
        assert!(kernel.try_get::<u32>().is_none());
    }

    // logs: "Application error raised by host"
    app.error(&LifecycleEvent::new("demo").with_error("simulated failure"));

    // logs: "Application stopping", "Disposing kernel", "Application stopped"
    app.application_end(&LifecycleEvent::new("demo"))
        .expect("application stops");

    println!("\n=== Demo Complete ===");
    println!("Tip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
