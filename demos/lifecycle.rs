//! Simulated hosting runtime driving a hosted application
//!
//! ```bash
//! cargo run --example lifecycle
//! ```

use hosted_injector::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

#[derive(Clone)]
struct Tariffs {
    vat_percent: u64,
}

struct InvoiceService {
    number: u64,
    tariffs: Arc<Tariffs>,
}

struct Billing;

impl KernelHooks for Billing {
    fn create_kernel(&self) -> std::result::Result<Container, BoxError> {
        static NEXT_INVOICE: AtomicU64 = AtomicU64::new(1000);

        let kernel = Container::new();
        kernel.singleton(Tariffs { vat_percent: 21 })?;

        let tariffs = kernel.get::<Tariffs>()?;
        kernel.transient(move || InvoiceService {
            number: NEXT_INVOICE.fetch_add(1, Ordering::SeqCst),
            tariffs: Arc::clone(&tariffs),
        })?;

        kernel.on_dispose(|| {
            println!("  [kernel] releasing tariff cache");
            Ok(())
        })?;
        Ok(kernel)
    }

    fn on_application_started(&self, kernel: &Arc<Container>) {
        println!("  [app] started with {} bindings", kernel.len());
    }

    fn on_application_stopped(&self) {
        println!("  [app] stopped");
    }

    fn begin_request(&self, event: &LifecycleEvent) {
        println!("  [app] request from {}", event.source());
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "logging")]
    hosted_injector::logging::init();

    let app = Arc::new(HostedApplication::new(Billing));

    println!("=== startup ===");
    app.dispatch(HostEvent::ApplicationStart, &LifecycleEvent::new("runtime"))?;

    println!("=== requests ===");
    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let app = Arc::clone(&app);
            thread::spawn(move || -> std::result::Result<u64, hosted_injector::HostError> {
                app.begin_request(&LifecycleEvent::new(format!("worker-{worker}")));

                let host = HostFactory::global()
                    .create_host(ServiceEndpoint::of::<InvoiceService>().with_base_address("http://localhost/billing"))?;
                host.open()?;
                let invoice = host.instance_of::<InvoiceService>()?;
                host.close();
                Ok(invoice.number * 100 + invoice.tariffs.vat_percent)
            })
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(Ok(code)) => println!("  [runtime] served invoice code {code}"),
            Ok(Err(e)) => println!("  [runtime] request failed: {e}"),
            Err(_) => println!("  [runtime] worker panicked"),
        }
    }

    println!("=== shutdown ===");
    app.dispatch(HostEvent::ApplicationEnd, &LifecycleEvent::new("runtime"))?;

    match HostFactory::global().create_host(ServiceEndpoint::of::<InvoiceService>()) {
        Err(e) => println!("  [runtime] after shutdown: {e}"),
        Ok(_) => println!("  [runtime] unexpected host after shutdown"),
    }

    Ok(())
}
