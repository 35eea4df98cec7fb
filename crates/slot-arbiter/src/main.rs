//! Walks the reference arbitration scenario against a headless surface.

use std::process;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use slot_arbiter::{
    Arbiter, ArbiterConfig, ArbiterWorker, HeadlessSurface, Modal, Presentable, Priority,
    SlotSnapshot, TimedAnimator,
};

/// Initialize tracing from RUST_LOG, else the ARBITER_LOG level. LOG_FORMAT=json
/// switches stderr output to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("ARBITER_LOG").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(format!("slot_arbiter={level},slot_arbiter_demo={level}"))
    });

    let json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init();
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let animated = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: slot-arbiter-demo [--animated]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --animated    Fade transitions using each entity's animation duration");
            process::exit(2);
        }
    };

    init_tracing();
    info!("slot-arbiter {}", env!("CARGO_PKG_VERSION"));

    let result = run(animated).await.and_then(|snapshot| {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    });
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<bool, String> {
    let mut animated = false;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--animated" => animated = true,
            "--help" | "-h" => return Err(String::new()),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }
    Ok(animated)
}

/// Run the scenario and return the slot as it stands once the worker stops.
async fn run(animated: bool) -> anyhow::Result<SlotSnapshot> {
    let config = ArbiterConfig::default();
    let surface = HeadlessSurface::new();
    let animator = TimedAnimator::from_config(&config);
    let arbiter = Arbiter::new(surface.clone(), animator).with_config(config);
    let (handle, join) = ArbiterWorker::spawn(arbiter);

    let a = Arc::new(Modal::new("a").with_priority(Priority::REQUIRED));
    let b = Arc::new(Modal::new("b").with_priority(Priority::LOW));
    let c = Arc::new(Modal::new("c").with_priority(Priority::HIGH));
    for modal in [&a, &b, &c] {
        info!(name = modal.name(), id = %modal.id(), priority = %modal.priority(), "Registered");
    }

    let status = handle.present(a.clone(), animated).await?;
    info!(name = "a", %status, "Presented a");
    let status = handle.present(b.clone(), animated).await?;
    info!(name = "b", %status, "Presented b");

    a.set_dismissible(true);
    let status = handle.present(c.clone(), animated).await?;
    info!(name = "c", %status, "Presented c over dismissible a");

    handle.withdraw(c.id(), animated).await?;
    info!(b = %handle.status(b.id()).await?, "Withdrew c");

    handle.withdraw(b.id(), animated).await?;

    handle.shutdown();
    let arbiter = join.await?;
    info!(showing = surface.content().is_some(), "Withdrew b");
    Ok(arbiter.snapshot())
}
