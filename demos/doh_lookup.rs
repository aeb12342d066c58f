//! Resolve hostnames through DoH with overrides.
//!
//! ```text
//! cargo run --example doh_lookup -- [settings.json] host [host...]
//! RUST_LOG=dohnet=debug cargo run --example doh_lookup -- example.com
//! ```

use dohnet::dns::{ResolutionAdapter, ResolveOptions, ResolverSettings};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let settings = match args.first() {
        Some(path) if path.ends_with(".json") => {
            let settings = ResolverSettings::from_json_file(path)?;
            args.remove(0);
            settings
        }
        _ => ResolverSettings::default(),
    };
    if args.is_empty() {
        args.push("example.com".to_string());
    }

    println!("{:#?}", settings);
    let adapter = ResolutionAdapter::from_settings(&settings)?;

    for host in &args {
        println!("\n=== {} (cold) ===", host);
        let start = Instant::now();
        match adapter.resolve(host, ResolveOptions::all()).await {
            Ok(resolution) => {
                for record in resolution.into_answer_set().iter() {
                    println!("  {} (IPv{})", record.address(), record.family().as_u8());
                }
            }
            Err(e) => println!("  error: {}", e),
        }
        println!("Time: {:?}", start.elapsed());

        println!("=== {} (warm) ===", host);
        let start = Instant::now();
        let resolution = adapter.resolve(host, ResolveOptions::single()).await;
        println!("  {:?}", resolution.map(|r| r.address()));
        println!("Time: {:?}", start.elapsed());
    }

    Ok(())
}
