use std::sync::Arc;

use tokio::io::AsyncReadExt;

use mail_ticket::backend::MemoryTracker;
use mail_ticket::config::ServiceConfig;
use mail_ticket::handler::{Collector, MailHandler};
use mail_ticket::pipeline::{Disposition, MailProcessor, RawMail};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ServiceConfig::from_env()?;
    let kind = config.mode_kind();

    eprintln!("📬 mail-ticket v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mode: {}", kind.label());
    eprintln!("   Params: {}", config.params.to_params_string());
    eprintln!("   Backend: {}", config.backend_fixture.display());
    eprintln!(
        "   Unhandled mail: {}",
        config
            .forward_address
            .as_deref()
            .map_or_else(|| "left in place".to_string(), |a| format!("forwarded to {a}"))
    );
    if config.dry_run {
        eprintln!("   Dry run: no issue will be modified");
    }

    // ── Backend + handler ───────────────────────────────────────────
    let backend = Arc::new(MemoryTracker::from_file(&config.backend_fixture).await?);

    let mut handler = MailHandler::from_backend(kind, Arc::clone(&backend));
    let collector = Collector::configuration();
    handler.initialize(config.params.clone(), &collector).await;

    for problem in collector.errors() {
        eprintln!("   Configuration error: {problem}");
    }
    if handler.mode().is_none() {
        eprintln!("Error: handler parameters are incomplete");
        std::process::exit(2);
    }

    // ── Input: file arguments, or a single message on stdin ─────────
    let mut batch = Vec::new();
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        let mut bytes = Vec::new();
        tokio::io::stdin().read_to_end(&mut bytes).await?;
        batch.push(RawMail::anonymous(bytes));
    } else {
        for path in paths {
            let bytes = tokio::fs::read(&path).await?;
            batch.push(RawMail::new(path, bytes));
        }
    }

    let processor = MailProcessor::new(Arc::new(handler), backend)
        .with_forward_address(config.forward_address.clone())
        .with_dry_run(config.dry_run);
    let results = processor.process_batch(batch).await;

    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results
        .iter()
        .any(|r| matches!(r.disposition, Disposition::Failed { .. }));
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
