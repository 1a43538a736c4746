//! CLI entry point for payconnect.

mod cli;

use clap::Parser;
use payconnect::cancel::Cancellable;
use payconnect::config::load_config;
use payconnect::connector::ConnectorBuilder;
use payconnect::failure::Failure;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    // Load config.
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let connector = match args
        .apply_overrides(&mut config)
        .and_then(|()| ConnectorBuilder::from_config(&config))
        .and_then(|b| b.build())
    {
        Ok(connector) => connector,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let (sender, mut receiver) = oneshot::channel();
    let handle = connector.start(args.request(), move |outcome| {
        let _ = sender.send(outcome);
    });

    let finished = tokio::select! {
        outcome = &mut receiver => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            handle.cancel();
            receiver.await
        }
    };

    match outcome {
        Ok(Ok(response)) => {
            let text = serde_json::to_string_pretty(&response.value)
                .unwrap_or_else(|_| response.value.to_string());
            println!("{text}");
        }
        Ok(Err(failure)) => {
            report_failure(&failure);
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("error: request finished without a result");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = "warn";
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_failure(failure: &Failure) {
    eprintln!("error: {failure}");
    for field in failure.invalid_fields.iter().flatten() {
        eprintln!("  {}: {}", field.name, field.message);
    }
    if let Some(underlying) = failure.underlying() {
        tracing::debug!(failure = %underlying, "underlying connector failure");
    }
}
