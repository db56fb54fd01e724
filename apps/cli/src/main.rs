mod cli;
mod logger;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use log::{info, warn};
use rpy_extractor_core::{
    default_config_path, event_bus, subscriber, ConfigStore, Event, ExtractionCore, Topic,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(path) = logger::init_logger(cli.verbose, cli.log_file.clone()) {
        eprintln!("Logging to {}", path.display());
    }

    let bus = event_bus();
    bus.publish(Event::AppInit);

    let exit_code = match run(&cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("error: {:#}", err);
            1
        }
    };

    bus.publish(Event::AppExit { exit_code });
    ExitCode::from(exit_code as u8)
}

/// Returns whether the extraction completed
fn run(cli: &Cli) -> Result<bool> {
    let bus = event_bus();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let mut store = ConfigStore::load_or_default(&config_path, Arc::clone(&bus))
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let mut config = store.snapshot();
    cli.apply_to(&mut config);
    store.replace(config);

    if store.game_directory().as_os_str().is_empty() {
        anyhow::bail!("no game directory given (pass it as an argument or set RPY_GAME_DIR)");
    }

    if cli.save_config {
        store
            .save(&config_path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("saving {}", config_path.display()))?;
        info!("settings saved to {}", config_path.display());
    }

    subscribe_printers();

    let core = ExtractionCore::new(Arc::clone(&bus));
    let result = core.run(&store.snapshot());

    for failure in &result.failed_files {
        warn!("skipped {}: {}", failure.path.display(), failure.reason);
    }
    if result.success {
        println!(
            "{} entries written ({} already translated, {} duplicates, {} rejected)",
            result.count, result.skipped_translated, result.duplicates, result.rejected
        );
    }

    Ok(result.success)
}

/// Status output driven by bus events
fn subscribe_printers() {
    let bus = event_bus();

    bus.subscribe(
        Topic::ExtractionProgress,
        subscriber(|event| {
            if let Event::ExtractionProgress {
                current,
                total,
                entries,
                file: Some(file),
                ..
            } = event
            {
                eprintln!("[{current}/{total}] {} ({entries} entries)", file.display());
            }
            Ok(())
        }),
    );

    bus.subscribe(
        Topic::FileSaved,
        subscriber(|event| {
            if let Event::FileSaved { path, entry_count } = event {
                println!("Saved {} entries to {}", entry_count, path.display());
            }
            Ok(())
        }),
    );

    bus.subscribe(
        Topic::ExtractionCompleted,
        subscriber(|event| {
            if let Event::ExtractionCompleted { message, .. } = event {
                println!("{message}");
            }
            Ok(())
        }),
    );

    bus.subscribe(
        Topic::ExtractionError,
        subscriber(|event| {
            if let Event::ExtractionError { message, .. } = event {
                eprintln!("Extraction failed: {message}");
            }
            Ok(())
        }),
    );
}
