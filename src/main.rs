use clap::Parser;
use ruuvi_gateway::app::{self, Options, RealScanner, RunError};
use ruuvi_gateway::config::Settings;
use ruuvi_gateway::logging;
use std::panic::{self, PanicHookInfo};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Resolve settings, install logging, then run the gateway until the scanner stops.
async fn run(options: Options) -> Result<(), RunError> {
    let settings = Settings::load(&options)?;
    logging::init(&settings.logging)?;
    app::run(settings, &RealScanner).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Telegraf execd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    match run(options).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
