use anyhow::Context;
use clap::Parser;
use dumbterm::{logging, Args, Config};
use dumbterm_pty::ExitStatus;
use std::io::{self, Write};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args).context("Failed to load configuration")?;
    logging::init(&config)?;

    // Run the session; the terminal is restored before any error is printed
    let result = dumbterm::app::run(config).await;

    let _ = io::stderr().flush();
    let _ = io::stdout().flush();

    // Pass the shell's own exit code on; a shell we hung up on counts as success
    match result? {
        ExitStatus::Exited(code) => std::process::exit(code),
        ExitStatus::Signaled(_) => Ok(()),
    }
}
