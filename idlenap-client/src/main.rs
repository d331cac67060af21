#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use clap::Parser;
use idlenap_client::{Cli, run};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), idlenap_client::AppError> {
    run(Cli::parse()).await
}
