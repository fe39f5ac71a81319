mod app;
mod args;
mod constants;
mod episode;
mod logger;
mod progress;
mod prompt;
mod utils;

use std::process::ExitCode;

use owo_colors::OwoColorize;

use crate::app::App;

#[tokio::main]
async fn main() -> ExitCode {
    match App::new() {
        Ok(app) => app.run().await,
        Err(err) => {
            eprintln!("{} {err}", "✗".red());
            ExitCode::FAILURE
        }
    }
}
