use std::{future::Future, process::ExitCode, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, InquireError, Password, Text};
use weather_core::{App, Config, LookupOutcome, ViewState};

use crate::render;

/// How long a lookup may run before the loading state is printed.
const LOADING_NOTICE_AFTER: Duration = Duration::from_millis(250);

const SEARCH_HELP: &str = "Enter to search, `:locate` for your position, `:q` to quit";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather and 5-day forecast")]
pub struct Cli {
    /// Log requests and lookup outcomes to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Without a subcommand, start the interactive search.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and geolocation preference.
    Configure,

    /// Show weather for a city.
    Show {
        /// City name, e.g. "Paris" or "Paris,FR".
        city: String,
    },

    /// Show weather for the current position.
    Locate,
}

/// Interactive input parsed from one prompt line.
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    Search(&'a str),
    Locate,
    Quit,
}

fn parse_action(line: &str) -> Action<'_> {
    match line.trim() {
        ":q" | ":quit" => Action::Quit,
        ":locate" | ":l" => Action::Locate,
        _ => Action::Search(line),
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        tracing::debug!(command = ?self.command, "starting");

        if let Some(Command::Configure) = self.command {
            configure()?;
            return Ok(ExitCode::SUCCESS);
        }

        let config = Config::load()?.with_env_overrides();
        tracing::debug!(base_url = %config.api_base_url, "config loaded");
        let app = App::from_config(&config).context("Failed to set up weather client")?;

        match self.command {
            Some(Command::Show { city }) => {
                let outcome = drive(&app, app.submit(&city)).await;
                Ok(finish(&app, outcome))
            }
            Some(Command::Locate) => {
                let outcome = drive(&app, app.locate()).await;
                Ok(finish(&app, outcome))
            }
            Some(Command::Configure) => Ok(ExitCode::SUCCESS),
            None => {
                interactive(&app).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

async fn interactive(app: &App) -> anyhow::Result<()> {
    if drive(app, app.startup()).await.is_some() {
        render::print_view(&app.view());
    }

    loop {
        let view = app.view();
        let line = match Text::new("City:")
            .with_initial_value(&view.input)
            .with_help_message(SEARCH_HELP)
            .prompt()
        {
            Ok(line) => line,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Failed to read search input"),
        };

        match parse_action(&line) {
            Action::Quit => break,
            Action::Locate => {
                drive(app, app.locate()).await;
            }
            Action::Search(text) => {
                drive(app, app.submit(text)).await;
            }
        }

        render::print_view(&app.view());
        app.clear_prompt();
    }

    Ok(())
}

/// Await a user action, printing the loading state if it takes a while.
async fn drive<T>(app: &App, action: impl Future<Output = T>) -> T {
    tokio::pin!(action);

    tokio::select! {
        done = &mut action => return done,
        _ = tokio::time::sleep(LOADING_NOTICE_AFTER) => {}
    }

    if matches!(app.view().state(), ViewState::Loading) {
        render::print_view(&app.view());
    }

    action.await
}

fn finish(app: &App, outcome: LookupOutcome) -> ExitCode {
    render::print_view(&app.view());
    tracing::debug!(?outcome, "lookup finished");

    match outcome {
        LookupOutcome::Rendered => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;

    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    config.geolocation.enabled = Confirm::new("Allow locating you by IP address?")
        .with_default(config.geolocation.enabled)
        .prompt()
        .context("Failed to read geolocation preference")?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quit_and_locate_commands() {
        assert_eq!(parse_action(":q"), Action::Quit);
        assert_eq!(parse_action(" :quit "), Action::Quit);
        assert_eq!(parse_action(":locate"), Action::Locate);
    }

    #[test]
    fn everything_else_is_a_search() {
        assert_eq!(parse_action("Paris"), Action::Search("Paris"));
        assert_eq!(parse_action("   "), Action::Search("   "));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["weather", "-v", "show", "New York"]).expect("valid args");

        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::Show { ref city }) if city == "New York"));
    }

    #[test]
    fn cli_without_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["weather"]).expect("valid args");
        assert!(cli.command.is_none());
    }
}
