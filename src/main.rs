use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use eframe::{egui, NativeOptions};
use tracing_subscriber::EnvFilter;

use studyweave_gui::app::StudyWeaveApp;
use studyweave_gui::config::{load_config, Config};
use studyweave_gui::llm::{HttpCompletionClient, TransportError};
use studyweave_gui::parsing::normalize;
use studyweave_gui::render::{render_error, render_song_report, render_topic_report};
use studyweave_gui::session::{run_song, run_topic, SessionError, SongReport, TopicReport};
use studyweave_gui::types::llm_data::{NormalizedResult, RawCompletionPayload, Schema};

#[derive(Parser, Debug)]
#[command(
    name = "studyweave",
    version,
    about = "Topic quizzes and Japanese song vocabulary from a chat completion model.",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to ./studyweave.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the desktop window (the default)
    Gui,
    /// Generate questions, answers and technical terms for a topic
    Topic {
        /// Topic text; read from stdin when omitted
        text: Option<String>,
        #[command(flatten)]
        call: CallArgs,
        /// Skip the per-term description calls
        #[arg(long)]
        no_term_lookup: bool,
    },
    /// Translate Japanese song lyrics and extract vocabulary
    Song {
        /// Lyrics; read from stdin when omitted
        text: Option<String>,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Normalize a saved model response without calling the service
    Normalize {
        #[arg(long, value_enum)]
        schema: SchemaArg,
        /// Response file; read from stdin when omitted
        file: Option<PathBuf>,
        /// Print the normalized JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// API key (falls back to the configured environment variable)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,
    /// Model name, overriding the configuration
    #[arg(long)]
    model: Option<String>,
    /// Print the normalized JSON instead of formatted text
    #[arg(long)]
    json: bool,
    /// Also print the raw model response
    #[arg(long)]
    show_raw: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SchemaArg {
    Topic,
    Song,
}

impl From<SchemaArg> for Schema {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Topic => Schema::TopicQa,
            SchemaArg::Song => Schema::SongTranslation,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command.unwrap_or(Command::Gui) {
        Command::Gui => {
            let (config, config_error) = match load_config(cli.config.as_deref()) {
                Ok(config) => (config, None),
                Err(e) => {
                    tracing::error!(error = %e, "configuration could not be loaded");
                    (Config::default(), Some(e.to_string()))
                }
            };
            run_gui(config, config_error)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Topic {
            text,
            call,
            no_term_lookup,
        } => {
            let config = call_config(cli.config, &call)?;
            let topic = read_text(text)?;
            let lookup = (config.describe_terms && !no_term_lookup).then(|| config.lookup_options());
            let outcome = connect(&config, &call)
                .and_then(|client| run_topic(&client, &topic, lookup.as_ref()));
            finish(outcome, |report| topic_output(report, &call))
        }
        Command::Song { text, call } => {
            let config = call_config(cli.config, &call)?;
            let lyrics = read_text(text)?;
            let outcome = connect(&config, &call).and_then(|client| run_song(&client, &lyrics));
            finish(outcome, |report| song_output(report, &call))
        }
        Command::Normalize { schema, file, json } => {
            let text = match file {
                Some(path) => fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {}", path.display(), e))?,
                None => read_stdin()?,
            };
            let payload = RawCompletionPayload::new(text);
            let outcome = normalize(&payload, schema.into()).map_err(|failure| SessionError::Parse {
                failure,
                raw_text: payload.text.clone(),
            });
            finish(outcome, |result| normalized_output(result, payload.text.clone(), json))
        }
    }
}

fn run_gui(config: Config, config_error: Option<String>) -> Result<(), eframe::Error> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "StudyWeave",
        options,
        Box::new(move |cc| Box::new(StudyWeaveApp::new(cc, config, config_error))),
    )
}

fn call_config(path: Option<PathBuf>, call: &CallArgs) -> Result<Config, Box<dyn Error>> {
    let mut config = load_config(path.as_deref())?;
    if let Some(model) = &call.model {
        config.model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

fn connect(config: &Config, call: &CallArgs) -> Result<HttpCompletionClient, SessionError> {
    let key = config
        .resolve_api_key(call.api_key.as_deref())
        .ok_or(TransportError::MissingCredential)?;
    Ok(HttpCompletionClient::new(config.client_config(&key))?)
}

/// Prints the successful output, or the error (with raw text) on stderr.
fn finish<T, F>(outcome: Result<T, SessionError>, output: F) -> Result<ExitCode, Box<dyn Error>>
where
    F: FnOnce(T) -> Result<String, serde_json::Error>,
{
    match outcome {
        Ok(value) => {
            println!("{}", output(value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprint!("{}", render_error(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn topic_output(report: TopicReport, call: &CallArgs) -> Result<String, serde_json::Error> {
    if call.json {
        serde_json::to_string_pretty(&report.merged_result())
    } else {
        Ok(render_topic_report(&report, call.show_raw))
    }
}

fn song_output(report: SongReport, call: &CallArgs) -> Result<String, serde_json::Error> {
    if call.json {
        serde_json::to_string_pretty(&report.result)
    } else {
        Ok(render_song_report(&report, call.show_raw))
    }
}

fn normalized_output(
    result: NormalizedResult,
    raw_text: String,
    json: bool,
) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(&result);
    }
    Ok(match result {
        NormalizedResult::TopicQa(topic) => render_topic_report(
            &TopicReport {
                raw_text,
                result: topic,
                term_descriptions: Vec::new(),
            },
            false,
        ),
        NormalizedResult::SongTranslation(song) => render_song_report(
            &SongReport {
                raw_text,
                result: song,
            },
            false,
        ),
    })
}

fn read_text(text: Option<String>) -> io::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => read_stdin(),
    }
}

fn read_stdin() -> io::Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
