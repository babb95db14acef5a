//! DebateVoice CLI - Debate Voice Tool
//!
//! A command-line tool for rendering debate lines with neural and cloud
//! text-to-speech voices.

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use debatevoice_core::audio::generate_output_filename;
use debatevoice_core::neural::{NO_TORCH_COMPILE_ENV, torch_compile_disabled};
use debatevoice_core::{
    BackendKind, CloudClient, Config, SynthesisDispatcher, VoiceError, default_config,
};
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "DEBATEVOICE_CONFIG";

#[derive(Parser)]
#[command(
    name = "debatevoice",
    version,
    about = "Debate Voice Tool - Give each debater a voice",
    long_about = "A CLI tool for synthesizing debate lines with a local neural TTS server or Edge cloud voices."
)]
struct Cli {
    /// Voice configuration file (TOML). Falls back to $DEBATEVOICE_CONFIG, then the built-in voices.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured voices
    Voices,

    /// Validate the voice configuration
    Check,

    /// Synthesize one line of text
    Say {
        /// The text to speak
        #[arg(value_name = "TEXT")]
        text: String,

        /// Voice name from the configuration
        #[arg(long, value_name = "VOICE")]
        voice: String,

        /// Output file (defaults to a name derived from voice and text)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List voices offered by the cloud service
    CloudVoices {
        /// Only show locales starting with this prefix, e.g. "en-US"
        #[arg(long, value_name = "LOCALE")]
        locale: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = match load_config(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    match cli.command {
        Command::Voices => list_voices(&config),
        Command::Check => check_config(&config),
        Command::Say {
            text,
            voice,
            output,
        } => say(&config, &text, &voice, output).await,
        Command::CloudVoices { locale } => list_cloud_voices(&config, locale.as_deref()).await,
    }

    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the configuration file and apply environment overrides.
fn load_config(path: Option<PathBuf>) -> Result<Config, VoiceError> {
    let path = path.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            Config::load(&path)?
        }
        None => default_config(),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Print an error and exit with a failure status.
fn fail(error: &VoiceError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), error);
    std::process::exit(1);
}

fn list_voices(config: &Config) {
    let registry = match config.registry() {
        Ok(registry) => registry,
        Err(e) => fail(&e),
    };

    println!();
    println!("{}", "Configured voices:".bold());
    for voice in registry.iter() {
        let backend = match voice.kind() {
            BackendKind::Neural => voice.kind().as_str().bright_magenta(),
            BackendKind::Cloud => voice.kind().as_str().bright_cyan(),
        };
        println!(
            "  {} [{}] {}",
            voice.name.bold(),
            backend,
            voice.describe().dimmed()
        );
    }
    println!();
}

fn check_config(config: &Config) {
    match config.registry() {
        Ok(registry) => {
            let neural = registry
                .iter()
                .filter(|v| v.kind() == BackendKind::Neural)
                .count();
            println!(
                "{} {} voices ({} neural, {} cloud)",
                "OK:".green().bold(),
                registry.len(),
                neural,
                registry.len() - neural
            );
        }
        Err(e) => fail(&e),
    }
}

async fn say(config: &Config, text: &str, voice: &str, output: Option<PathBuf>) {
    let dispatcher = match SynthesisDispatcher::from_config(config) {
        Ok(dispatcher) => dispatcher,
        Err(e) => fail(&e),
    };

    let uses_neural = dispatcher
        .registry()
        .lookup(voice)
        .map(|v| v.kind() == BackendKind::Neural)
        .unwrap_or(false);
    if uses_neural && !torch_compile_disabled() {
        warn!(
            "{}=1 is not set; the neural TTS server needs it in its environment",
            NO_TORCH_COMPILE_ENV
        );
    }

    println!(
        "{} {} {}",
        "▶".bright_cyan(),
        voice.bright_cyan().bold(),
        text.dimmed()
    );

    let synthesis = match dispatcher.synthesize(text, voice).await {
        Ok(synthesis) => synthesis,
        Err(e) => fail(&e),
    };

    let path = output.unwrap_or_else(|| {
        PathBuf::from(generate_output_filename(
            &synthesis.voice,
            text,
            synthesis.artifact.format,
        ))
    });
    if let Err(e) = synthesis.artifact.save(&path) {
        fail(&e);
    }

    println!(
        "{} {} ({} backend, {} Hz)",
        "Saved".green().bold(),
        path.display(),
        synthesis.backend,
        synthesis.artifact.sample_rate
    );
}

async fn list_cloud_voices(config: &Config, locale: Option<&str>) {
    let client = CloudClient::new(config.cloud.clone());
    let voices = match client.list_voices(locale).await {
        Ok(voices) => voices,
        Err(e) => fail(&e),
    };

    println!();
    for voice in &voices {
        println!(
            "  {} {} {}",
            voice.short_name.bright_cyan(),
            format!("({}, {})", voice.gender, voice.locale).yellow(),
            voice.friendly_name.dimmed()
        );
    }
    println!();
    println!("{} voices", voices.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_say() {
        let cli = Cli::try_parse_from([
            "debatevoice",
            "-vv",
            "say",
            "Hello there",
            "--voice",
            "Jenny",
            "-o",
            "out.mp3",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Say {
                text,
                voice,
                output,
            } => {
                assert_eq!(text, "Hello there");
                assert_eq!(voice, "Jenny");
                assert_eq!(output, Some(PathBuf::from("out.mp3")));
            }
            _ => panic!("expected say"),
        }
    }

    #[test]
    fn test_default_config_survives_env_overrides() {
        let mut config = default_config();
        config.apply_env_overrides();
        let registry = config.registry().unwrap();
        assert!(registry.lookup("Narrator").is_ok());
        assert_eq!(registry.len(), default_config().voices.len());
    }
}
