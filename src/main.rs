use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pushtalk::voice::{
    AudioChunk, CpalInput, CpalOutput, PlaybackSink, TerminalConsole, list_devices,
};
use pushtalk::{Config, Conversation, OpenAiPipeline};

/// Pushtalk - push-to-talk voice conversations with an AI assistant
#[derive(Parser)]
#[command(name = "pushtalk", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to ~/.config/pushtalk/config.toml)
    #[arg(short, long, env = "PUSHTALK_CONFIG")]
    config: Option<PathBuf>,

    /// Voice used for spoken replies
    #[arg(long)]
    voice: Option<String>,

    /// System prompt for the assistant
    #[arg(long)]
    instructions: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test speaker output
    TestSpeaker,
    /// List audio devices
    Devices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,pushtalk=info",
        1 => "info,pushtalk=debug",
        2 => "debug",
        _ => "trace",
    };

    // Prompts own stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(voice) = cli.voice {
        config.pipeline.tts_voice = voice;
    }
    if let Some(instructions) = cli.instructions {
        config.pipeline.instructions = instructions;
    }
    tracing::debug!(?config.audio, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestSpeaker => test_speaker(&config),
            Command::Devices => show_devices(),
        };
    }

    let pipeline = OpenAiPipeline::new(config.pipeline.clone())?;

    let mut conversation = Conversation::new(
        Box::new(CpalInput),
        Box::new(CpalOutput),
        Arc::new(pipeline),
        Box::new(TerminalConsole::new()),
        &config.audio,
    );

    println!(
        "Starting conversation. Press SPACEBAR to start talking, press again to stop. Press RETURN to exit."
    );

    let summary = conversation.run().await?;
    tracing::info!(
        cycles = summary.cycles,
        failed = summary.failed_cycles,
        "session finished"
    );
    println!("Conversation ended.");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker(config: &Config) -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let format = config.audio.format();
    let mut sink = PlaybackSink::open(&CpalOutput, format)?;

    let sample_rate = format.sample_rate;
    let frequency = 440.0_f32;
    let num_samples = format.samples_for(std::time::Duration::from_secs(2));

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<i16> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            pushtalk::voice::f32_to_i16((2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3)
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    sink.write(&AudioChunk::new(samples))?;
    sink.close();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Print input and output devices
fn show_devices() -> anyhow::Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for device in devices {
        let direction = if device.is_input { "input " } else { "output" };
        let marker = if device.is_default { " (default)" } else { "" };
        println!("[{direction}] {}{marker}", device.name);
    }

    Ok(())
}
