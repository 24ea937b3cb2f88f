//! Jukebox - keeps a named playlist playing.
//!
//! Logs in to a streaming provider, finds the playlist whose name matches
//! the one given on the command line, and plays it track by track through
//! the audio device, following edits to the playlist as they happen.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod jukebox;
pub mod provider;
#[cfg(test)]
pub mod test_utils;

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use audio::{AudioOutput, FadeMixer, StagingQueue};
use error::{EXIT_FAILURE, Error, ResultExt};
use jukebox::{Bridge, ControlLoop, Jukebox, NotifyGate};
use provider::StreamingProvider;
use provider::local::LocalProvider;

fn main() -> ExitCode {
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() { EXIT_FAILURE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jukebox=info")))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let code = e
                .downcast_ref::<Error>()
                .map_or(EXIT_FAILURE, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(args: cli::Cli) -> anyhow::Result<()> {
    let mut config = config::load(args.config.as_deref());
    args.apply_to(&mut config);

    if args.list_devices {
        for name in audio::list_audio_devices() {
            println!("{}", name);
        }
        return Ok(());
    }

    let session = args
        .session()
        .ok_or_else(|| Error::config("username, password and playlist are required"))?;

    if args.delete_played {
        tracing::warn!(
            "Tracks will be deleted from \"{}\" once they have played",
            session.playlist
        );
    }

    let manifest = config
        .manifest_path()
        .ok_or_else(|| Error::config("no library manifest configured, pass --library"))?;

    let queue = Arc::new(StagingQueue::new(config.queue_capacity()));
    let gate = Arc::new(NotifyGate::new());

    let mixer = FadeMixer::new(Arc::clone(&queue), Arc::clone(&gate), config.fade_in());
    let output = AudioOutput::open(&config.audio.output_device, mixer)
        .with_context("Failed to open audio output")?;

    let bridge = Arc::new(Bridge::new(Arc::clone(&queue), Arc::clone(&gate)));
    let mut provider =
        LocalProvider::open(&manifest, bridge).with_context("Failed to create session")?;

    spawn_interrupt_listener(Arc::clone(&gate))?;

    provider
        .login(&session.username, &session.password)
        .with_context("Failed to log in")?;

    let jukebox = Jukebox::new(session.playlist, args.delete_played, queue);
    let mut control = ControlLoop::new(provider, jukebox, gate);
    let result = control.run();

    // Stop the streamer before the device
    drop(control);
    output.close();

    result?;
    Ok(())
}

/// Turn Ctrl-C into an orderly shutdown of the control loop.
fn spawn_interrupt_listener(gate: Arc<NotifyGate>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupted, stopping playback");
                        gate.request_shutdown();
                    }
                    Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
                }
            });
        })?;

    Ok(())
}
