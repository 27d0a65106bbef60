mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use vidmerge_core::{
    default_output_path, init_logging, new_job_id, CoreEvent, EngineSettings, MergeRequest,
    MergeService, Resolution, SettingsLoader,
};

async fn merge(
    settings: &EngineSettings,
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    resolution: &str,
    json: bool,
) -> Result<()> {
    let output = match output {
        Some(path) => path,
        None => default_output_path(
            &std::env::current_dir().context("Failed to read current directory")?,
        ),
    };
    let request = MergeRequest::new(inputs, output.clone(), Resolution::parse(resolution));

    let service = MergeService::from_settings(settings).await;
    let job_id = new_job_id();
    let printer = tokio::spawn(print_events(service.subscribe(), job_id.clone(), json));

    let merge = service.merge_videos_as(job_id.clone(), request);
    tokio::pin!(merge);

    let result = tokio::select! {
        result = &mut merge => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling merge");
            service.cancel(&job_id);
            merge.await
        }
    };

    if let Err(e) = printer.await {
        tracing::warn!("Event printer failed: {}", e);
    }

    match result {
        Ok(_) => {
            if !json {
                println!("{}", output.display());
            }
            Ok(())
        }
        Err(reason) => bail!(reason),
    }
}

/// Print one job's events until its terminal event arrives.
async fn print_events(mut rx: broadcast::Receiver<CoreEvent>, job_id: String, json: bool) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if event.job_id() != job_id {
            continue;
        }

        let terminal = matches!(
            event,
            CoreEvent::MergeCompleted(_) | CoreEvent::MergeFailed(_)
        );

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            }
        } else {
            match &event {
                CoreEvent::MergeStarted(_) => eprintln!("Merging..."),
                CoreEvent::MergeProgress(p) => {
                    eprint!("\rProgress: {:>5}%", p.percent);
                    let _ = std::io::stderr().flush();
                }
                CoreEvent::MergeCompleted(_) => eprintln!("\nDone."),
                CoreEvent::MergeFailed(f) => eprintln!("\nMerge failed: {}", f.reason),
            }
        }

        if terminal {
            break;
        }
    }
}

async fn probe(settings: &EngineSettings, file: &Path, json: bool) -> Result<()> {
    let service = MergeService::from_settings(settings).await;
    let info = service.video_info(file).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File:       {}", file.display());
        println!("Resolution: {}x{}", info.width, info.height);
        println!("Audio:      {}", if info.has_audio { "yes" } else { "no" });
    }
    Ok(())
}

async fn check(settings: &EngineSettings, json: bool) -> Result<()> {
    let service = MergeService::from_settings(settings).await;
    let status = service.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if status.available {
        println!(
            "FFmpeg {} ({})",
            status.version.as_deref().unwrap_or("unknown"),
            status.ffmpeg_path.as_deref().unwrap_or("?")
        );
        println!("FFprobe: {}", status.ffprobe_path.as_deref().unwrap_or("?"));
        println!(
            "Video encoder: {}{}",
            status.video_encoder.as_deref().unwrap_or("?"),
            if status.hardware_accelerated {
                " (hardware)"
            } else {
                ""
            }
        );
    } else {
        println!("FFmpeg: not found");
    }

    if !status.available {
        bail!("FFmpeg is not available. Install it or set ffmpegPath in the settings.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => SettingsLoader::new(path),
        None => SettingsLoader::from_default_location(),
    };
    let settings = loader.load();

    init_logging(settings.log_dir.as_deref(), cli.verbose);

    match cli.command {
        Commands::Merge {
            inputs,
            output,
            resolution,
            json,
        } => merge(&settings, inputs, output, &resolution, json).await,
        Commands::Probe { file, json } => probe(&settings, &file, json).await,
        Commands::Check { json } => check(&settings, json).await,
    }
}
