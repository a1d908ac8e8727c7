mod input;
mod progress;
mod upload;

use std::time::Duration;

use anyhow::{bail, Context};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use echocoach_endpoint::{EndpointConfig, RecordingAttempt, SessionController, StopReason};
use echocoach_foundation::{real_clock, AppError, ControlEvent, SharedClock};

use input::CpalInput;
use progress::ProgressStore;
use upload::{TestStage, UploadClient};

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "echocoach.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

struct Args {
    device: Option<String>,
    stage: TestStage,
    server: Option<String>,
    words: Vec<String>,
}

const USAGE: &str = "usage: echocoach [--device NAME] [--stage pre|post] [--server URL] WORD...";

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        device: None,
        stage: TestStage::Pre,
        server: None,
        words: Vec::new(),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--device" => args.device = Some(it.next().context("--device needs a value")?),
            "--stage" => {
                let value = it.next().context("--stage needs a value")?;
                args.stage = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            }
            "--server" => args.server = Some(it.next().context("--server needs a value")?),
            other if other.starts_with("--") => bail!("unknown flag {other}\n{USAGE}"),
            word => args.words.push(word.to_string()),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("Starting EchoCoach recorder");

    let args = parse_args()?;
    if args.words.is_empty() {
        bail!("no words given\n{USAGE}");
    }

    let mut progress = ProgressStore::load("progress.json")?;
    let uploader = match &args.server {
        Some(url) => Some(UploadClient::new(url.clone())?),
        None => None,
    };

    let cfg = EndpointConfig::new();
    let tick = Duration::from_millis(cfg.auto_stop.check_interval_ms);
    let clock = real_clock();
    let mut controller = SessionController::new(
        CpalInput::new(args.device.clone()),
        CpalInput::new(args.device.clone()),
        cfg,
    );
    controller
        .dispatch(ControlEvent::SessionStarted, clock.now())
        .context("starting ambient monitor")?;

    // Let the monitor hear the room before the first word.
    run_monitor(&mut controller, &clock, Duration::from_secs(2), tick);
    tracing::info!(
        floor = controller.noise_floor(),
        room = ?controller.monitor().room_status(),
        "ambient calibration done"
    );

    std::fs::create_dir_all("recordings")?;

    for word in &args.words {
        if progress.is_done(args.stage, word) {
            tracing::info!(%word, "already completed, skipping");
            continue;
        }

        println!("Say \"{word}\" now (recording stops automatically)");
        let attempt = match record_word(&mut controller, &clock, word, tick) {
            Ok(attempt) => attempt,
            Err(err) => {
                println!("{}", err.user_message());
                tracing::warn!(%word, "attempt failed: {err}");
                run_monitor(&mut controller, &clock, Duration::from_millis(500), tick);
                continue;
            }
        };

        let path = format!("recordings/{}_{}.wav", args.stage.as_str(), word);
        std::fs::write(&path, &attempt.encoded).with_context(|| format!("writing {path}"))?;
        println!(
            "Saved {path}: {} ms kept of {} ms captured",
            attempt.trimmed.duration_ms(),
            attempt.captured.duration_ms()
        );

        match &uploader {
            Some(client) => match client.analyze(&attempt, args.stage) {
                Ok(analysis) => {
                    println!("Score (Bark distance): {:.2}", analysis.distance_bark);
                    if !analysis.recommendation.is_empty() {
                        println!("{}", analysis.recommendation);
                    }
                    progress.mark_done(args.stage, word)?;
                }
                Err(err) => {
                    println!("{}", err.user_message());
                    tracing::warn!(%word, "upload failed: {err}");
                }
            },
            // Offline run: the saved file is the deliverable.
            None => progress.mark_done(args.stage, word)?,
        }

        run_monitor(&mut controller, &clock, Duration::from_millis(800), tick);
    }

    tracing::info!(
        done = progress.done_count(args.stage),
        stage = args.stage.as_str(),
        "session finished"
    );
    Ok(())
}

/// Drives the ambient monitor for a stretch of wall-clock time.
fn run_monitor(
    controller: &mut SessionController<CpalInput>,
    clock: &SharedClock,
    total: Duration,
    tick: Duration,
) {
    let deadline = clock.now() + total;
    while clock.now() < deadline {
        std::thread::sleep(tick);
        if let Err(err) = controller.tick(clock.now()) {
            tracing::warn!("monitor tick failed: {err}");
        }
    }
}

/// One capture, driven to completion by the auto-stop detector.
fn record_word(
    controller: &mut SessionController<CpalInput>,
    clock: &SharedClock,
    word: &str,
    tick: Duration,
) -> Result<RecordingAttempt, AppError> {
    controller.dispatch(
        ControlEvent::StartCapture {
            word: word.to_string(),
        },
        clock.now(),
    )?;

    loop {
        std::thread::sleep(tick);
        if let Some(reason) = controller.tick(clock.now())? {
            if reason == StopReason::HardCap {
                tracing::warn!(word, "recording hit the length cap");
            }
            return controller
                .take_attempt()
                .ok_or_else(|| AppError::Config("attempt was superseded".into()));
        }
    }
}
