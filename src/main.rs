mod audio;
mod cli;
mod config;
mod error;
mod output;
mod pipeline;
mod plot;
mod shutdown;
mod source;
mod supervisor;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Action, Cli, PlotArgs};
use config::StreamConfig;
use output::SystemClock;
use pipeline::StreamProcessor;
use shutdown::Shutdown;
use source::command::CommandSource;
use supervisor::Supervisor;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Some(Action::Plot(args)) = &cli.action {
        return run_plot(args);
    }

    // Load config: explicit --config path, or auto-detect noiselog.toml / user config
    let file_config = match cli.config.as_deref() {
        Some(path) => {
            let cfg = config::load_config(path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => match config::discover_config_path() {
            Some(path) => match config::load_config(&path) {
                Ok(cfg) => {
                    log::info!("Loaded config from {}", path.display());
                    cfg
                }
                Err(err) => {
                    log::warn!("Ignoring config: {}", err);
                    config::Config::default()
                }
            },
            None => config::Config::default(),
        },
    };

    let stream_config = StreamConfig::resolve(&cli, file_config).context("invalid options")?;
    stream_config.prepare_output_dir()?;
    let source = CommandSource::parse(&stream_config.command)?;

    log::info!("Output: {}", stream_config.output_dir.display());
    log::info!("Command: {}", stream_config.command);
    log::info!(
        "Max. frequency: {} Hz, averaging: {} s, dB: {}, wav: {}",
        stream_config.max_freq,
        stream_config.avg_interval,
        stream_config.in_db,
        stream_config.wav
    );

    let shutdown = Shutdown::new();
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received exit signal, stopping after the current second");
        handler_flag.trigger();
    })
    .context("Failed to install signal handler")?;

    let processor = StreamProcessor::new(stream_config, SystemClock, shutdown.clone());
    let mut supervisor = Supervisor::new(source, processor, shutdown);
    supervisor.run();

    Ok(())
}

fn run_plot(args: &PlotArgs) -> Result<()> {
    let opts = plot::PlotOptions::try_from(args).context("invalid plot options")?;
    if let Some(dir) = &opts.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let logs = plot::collect_logs(&args.inputs, args.newer)?;
    if logs.is_empty() {
        log::warn!("No CSV logs found");
        return Ok(());
    }

    let summary = plot::plot_all(&logs, &opts);
    log::info!(
        "{} images written, {} logs without data in range, {} failed",
        summary.written,
        summary.empty,
        summary.failed
    );
    if summary.failed > 0 {
        anyhow::bail!("{} of {} logs could not be plotted", summary.failed, logs.len());
    }
    Ok(())
}
