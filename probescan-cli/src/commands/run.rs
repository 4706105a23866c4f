//! The `run` command: a full simulated inspection with live analysis.
//!
//! Loads the reference model, starts a [`ScanSession`], and renders its
//! event stream as a progress bar with deviation lines. Ctrl+C stops both
//! workers and still prints the summary of what was measured.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use probescan::analysis::{AnalysisEvent, ErrorStatus};
use probescan::config::{ChannelMode, ConfigFile};
use probescan::reference::ReferenceModel;
use probescan::scan::ScanParameters;
use probescan::session::{ScanSession, SessionConfig, SessionEvent, SessionSummary};
use probescan::simulator::SimulatorEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{load_model, ChannelArg, ScanArgs};
use crate::error::CliError;
use crate::output;

/// Arguments for `probescan run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Reference point cloud CSV (x,y,z)
    pub model: PathBuf,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// Qualified tolerance in mm
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Seed for the random error term
    #[arg(long)]
    pub seed: Option<u64>,

    /// Report ideal readings with no simulated error
    #[arg(long)]
    pub no_noise: bool,

    /// Measurement channel backend
    #[arg(long, value_enum)]
    pub channel: Option<ChannelArg>,

    /// Measurement log path (implies --channel file)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print points outside the qualified band as they are analysed
    #[arg(long)]
    pub show_deviations: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Applies command-line overrides on top of the config file.
    fn apply(&self, config: &mut ConfigFile) -> Result<(), CliError> {
        config.scan = self.scan.resolve(&config.scan);
        if let Some(tolerance) = self.tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(CliError::Config(format!(
                    "--tolerance must be a positive number, got {}",
                    tolerance
                )));
            }
            config.analysis.tolerance = tolerance;
        }
        if self.no_noise {
            config.noise.enabled = false;
        }
        if let Some(seed) = self.seed {
            config.noise.model.seed = Some(seed);
        }
        if let Some(channel) = self.channel {
            config.channel.mode = channel.into();
        }
        if let Some(path) = &self.log_file {
            config.channel.mode = ChannelMode::File;
            config.channel.path = path.clone();
        }
        Ok(())
    }
}

/// Run a simulated inspection.
pub fn run(args: RunArgs, mut config: ConfigFile) -> Result<(), CliError> {
    args.apply(&mut config)?;
    config.scan.validate()?;

    let model = load_model(&args.model, config.index)?;
    info!(
        model = %args.model.display(),
        points = model.cloud().len(),
        "Reference model loaded"
    );

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    if !args.json {
        print_banner(&args, &config, &model);
    }

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    let summary = runtime.block_on(drive(
        &model,
        config.scan,
        config.session_config(),
        config.session.stop_timeout,
        shutdown,
        args.show_deviations,
    ))?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", json);
    } else {
        output::print_summary(&summary);
    }

    match (&summary.simulator_error, &summary.analysis_error) {
        (Some(e), _) | (None, Some(e)) => Err(CliError::ScanFailed(e.clone())),
        (None, None) => Ok(()),
    }
}

fn print_banner(args: &RunArgs, config: &ConfigFile, model: &ReferenceModel) {
    let scan = &config.scan;
    println!("{} v{}", style("ProbeScan").bold(), probescan::VERSION);
    println!("==================");
    println!();
    println!(
        "Model:      {} ({} points)",
        args.model.display(),
        model.cloud().len()
    );
    println!(
        "Range:      x {:.3} .. {:.3} mm, step {:.3} mm, rotation step {:.3}°",
        scan.x_min, scan.x_max, scan.x_step, scan.rot_step
    );
    println!("Tolerance:  ±{:.4} mm", config.analysis.tolerance);
    match config.channel.mode {
        ChannelMode::Memory => println!("Channel:    memory"),
        ChannelMode::File => println!("Channel:    {}", config.channel.path.display()),
    }
    if !config.noise.enabled {
        println!("Noise:      disabled");
    }
    println!();
    println!("Press Ctrl+C to stop.");
    println!();
}

/// Runs the session to completion, stopping it when `shutdown` fires.
async fn drive(
    model: &ReferenceModel,
    params: ScanParameters,
    session_config: SessionConfig,
    stop_timeout: Duration,
    shutdown: CancellationToken,
    show_deviations: bool,
) -> Result<SessionSummary, CliError> {
    let (session, events) = ScanSession::start(model, params, session_config)?;
    let progress = progress_bar();

    let summary = render_events(
        &session,
        events,
        &progress,
        &shutdown,
        stop_timeout,
        show_deviations,
    )
    .await?;
    progress.finish_and_clear();

    match summary {
        Some(summary) => Ok(summary),
        None => Ok(session.wait().await?),
    }
}

/// Renders events until `Completed`; returns `None` if the stream ends first.
async fn render_events(
    session: &ScanSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    progress: &ProgressBar,
    shutdown: &CancellationToken,
    stop_timeout: Duration,
    show_deviations: bool,
) -> Result<Option<SessionSummary>, CliError> {
    let mut stopping = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Completed(summary)) => return Ok(Some(summary)),
                Some(event) => render_event(event, progress, show_deviations),
                None => return Ok(None),
            },
            _ = shutdown.cancelled(), if !stopping => {
                stopping = true;
                progress.println(format!("{}", style("Stopping scan...").yellow()));
                if let Err(e) = session.stop(stop_timeout).await {
                    warn!(error = %e, "Scan session did not stop cleanly");
                    return Err(e.into());
                }
            }
        }
    }
}

fn render_event(event: SessionEvent, progress: &ProgressBar, show_deviations: bool) {
    match event {
        SessionEvent::Simulator(SimulatorEvent::Progress { current, total }) => {
            progress.set_length(total as u64);
            progress.set_position(current as u64);
        }
        SessionEvent::Simulator(SimulatorEvent::Failed(message)) => {
            progress.println(format!("{} Simulator: {}", style("✗").red(), message));
        }
        SessionEvent::Analysis(AnalysisEvent::Result(result))
            if show_deviations && result.status() != ErrorStatus::Qualified =>
        {
            progress.println(output::deviation_line(&result));
        }
        SessionEvent::Analysis(AnalysisEvent::Statistics(stats)) => {
            progress.set_message(output::statistics_message(&stats));
        }
        SessionEvent::Analysis(AnalysisEvent::Failed(message)) => {
            progress.println(format!("{} Analysis: {}", style("✗").red(), message));
        }
        _ => {}
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => warn!(error = %e, "Invalid progress template"),
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
