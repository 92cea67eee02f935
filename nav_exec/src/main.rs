//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Open and initialise all hardware (Raspberry Pi or simulated)
//!     - Start one worker per sensor
//!     - Main loop, until SIGINT/SIGTERM or the run time elapses:
//!         - Obstacle check on the front range sensor
//!         - Obstacle avoidance or line steering
//!     - Join all workers, stop the motors, archive the run summary

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use structopt::StructOpt;

// Internal
use hw_if::MotorActuator;
use nav_lib::{hardware::Hardware, orchestrator::Orchestrator, params::NavExecParams};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Line following robot navigation executable.
#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec")]
struct Opt {
    /// Use simulated hardware instead of the Raspberry Pi peripherals.
    #[structopt(long)]
    sim: bool,

    /// Parameter file, relative to the params directory unless absolute.
    #[structopt(long, default_value = "nav_exec.toml")]
    params: String,

    /// Stop automatically after this many seconds.
    #[structopt(long)]
    run_time: Option<f64>,

    /// Log at trace level.
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // Initialise session
    let session = Session::new("nav_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Exit the session whatever the result
    let result = exec(opt, &session);

    info!("End of execution");
    session.exit();

    result
}

/// Everything between session creation and session exit.
fn exec(opt: Opt, session: &Session) -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise logger
    let level = match opt.verbose {
        true => LevelFilter::Trace,
        false => LevelFilter::Debug,
    };
    logger_init(level, session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Line Follower Navigation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: NavExecParams = util::params::load(&opt.params)
        .wrap_err_with(|| format!("Could not load parameters from {}", opt.params))?;

    info!("Exec parameters loaded");

    // ---- SIGNALS ----

    let terminate = Arc::new(AtomicBool::new(false));
    {
        let t = terminate.clone();
        ctrlc::set_handler(move || {
            info!("Termination signal received");
            t.store(true, Ordering::SeqCst);
        })
        .wrap_err("Failed to install the signal handler")?;
    }

    let run_time = opt.run_time.map(|s| Duration::from_secs_f64(s.max(0.0)));

    // ---- HARDWARE AND MAIN LOOP ----

    if opt.sim {
        info!("Using simulated hardware");
        let (hw, sim) = Hardware::simulated(&params);

        // Put the simulated robot on the line
        sim.line_inner[1].set(true);

        run(params, hw, terminate, run_time, session)
    } else {
        let hw = Hardware::raspberry_pi(&params)
            .wrap_err("Failed to initialise the Raspberry Pi hardware")?;

        run(params, hw, terminate, run_time, session)
    }
}

/// Run the navigation core on the given hardware until termination.
fn run<M: MotorActuator>(
    params: NavExecParams,
    hw: Hardware<M>,
    terminate: Arc<AtomicBool>,
    run_time: Option<Duration>,
    session: &Session,
) -> Result<(), Report> {
    let mut orch = Orchestrator::start(params, hw, terminate)
        .wrap_err("Failed to start the sensor workers")?;

    if let Err(e) = orch.run(run_time) {
        warn!("Control loop error: {}", e);
    }

    let summary = orch.shutdown().wrap_err("Failed to shut down cleanly")?;

    info!(
        "Run summary: {} cycles in {:.1} s, {} steering commands, {}/{} obstacles avoided",
        summary.cycles,
        summary.run_time_s,
        summary.steer_cmds,
        summary.obstacle_mnvrs_completed,
        summary.obstacle_mnvrs
    );
    session.save("run_summary.json", summary);

    Ok(())
}
