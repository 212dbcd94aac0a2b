//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Pose and velocity acquisition from the pose source
//!         - Operator input polling
//!         - Drive manager processing (mode arbitration, trajectory
//!           tracking, kinematic conversion)
//!         - Actuator command output
//!         - Telemetry reporting
//!
//! The loop runs at a fixed period driven by an external tick; here a
//! simple sleep-based cycle stands in for it. A kinematic simulation plays
//! the roles of both pose source and actuator sink, closing the loop.
//!
//! With no arguments a demo mission is generated from the `traj_gen.toml`
//! parameters. A single argument gives the path to a serialized trajectory
//! to follow instead.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{
    cmd::ActuatorCmd,
    data_store::DataStore,
    drive_mgr::{DriveMgr, DriveMode, InputData},
    sim,
    traj::{gen, Trajectory},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Factor of the trajectory duration after which a run that has not
/// converged is abandoned.
const COMPLETION_TIMEOUT_FACTOR: f64 = 4.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Hermes Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.sim
        .init("sim.toml", &session)
        .wrap_err("Failed to initialise Sim")?;
    info!("Sim init complete");

    let mut drive_mgr =
        DriveMgr::init("drive_mgr.toml").wrap_err("Failed to initialise DriveMgr")?;
    info!("DriveMgr init complete");

    info!("Module initialisation complete\n");

    // ---- TRAJECTORY SOURCE ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    let trajectory = match args.len() {
        // If we have a single argument use it as a serialized trajectory
        // path
        2 => {
            info!("Loading trajectory from \"{}\"", &args[1]);
            Trajectory::load(&args[1]).wrap_err("Failed to load trajectory")?
        }
        // If no arguments generate the demo mission from parameters
        1 => {
            info!("No trajectory provided, generating demo mission");

            let mission: gen::MissionParams = util::params::load("traj_gen.toml")
                .wrap_err("Could not load trajectory generation params")?;

            let kinematics = mission
                .drivetrain
                .build()
                .wrap_err("Invalid mission drivetrain")?;

            gen::generate(&mission.waypoint_poses(), &mission.config, kinematics.as_ref())
                .wrap_err("Failed to generate mission trajectory")?
        }
        _ => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                args.len() - 1
            ))
        }
    };

    // Replay the path shape from wherever the robot currently is
    let trajectory = trajectory.anchored_at(&ds.sim.pose());

    info!(
        "Trajectory ready: {} states over {:.2} s\n",
        trajectory.num_states(),
        trajectory.duration_s()
    );

    // Record the mission for later inspection (best effort, background)
    session.save("trajectory.json", trajectory.states().to_vec());

    // ---- TELEMETRY ----

    let mut tm_arch_dir = session.arch_root.clone();
    tm_arch_dir.push("drive_mgr");
    std::fs::create_dir_all(tm_arch_dir).wrap_err("Failed to create telemetry archive dir")?;

    let mut arch_tm = Archiver::from_path(&session, "drive_mgr/tm.csv")
        .map_err(|e| eyre!("Failed to create telemetry archive: {}", e))?;

    // ---- MAIN LOOP ----

    let timeout_s = trajectory.duration_s() * COMPLETION_TIMEOUT_FACTOR + 5.0;
    drive_mgr.set_trajectory(trajectory, util::session::get_elapsed_seconds());

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- DATA INPUT ----

        let input = InputData {
            time_s: ds.cycle_time_s,
            pose: ds.sim.pose(),
            chassis_speeds: ds.sim.chassis_speeds(),
            teleop: ds.teleop,
            operator_cmd: ds.operator_cmd,
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        match drive_mgr.proc(&input) {
            Ok((cmd, report)) => {
                ds.actuator_cmd = cmd;
                ds.drive_status_rpt = report;
            }
            Err(e) => {
                // A processing error stops the robot: the worst failure
                // mode is zero output
                warn!("Error during DriveMgr processing: {}", e);
                ds.actuator_cmd = ActuatorCmd::Stop;
            }
        }

        // ---- ACTUATOR OUTPUT ----

        ds.sim_input = sim::InputData {
            cmd: ds.actuator_cmd.clone(),
            dt_s: CYCLE_PERIOD_S,
        };

        match ds.sim.proc(&ds.sim_input) {
            Ok((output, report)) => {
                ds.sim_output = output;
                ds.sim_status_rpt = report;
            }
            Err(e) => warn!("Error during Sim processing: {}", e),
        }

        // ---- TELEMETRY ----

        // Best effort only, failures must never affect control
        if let Err(e) = arch_tm.serialise(&ds.drive_status_rpt.tm) {
            warn!("Could not archive telemetry: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        if drive_mgr.mode() == DriveMode::Done {
            info!(
                "Autonomous operation complete after {} cycles\n",
                ds.num_cycles
            );
            break;
        }

        if ds.cycle_time_s > timeout_s {
            warn!(
                "Trajectory did not complete within {:.1} s, stopping",
                timeout_s
            );
            break;
        }

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    session.exit();

    Ok(())
}
