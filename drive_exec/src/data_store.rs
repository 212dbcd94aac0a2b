//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::cmd::ActuatorCmd;
use crate::drive_mgr;
use crate::kin::ChassisSpeeds;
use crate::sim;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session-elapsed time at the start of this cycle
    pub cycle_time_s: f64,

    // Drivetrain simulation (pose source stand-in)
    pub sim: sim::Sim,
    pub sim_input: sim::InputData,
    pub sim_output: sim::OutputData,
    pub sim_status_rpt: sim::StatusReport,

    // Drive manager cycle data
    pub actuator_cmd: ActuatorCmd,
    pub drive_status_rpt: drive_mgr::StatusReport,

    // Operator inputs (polled once per cycle)
    pub teleop: bool,
    pub operator_cmd: ChassisSpeeds,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and
    /// sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.actuator_cmd = ActuatorCmd::default();
        self.drive_status_rpt = drive_mgr::StatusReport::default();

        self.cycle_time_s = util::session::get_elapsed_seconds();
    }
}
