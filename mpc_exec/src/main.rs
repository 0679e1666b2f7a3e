//! Main MPC executable entry point.
//!
//! # Architecture
//!
//! The executable reads telemetry records, one JSON object per line, from the
//! file given as its only argument or from stdin if no argument is given. For
//! each record:
//!
//!     - MpcCtrl processing computes the command
//!     - The solve failure policy is applied if the solve did not succeed
//!     - MpcCtrl archives are written
//!     - The command is written to stdout as a single JSON line
//!
//! Logs go to stderr and the session log file so that stdout carries only
//! commands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, error, info, warn};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

// Internal
use mpc_lib::{
    mpc_ctrl::{InputData, MpcCtrl, MpcCtrlError, OutputData},
    params::MpcExecParams
};
use util::{
    archive::Archived,
    logger::logger_init,
    module::State,
    session::Session
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "mpc_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Load exec parameters, needed for the log level
    let exec_params: MpcExecParams = util::params::load(
        "mpc_exec.toml"
    ).wrap_err("Could not load exec params")?;

    // Initialise logger
    logger_init(exec_params.log_level.into(), &session)
        .wrap_err("Failed to initialise logging")?;

    info!("MPC Executable\n");
    info!("Session directory: {:?}", session.session_root);
    info!("Exec parameters: {:?}\n", exec_params);

    // ---- TELEMETRY SOURCE ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let telemetry: Box<dyn BufRead> = match args.len() {
        1 => {
            info!("Reading telemetry from stdin");
            Box::new(BufReader::new(io::stdin()))
        },
        2 => {
            info!("Reading telemetry from \"{}\"", &args[1]);
            Box::new(BufReader::new(
                File::open(&args[1])
                    .wrap_err_with(|| format!("Cannot open telemetry file {}", &args[1]))?
            ))
        },
        n => return Err(eyre!(
            "Expected either zero or one argument, found {}", n - 1
        ))
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut mpc_ctrl = MpcCtrl::default();
    mpc_ctrl.init("mpc_ctrl.toml", &session)
        .wrap_err("Failed to initialise MpcCtrl")?;
    info!("MpcCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let stdout = io::stdout();
    let mut cmd_out = stdout.lock();
    let mut prev_output: Option<OutputData> = None;
    let mut num_cycles = 0usize;

    for (line_idx, line) in telemetry.lines().enumerate() {
        let line = line.wrap_err("Failed to read telemetry")?;

        if line.trim().is_empty() {
            continue
        }

        let input: InputData = match serde_json::from_str(&line) {
            Ok(i) => i,
            Err(e) => {
                warn!("Skipping malformed telemetry on line {}: {}", line_idx + 1, e);
                continue
            }
        };

        let output = match mpc_ctrl.proc(&input) {
            Ok((o, r)) => {
                debug!(
                    "Cycle {}: {:?} in {:.3} s",
                    num_cycles, r.solve_status, r.solve_time_s
                );
                o
            },
            Err(e) => {
                match &e {
                    MpcCtrlError::SolveFailed { status, .. } => warn!(
                        "Solve failed with {:?}, applying {:?} policy",
                        status, exec_params.on_solve_failure
                    ),
                    _ => error!("MpcCtrl processing failed: {}", e)
                }
                exec_params.on_solve_failure.fallback(&mpc_ctrl, &e, prev_output.as_ref())
            }
        };

        // Archive the cycle
        if let Err(e) = mpc_ctrl.write() {
            warn!("Could not write MpcCtrl archives: {}", e);
        }

        // Send the command
        serde_json::to_writer(&mut cmd_out, &output)
            .wrap_err("Failed to serialise the command")?;
        writeln!(cmd_out).wrap_err("Failed to write the command")?;
        cmd_out.flush().wrap_err("Failed to flush the command output")?;

        prev_output = Some(output);
        num_cycles += 1;
    }

    info!("End of telemetry after {} cycles", num_cycles);

    Ok(())
}
