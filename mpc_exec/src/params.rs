//! # MPC Executable Parameters
//!
//! This module provide parameters for the MPC executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;
use util::logger::LogLevel;

use crate::mpc_ctrl::{MpcCtrl, MpcCtrlError, OutputData};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct MpcExecParams {

    /// Minimum level of log records to output
    pub log_level: LogLevel,

    /// What to send to the vehicle when a solve does not succeed
    pub on_solve_failure: SolveFailurePolicy
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Action taken when MpcCtrl cannot produce a command from a successful solve.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum SolveFailurePolicy {
    /// Send the command decoded from the solver's best iterate
    UseBest,

    /// Send the previous cycle's command again
    HoldPrevious,

    /// Centre the steering and brake fully
    Stop
}

impl Default for SolveFailurePolicy {
    fn default() -> Self {
        SolveFailurePolicy::UseBest
    }
}

impl SolveFailurePolicy {
    /// Choose the command to send after a failed MpcCtrl cycle.
    ///
    /// Errors other than `SolveFailed` carry no solution, so `UseBest` falls
    /// back to holding the previous command, as it does when the best iterate
    /// is unusable. Holding with no previous command sends a stop.
    pub fn fallback(
        &self,
        mpc_ctrl: &MpcCtrl,
        error: &MpcCtrlError,
        prev_output: Option<&OutputData>
    ) -> OutputData {
        let hold = || prev_output.cloned().unwrap_or_else(OutputData::stop);

        match (self, error) {
            (SolveFailurePolicy::Stop, _) => OutputData::stop(),
            (SolveFailurePolicy::UseBest, MpcCtrlError::SolveFailed { solution, .. }) => {
                match mpc_ctrl.output_from_solution(solution) {
                    Some(o) => o,
                    None => {
                        warn!("Best iterate is unusable, holding the previous command");
                        hold()
                    }
                }
            },
            _ => hold()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mpc_ctrl::{Params, Solution, SolveStatus, VarLayout};
    use std::time::Duration;

    #[test]
    fn test_exec_params() {
        let p: MpcExecParams = util::params::from_str(
            "log_level = \"Info\"\non_solve_failure = \"Stop\""
        ).unwrap();
        assert_eq!(p.log_level, LogLevel::Info);
        assert_eq!(p.on_solve_failure, SolveFailurePolicy::Stop);

        let p: MpcExecParams = util::params::from_str("").unwrap();
        assert_eq!(p.log_level, LogLevel::Debug);
        assert_eq!(p.on_solve_failure, SolveFailurePolicy::UseBest);
    }

    fn failed_solve(status: SolveStatus, value: f64) -> MpcCtrlError {
        let layout = VarLayout::new(Params::default().horizon);
        MpcCtrlError::SolveFailed {
            status,
            solution: Box::new(Solution {
                status,
                vars: vec![value; layout.num_vars()],
                layout,
                cost: value,
                max_violation: value,
                outer_iterations: 2,
                inner_iterations: 40,
                solve_time: Duration::from_millis(5)
            })
        }
    }

    fn prev_command() -> OutputData {
        OutputData {
            steer_norm: 0.25,
            throttle: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_use_best() {
        let ctrl = MpcCtrl::from_params(Params::default()).unwrap();
        let prev = prev_command();

        // A usable iterate is decoded
        let out = SolveFailurePolicy::UseBest.fallback(
            &ctrl, &failed_solve(SolveStatus::TimeExceeded, 0.1), Some(&prev)
        );
        assert_eq!(out.throttle, 0.1);
        assert_eq!(out.predicted_x.len(), Params::default().horizon);

        // NaN iterates never reach the vehicle
        let err = failed_solve(SolveStatus::NumericalFailure, f64::NAN);
        let out = SolveFailurePolicy::UseBest.fallback(&ctrl, &err, Some(&prev));
        assert_eq!(out, prev);
        let out = SolveFailurePolicy::UseBest.fallback(&ctrl, &err, None);
        assert_eq!(out, OutputData::stop());
        assert!(serde_json::to_string(&out).unwrap().contains("\"steering_angle\":0.0"));
    }

    #[test]
    fn test_fallback_hold_and_stop() {
        let ctrl = MpcCtrl::from_params(Params::default()).unwrap();
        let prev = prev_command();
        let solve_err = failed_solve(SolveStatus::MaxIterations, 0.1);
        let fit_err = MpcCtrlError::DegenerateFit;

        let hold = SolveFailurePolicy::HoldPrevious;
        assert_eq!(hold.fallback(&ctrl, &solve_err, Some(&prev)), prev);
        assert_eq!(hold.fallback(&ctrl, &solve_err, None), OutputData::stop());

        let stop = SolveFailurePolicy::Stop;
        assert_eq!(stop.fallback(&ctrl, &solve_err, Some(&prev)), OutputData::stop());
        assert_eq!(stop.fallback(&ctrl, &fit_err, Some(&prev)), OutputData::stop());

        // Failures before the solve hold the previous command
        let best = SolveFailurePolicy::UseBest;
        assert_eq!(best.fallback(&ctrl, &fit_err, Some(&prev)), prev);
        assert_eq!(best.fallback(&ctrl, &fit_err, None), OutputData::stop());
    }
}
