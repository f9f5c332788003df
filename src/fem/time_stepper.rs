use super::{FemModel, SolverImplicit, StepFailure, StepSummary};
use crate::base::Config;
use crate::StrError;

/// Largest relative growth of the time increment after a quick step
const MAX_GROWTH: f64 = 0.2;

/// Drives the implicit solver from t_ini to t_fin with an adaptive time increment
///
/// A step failing with a recoverable error is retried with half the time increment, down to
/// `dt_min` and at most `max_retries` times in a row. After a step converging without retries,
/// the increment is scaled with `sqrt(opt_iter / iterations)`: it grows towards `dt_max` when
/// the step needed fewer iterations than `opt_iter` and shrinks otherwise.
pub struct TimeStepper<'a> {
    /// Holds configuration parameters
    config: &'a Config,

    /// Holds the implicit solver
    pub solver: SolverImplicit<'a>,

    /// Holds the current time increment
    pub dt: f64,

    /// Holds the summaries of all converged steps
    pub history: Vec<StepSummary>,

    /// Holds the number of failed attempts
    pub n_failure: usize,

    /// Holds the directory and the filename stem of the state files (if enabled)
    output: Option<(String, String)>,
}

impl<'a> TimeStepper<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config, model: &FemModel) -> Result<Self, StrError> {
        let solver = SolverImplicit::new(config, model)?;
        Ok(TimeStepper {
            config,
            solver,
            dt: config.dt,
            history: Vec::new(),
            n_failure: 0,
            output: None,
        })
    }

    /// Enables writing the state (JSON) after each converged step
    ///
    /// The files are named `{directory}/{stem}-{step:0>8}.json`.
    pub fn set_output(&mut self, directory: &str, stem: &str) -> &mut Self {
        self.output = Some((directory.to_string(), stem.to_string()));
        self
    }

    /// Returns the path of the state file of a step
    pub fn path_state(&self, step: usize) -> Option<String> {
        self.output
            .as_ref()
            .map(|(dir, stem)| format!("{}/{}-{:0>8}.json", dir, stem, step))
    }

    /// Runs all time steps
    pub fn run(&mut self, model: &mut FemModel) -> Result<(), StepFailure> {
        let config = self.config;
        let tiny = 1e-12 * f64::max(1.0, config.t_fin);
        while self.solver.t < config.t_fin - tiny {
            let mut dt = f64::min(self.dt, config.t_fin - self.solver.t);
            let mut retries = 0;
            let summary = loop {
                let t = self.solver.t + dt;
                match self.solver.solve_step(model, t) {
                    Ok(summary) => break summary,
                    Err(failure) => {
                        self.n_failure += 1;
                        if !failure.is_recoverable() || retries >= config.max_retries || dt / 2.0 < config.dt_min {
                            return Err(failure);
                        }
                        retries += 1;
                        dt /= 2.0;
                        log::warn!("retrying with Δt = {:?} (retry {})", dt, retries);
                    }
                }
            };
            if config.verbose_timesteps {
                println!(
                    "t = {:.6e}, Δt = {:.6e}, iterations = {}, reformations = {}",
                    summary.t, dt, summary.iterations, summary.reformations
                );
            }
            if let Some(path) = self.path_state(self.solver.n_step) {
                self.solver.state(model).write_json(&path)?;
            }
            self.history.push(summary);
            self.dt = if retries > 0 { dt } else { self.next_dt(dt, summary.iterations) };
        }
        Ok(())
    }

    /// Computes the time increment of the next step after a step converging without retries
    fn next_dt(&self, dt: f64, iterations: usize) -> f64 {
        let config = self.config;
        let scale = f64::sqrt(config.opt_iter as f64 / usize::max(iterations, 1) as f64);
        let next = if iterations > config.opt_iter {
            dt * scale
        } else {
            dt + (config.dt_max - dt) * f64::min(MAX_GROWTH, scale - 1.0)
        };
        f64::max(config.dt_min, f64::min(config.dt_max, next))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
