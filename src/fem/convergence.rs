use crate::base::{Config, FieldEquations};
use russell_lab::{vec_inner, Vector};

/// Holds the verdict of a convergence check
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Convergence {
    /// All enabled criteria are satisfied
    pub converged: bool,

    /// The energy norm exceeds its running maximum
    pub diverging: bool,

    /// The line-search step is below `ls_min`
    pub small_step: bool,

    /// The residual is below `rmin` (no force acting on the system)
    pub no_force: bool,
}

/// Holds the increment norms of one physics field
struct FieldNorm {
    name: String,
    equations: Vec<usize>,
    tol: f64,
    norm_d: f64,
    norm_u: f64,
}

/// Controls the convergence of the quasi-Newton iterations
///
/// All norms are squared except the energy norms. The reference values (`norm_ri`, `norm_ei`)
/// are taken at the first iteration of a step and replaced when divergence is detected.
pub struct ConvergenceControl<'a> {
    config: &'a Config,
    fields: Vec<FieldNorm>,
    iteration: usize,
    norm_ri: f64,
    norm_ei: f64,
    norm_em: f64,
    norm_r1: f64,
    norm_e1: f64,
    last: Convergence,
}

impl<'a> ConvergenceControl<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config, fields: &FieldEquations) -> Self {
        let mut all = vec![FieldNorm::new("displacement", &fields.displacement, config.dtol)];
        if !fields.pressure.is_empty() {
            all.push(FieldNorm::new("pressure", &fields.pressure, config.ptol));
        }
        for (i, eqs) in fields.solutes.iter().enumerate() {
            if !eqs.is_empty() {
                all.push(FieldNorm::new(&format!("concentration {}", i + 1), eqs, config.ctol));
            }
        }
        ConvergenceControl {
            config,
            fields: all,
            iteration: 0,
            norm_ri: 0.0,
            norm_ei: 0.0,
            norm_em: 0.0,
            norm_r1: 0.0,
            norm_e1: 0.0,
            last: Convergence::default(),
        }
    }

    /// Resets all norms at the start of a time step
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.norm_ri = 0.0;
        self.norm_ei = 0.0;
        self.norm_em = 0.0;
        self.norm_r1 = 0.0;
        self.norm_e1 = 0.0;
        self.last = Convergence::default();
        for field in &mut self.fields {
            field.norm_d = 0.0;
            field.norm_u = 0.0;
        }
    }

    /// Records the reference norms at the first iteration
    ///
    /// `r0` is the initial residual and `delta` the first search direction.
    pub fn initialize(&mut self, r0: &Vector, delta: &Vector) {
        self.norm_ri = vec_inner(r0, r0);
        self.norm_ei = f64::abs(vec_inner(delta, r0));
        self.norm_em = self.norm_ei;
    }

    /// Evaluates the norms after a line search and checks convergence
    ///
    /// # Input
    ///
    /// * `iteration` -- the iteration number (starting at zero)
    /// * `s` -- the line-search step
    /// * `delta` -- the search direction
    /// * `r1` -- the residual after the step
    /// * `ui` -- the accumulated increment of the time step (including this iteration)
    pub fn check(&mut self, iteration: usize, s: f64, delta: &Vector, r1: &Vector, ui: &Vector) -> Convergence {
        let config = self.config;
        self.iteration = iteration;
        self.norm_r1 = vec_inner(r1, r1);
        self.norm_e1 = s * f64::abs(vec_inner(delta, r1));
        for field in &mut self.fields {
            field.norm_d = s * s * squared_norm(delta, &field.equations);
            field.norm_u = squared_norm(ui, &field.equations);
        }

        let mut converged = true;
        if config.rtol > 0.0 && self.norm_r1 > config.rtol * self.norm_ri {
            converged = false;
        }
        if config.etol > 0.0 && self.norm_e1 > config.etol * self.norm_ei {
            converged = false;
        }
        for field in &self.fields {
            if field.tol > 0.0 && field.norm_d > field.tol * field.tol * field.norm_u {
                converged = false;
            }
        }
        let small_step = config.ls_tol > 0.0 && s < config.ls_min;
        if small_step {
            converged = false;
        }
        let diverging = self.norm_e1 > self.norm_em;
        if diverging {
            converged = false;
        }
        let no_force = self.norm_r1 < config.rmin;
        if no_force {
            converged = true;
        }
        self.norm_em = f64::max(self.norm_em, self.norm_e1);
        self.last = Convergence {
            converged,
            diverging,
            small_step,
            no_force,
        };
        self.last
    }

    /// Replaces the reference norms by the current ones (after divergence)
    pub fn reset_reference(&mut self) {
        self.norm_ri = self.norm_r1;
        self.norm_ei = self.norm_e1;
        self.norm_em = self.norm_e1;
    }

    /// Returns the squared norm of the initial residual
    pub fn norm_ri(&self) -> f64 {
        self.norm_ri
    }

    /// Returns the squared norm of the current residual
    pub fn norm_r1(&self) -> f64 {
        self.norm_r1
    }

    /// Returns the current energy norm
    pub fn norm_e1(&self) -> f64 {
        self.norm_e1
    }

    /// Prints the header of the table of iterations
    pub(crate) fn print_header(&self, t: f64, dt: f64) {
        if self.config.verbose_iterations {
            println!("\ntime = {:.6e}, Δt = {:.6e}", t, dt);
            println!("{}", "─".repeat(79));
            println!(
                "{:>5} {:>9} {:>10} {:>10} {:>10} {:>10}  {}",
                "iter", "s", "‖R‖²", "‖R₀‖²", "energy", "energy₀", "status"
            );
            println!("{}", "─".repeat(79));
        }
    }

    /// Prints the norms of the last iteration
    pub(crate) fn print_iteration(&self, s: f64) {
        if self.config.verbose_iterations {
            let status = if self.last.no_force {
                "no force"
            } else if self.last.converged {
                "converged"
            } else if self.last.diverging {
                "diverging"
            } else if self.last.small_step {
                "small step"
            } else {
                "·"
            };
            println!(
                "{:>5} {:>9.3e} {:>10.3e} {:>10.3e} {:>10.3e} {:>10.3e}  {}",
                self.iteration + 1,
                s,
                self.norm_r1,
                self.norm_ri,
                self.norm_e1,
                self.norm_ei,
                status
            );
            for field in &self.fields {
                println!(
                    "{:>5} {:>20} {:>10.3e} {:>10.3e}",
                    "", field.name, field.norm_d, field.norm_u
                );
            }
        }
    }
}

impl FieldNorm {
    fn new(name: &str, equations: &[usize], tol: f64) -> Self {
        FieldNorm {
            name: name.to_string(),
            equations: equations.to_vec(),
            tol,
            norm_d: 0.0,
            norm_u: 0.0,
        }
    }
}

fn squared_norm(u: &Vector, equations: &[usize]) -> f64 {
    equations.iter().map(|eq| u[*eq] * u[*eq]).sum()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
