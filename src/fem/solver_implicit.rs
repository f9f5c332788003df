use super::{line_search, Bfgs, Constraint, ConvergenceControl, FemModel, LinearSystem, SolverState, StepFailure};
use crate::base::{Config, GlobalMatrix, GlobalResidual};
use crate::StrError;
use russell_lab::{vec_add, vec_copy, vec_inner, vec_update, Vector};

/// Defines the states of the quasi-Newton state machine
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolverStatus {
    /// The step has been prepared (prescribed increments computed, snapshot taken)
    Prepared,

    /// Iterating with the current factorization
    Iterating,

    /// The step converged
    Converged,

    /// The step failed and the state was rolled back
    Diverged,

    /// The stiffness has just been reformed
    Reformed,
}

/// Holds the outcome of a converged time step
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepSummary {
    /// Time at the end of the step
    pub t: f64,

    /// Number of quasi-Newton iterations (all augmentations)
    pub iterations: usize,

    /// Number of stiffness reformations (including the first one)
    pub reformations: usize,

    /// Number of augmentations
    pub augmentations: usize,

    /// The system was found unloaded before the first factorization
    pub no_force: bool,

    /// Squared norm of the final residual
    pub norm_rr: f64,
}

/// Implements the implicit quasi-Newton (BFGS) solver for one time step
///
/// Notation:
///
/// ```text
/// R  = F_ext - F_int                    residual
/// K  = ∂F_int/∂U                        stiffness
/// Ui = Σ s δ                            increment of the current step
/// Ut = Σ Ui                             total solution (converged steps)
/// Fd = -K_fp ū_p                        correction due to the prescribed increments ū_p
/// ```
///
/// Each iteration solves `K δ = R₀` with the BFGS-updated inverse, performs a line search along
/// δ, and checks convergence. The state of the model is updated non-cumulatively from the start
/// of the step, thus a failed step is undone by restoring the snapshot taken in `prep_step`.
pub struct SolverImplicit<'a> {
    /// Holds configuration parameters
    config: &'a Config,

    /// Holds the state of the state machine
    pub status: SolverStatus,

    /// Holds the time of the last converged step
    pub t: f64,

    /// Holds the time increment of the current step
    pub dt: f64,

    /// Holds the number of converged steps
    pub n_step: usize,

    /// Holds the total solution {Ut}
    pub ut: Vector,

    /// Holds the increment of the current step {Ui}
    pub ui: Vector,

    /// Holds the current residual R₁ (and the reactions side channel)
    out: GlobalResidual,

    /// Holds the residual at the start of the iteration R₀
    r0: Vector,

    /// Holds the residual correction due to prescribed increments
    fd: Vector,

    /// Holds the prescribed increments (zeroed after the first update)
    dup: Vector,

    /// Holds the prescribed values at the new time
    targets: Vec<f64>,

    /// Holds the trial increment Ui + s δ used by the line search
    trial: Vector,

    /// Holds the BFGS updates and the search direction δ
    bfgs: Bfgs,

    /// Holds the convergence norms
    control: ConvergenceControl<'a>,

    /// Holds the global stiffness and the linear solver
    linear_system: LinearSystem<'a>,

    /// Holds the contact generation corresponding to the stiffness profile
    generation: usize,

    /// Holds the state at the start of the current step
    snapshot: Option<SolverState>,

    /// Counters of the current step
    n_iteration: usize,
    n_reformation: usize,
}

impl<'a> SolverImplicit<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config, model: &FemModel) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate solver because config.validate() failed");
        }
        let neq = model.n_equation();
        let npres = model.equations.n_prescribed();
        let linear_system = LinearSystem::new(config, model.profile()?, model.symmetric())?;
        Ok(SolverImplicit {
            config,
            status: SolverStatus::Converged,
            t: config.t_ini,
            dt: config.dt,
            n_step: 0,
            ut: Vector::new(neq),
            ui: Vector::new(neq),
            out: GlobalResidual::new(neq, npres, model.bodies.len()),
            r0: Vector::new(neq),
            fd: Vector::new(neq),
            dup: Vector::new(npres),
            targets: vec![0.0; npres],
            trial: Vector::new(neq),
            bfgs: Bfgs::new(neq, config.cmax),
            control: ConvergenceControl::new(config, &model.equations.fields),
            linear_system,
            generation: model.contact_generation(),
            snapshot: None,
            n_iteration: 0,
            n_reformation: 0,
        })
    }

    /// Solves one time step ending at time t
    ///
    /// On success, the increment is accumulated into `ut` and the model state is committed.
    /// On failure, the model is restored to the start of the step and the failure is returned;
    /// the caller decides whether to retry (see [StepFailure::is_recoverable]).
    pub fn solve_step(&mut self, model: &mut FemModel, t: f64) -> Result<StepSummary, StepFailure> {
        self.prep_step(model, t)?;
        self.control.print_header(t, self.dt);
        match self.quasin(model, t) {
            Ok(summary) => {
                vec_update(&mut self.ut, 1.0, &self.ui)?;
                model.commit(self.dt);
                self.t = t;
                self.n_step += 1;
                self.snapshot = None;
                self.status = SolverStatus::Converged;
                Ok(summary)
            }
            Err(failure) => {
                log::warn!(
                    "step rejected at t = {:?} after {} iterations and {} reformations: {}",
                    t,
                    self.n_iteration,
                    self.n_reformation,
                    failure
                );
                self.rollback(model)?;
                self.status = SolverStatus::Diverged;
                Err(failure)
            }
        }
    }

    /// Prepares the step: takes the snapshot and computes the prescribed increments
    fn prep_step(&mut self, model: &mut FemModel, t: f64) -> Result<(), StepFailure> {
        if t <= self.t {
            return Err(StepFailure::Fatal("the time of the new step must be greater than the current time"));
        }
        self.dt = t - self.t;
        self.snapshot = Some(self.state(model));
        self.ui.fill(0.0);
        for (k, prescribed) in model.equations.prescribed.iter().enumerate() {
            self.targets[k] = prescribed.value(t);
        }
        for k in 0..self.targets.len() {
            self.dup[k] = self.targets[k] - model.prescribed_current(k);
        }
        model.set_time(t);
        model.update_constraints(0)?;
        self.control.reset();
        self.bfgs.reset();
        self.n_iteration = 0;
        self.n_reformation = 0;
        self.status = SolverStatus::Prepared;
        Ok(())
    }

    /// Runs the quasi-Newton iterations and the augmentation loop
    fn quasin(&mut self, model: &mut FemModel, t: f64) -> Result<StepSummary, StepFailure> {
        let config = self.config;

        // initial residual, including the effect of the prescribed increments
        model.residual(&mut self.out, t)?;
        self.assemble_stiffness(model)?;
        vec_add(&mut self.r0, 1.0, &self.out.rr, 1.0, &self.fd)?;
        if vec_inner(&self.r0, &self.r0) < config.rmin {
            // apply the prescribed values; they may activate contact
            self.apply_increment(model, 0)?;
            self.dup.fill(0.0);
            model.residual(&mut self.out, t)?;
            if vec_inner(&self.out.rr, &self.out.rr) < config.rmin {
                log::warn!("no force acting on the system");
                self.status = SolverStatus::Converged;
                return Ok(self.summary(t, 0, true));
            }
            self.assemble_stiffness(model)?;
            vec_copy(&mut self.r0, &self.out.rr)?;
        }
        self.factorize()?;
        self.status = SolverStatus::Iterating;

        let mut naug = 0;
        let mut initialize = true;
        loop {
            // search direction
            let ls = &mut self.linear_system;
            self.bfgs.solve(&self.r0, |x, rhs| ls.solve(x, rhs, false))?;
            if initialize {
                self.control.initialize(&self.r0, &self.bfgs.ui);
                initialize = false;
            }

            // line search
            let iteration = self.n_iteration;
            let energy_0 = vec_inner(&self.bfgs.ui, &self.r0);
            let s = {
                let delta = &self.bfgs.ui;
                let ui = &self.ui;
                let trial = &mut self.trial;
                let targets = &self.targets;
                let out = &mut self.out;
                line_search(config, energy_0, |s| {
                    vec_add(trial, 1.0, ui, s, delta)?;
                    model.update_kinematics(trial, targets)?;
                    model.update_constraints(iteration)?;
                    model.residual(out, t)?;
                    Ok(vec_inner(delta, &out.rr))
                })?
            };
            self.dup.fill(0.0);
            vec_update(&mut self.ui, s, &self.bfgs.ui)?;
            let verdict = self.control.check(iteration, s, &self.bfgs.ui, &self.out.rr, &self.ui);
            self.control.print_iteration(s);
            self.n_iteration += 1;

            // augmentations
            if verdict.converged {
                let mut done = true;
                for constraint in model.all_constraints_mut() {
                    if constraint.augmented() && !constraint.augment(naug)? {
                        done = false;
                    }
                }
                if done {
                    self.status = SolverStatus::Converged;
                    return Ok(self.summary(t, naug, verdict.no_force));
                }
                if naug >= config.max_augmentations {
                    return Err(StepFailure::AugmentationLimit { augmentations: naug });
                }
                naug += 1;
                log::debug!("augmentation {} at t = {:?}", naug, t);
                model.residual(&mut self.out, t)?;
                vec_copy(&mut self.r0, &self.out.rr)?;
                self.bfgs.reset();
                if config.max_ups == 0 {
                    self.reform(model)?;
                }
                initialize = true;
                continue;
            }

            // decide whether to reform the stiffness
            let mut reform = false;
            if verdict.small_step {
                log::debug!("line-search step {:?} is too small", s);
                reform = true;
            } else if verdict.diverging {
                log::warn!("diverging at iteration {}; reforming the stiffness", self.n_iteration);
                self.control.reset_reference();
                reform = true;
            }
            if !reform {
                if self.bfgs.n_updates() < config.max_ups {
                    if !self.bfgs.update(s, &self.r0, &self.out.rr)? {
                        log::warn!("BFGS update rejected at iteration {}", self.n_iteration);
                        reform = true;
                    }
                } else {
                    reform = true;
                }
            }
            if reform {
                if self.n_reformation >= config.max_refs {
                    return Err(StepFailure::NotConverged {
                        iterations: self.n_iteration,
                        reformations: self.n_reformation,
                    });
                }
                self.reform(model)?;
            }
            vec_copy(&mut self.r0, &self.out.rr)?;
        }
    }

    /// Assembles and factorizes the stiffness, discarding the BFGS updates
    fn reform(&mut self, model: &mut FemModel) -> Result<(), StepFailure> {
        self.assemble_stiffness(model)?;
        self.factorize()?;
        self.bfgs.reset();
        self.status = SolverStatus::Reformed;
        log::debug!("stiffness reformed ({} reformations)", self.n_reformation);
        Ok(())
    }

    /// Assembles the stiffness (rebuilding the profile if the contact pairs changed)
    fn assemble_stiffness(&mut self, model: &mut FemModel) -> Result<(), StepFailure> {
        let generation = model.contact_generation();
        if generation != self.generation {
            let profile = model.profile()?;
            self.linear_system = LinearSystem::new(self.config, profile, model.symmetric())?;
            self.generation = generation;
        }
        model.stiffness(&mut self.linear_system.kk, &mut self.fd, &self.dup)?;
        Ok(())
    }

    /// Factorizes the assembled stiffness and counts the reformation
    fn factorize(&mut self) -> Result<(), StepFailure> {
        self.linear_system.factorize(self.config)?;
        self.n_reformation += 1;
        Ok(())
    }

    /// Moves the model to the current increment plus the prescribed values
    fn apply_increment(&mut self, model: &mut FemModel, iteration: usize) -> Result<(), StepFailure> {
        model.update_kinematics(&self.ui, &self.targets)?;
        model.update_constraints(iteration)?;
        Ok(())
    }

    /// Returns the summary of the current step
    fn summary(&self, t: f64, augmentations: usize, no_force: bool) -> StepSummary {
        StepSummary {
            t,
            iterations: self.n_iteration,
            reformations: self.n_reformation,
            augmentations,
            no_force,
            norm_rr: vec_inner(&self.out.rr, &self.out.rr),
        }
    }

    /// Restores the state at the start of the current step
    fn rollback(&mut self, model: &mut FemModel) -> Result<(), StepFailure> {
        if let Some(state) = self.snapshot.take() {
            self.restore(model, &state)?;
        }
        Ok(())
    }

    /// Returns the current state of the simulation
    pub fn state(&self, model: &FemModel) -> SolverState {
        SolverState {
            t: self.t,
            n_step: self.n_step,
            ut: self.ut.clone(),
            nodes: model.mesh.nodes.clone(),
            bodies: model.bodies.clone(),
            contacts: model.contacts.clone(),
            constraints: model.constraints.clone(),
        }
    }

    /// Restores a state into the model (built from the same input)
    pub fn restore(&mut self, model: &mut FemModel, state: &SolverState) -> Result<(), StepFailure> {
        if state.nodes.len() != model.mesh.nodes.len()
            || state.bodies.len() != model.bodies.len()
            || state.contacts.len() != model.contacts.len()
            || state.constraints.len() != model.constraints.len()
            || state.ut.dim() != self.ut.dim()
        {
            return Err(StepFailure::Fatal("state is not compatible with the model"));
        }
        model.mesh.nodes.clone_from(&state.nodes);
        model.bodies.clone_from(&state.bodies);
        model.contacts.clone_from(&state.contacts);
        model.constraints.clone_from(&state.constraints);
        self.t = state.t;
        self.n_step = state.n_step;
        vec_copy(&mut self.ut, &state.ut)?;
        self.ui.fill(0.0);
        self.dup.fill(0.0);
        // the profile may correspond to contact pairs of the discarded iterations
        self.generation = usize::MAX;
        model.elements.update_stresses(&model.mesh)
    }

    /// Evaluates the residual and the stiffness at the current state (for inspection)
    pub fn evaluate(&mut self, model: &mut FemModel, t: f64) -> Result<(), StepFailure> {
        model.residual(&mut self.out, t)?;
        self.assemble_stiffness(model)
    }

    /// Returns the last computed residual
    pub fn residual(&self) -> &GlobalResidual {
        &self.out
    }

    /// Returns the last assembled stiffness
    pub fn stiffness(&self) -> &GlobalMatrix {
        &self.linear_system.kk
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
