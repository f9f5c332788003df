use crate::StrError;
use russell_sparse::{Genie, LinSolParams};
use std::fmt;

/// Defines the smallest allowed dt_min
pub const CONFIG_MIN_DT_MIN: f64 = 1e-10;

/// Defines the largest allowed condition number of a BFGS update
pub const CONFIG_MAX_CMAX: f64 = 1e20;

/// Holds the options of the nonlinear solver and the time stepper
///
/// All tolerances are disabled when set to zero (or a negative value).
#[derive(Clone, Debug)]
pub struct Config {
    /// Relative residual tolerance (on squared norms)
    pub rtol: f64,

    /// Relative energy tolerance
    pub etol: f64,

    /// Relative displacement tolerance
    pub dtol: f64,

    /// Relative pressure tolerance
    pub ptol: f64,

    /// Relative concentration tolerance (each solute)
    pub ctol: f64,

    /// Squared residual norm below which the system is considered unloaded
    pub rmin: f64,

    /// Maximum number of BFGS updates before a reformation
    pub max_ups: usize,

    /// Maximum number of stiffness reformations per step
    pub max_refs: usize,

    /// Maximum number of augmentations per step
    pub max_augmentations: usize,

    /// Line-search tolerance (zero disables the line search)
    pub ls_tol: f64,

    /// Minimum line-search step
    pub ls_min: f64,

    /// Maximum number of line-search iterations
    pub ls_iter: usize,

    /// Maximum condition number of a BFGS update
    pub cmax: f64,

    /// Linear solver
    pub lin_sol_genie: Genie,

    /// Parameters for the linear solver
    pub lin_sol_params: LinSolParams,

    /// Assume a symmetric global stiffness matrix if all contributions are symmetric
    pub symmetric_stiffness: bool,

    /// Initial time
    pub t_ini: f64,

    /// Final time
    pub t_fin: f64,

    /// Initial time increment
    pub dt: f64,

    /// Minimum time increment
    pub dt_min: f64,

    /// Maximum time increment
    pub dt_max: f64,

    /// Maximum number of retries (with halved time increments) per step
    pub max_retries: usize,

    /// Optimal number of iterations; the time increment grows when a step needs fewer
    pub opt_iter: usize,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            rtol: 0.0,
            etol: 0.01,
            dtol: 0.001,
            ptol: 0.01,
            ctol: 0.01,
            rmin: 1e-20,
            max_ups: 10,
            max_refs: 15,
            max_augmentations: 50,
            ls_tol: 0.9,
            ls_min: 0.01,
            ls_iter: 5,
            cmax: 1e5,
            lin_sol_genie: Genie::Umfpack,
            lin_sol_params: LinSolParams::new(),
            symmetric_stiffness: true,
            t_ini: 0.0,
            t_fin: 1.0,
            dt: 0.1,
            dt_min: 1e-6,
            dt_max: 0.1,
            max_retries: 5,
            opt_iter: 10,
            verbose_timesteps: false,
            verbose_iterations: false,
        }
    }

    /// Sets the residual tolerance and the "no force" threshold
    pub fn set_residual_tol(&mut self, rtol: f64, rmin: f64) -> Result<&mut Self, StrError> {
        if rmin < 0.0 {
            return Err("rmin must be ≥ 0.0");
        }
        self.rtol = rtol;
        self.rmin = rmin;
        Ok(self)
    }

    /// Sets the energy, displacement, pressure, and concentration tolerances
    pub fn set_tolerances(&mut self, etol: f64, dtol: f64, ptol: f64, ctol: f64) -> Result<&mut Self, StrError> {
        if etol <= 0.0 && dtol <= 0.0 && ptol <= 0.0 && ctol <= 0.0 && self.rtol <= 0.0 {
            return Err("at least one convergence tolerance must be > 0.0");
        }
        self.etol = etol;
        self.dtol = dtol;
        self.ptol = ptol;
        self.ctol = ctol;
        Ok(self)
    }

    /// Sets the maximum number of BFGS updates and stiffness reformations
    pub fn set_max_updates(&mut self, max_ups: usize, max_refs: usize) -> Result<&mut Self, StrError> {
        if max_refs < 1 {
            return Err("max_refs must be ≥ 1");
        }
        self.max_ups = max_ups;
        self.max_refs = max_refs;
        Ok(self)
    }

    /// Sets the maximum number of augmentations per step
    pub fn set_max_augmentations(&mut self, value: usize) -> Result<&mut Self, StrError> {
        self.max_augmentations = value;
        Ok(self)
    }

    /// Sets the line-search parameters
    pub fn set_line_search(&mut self, ls_tol: f64, ls_min: f64, ls_iter: usize) -> Result<&mut Self, StrError> {
        if ls_tol < 0.0 {
            return Err("ls_tol must be ≥ 0.0");
        }
        if ls_min <= 0.0 || ls_min > 1.0 {
            return Err("ls_min must be in (0.0, 1.0]");
        }
        self.ls_tol = ls_tol;
        self.ls_min = ls_min;
        self.ls_iter = ls_iter;
        Ok(self)
    }

    /// Sets the maximum condition number of a BFGS update
    pub fn set_cmax(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 1.0 || value > CONFIG_MAX_CMAX {
            return Err("cmax must be in (1.0, 1e20]");
        }
        self.cmax = value;
        Ok(self)
    }

    /// Sets the linear solver
    pub fn set_lin_sol_genie(&mut self, genie: Genie) -> Result<&mut Self, StrError> {
        self.lin_sol_genie = genie;
        Ok(self)
    }

    /// Sets the symmetric-stiffness flag
    pub fn set_symmetric_stiffness(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.symmetric_stiffness = flag;
        Ok(self)
    }

    /// Sets the initial and final times
    pub fn set_time(&mut self, t_ini: f64, t_fin: f64) -> Result<&mut Self, StrError> {
        if t_ini < 0.0 {
            return Err("t_ini must be ≥ 0.0");
        }
        if t_fin <= t_ini {
            return Err("t_fin must be > t_ini");
        }
        self.t_ini = t_ini;
        self.t_fin = t_fin;
        Ok(self)
    }

    /// Sets the initial, minimum, and maximum time increments
    pub fn set_dt(&mut self, dt: f64, dt_min: f64, dt_max: f64) -> Result<&mut Self, StrError> {
        if dt_min < CONFIG_MIN_DT_MIN {
            return Err("dt_min must be ≥ 1e-10");
        }
        if dt < dt_min || dt > dt_max {
            return Err("dt must satisfy dt_min ≤ dt ≤ dt_max");
        }
        self.dt = dt;
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        Ok(self)
    }

    /// Sets the retry and step-growth options of the time stepper
    pub fn set_time_stepping(&mut self, max_retries: usize, opt_iter: usize) -> Result<&mut Self, StrError> {
        if opt_iter < 1 {
            return Err("opt_iter must be ≥ 1");
        }
        self.max_retries = max_retries;
        self.opt_iter = opt_iter;
        Ok(self)
    }

    /// Sets the verbose flags
    pub fn set_verbose(&mut self, timesteps: bool, iterations: bool) -> Result<&mut Self, StrError> {
        self.verbose_timesteps = timesteps;
        self.verbose_iterations = iterations;
        Ok(self)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.rmin < 0.0 {
            return Some(format!("rmin = {:?} is incorrect; it must be ≥ 0.0", self.rmin));
        }
        if self.rtol <= 0.0 && self.etol <= 0.0 && self.dtol <= 0.0 && self.ptol <= 0.0 && self.ctol <= 0.0 {
            return Some("all convergence tolerances are disabled; at least one must be > 0.0".to_string());
        }
        if self.max_refs < 1 {
            return Some(format!("max_refs = {} is incorrect; it must be ≥ 1", self.max_refs));
        }
        if self.ls_tol < 0.0 {
            return Some(format!("ls_tol = {:?} is incorrect; it must be ≥ 0.0", self.ls_tol));
        }
        if self.ls_min <= 0.0 || self.ls_min > 1.0 {
            return Some(format!("ls_min = {:?} is incorrect; it must be in (0.0, 1.0]", self.ls_min));
        }
        if self.cmax <= 1.0 || self.cmax > CONFIG_MAX_CMAX {
            return Some(format!("cmax = {:?} is incorrect; it must be in (1.0, 1e20]", self.cmax));
        }
        if self.t_fin <= self.t_ini {
            return Some(format!(
                "t_fin = {:?} is incorrect; it must be > t_ini = {:?}",
                self.t_fin, self.t_ini
            ));
        }
        if self.dt_min < CONFIG_MIN_DT_MIN {
            return Some(format!(
                "dt_min = {:?} is incorrect; it must be ≥ {:e}",
                self.dt_min, CONFIG_MIN_DT_MIN
            ));
        }
        if self.dt < self.dt_min || self.dt > self.dt_max {
            return Some(format!(
                "dt = {:?} is incorrect; it must satisfy {:?} ≤ dt ≤ {:?}",
                self.dt, self.dt_min, self.dt_max
            ));
        }
        if self.opt_iter < 1 {
            return Some(format!("opt_iter = {} is incorrect; it must be ≥ 1", self.opt_iter));
        }
        None // all good
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n").unwrap();
        write!(f, "==================\n").unwrap();
        write!(f, "rtol = {:?}, rmin = {:?}\n", self.rtol, self.rmin).unwrap();
        write!(
            f,
            "etol = {:?}, dtol = {:?}, ptol = {:?}, ctol = {:?}\n",
            self.etol, self.dtol, self.ptol, self.ctol
        )
        .unwrap();
        write!(
            f,
            "max_ups = {}, max_refs = {}, max_augmentations = {}\n",
            self.max_ups, self.max_refs, self.max_augmentations
        )
        .unwrap();
        write!(
            f,
            "ls_tol = {:?}, ls_min = {:?}, ls_iter = {}\n",
            self.ls_tol, self.ls_min, self.ls_iter
        )
        .unwrap();
        write!(f, "cmax = {:?}\n", self.cmax).unwrap();
        write!(f, "lin_sol_genie = {:?}\n", self.lin_sol_genie).unwrap();
        write!(f, "symmetric_stiffness = {:?}\n", self.symmetric_stiffness).unwrap();
        write!(f, "\nTime stepping\n").unwrap();
        write!(f, "=============\n").unwrap();
        write!(f, "t_ini = {:?}, t_fin = {:?}\n", self.t_ini, self.t_fin).unwrap();
        write!(
            f,
            "dt = {:?}, dt_min = {:?}, dt_max = {:?}\n",
            self.dt, self.dt_min, self.dt_max
        )
        .unwrap();
        write!(f, "max_retries = {}, opt_iter = {}\n", self.max_retries, self.opt_iter).unwrap();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::StrError;
    use russell_sparse::Genie;

    #[test]
    fn new_works() {
        let config = Config::new();
        assert_eq!(config.rtol, 0.0);
        assert_eq!(config.etol, 0.01);
        assert_eq!(config.dtol, 0.001);
        assert_eq!(config.ptol, 0.01);
        assert_eq!(config.ctol, 0.01);
        assert_eq!(config.rmin, 1e-20);
        assert_eq!(config.max_ups, 10);
        assert_eq!(config.max_refs, 15);
        assert_eq!(config.ls_tol, 0.9);
        assert_eq!(config.ls_min, 0.01);
        assert_eq!(config.ls_iter, 5);
        assert_eq!(config.cmax, 1e5);
        assert_eq!(config.verbose_iterations, false);
        assert_eq!(config.validate(), None);
    }

    #[test]
    fn setters_work() -> Result<(), StrError> {
        let mut config = Config::new();
        config
            .set_residual_tol(1e-10, 1e-30)?
            .set_tolerances(0.001, 0.0, 0.0, 0.0)?
            .set_max_updates(0, 20)?
            .set_max_augmentations(10)?
            .set_line_search(0.0, 0.05, 3)?
            .set_cmax(1e6)?
            .set_lin_sol_genie(Genie::Umfpack)?
            .set_symmetric_stiffness(false)?
            .set_time(0.0, 2.0)?
            .set_dt(0.5, 0.01, 1.0)?
            .set_time_stepping(3, 5)?
            .set_verbose(false, false)?;
        assert_eq!(config.validate(), None);
        assert_eq!(
            format!("{}", config),
            "Configuration data\n\
             ==================\n\
             rtol = 1e-10, rmin = 1e-30\n\
             etol = 0.001, dtol = 0.0, ptol = 0.0, ctol = 0.0\n\
             max_ups = 0, max_refs = 20, max_augmentations = 10\n\
             ls_tol = 0.0, ls_min = 0.05, ls_iter = 3\n\
             cmax = 1000000.0\n\
             lin_sol_genie = Umfpack\n\
             symmetric_stiffness = false\n\
             \n\
             Time stepping\n\
             =============\n\
             t_ini = 0.0, t_fin = 2.0\n\
             dt = 0.5, dt_min = 0.01, dt_max = 1.0\n\
             max_retries = 3, opt_iter = 5\n"
        );
        Ok(())
    }

    #[test]
    fn setters_capture_errors() {
        let mut config = Config::new();
        assert_eq!(config.set_residual_tol(0.0, -1.0).err(), Some("rmin must be ≥ 0.0"));
        assert_eq!(
            config.set_tolerances(0.0, 0.0, 0.0, 0.0).err(),
            Some("at least one convergence tolerance must be > 0.0")
        );
        assert_eq!(config.set_max_updates(10, 0).err(), Some("max_refs must be ≥ 1"));
        assert_eq!(config.set_line_search(-1.0, 0.01, 5).err(), Some("ls_tol must be ≥ 0.0"));
        assert_eq!(config.set_line_search(0.9, 0.0, 5).err(), Some("ls_min must be in (0.0, 1.0]"));
        assert_eq!(config.set_cmax(1.0).err(), Some("cmax must be in (1.0, 1e20]"));
        assert_eq!(config.set_time(-1.0, 1.0).err(), Some("t_ini must be ≥ 0.0"));
        assert_eq!(config.set_time(1.0, 1.0).err(), Some("t_fin must be > t_ini"));
        assert_eq!(config.set_dt(0.1, 0.0, 1.0).err(), Some("dt_min must be ≥ 1e-10"));
        assert_eq!(
            config.set_dt(2.0, 0.01, 1.0).err(),
            Some("dt must satisfy dt_min ≤ dt ≤ dt_max")
        );
        assert_eq!(config.set_time_stepping(3, 0).err(), Some("opt_iter must be ≥ 1"));
    }

    #[test]
    fn validate_works() {
        let mut config = Config::new();
        config.rmin = -1.0;
        assert_eq!(
            config.validate(),
            Some("rmin = -1.0 is incorrect; it must be ≥ 0.0".to_string())
        );
        config.rmin = 0.0;

        config.etol = 0.0;
        config.dtol = 0.0;
        config.ptol = 0.0;
        config.ctol = 0.0;
        assert_eq!(
            config.validate(),
            Some("all convergence tolerances are disabled; at least one must be > 0.0".to_string())
        );
        config.etol = 0.01;

        config.ls_min = 2.0;
        assert_eq!(
            config.validate(),
            Some("ls_min = 2.0 is incorrect; it must be in (0.0, 1.0]".to_string())
        );
        config.ls_min = 0.01;

        config.dt = 10.0;
        assert_eq!(
            config.validate(),
            Some("dt = 10.0 is incorrect; it must satisfy 1e-6 ≤ dt ≤ 0.1".to_string())
        );
        config.dt = 0.1;

        config.t_fin = 0.0;
        assert_eq!(
            config.validate(),
            Some("t_fin = 0.0 is incorrect; it must be > t_ini = 0.0".to_string())
        );
    }
}
