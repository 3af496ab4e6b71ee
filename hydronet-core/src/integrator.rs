//! Adaptive sub-stepping for process models with stiff storage dynamics.
//!
//! A process model describes its storages as an initial value problem via [`IVP`] and
//! asks the run's [`Integrator`] to advance it over the step duration.
//! Every trial interval is advanced with `ode_solvers`' fourth order Runge-Kutta method,
//! once as a single step and once as two half-steps.
//! The two answers are compared and the interval is halved until they agree within
//! the tolerance, or fails with [`HydroNetError::Convergence`] once the minimum
//! sub-step is reached.

use crate::errors::{HydroNetError, HydroNetResult};
use crate::timeseries::{FloatValue, Time};
use nalgebra::DVector;
use ode_solvers::{Rk4, System};
use serde::{Deserialize, Serialize};

/// An initial value problem `dy/dt = f(t, y)`
pub trait IVP {
    fn calculate_dy_dt(&self, t: Time, y: &DVector<FloatValue>, dy_dt: &mut DVector<FloatValue>);

    /// Whether component `index` of the state may legitimately change sign
    ///
    /// Non-signed components that swing sign within a trial interval cause the interval
    /// to be subdivided.
    fn is_signed(&self, _index: usize) -> bool {
        false
    }
}

impl<F> IVP for F
where
    F: Fn(Time, &DVector<FloatValue>, &mut DVector<FloatValue>),
{
    fn calculate_dy_dt(&self, t: Time, y: &DVector<FloatValue>, dy_dt: &mut DVector<FloatValue>) {
        self(t, y, dy_dt)
    }
}

/// Exposes an [`IVP`] to `ode_solvers` on a local time axis starting at zero
///
/// Solving on `[0, length]` keeps the solver's step count exact: `length / step` is an
/// exact integer for the full and half trial steps.
struct LocalSystem<'a, P: ?Sized> {
    ivp: &'a P,
    t0: Time,
}

impl<P: IVP + ?Sized> System<Time, DVector<FloatValue>> for LocalSystem<'_, P> {
    fn system(&self, x: Time, y: &DVector<FloatValue>, dy: &mut DVector<FloatValue>) {
        self.ivp.calculate_dy_dt(self.t0 + x, y, dy)
    }
}

/// Fixed-step classical Runge-Kutta solve of `system` from `y` at `t` over `length`
pub(crate) fn solve_fixed<P: IVP + ?Sized>(
    system: &P,
    t: Time,
    y: &DVector<FloatValue>,
    length: Time,
    step: Time,
) -> HydroNetResult<DVector<FloatValue>> {
    let mut solver = Rk4::new(LocalSystem { ivp: system, t0: t }, 0.0, y.clone(), length, step);
    solver
        .integrate()
        .map_err(|e| HydroNetError::Error(format!("Runge-Kutta solve failed: {:?}", e)))?;
    solver
        .y_out()
        .last()
        .cloned()
        .ok_or_else(|| HydroNetError::Error("Runge-Kutta solve produced no steps".to_string()))
}

/// Result of a successful integration
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    /// State at the end of the integrated interval
    pub y: DVector<FloatValue>,
    /// Number of accepted sub-steps
    pub substeps: usize,
    /// Largest error estimate among the accepted sub-steps
    pub max_error: FloatValue,
}

/// Tolerance-controlled integrator shared by every element of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integrator {
    /// Largest accepted mixed absolute/relative difference between a full step and two
    /// half-steps
    pub tolerance: FloatValue,
    /// Shortest sub-step the integrator may use before giving up
    pub min_substep: Time,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            min_substep: 1e-6,
        }
    }
}

/// Mixed error norm between a coarse and a refined estimate
///
/// Differences are relative for components with a magnitude above one and absolute
/// below that. Any NaN yields an infinite error.
pub fn error_norm(coarse: &DVector<FloatValue>, refined: &DVector<FloatValue>) -> FloatValue {
    coarse
        .iter()
        .zip(refined.iter())
        .map(|(c, r)| (c - r).abs() / r.abs().max(1.0))
        .fold(0.0, |acc, e| {
            if e.is_nan() {
                FloatValue::INFINITY
            } else {
                acc.max(e)
            }
        })
}

fn swings_sign<P: IVP + ?Sized>(
    system: &P,
    before: &DVector<FloatValue>,
    after: &DVector<FloatValue>,
) -> bool {
    before
        .iter()
        .zip(after.iter())
        .enumerate()
        .any(|(i, (b, a))| !system.is_signed(i) && ((*b > 0.0 && *a < 0.0) || (*b < 0.0 && *a > 0.0)))
}

impl Integrator {
    pub fn new(tolerance: FloatValue, min_substep: Time) -> HydroNetResult<Self> {
        let integrator = Self {
            tolerance,
            min_substep,
        };
        integrator.validate()?;
        Ok(integrator)
    }

    pub fn validate(&self) -> HydroNetResult<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(HydroNetError::InvalidConfig(format!(
                "integrator tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !self.min_substep.is_finite() || self.min_substep <= 0.0 {
            return Err(HydroNetError::InvalidConfig(format!(
                "minimum sub-step must be positive, got {}",
                self.min_substep
            )));
        }
        Ok(())
    }

    /// Integrate `system` from `y0` at `t0` over `duration`
    ///
    /// Pending intervals are kept on an explicit stack. A rejected interval is replaced
    /// by its two halves, which is equivalent to recursive bisection without the
    /// recursion.
    pub fn integrate<P: IVP + ?Sized>(
        &self,
        system: &P,
        y0: &DVector<FloatValue>,
        t0: Time,
        duration: Time,
    ) -> HydroNetResult<Integration> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(HydroNetError::Error(format!(
                "cannot integrate over a duration of {duration}"
            )));
        }
        if duration == 0.0 {
            return Ok(Integration {
                y: y0.clone(),
                substeps: 0,
                max_error: 0.0,
            });
        }

        let mut pending = vec![duration];
        let mut t = t0;
        let mut y = y0.clone();
        let mut substeps = 0;
        let mut max_error: FloatValue = 0.0;

        while let Some(h) = pending.pop() {
            let full = solve_fixed(system, t, &y, h, h)?;
            let refined = solve_fixed(system, t, &y, h, 0.5 * h)?;

            let error = error_norm(&full, &refined);
            let accepted = error <= self.tolerance
                && refined.iter().all(|v| v.is_finite())
                && !swings_sign(system, &y, &full)
                && !swings_sign(system, &y, &refined);

            if accepted {
                t += h;
                y = refined;
                substeps += 1;
                max_error = max_error.max(error);
                continue;
            }

            let half_h = 0.5 * h;
            if half_h < self.min_substep {
                return Err(HydroNetError::Convergence {
                    duration,
                    min_substep: self.min_substep,
                    error,
                    tolerance: self.tolerance,
                });
            }
            pending.push(half_h);
            pending.push(half_h);
        }

        log::trace!(
            "integrated {} over {} in {} sub-steps (max error {:e})",
            t0,
            duration,
            substeps,
            max_error
        );
        Ok(Integration {
            y,
            substeps,
            max_error,
        })
    }
}
