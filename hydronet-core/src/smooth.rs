//! Logistic regularisation of discontinuous process equations.
//!
//! Many process equations contain thresholds (a dam that only releases above a crest
//! level, evaporation that stops on a dry soil). Such kinks make the right hand side of
//! the storage equation discontinuous, which forces the integrator into very short
//! sub-steps near the threshold. The functions below replace the kinks with smooth
//! logistic approximations. Their smoothing parameter is usually derived from a more
//! intuitive meta parameter: the distance from the discontinuity at which the smooth
//! function deviates from the discontinuous one by 1 %.
//!
//! A smoothing parameter of zero reproduces the discontinuous function exactly.

use num::Float;

/// Deviation from the discontinuous function at the meta parameter distance
const DEVIATION: f64 = 0.01;

fn constant<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Smooth approximation of the step function `x >= 0 ? 1 : 0`
pub fn smooth_logistic1<T: Float>(value: T, parameter: T) -> T {
    if parameter <= T::zero() {
        return if value >= T::zero() {
            T::one()
        } else {
            T::zero()
        };
    }
    T::one() / (T::one() + (-value / parameter).exp())
}

/// Smooth approximation of `max(x, 0)`
///
/// Evaluated as a numerically stable softplus so that large arguments do not overflow.
pub fn smooth_logistic2<T: Float>(value: T, parameter: T) -> T {
    if parameter <= T::zero() {
        return value.max(T::zero());
    }
    let z = value / parameter;
    if z > T::zero() {
        parameter * (z + (-z).exp().ln_1p())
    } else {
        parameter * z.exp().ln_1p()
    }
}

/// Derivative of [`smooth_logistic2`] with respect to `value`
pub fn smooth_logistic2_derivative<T: Float>(value: T, parameter: T) -> T {
    smooth_logistic1(value, parameter)
}

/// Smooth approximation of the ramp `min(max(x, 0), 1)`
///
/// Both kinks are smoothed with the [`smooth_logistic2`] kernel. The result stays within
/// `[0, 1]` and is symmetric: `f(x) + f(1 - x) == 1`.
pub fn smooth_logistic3<T: Float>(value: T, parameter: T) -> T {
    if parameter <= T::zero() {
        return value.max(T::zero()).min(T::one());
    }
    let ramp = smooth_logistic2(value, parameter) - smooth_logistic2(value - T::one(), parameter);
    ramp.max(T::zero()).min(T::one())
}

/// Smooth approximation of `max(x, y)`
pub fn smooth_max1<T: Float>(x: T, y: T, parameter: T) -> T {
    y + smooth_logistic2(x - y, parameter)
}

/// Smooth approximation of `min(x, y)`
pub fn smooth_min1<T: Float>(x: T, y: T, parameter: T) -> T {
    x - smooth_logistic2(x - y, parameter)
}

/// Smoothing parameter for [`smooth_logistic1`]
///
/// With the returned parameter the smooth step is 0.01 at `-metapar` and 0.99 at
/// `metapar`. Non-positive meta parameters yield zero (no smoothing).
pub fn calc_smoothpar_logistic1<T: Float>(metapar: T) -> T {
    (metapar / constant::<T>(99.0).ln()).max(T::zero())
}

/// Smoothing parameter for [`smooth_logistic2`]
///
/// With the returned parameter `smooth_logistic2(-metapar)` is 0.01. There is no closed
/// form, the parameter is found by bisection. Non-positive meta parameters yield zero
/// (no smoothing).
pub fn calc_smoothpar_logistic2<T: Float>(metapar: T) -> T {
    if metapar <= T::zero() || !metapar.is_finite() {
        return T::zero();
    }
    let target = constant::<T>(DEVIATION);
    let error = |parameter: T| smooth_logistic2(-metapar, parameter) - target;

    // The deviation grows monotonically with the parameter
    let mut lo = T::zero();
    let mut hi = metapar;
    for _ in 0..64 {
        if error(hi) >= T::zero() {
            break;
        }
        lo = hi;
        hi = hi + hi;
    }

    let two = constant::<T>(2.0);
    for _ in 0..200 {
        let mid = (lo + hi) / two;
        if mid <= lo || mid >= hi {
            break;
        }
        if error(mid) < T::zero() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / two
}

/// Smoothing parameter for [`smooth_logistic3`]
///
/// Shares [`calc_smoothpar_logistic2`]. Because the two kinks of the ramp overlap, the
/// deviation at `metapar` from the nearest kink is slightly below 1 %.
pub fn calc_smoothpar_logistic3<T: Float>(metapar: T) -> T {
    calc_smoothpar_logistic2(metapar)
}

/// Smoothing parameter for [`smooth_max1`]
///
/// The smooth maximum exceeds the sharp one by 0.01 when `|x - y| == metapar`.
pub fn calc_smoothpar_max1<T: Float>(metapar: T) -> T {
    calc_smoothpar_logistic2(metapar)
}

/// Smoothing parameter for [`smooth_min1`]
pub fn calc_smoothpar_min1<T: Float>(metapar: T) -> T {
    calc_smoothpar_logistic2(metapar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn logistic1_hits_one_percent() {
        let parameter = calc_smoothpar_logistic1(2.5);
        assert!(is_close!(smooth_logistic1(-2.5, parameter), 0.01));
        assert!(is_close!(smooth_logistic1(2.5, parameter), 0.99));
        assert_eq!(smooth_logistic1(0.0, parameter), 0.5);
    }

    #[test]
    fn logistic2_hits_one_percent() {
        let parameter = calc_smoothpar_logistic2(2.5);
        assert!(is_close!(smooth_logistic2(-2.5, parameter), 0.01));
        assert!(is_close!(smooth_logistic2(2.5, parameter), 2.51));
    }

    #[test]
    fn max_and_min() {
        let parameter = calc_smoothpar_max1(2.5);
        assert!(is_close!(smooth_max1(4.0, 1.5, parameter), 4.01));
        let parameter = calc_smoothpar_min1(2.5);
        assert!(is_close!(smooth_min1(4.0, 1.5, parameter), 1.49));
        assert!(is_close!(smooth_min1(-4.0, -1.5, parameter), -4.01));
    }

    #[test]
    fn logistic3_is_a_bounded_symmetric_ramp() {
        let parameter = calc_smoothpar_logistic3(2.5);
        assert_eq!(parameter, calc_smoothpar_logistic2(2.5));

        assert!(is_close!(smooth_logistic3(0.5, parameter), 0.5));
        for x in [-4.0, -2.0, -0.3, 0.2, 0.9, 1.7, 3.0] {
            let y = smooth_logistic3(x, parameter);
            assert!((0.0..=1.0).contains(&y));
            assert!(is_close!(y + smooth_logistic3(1.0 - x, parameter), 1.0));
        }
        // The overlapping kinks keep the deviation below 1 % at the meta parameter
        let low = smooth_logistic3(-2.5, parameter);
        assert!(low > 0.0 && low < 0.01);
        assert!(smooth_logistic3(-2.0, parameter) < smooth_logistic2(-2.0, parameter));
        assert!(smooth_logistic3(0.1, parameter) < smooth_logistic3(0.2, parameter));
    }

    #[test]
    fn zero_parameter_is_discontinuous() {
        assert_eq!(calc_smoothpar_logistic1(0.0), 0.0);
        assert_eq!(calc_smoothpar_logistic1(-1.0), 0.0);
        assert_eq!(calc_smoothpar_logistic2(0.0), 0.0);
        assert_eq!(calc_smoothpar_logistic2(-1.0), 0.0);

        assert_eq!(smooth_logistic1(-1e-9, 0.0), 0.0);
        assert_eq!(smooth_logistic1(0.0, 0.0), 1.0);
        assert_eq!(smooth_logistic2(-3.0, 0.0), 0.0);
        assert_eq!(smooth_logistic2(3.0, 0.0), 3.0);
        assert_eq!(smooth_logistic3(-0.5, 0.0), 0.0);
        assert_eq!(smooth_logistic3(0.25, 0.0), 0.25);
        assert_eq!(smooth_logistic3(1.5, 0.0), 1.0);
        assert_eq!(calc_smoothpar_logistic3(0.0), 0.0);
        assert_eq!(calc_smoothpar_max1(-1.0), 0.0);
        assert_eq!(smooth_max1(1.0, 2.0, 0.0), 2.0);
        assert_eq!(smooth_min1(1.0, 2.0, 0.0), 1.0);
    }

    #[test]
    fn large_arguments_do_not_overflow() {
        assert!(is_close!(smooth_logistic2(1e6, 1e-3), 1e6));
        assert_eq!(smooth_logistic2(-1e6, 1e-3), 0.0);
        assert_eq!(smooth_logistic1(1e6, 1e-3), 1.0);
        assert!(smooth_logistic2_derivative(-1e6, 1e-3).abs() < 1e-300);
    }

    #[test]
    fn works_in_single_precision() {
        let parameter = calc_smoothpar_logistic1(2.5f32);
        assert!((smooth_logistic1(2.5f32, parameter) - 0.99).abs() < 1e-5);
    }
}
