//! Helper functions for running and checking FMMs.
use std::time::{Duration, Instant};

use num::Float;

/// Run a closure, timing it when `timed` is set.
pub fn optionally_time<T, F: FnOnce() -> T>(timed: bool, f: F) -> (T, Option<Duration>) {
    if timed {
        let start = Instant::now();
        let result = f();
        (result, Some(start.elapsed()))
    } else {
        (f(), None)
    }
}

/// Relative error, in the l2 norm, of an approximation against a reference.
///
/// # Arguments
/// * `approximation` - Computed values.
/// * `reference` - Exact values, of the same length.
pub fn relative_l2_error<T: Float>(approximation: &[T], reference: &[T]) -> T {
    let (error, norm) = approximation.iter().zip(reference).fold(
        (T::zero(), T::zero()),
        |(error, norm), (&a, &r)| (error + (a - r) * (a - r), norm + r * r),
    );

    if norm == T::zero() {
        error.sqrt()
    } else {
        (error / norm).sqrt()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_relative_l2_error() {
        let reference = [3.0f64, 4.0];
        assert_eq!(relative_l2_error(&reference, &reference), 0.0);
        assert_relative_eq!(relative_l2_error(&[3.0, 5.0], &reference), 0.2);
    }

    #[test]
    fn test_optionally_time() {
        let (result, duration) = optionally_time(false, || 2);
        assert_eq!(result, 2);
        assert!(duration.is_none());

        let (_, duration) = optionally_time(true, || 2);
        assert!(duration.is_some());
    }
}
