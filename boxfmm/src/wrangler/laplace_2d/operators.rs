//! Series operators for the 2D Laplace kernel `log|x - y|`.
//!
//! Points are identified with complex numbers, and the potential is the real part of
//!
//! * multipole expansions `a_0 log(z - c) + sum_{k >= 1} a_k (r / (z - c))^k`,
//! * local expansions `sum_{l >= 0} b_l ((z - c) / r)^l`,
//!
//! truncated after `p + 1` coefficients for truncation order `p`. Expansions are scaled by the
//! radius `r` of the box they are centred on, so that coefficients stay bounded by the total
//! charge at every level of the tree.
use num::Zero;
use num_complex::Complex;

use crate::traits::types::FmmScalar;

/// Binomial coefficients `C(n, k)` for `0 <= k <= n <= nmax`, stored as floats.
#[derive(Debug, Clone)]
pub struct Binomials<T> {
    nmax: usize,
    values: Vec<T>,
}

impl<T: FmmScalar> Binomials<T> {
    /// Pascal's triangle up to row `nmax`.
    pub fn new(nmax: usize) -> Self {
        let width = nmax + 1;
        let mut values = vec![T::zero(); width * width];
        for n in 0..width {
            values[n * width] = T::one();
            for k in 1..=n {
                values[n * width + k] =
                    values[(n - 1) * width + k - 1] + values[(n - 1) * width + k];
            }
        }
        Self { nmax, values }
    }

    /// Largest row of the table.
    pub fn nmax(&self) -> usize {
        self.nmax
    }

    /// `C(n, k)`, zero for `k > n`.
    pub fn get(&self, n: usize, k: usize) -> T {
        if k > n {
            T::zero()
        } else {
            self.values[n * (self.nmax + 1) + k]
        }
    }
}

/// `[1, x, x^2, ..., x^n]`
fn powers<T: FmmScalar>(x: Complex<T>, n: usize) -> Vec<Complex<T>> {
    let mut result = Vec::with_capacity(n + 1);
    let mut current = Complex::new(T::one(), T::zero());
    for _ in 0..=n {
        result.push(current);
        current = current * x;
    }
    result
}

fn real_powers<T: FmmScalar>(x: T, n: usize) -> Vec<T> {
    let mut result = Vec::with_capacity(n + 1);
    let mut current = T::one();
    for _ in 0..=n {
        result.push(current);
        current *= x;
    }
    result
}

/// `[0, 1, 1/2, ..., 1/n]`, with a zero placeholder for the unused zeroth entry.
fn reciprocals<T: FmmScalar>(n: usize) -> Vec<T> {
    let mut result = Vec::with_capacity(n + 1);
    result.push(T::zero());
    let mut k = T::zero();
    for _ in 1..=n {
        k += T::one();
        result.push(T::one() / k);
    }
    result
}

fn complex<T: FmmScalar>(coordinate: &[T]) -> Complex<T> {
    Complex::new(coordinate[0], coordinate[1])
}

fn sign<T: FmmScalar>(k: usize) -> T {
    if k % 2 == 0 {
        T::one()
    } else {
        -T::one()
    }
}

/// Particle to multipole, add the expansion about `centre`, scaled by `radius`, of charges at
/// `coordinates`.
pub fn p2m<T: FmmScalar>(
    centre: Complex<T>,
    radius: T,
    coordinates: &[T],
    charges: &[T],
    multipole: &mut [Complex<T>],
) {
    let n = multipole.len();
    let inverse = reciprocals::<T>(n);

    for (coordinate, &charge) in coordinates.chunks_exact(2).zip(charges) {
        let u = (complex(coordinate) - centre).unscale(radius);
        multipole[0] += Complex::new(charge, T::zero());

        let mut power = u;
        for k in 1..n {
            multipole[k] -= power * (charge * inverse[k]);
            power = power * u;
        }
    }
}

/// Multipole to multipole, add the child's expansion shifted by `shift`, the child's centre
/// relative to the parent's, into the parent's expansion.
pub fn m2m<T: FmmScalar>(
    shift: Complex<T>,
    child_radius: T,
    parent_radius: T,
    child: &[Complex<T>],
    parent: &mut [Complex<T>],
    binomials: &Binomials<T>,
) {
    let n = child.len();
    debug_assert!(binomials.nmax() + 1 >= n);
    let shift_powers = powers(shift.unscale(parent_radius), n);
    let ratio_powers = real_powers(child_radius / parent_radius, n);
    let inverse = reciprocals::<T>(n);
    let a0 = child[0];

    parent[0] += a0;
    for l in 1..n {
        let mut coefficient = -a0 * shift_powers[l] * inverse[l];
        for k in 1..=l {
            coefficient += child[k]
                * shift_powers[l - k]
                * (ratio_powers[k] * binomials.get(l - 1, k - 1));
        }
        parent[l] += coefficient;
    }
}

/// Multipole to local operator, a row major `(p + 1) x (p + 1)` matrix mapping the multipole
/// about a source centre to the local expansion about a target centre, where `separation` is
/// the source centre relative to the target centre.
///
/// Entries are products of `(source_radius / separation)^k` and
/// `(target_radius / separation)^l`, which are below one for separated boxes, so the operator
/// stays finite for any depth and order.
pub fn m2l_operator<T: FmmScalar>(
    separation: Complex<T>,
    source_radius: T,
    target_radius: T,
    expansion_order: usize,
    binomials: &Binomials<T>,
) -> Vec<Complex<T>> {
    let n = expansion_order + 1;
    debug_assert!(binomials.nmax() + 1 >= 2 * expansion_order);
    let inverse_separation = separation.inv();
    let source_powers = powers(inverse_separation.scale(source_radius), expansion_order);
    let target_powers = powers(inverse_separation.scale(target_radius), expansion_order);
    let inverse = reciprocals::<T>(n);
    let mut operator = vec![Complex::zero(); n * n];

    operator[0] = (-separation).ln();
    for k in 1..n {
        operator[k] = source_powers[k] * sign::<T>(k);
    }

    for l in 1..n {
        operator[l * n] = -target_powers[l] * inverse[l];
        for k in 1..n {
            operator[l * n + k] = target_powers[l]
                * source_powers[k]
                * (sign::<T>(k) * binomials.get(l + k - 1, k - 1));
        }
    }

    operator
}

/// Add `operator * input` to `output`, for a square row major operator.
pub fn apply_operator<T: FmmScalar>(
    operator: &[Complex<T>],
    input: &[Complex<T>],
    output: &mut [Complex<T>],
) {
    let n = input.len();
    for (row, out) in operator.chunks_exact(n).zip(output.iter_mut()) {
        *out += row
            .iter()
            .zip(input)
            .fold(Complex::zero(), |acc, (&m, &x)| acc + m * x);
    }
}

/// Local to local, add the parent's expansion shifted by `shift`, the child's centre relative
/// to the parent's, into the child's expansion.
pub fn l2l<T: FmmScalar>(
    shift: Complex<T>,
    parent_radius: T,
    child_radius: T,
    parent: &[Complex<T>],
    child: &mut [Complex<T>],
    binomials: &Binomials<T>,
) {
    let n = parent.len();
    debug_assert!(binomials.nmax() + 1 >= n);
    let shift_powers = powers(shift.unscale(parent_radius), n);
    let ratio_powers = real_powers(child_radius / parent_radius, n);

    for (l, out) in child.iter_mut().enumerate() {
        let mut coefficient = Complex::zero();
        for k in l..n {
            coefficient += parent[k] * shift_powers[k - l] * binomials.get(k, l);
        }
        *out += coefficient * ratio_powers[l];
    }
}

/// Particle to local, add the expansion about `centre`, scaled by `radius`, of charges at
/// `coordinates`.
pub fn p2l<T: FmmScalar>(
    centre: Complex<T>,
    radius: T,
    coordinates: &[T],
    charges: &[T],
    local: &mut [Complex<T>],
) {
    let n = local.len();
    let inverse = reciprocals::<T>(n);

    for (coordinate, &charge) in coordinates.chunks_exact(2).zip(charges) {
        let u = complex(coordinate) - centre;
        local[0] += (-u).ln() * charge;

        let ratio = u.inv().scale(radius);
        let mut power = ratio;
        for l in 1..n {
            local[l] -= power * (charge * inverse[l]);
            power = power * ratio;
        }
    }
}

/// Local to particle, add the local expansion about `centre`, scaled by `radius`, evaluated at
/// `coordinates`.
pub fn l2p<T: FmmScalar>(
    centre: Complex<T>,
    radius: T,
    local: &[Complex<T>],
    coordinates: &[T],
    potentials: &mut [T],
) {
    for (coordinate, potential) in coordinates.chunks_exact(2).zip(potentials.iter_mut()) {
        let w = (complex(coordinate) - centre).unscale(radius);
        let value = local
            .iter()
            .rev()
            .fold(Complex::zero(), |acc, &b| acc * w + b);
        *potential += value.re;
    }
}

/// Multipole to particle, add the multipole expansion about `centre`, scaled by `radius`,
/// evaluated at `coordinates`.
pub fn m2p<T: FmmScalar>(
    centre: Complex<T>,
    radius: T,
    multipole: &[Complex<T>],
    coordinates: &[T],
    potentials: &mut [T],
) {
    for (coordinate, potential) in coordinates.chunks_exact(2).zip(potentials.iter_mut()) {
        let w = complex(coordinate) - centre;
        let ratio = w.inv().scale(radius);
        let tail = multipole[1..]
            .iter()
            .rev()
            .fold(Complex::zero(), |acc, &a| (acc + a) * ratio);
        *potential += (multipole[0] * w.ln() + tail).re;
    }
}

/// Particle to particle, add the potential of charges at `sources` evaluated at `targets`.
/// Coincident points don't interact.
pub fn p2p<T: FmmScalar>(sources: &[T], charges: &[T], targets: &[T], potentials: &mut [T]) {
    let half = T::one() / (T::one() + T::one());

    for (target, potential) in targets.chunks_exact(2).zip(potentials.iter_mut()) {
        for (source, &charge) in sources.chunks_exact(2).zip(charges) {
            let dx = target[0] - source[0];
            let dy = target[1] - source[1];
            let r2 = dx * dx + dy * dy;
            if r2 > T::zero() {
                *potential += charge * half * r2.ln();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    use crate::tree::helpers::{points_fixture, weights_fixture};

    /// Radius of a box of side `side`.
    fn radius(side: f64) -> f64 {
        side * std::f64::consts::FRAC_1_SQRT_2
    }

    fn direct(sources: &[f64], charges: &[f64], targets: &[f64]) -> Vec<f64> {
        let mut potentials = vec![0.0; targets.len() / 2];
        p2p(sources, charges, targets, &mut potentials);
        potentials
    }

    /// Points in a box of side `width` centred at `centre`.
    fn cluster(n: usize, centre: [f64; 2], width: f64, seed: u64) -> Vec<f64> {
        points_fixture::<f64>(n, Some(-width / 2.0), Some(width / 2.0), Some(seed))
            .chunks_exact(2)
            .flat_map(|p| [p[0] + centre[0], p[1] + centre[1]])
            .collect()
    }

    #[test]
    fn test_binomials() {
        let binomials = Binomials::<f64>::new(10);
        assert_eq!(binomials.get(0, 0), 1.0);
        assert_eq!(binomials.get(5, 2), 10.0);
        assert_eq!(binomials.get(10, 5), 252.0);
        assert_eq!(binomials.get(3, 4), 0.0);
        assert_eq!(binomials.nmax(), 10);
    }

    #[test]
    fn test_p2m_m2p() {
        let order = 16;
        let centre = Complex::new(0.5, 0.5);
        let sources = cluster(50, [0.5, 0.5], 0.5, 0);
        let charges = weights_fixture::<f64>(50, Some(1));
        let targets = cluster(20, [3.5, 0.5], 1.0, 2);

        let mut multipole = vec![Complex::zero(); order + 1];
        p2m(centre, radius(0.5), &sources, &charges, &mut multipole);

        let mut potentials = vec![0.0; 20];
        m2p(centre, radius(0.5), &multipole, &targets, &mut potentials);

        let expected = direct(&sources, &charges, &targets);
        for (p, e) in potentials.iter().zip(expected) {
            assert_relative_eq!(*p, e, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_m2m() {
        let order = 20;
        let binomials = Binomials::new(2 * order);
        let child_centre = Complex::new(0.25, 0.75);
        let parent_centre = Complex::new(0.5, 0.5);
        let sources = cluster(30, [0.25, 0.75], 0.5, 3);
        let charges = weights_fixture::<f64>(30, Some(4));

        let mut child = vec![Complex::zero(); order + 1];
        p2m(child_centre, radius(0.5), &sources, &charges, &mut child);
        let mut shifted = vec![Complex::zero(); order + 1];
        m2m(
            child_centre - parent_centre,
            radius(0.5),
            radius(1.0),
            &child,
            &mut shifted,
            &binomials,
        );

        // The shift is exact up to the truncation order
        let mut expected = vec![Complex::zero(); order + 1];
        p2m(parent_centre, radius(1.0), &sources, &charges, &mut expected);
        for (a, b) in shifted.iter().zip(expected.iter()) {
            assert!((a - b).norm() <= 1e-12 * (1.0 + b.norm()));
        }
    }

    #[test]
    fn test_m2l_l2p() {
        let order = 20;
        let binomials = Binomials::new(2 * order);
        let source_centre = Complex::new(0.5, 0.5);
        let target_centre = Complex::new(3.5, 0.5);
        let sources = cluster(40, [0.5, 0.5], 0.5, 5);
        let charges = weights_fixture::<f64>(40, Some(6));
        let targets = cluster(25, [3.5, 0.5], 0.5, 7);

        let mut multipole = vec![Complex::zero(); order + 1];
        p2m(source_centre, radius(0.5), &sources, &charges, &mut multipole);

        let operator = m2l_operator(
            source_centre - target_centre,
            radius(0.5),
            radius(0.5),
            order,
            &binomials,
        );
        let mut local = vec![Complex::zero(); order + 1];
        apply_operator(&operator, &multipole, &mut local);

        let mut potentials = vec![0.0; 25];
        l2p(target_centre, radius(0.5), &local, &targets, &mut potentials);

        let expected = direct(&sources, &charges, &targets);
        for (p, e) in potentials.iter().zip(expected) {
            assert!((p - e).abs() < 1e-6 * (1.0 + e.abs()));
        }
    }

    #[test]
    fn test_p2l_l2l() {
        let order = 20;
        let binomials = Binomials::new(2 * order);
        let parent_centre = Complex::new(0.5, 0.5);
        let child_centre = Complex::new(0.75, 0.25);
        let sources = cluster(30, [3.0, 3.0], 1.0, 8);
        let charges = weights_fixture::<f64>(30, Some(9));
        let targets = cluster(15, [0.75, 0.25], 0.5, 10);

        let mut parent = vec![Complex::zero(); order + 1];
        p2l(parent_centre, radius(1.0), &sources, &charges, &mut parent);
        let mut child = vec![Complex::zero(); order + 1];
        l2l(
            child_centre - parent_centre,
            radius(1.0),
            radius(0.5),
            &parent,
            &mut child,
            &binomials,
        );

        let mut from_parent = vec![0.0; 15];
        l2p(parent_centre, radius(1.0), &parent, &targets, &mut from_parent);
        let mut from_child = vec![0.0; 15];
        l2p(child_centre, radius(0.5), &child, &targets, &mut from_child);

        let expected = direct(&sources, &charges, &targets);
        for ((a, b), e) in from_parent.iter().zip(from_child.iter()).zip(expected) {
            assert_relative_eq!(*a, e, max_relative = 1e-8);
            assert_relative_eq!(*b, e, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_tiny_boxes_high_order() {
        // Boxes at the deepest level of a unit domain
        let order = 64;
        let side = 1.0f32 / 65536.0;
        let r = side * std::f32::consts::FRAC_1_SQRT_2;
        let binomials = Binomials::<f32>::new(2 * order);
        let source_centre = Complex::new(0.25f32, 0.25);
        let target_centre = source_centre + Complex::new(3.0 * side, side);

        let operator = m2l_operator(source_centre - target_centre, r, r, order, &binomials);
        assert!(operator.iter().all(|m| m.re.is_finite() && m.im.is_finite()));

        let sources = points_fixture::<f32>(10, Some(-side / 2.0), Some(side / 2.0), Some(11))
            .chunks_exact(2)
            .flat_map(|p| [p[0] + source_centre.re, p[1] + source_centre.im])
            .collect::<Vec<_>>();
        let targets = [target_centre.re, target_centre.im];
        let charges = weights_fixture::<f32>(10, Some(12));

        let mut multipole = vec![Complex::zero(); order + 1];
        p2m(source_centre, r, &sources, &charges, &mut multipole);
        let mut local = vec![Complex::zero(); order + 1];
        apply_operator(&operator, &multipole, &mut local);
        let mut potential = [0.0f32];
        l2p(target_centre, r, &local, &targets, &mut potential);

        let mut expected = [0.0f32];
        p2p(&sources, &charges, &targets, &mut expected);
        assert!(potential[0].is_finite());
        assert_relative_eq!(potential[0], expected[0], max_relative = 1e-4);

        // Scaled coefficients are bounded by the total charge
        let total = charges.iter().sum::<f32>();
        assert!(multipole.iter().all(|a| a.norm() <= 1.001 * total));
    }

    #[test]
    fn test_p2p_skips_coincident() {
        let sources = [0.0, 0.0, 1.0, 0.0];
        let charges = [1.0, 2.0];
        let potentials = direct(&sources, &charges, &[0.0, 0.0]);
        assert_relative_eq!(potentials[0], 0.0);
    }
}
