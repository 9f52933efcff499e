//! Constructors for domains.
use itertools::Itertools;

use crate::{
    traits::types::{FmmError, FmmResult, FmmScalar},
    tree::{constants::DOMAIN_PADDING, types::Domain},
};

impl<T> Domain<T>
where
    T: FmmScalar,
{
    /// Constructor.
    ///
    /// # Arguments
    /// * `origin` - Lower left corner of the domain.
    /// * `side_length` - Length of the domain's sides, strictly positive and equal along both
    ///   axes.
    pub fn new(origin: [T; 2], side_length: [T; 2]) -> FmmResult<Self> {
        let domain = Domain {
            origin,
            side_length,
        };
        domain.validate()?;
        Ok(domain)
    }

    /// Check that the domain is a finite square of positive side. Boxes of other domains are
    /// rectangles, for which adjacency of keys does not imply separation in space.
    pub fn validate(&self) -> FmmResult<()> {
        let [sx, sy] = self.side_length;
        if self
            .side_length
            .iter()
            .chain(self.origin.iter())
            .any(|s| !s.is_finite())
            || sx <= T::zero()
        {
            return Err(FmmError::InvalidInput(format!(
                "Domain side lengths must be positive and finite, found {:?}",
                self.side_length
            )));
        }
        if sx != sy {
            return Err(FmmError::InvalidInput(format!(
                "Domains must be square, found side lengths {:?}",
                self.side_length
            )));
        }
        Ok(())
    }

    /// Compute the square domain enclosing a set of points. The bounding box is padded so that
    /// no point lies on the boundary of the domain.
    ///
    /// # Arguments
    /// * `coordinates` - Point coordinates in row major order `[x_0, y_0, x_1, y_1, ...]`.
    pub fn from_local_points(coordinates: &[T]) -> FmmResult<Domain<T>> {
        if coordinates.is_empty() || coordinates.len() % 2 != 0 {
            return Err(FmmError::InvalidInput(format!(
                "Expected a non-empty list of 2D coordinates, found {} values",
                coordinates.len()
            )));
        }

        if coordinates.iter().any(|c| !c.is_finite()) {
            return Err(FmmError::InvalidInput(
                "Coordinates must be finite".to_string(),
            ));
        }

        let (min_x, max_x) = coordinates
            .iter()
            .step_by(2)
            .fold((T::infinity(), T::neg_infinity()), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let (min_y, max_y) = coordinates
            .iter()
            .skip(1)
            .step_by(2)
            .fold((T::infinity(), T::neg_infinity()), |(lo, hi), &y| {
                (lo.min(y), hi.max(y))
            });

        // Want a square box to place everything in
        let mut side_length = (max_x - min_x).max(max_y - min_y);
        if side_length == T::zero() {
            side_length = T::one();
        }

        let err = side_length * T::from(DOMAIN_PADDING).unwrap_or_else(T::epsilon);
        let two = T::one() + T::one();

        let side_length = [side_length + two * err; 2];
        let origin = [min_x - err, min_y - err];

        Ok(Domain {
            origin,
            side_length,
        })
    }

    /// Whether a point lies within the closed domain.
    pub fn contains(&self, point: &[T; 2]) -> bool {
        point
            .iter()
            .zip_eq(self.origin.iter().zip(self.side_length.iter()))
            .all(|(&p, (&o, &s))| o <= p && p <= o + s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::points_fixture;

    #[test]
    fn test_from_local_points() {
        let points = points_fixture::<f64>(1000, Some(-1.0), Some(2.0), Some(0));
        let domain = Domain::from_local_points(&points).unwrap();

        for point in points.chunks_exact(2) {
            let point = [point[0], point[1]];
            assert!(domain.contains(&point));
            // Padding keeps points away from the boundary
            assert!(point[0] > domain.origin[0] && point[1] > domain.origin[1]);
        }
        assert_eq!(domain.side_length[0], domain.side_length[1]);
    }

    #[test]
    fn test_degenerate_points() {
        let points = vec![0.5f64, 0.5, 0.5, 0.5];
        let domain = Domain::from_local_points(&points).unwrap();
        assert!(domain.side_length[0] > 0.0);
        assert!(domain.contains(&[0.5, 0.5]));

        assert!(Domain::<f64>::from_local_points(&[]).is_err());
        assert!(Domain::<f64>::from_local_points(&[0.0, 1.0, 2.0]).is_err());
        assert!(Domain::new([0.0, 0.0], [0.0, 1.0]).is_err());
    }

    #[test]
    fn test_rectangular_domain() {
        assert!(matches!(
            Domain::new([0.0f64, 0.0], [1.0, 8.0]),
            Err(FmmError::InvalidInput(_))
        ));
        assert!(matches!(
            Domain::new([0.0f32, 0.0], [2.0, 1.0]),
            Err(FmmError::InvalidInput(_))
        ));

        let rectangle = Domain {
            origin: [0.0f64, 0.0],
            side_length: [1.0, 8.0],
        };
        assert!(rectangle.validate().is_err());

        let square = Domain::new([-1.0f64, 2.0], [3.0, 3.0]).unwrap();
        assert!(square.validate().is_ok());
        assert!(square.contains(&[0.0, 4.0]));
    }
}
