//! Expansion wrangler for the 2D Laplace kernel `log|x - y|`.
mod operators;

use std::{ops::Range, sync::Arc};

use num::Zero;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    fmm::{
        constants::{DEFAULT_EXPANSION_ORDER, MAX_EXPANSION_ORDER, MIN_BOXES_PER_TASK},
        types::{Expansions, ExpansionsMut},
    },
    traits::{
        types::{FmmError, FmmResult, FmmScalar},
        wrangler::ExpansionWrangler,
    },
    traversal::types::ListSlice,
    tree::types::Tree,
    wrangler::{
        cache::{TransferKey, TranslationCache},
        check_lists, permute, scatter_potentials, source_slices,
    },
};

use operators::{apply_operator, l2l, l2p, m2l_operator, m2m, m2p, p2l, p2m, p2p, Binomials};

/// Expansion wrangler for the 2D Laplace kernel, with complex power series expansions.
///
/// The wrangler borrows the tree it evaluates on, and caches multipole to local operators for
/// that tree's geometry across runs.
///
/// # Example
/// ```
/// use boxfmm::{Laplace2dWrangler, TreeBuilder};
///
/// let sources = vec![0.0, 0.0, 1.0, 1.0];
/// let tree = TreeBuilder::new().uniform(1).build(&sources, None).unwrap();
///
/// // Expansions accurate to roughly 1e-6
/// let wrangler = Laplace2dWrangler::new(&tree, 20)
///     .unwrap()
///     .with_precision(1e-6)
///     .unwrap();
/// ```
pub struct Laplace2dWrangler<'a, T: FmmScalar> {
    tree: &'a Tree<T>,
    expansion_order: usize,
    precision: Option<T>,
    binomials: TranslationCache<usize, Binomials<T>>,
    m2l: TranslationCache<TransferKey, Vec<Complex<T>>>,
}

impl<'a, T> Laplace2dWrangler<'a, T>
where
    T: FmmScalar,
{
    /// Constructor
    ///
    /// # Arguments
    /// * `tree` - Tree the wrangler evaluates on.
    /// * `expansion_order` - Default truncation order, between 1 and 64.
    pub fn new(tree: &'a Tree<T>, expansion_order: usize) -> FmmResult<Self> {
        let wrangler = Self {
            tree,
            expansion_order,
            precision: None,
            binomials: TranslationCache::new(),
            m2l: TranslationCache::new(),
        };
        wrangler.check_expansion_order(expansion_order)?;
        Ok(wrangler)
    }

    /// Constructor with the default truncation order.
    pub fn with_default_order(tree: &'a Tree<T>) -> FmmResult<Self> {
        Self::new(tree, DEFAULT_EXPANSION_ORDER)
    }

    /// Require expansions accurate to a relative `precision`, rejecting truncation orders too
    /// low to reach it.
    pub fn with_precision(mut self, precision: T) -> FmmResult<Self> {
        if !(precision > T::zero() && precision < T::one()) {
            return Err(FmmError::InvalidInput(format!(
                "Precision must lie strictly between 0 and 1, found {precision}"
            )));
        }
        self.precision = Some(precision);
        self.check_expansion_order(self.expansion_order)?;
        Ok(self)
    }

    /// Lowest truncation order reaching a relative precision. Errors of well separated
    /// interactions roughly halve with each additional term.
    pub fn required_expansion_order(precision: T) -> usize {
        (-precision.log2()).ceil().to_usize().unwrap_or(1).max(1)
    }

    /// Cache of multipole to local operators.
    pub fn m2l_cache(&self) -> &TranslationCache<TransferKey, Vec<Complex<T>>> {
        &self.m2l
    }

    fn check_expansion_order(&self, expansion_order: usize) -> FmmResult<()> {
        if expansion_order == 0 {
            return Err(FmmError::InvalidExpansionOrder {
                order: expansion_order,
                reason: "expansions need at least one term beyond the charge".to_string(),
            });
        }

        if expansion_order > MAX_EXPANSION_ORDER {
            return Err(FmmError::InvalidExpansionOrder {
                order: expansion_order,
                reason: format!("orders above {MAX_EXPANSION_ORDER} are not supported"),
            });
        }

        if let Some(precision) = self.precision {
            let required = Self::required_expansion_order(precision);
            if expansion_order < required {
                return Err(FmmError::InvalidExpansionOrder {
                    order: expansion_order,
                    reason: format!(
                        "a precision of {precision} requires an order of at least {required}"
                    ),
                });
            }
        }

        Ok(())
    }

    fn centre(&self, ibox: usize) -> FmmResult<Complex<T>> {
        let [x, y] = self.tree.box_centre(ibox)?;
        Ok(Complex::new(x, y))
    }

    /// Radius of a box, the scale of the expansions centred on it.
    fn radius(&self, ibox: usize) -> FmmResult<T> {
        let key = self
            .tree
            .keys
            .get(ibox)
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: format!("box not in tree of {} boxes", self.tree.nboxes()),
            })?;
        Ok(self.tree.box_side(key.level()) * T::FRAC_1_SQRT_2())
    }

    fn binomials(&self, expansion_order: usize) -> Arc<Binomials<T>> {
        self.binomials
            .get_or_insert_with(expansion_order, || Binomials::new(2 * expansion_order))
    }

    /// Multipole to local operator from `source` to `target`, on the same `level`.
    fn m2l_operator(
        &self,
        level: u64,
        expansion_order: usize,
        target: usize,
        source: usize,
    ) -> FmmResult<Arc<Vec<Complex<T>>>> {
        let separation = self.centre(source)? - self.centre(target)?;
        let components = self.tree.keys[source]
            .find_transfer_vector_components(&self.tree.keys[target])
            .map_err(|e| FmmError::MalformedTraversal {
                ibox: source,
                reason: e.to_string(),
            })?;

        let key = TransferKey {
            expansion_order,
            level,
            components,
        };

        let source_radius = self.radius(source)?;
        let target_radius = self.radius(target)?;

        Ok(self.m2l.get_or_insert_with(key, || {
            m2l_operator(
                separation,
                source_radius,
                target_radius,
                expansion_order,
                &self.binomials(expansion_order),
            )
        }))
    }

    fn targets(&self, ibox: usize) -> FmmResult<(Range<usize>, &[T])> {
        let targets = self.tree.box_targets(ibox)?;
        let coordinates = self
            .tree
            .targets
            .get(2 * targets.start..2 * targets.end)
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: "target range exceeds the targets".to_string(),
            })?;
        Ok((targets, coordinates))
    }
}

impl<T> ExpansionWrangler for Laplace2dWrangler<'_, T>
where
    T: FmmScalar,
{
    type Weight = T;
    type Potential = T;
    type Coefficient = Complex<T>;

    fn expansion_order(&self) -> usize {
        self.expansion_order
    }

    fn ncoeffs(&self, expansion_order: usize) -> usize {
        expansion_order + 1
    }

    fn reorder_sources(&self, source_weights: &[T]) -> FmmResult<Vec<T>> {
        permute(source_weights, &self.tree.user_source_ids, "source weights")
    }

    fn reorder_potentials(&self, potentials: &[T]) -> FmmResult<Vec<T>> {
        permute(potentials, &self.tree.sorted_target_ids, "potentials")
    }

    fn form_multipoles(
        &self,
        _level: u64,
        expansion_order: usize,
        source_boxes: &[usize],
        source_weights: &[T],
        multipoles: &mut ExpansionsMut<'_, Complex<T>>,
    ) -> FmmResult<()> {
        self.check_expansion_order(expansion_order)?;
        let ncoeffs = self.ncoeffs(expansion_order);

        let expansions = source_boxes
            .par_iter()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|&ibox| -> FmmResult<_> {
                let sources = self.tree.box_sources(ibox)?;
                let (coordinates, charges) =
                    source_slices(ibox, &self.tree.sources, source_weights, sources)?;
                let mut multipole = vec![Complex::zero(); ncoeffs];
                p2m(
                    self.centre(ibox)?,
                    self.radius(ibox)?,
                    coordinates,
                    charges,
                    &mut multipole,
                );
                Ok((ibox, multipole))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        for (ibox, multipole) in expansions {
            multipoles.accumulate(ibox, &multipole)?;
        }
        Ok(())
    }

    fn coarsen_multipoles(
        &self,
        _level: u64,
        expansion_order: usize,
        parent_boxes: &[usize],
        child_multipoles: &Expansions<'_, Complex<T>>,
        parent_multipoles: &mut ExpansionsMut<'_, Complex<T>>,
    ) -> FmmResult<()> {
        let ncoeffs = self.ncoeffs(expansion_order);
        let binomials = self.binomials(expansion_order);

        let expansions = parent_boxes
            .par_iter()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|&ibox| -> FmmResult<_> {
                let centre = self.centre(ibox)?;
                let radius = self.radius(ibox)?;
                let mut multipole = vec![Complex::zero(); ncoeffs];
                for child in self.tree.box_children(ibox)? {
                    if self.tree.has_sources(child) {
                        m2m(
                            self.centre(child)? - centre,
                            self.radius(child)?,
                            radius,
                            child_multipoles.try_get(child)?,
                            &mut multipole,
                            &binomials,
                        );
                    }
                }
                Ok((ibox, multipole))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        for (ibox, multipole) in expansions {
            parent_multipoles.accumulate(ibox, &multipole)?;
        }
        Ok(())
    }

    fn translate_box_multipoles_to_local(
        &self,
        level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, Complex<T>>,
        locals: &mut ExpansionsMut<'_, Complex<T>>,
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        let ncoeffs = self.ncoeffs(expansion_order);

        let expansions = target_boxes
            .par_iter()
            .enumerate()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|(i, &ibox)| -> FmmResult<_> {
                let mut local = vec![Complex::zero(); ncoeffs];
                for &source in source_lists.list(i) {
                    let operator = self.m2l_operator(level, expansion_order, ibox, source)?;
                    apply_operator(&operator, multipoles.try_get(source)?, &mut local);
                }
                Ok((ibox, local))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        for (ibox, local) in expansions {
            locals.accumulate(ibox, &local)?;
        }
        Ok(())
    }

    fn form_locals(
        &self,
        _level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[T],
        locals: &mut ExpansionsMut<'_, Complex<T>>,
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        let ncoeffs = self.ncoeffs(expansion_order);

        let expansions = target_boxes
            .par_iter()
            .enumerate()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|(i, &ibox)| -> FmmResult<_> {
                let centre = self.centre(ibox)?;
                let radius = self.radius(ibox)?;
                let mut local = vec![Complex::zero(); ncoeffs];
                for &source in source_lists.list(i) {
                    let sources = self.tree.box_sources(source)?;
                    let (coordinates, charges) =
                        source_slices(source, &self.tree.sources, source_weights, sources)?;
                    p2l(centre, radius, coordinates, charges, &mut local);
                }
                Ok((ibox, local))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        for (ibox, local) in expansions {
            locals.accumulate(ibox, &local)?;
        }
        Ok(())
    }

    fn refine_locals(
        &self,
        _level: u64,
        expansion_order: usize,
        child_boxes: &[usize],
        parent_locals: &Expansions<'_, Complex<T>>,
        child_locals: &mut ExpansionsMut<'_, Complex<T>>,
    ) -> FmmResult<()> {
        let ncoeffs = self.ncoeffs(expansion_order);
        let binomials = self.binomials(expansion_order);

        let expansions = child_boxes
            .par_iter()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|&ibox| -> FmmResult<_> {
                let parent = self.tree.box_parent(ibox)?;
                let shift = self.centre(ibox)? - self.centre(parent)?;
                let mut local = vec![Complex::zero(); ncoeffs];
                l2l(
                    shift,
                    self.radius(parent)?,
                    self.radius(ibox)?,
                    parent_locals.try_get(parent)?,
                    &mut local,
                    &binomials,
                );
                Ok((ibox, local))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        for (ibox, local) in expansions {
            child_locals.accumulate(ibox, &local)?;
        }
        Ok(())
    }

    fn eval_locals(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        locals: &Expansions<'_, Complex<T>>,
        potentials: &mut [T],
    ) -> FmmResult<()> {
        let results = target_boxes
            .par_iter()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|&ibox| -> FmmResult<_> {
                let (targets, coordinates) = self.targets(ibox)?;
                let mut values = vec![T::zero(); targets.len()];
                l2p(
                    self.centre(ibox)?,
                    self.radius(ibox)?,
                    locals.try_get(ibox)?,
                    coordinates,
                    &mut values,
                );
                Ok((ibox, targets, values))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        scatter_potentials(results, potentials)
    }

    fn eval_multipoles(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, Complex<T>>,
        potentials: &mut [T],
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;

        let results = target_boxes
            .par_iter()
            .enumerate()
            .with_min_len(MIN_BOXES_PER_TASK)
            .map(|(i, &ibox)| -> FmmResult<_> {
                let (targets, coordinates) = self.targets(ibox)?;
                let mut values = vec![T::zero(); targets.len()];
                for &source in source_lists.list(i) {
                    m2p(
                        self.centre(source)?,
                        self.radius(source)?,
                        multipoles.try_get(source)?,
                        coordinates,
                        &mut values,
                    );
                }
                Ok((ibox, targets, values))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        scatter_potentials(results, potentials)
    }

    fn eval_direct(
        &self,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[T],
        potentials: &mut [T],
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;

        let results = target_boxes
            .par_iter()
            .enumerate()
            .map(|(i, &ibox)| -> FmmResult<_> {
                let (targets, coordinates) = self.targets(ibox)?;
                let mut values = vec![T::zero(); targets.len()];
                for &source in source_lists.list(i) {
                    let sources = self.tree.box_sources(source)?;
                    let (source_coordinates, charges) =
                        source_slices(source, &self.tree.sources, source_weights, sources)?;
                    p2p(source_coordinates, charges, coordinates, &mut values);
                }
                Ok((ibox, targets, values))
            })
            .collect::<FmmResult<Vec<_>>>()?;

        scatter_potentials(results, potentials)
    }
}

/// Potentials of the 2D Laplace kernel by direct summation, the reference for FMM results.
///
/// # Arguments
/// * `sources` - Source coordinates, row major `[x_0, y_0, x_1, y_1, ...]`.
/// * `charges` - One charge per source.
/// * `targets` - Target coordinates, row major.
pub fn direct_potentials<T: FmmScalar>(
    sources: &[T],
    charges: &[T],
    targets: &[T],
) -> FmmResult<Vec<T>> {
    if sources.len() % 2 != 0 || targets.len() % 2 != 0 || sources.len() / 2 != charges.len() {
        return Err(FmmError::InvalidInput(format!(
            "Expected one charge per source, found {} coordinates and {} charges",
            sources.len(),
            charges.len()
        )));
    }

    Ok(targets
        .par_chunks_exact(2)
        .map(|target| {
            let mut potential = [T::zero()];
            p2p(sources, charges, target, &mut potential);
            potential[0]
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fmm::types::ExpansionBuffer,
        traversal::types::Traversal,
        tree::{
            helpers::{points_fixture, weights_fixture},
            types::TreeBuilder,
        },
        FmmConfig,
    };

    #[test]
    fn test_expansion_order_validation() {
        let sources = points_fixture::<f64>(50, None, None, Some(0));
        let tree = TreeBuilder::new().uniform(2).build(&sources, None).unwrap();

        assert!(matches!(
            Laplace2dWrangler::new(&tree, 0),
            Err(FmmError::InvalidExpansionOrder { order: 0, .. })
        ));
        assert!(matches!(
            Laplace2dWrangler::new(&tree, MAX_EXPANSION_ORDER + 1),
            Err(FmmError::InvalidExpansionOrder { .. })
        ));

        assert_eq!(Laplace2dWrangler::<f64>::required_expansion_order(1e-10), 34);
        assert!(matches!(
            Laplace2dWrangler::new(&tree, 8).unwrap().with_precision(1e-10),
            Err(FmmError::InvalidExpansionOrder { order: 8, .. })
        ));
        assert!(Laplace2dWrangler::new(&tree, 40)
            .unwrap()
            .with_precision(1e-10)
            .is_ok());
        assert!(matches!(
            Laplace2dWrangler::new(&tree, 8).unwrap().with_precision(2.0),
            Err(FmmError::InvalidInput(_))
        ));

        let wrangler = Laplace2dWrangler::with_default_order(&tree).unwrap();
        assert_eq!(wrangler.expansion_order(), DEFAULT_EXPANSION_ORDER);
        assert_eq!(wrangler.ncoeffs(DEFAULT_EXPANSION_ORDER), DEFAULT_EXPANSION_ORDER + 1);
    }

    #[test]
    fn test_coarsening_additivity() {
        let nsources = 400;
        let sources = points_fixture::<f64>(nsources, None, None, Some(0));
        let weights = weights_fixture::<f64>(nsources, Some(1));
        let tree = TreeBuilder::new().uniform(2).build(&sources, None).unwrap();
        let traversal = Traversal::new(tree).unwrap();

        let order = 12;
        let wrangler = Laplace2dWrangler::new(&traversal.tree, order).unwrap();
        let ncoeffs = wrangler.ncoeffs(order);
        let weights = wrangler.reorder_sources(&weights).unwrap();
        let level_start_box_nrs = &traversal.tree.level_start_box_nrs;
        let parents = traversal.source_parent_boxes.level(1);

        // Children formed from particles, then translated into their parents
        let mut coarsened = ExpansionBuffer::new(level_start_box_nrs, ncoeffs);
        wrangler
            .form_multipoles(
                2,
                order,
                traversal.source_boxes.level(2),
                &weights,
                &mut coarsened.level_mut(2),
            )
            .unwrap();
        let (children, mut parent_multipoles) = coarsened.coarsen_views(1);
        wrangler
            .coarsen_multipoles(1, order, parents, &children, &mut parent_multipoles)
            .unwrap();

        // Parents formed from their particles directly
        let mut direct = ExpansionBuffer::new(level_start_box_nrs, ncoeffs);
        wrangler
            .form_multipoles(1, order, parents, &weights, &mut direct.level_mut(1))
            .unwrap();

        assert_eq!(parents.len(), 4);
        for &ibox in parents {
            let a = coarsened.level(1).get(ibox).unwrap();
            let b = direct.level(1).get(ibox).unwrap();
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).norm() <= 1e-12 * (1.0 + y.norm()));
            }
        }
    }

    #[test]
    fn test_reorder_round_trip() {
        let nsources = 300;
        let sources = points_fixture::<f64>(nsources, None, None, Some(2));
        let weights = weights_fixture::<f64>(nsources, Some(3));
        let tree = TreeBuilder::new().adaptive(10, 8).build(&sources, None).unwrap();
        let wrangler = Laplace2dWrangler::new(&tree, 6).unwrap();

        let tree_order = wrangler.reorder_sources(&weights).unwrap();
        assert_ne!(tree_order, weights);
        assert_eq!(wrangler.reorder_potentials(&tree_order).unwrap(), weights);

        assert!(matches!(
            wrangler.reorder_sources(&weights[1..]),
            Err(FmmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_m2l_cache_reuse() {
        let nsources = 1000;
        let sources = points_fixture::<f64>(nsources, None, None, Some(4));
        let weights = weights_fixture::<f64>(nsources, Some(5));
        let tree = TreeBuilder::new().uniform(3).build(&sources, None).unwrap();
        let traversal = Traversal::new(tree).unwrap();
        let wrangler = Laplace2dWrangler::new(&traversal.tree, 8).unwrap();

        let first = crate::drive_fmm(&traversal, &wrangler, &weights, FmmConfig::new()).unwrap();
        let ncached = wrangler.m2l_cache().len();

        // At most 40 distinct transfer vectors on each of levels 2 and 3
        assert!(ncached > 0 && ncached <= 80);

        let second = crate::drive_fmm(&traversal, &wrangler, &weights, FmmConfig::new()).unwrap();
        assert_eq!(wrangler.m2l_cache().len(), ncached);
        assert_eq!(first, second);
    }

    #[test]
    fn test_direct_potentials() {
        let sources = vec![0.0, 0.0, 3.0, 4.0];
        let charges = vec![1.0, 2.0];
        let targets = vec![0.0, 0.0];

        let potentials = direct_potentials(&sources, &charges, &targets).unwrap();
        assert!((potentials[0] - 2.0 * 5f64.ln()).abs() < 1e-14);
        assert!(direct_potentials(&sources, &charges[..1], &targets).is_err());
    }
}
