//! The pass sequence of a multilevel FMM.
use log::{debug, info};

use crate::{
    fmm::{
        helpers::optionally_time,
        types::{ExpansionBuffer, FmmConfig, FmmEvaluation, PassCallback},
    },
    traits::{
        types::{FmmError, FmmResult, FmmScalar, PassTime, PassType},
        wrangler::ExpansionWrangler,
    },
    traversal::types::Traversal,
};

impl<'a> FmmConfig<'a> {
    /// Default configuration, using the wrangler's truncation order without timing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the wrangler's default truncation order.
    pub fn expansion_order(mut self, expansion_order: usize) -> Self {
        self.expansion_order = Some(expansion_order);
        self
    }

    /// Collect the time spent in each pass.
    pub fn timed(mut self, timed: bool) -> Self {
        self.timed = timed;
        self
    }

    /// Observe each completed pass, with the time it took.
    pub fn on_pass<F: FnMut(&PassTime) + 'a>(mut self, callback: F) -> Self {
        self.on_pass = Some(Box::new(callback));
        self
    }
}

/// Runs passes, annotating their errors and reporting their durations.
struct PassRecorder<'a> {
    timed: bool,
    times: Vec<PassTime>,
    on_pass: Option<PassCallback<'a>>,
}

impl<'a> PassRecorder<'a> {
    fn new(timed: bool, on_pass: Option<PassCallback<'a>>) -> Self {
        Self {
            timed,
            times: Vec::new(),
            on_pass,
        }
    }

    fn run<R, F: FnOnce() -> FmmResult<R>>(&mut self, pass: PassType, f: F) -> FmmResult<R> {
        debug!("{pass}");

        let (result, duration) = optionally_time(self.timed || self.on_pass.is_some(), f);
        let result = result.map_err(|e| e.in_pass(pass))?;

        if let Some(duration) = duration {
            let time = PassTime::from_duration(pass, duration);
            if let Some(callback) = self.on_pass.as_mut() {
                callback(&time);
            }
            if self.timed {
                self.times.push(time);
            }
        }

        Ok(result)
    }
}

/// Evaluate potentials at the targets of a traversal with an FMM.
///
/// Runs, in order: reordering of the weights into tree order, the upward pass from the deepest
/// level to the root, the far field translations, the downward pass from the root to the deepest
/// level, the evaluation of far and near fields at targets, and the reordering of potentials
/// back into user order. A failing pass aborts the run, and its error is returned annotated
/// with the pass.
///
/// # Arguments
/// * `traversal` - Tree and interaction lists to evaluate over.
/// * `wrangler` - Kernel specific expansion operators.
/// * `source_weights` - One weight per source, in user order.
/// * `config` - Run configuration.
pub fn drive_fmm<T, W>(
    traversal: &Traversal<T>,
    wrangler: &W,
    source_weights: &[W::Weight],
    config: FmmConfig<'_>,
) -> FmmResult<Vec<W::Potential>>
where
    T: FmmScalar,
    W: ExpansionWrangler + ?Sized,
{
    drive_fmm_timed(traversal, wrangler, source_weights, config).map(|result| result.potentials)
}

/// Evaluate potentials as [`drive_fmm`] does, returning the time spent in each pass alongside
/// the potentials when the configuration asks for timing.
pub fn drive_fmm_timed<T, W>(
    traversal: &Traversal<T>,
    wrangler: &W,
    source_weights: &[W::Weight],
    config: FmmConfig<'_>,
) -> FmmResult<FmmEvaluation<W::Potential>>
where
    T: FmmScalar,
    W: ExpansionWrangler + ?Sized,
{
    let tree = &traversal.tree;
    let nsources = tree.nsources();
    let ntargets = tree.ntargets();

    if source_weights.len() != nsources {
        return Err(FmmError::InvalidInput(format!(
            "Expected {nsources} source weights, found {}",
            source_weights.len()
        )));
    }

    let FmmConfig {
        expansion_order,
        timed,
        on_pass,
    } = config;
    let order = expansion_order.unwrap_or_else(|| wrangler.expansion_order());
    let ncoeffs = wrangler.ncoeffs(order);
    let nlevels = traversal.nlevels() as u64;
    let mut recorder = PassRecorder::new(timed, on_pass);

    info!(
        "start fmm: {nsources} sources, {ntargets} targets, {nlevels} levels, expansion order {order}"
    );

    let weights = recorder.run(PassType::ReorderSources, || {
        let weights = wrangler.reorder_sources(source_weights)?;
        if weights.len() != nsources {
            return Err(FmmError::InvalidInput(format!(
                "Reordering returned {} weights for {nsources} sources",
                weights.len()
            )));
        }
        Ok(weights)
    })?;

    // Upward pass
    debug!("upward pass");
    let mut multipoles =
        ExpansionBuffer::<W::Coefficient>::new(&tree.level_start_box_nrs, ncoeffs);
    for level in (0..nlevels).rev() {
        let leaves = traversal.source_boxes.level(level);
        if !leaves.is_empty() {
            let mut level_multipoles = multipoles.level_mut(level);
            recorder.run(PassType::FormMultipoles(level), || {
                wrangler.form_multipoles(level, order, leaves, &weights, &mut level_multipoles)
            })?;
        }

        let parents = traversal.source_parent_boxes.level(level);
        if !parents.is_empty() {
            let (children, mut parent_multipoles) = multipoles.coarsen_views(level);
            recorder.run(PassType::CoarsenMultipoles(level), || {
                wrangler.coarsen_multipoles(
                    level,
                    order,
                    parents,
                    &children,
                    &mut parent_multipoles,
                )
            })?;
        }
    }

    // Far field translations, order across levels is irrelevant
    debug!("far field translations");
    let mut locals = ExpansionBuffer::<W::Coefficient>::new(&tree.level_start_box_nrs, ncoeffs);
    for level in 0..nlevels {
        let range = traversal.target_or_target_parent_boxes.level_range(level);
        let targets = &traversal.target_or_target_parent_boxes.boxes[range.clone()];

        let siblings = traversal.from_sep_siblings.slice(range.clone());
        if siblings.nentries() > 0 {
            let level_multipoles = multipoles.level(level);
            let mut level_locals = locals.level_mut(level);
            recorder.run(PassType::MultipolesToLocals(level), || {
                wrangler.translate_box_multipoles_to_local(
                    level,
                    order,
                    targets,
                    &siblings,
                    &level_multipoles,
                    &mut level_locals,
                )
            })?;
        }

        let bigger = traversal.from_sep_bigger.slice(range);
        if bigger.nentries() > 0 {
            let mut level_locals = locals.level_mut(level);
            recorder.run(PassType::FormLocals(level), || {
                wrangler.form_locals(level, order, targets, &bigger, &weights, &mut level_locals)
            })?;
        }
    }

    // Downward pass, root locals are their far field translations alone
    debug!("downward pass");
    for level in 1..nlevels {
        let children = traversal.target_or_target_parent_boxes.level(level);
        if !children.is_empty() {
            let (parent_locals, mut child_locals) = locals.refine_views(level);
            recorder.run(PassType::RefineLocals(level), || {
                wrangler.refine_locals(level, order, children, &parent_locals, &mut child_locals)
            })?;
        }
    }

    // Far and near fields at targets
    debug!("evaluation at targets");
    let mut far_field = vec![W::Potential::default(); ntargets];
    let mut near_field = vec![W::Potential::default(); ntargets];
    let all_multipoles = multipoles.view();

    for level in 0..nlevels {
        let range = traversal.target_boxes.level_range(level);
        if range.is_empty() {
            continue;
        }
        let leaves = &traversal.target_boxes.boxes[range.clone()];

        let level_locals = locals.level(level);
        recorder.run(PassType::EvalLocals(level), || {
            wrangler.eval_locals(level, order, leaves, &level_locals, &mut far_field)
        })?;

        let smaller = traversal.from_sep_smaller.slice(range);
        if smaller.nentries() > 0 {
            recorder.run(PassType::EvalMultipoles(level), || {
                wrangler.eval_multipoles(
                    level,
                    order,
                    leaves,
                    &smaller,
                    &all_multipoles,
                    &mut far_field,
                )
            })?;
        }
    }

    recorder.run(PassType::EvalDirect, || {
        wrangler.eval_direct(
            &traversal.target_boxes.boxes,
            &traversal.neighbor_source_boxes.all(),
            &weights,
            &mut near_field,
        )
    })?;

    let potentials = recorder.run(PassType::Combine, || {
        for (near, far) in near_field.iter_mut().zip(far_field) {
            *near += far;
        }
        Ok(near_field)
    })?;

    let potentials = recorder.run(PassType::ReorderPotentials, || {
        wrangler.reorder_potentials(&potentials)
    })?;

    let potentials = recorder.run(PassType::FinalizePotentials, || {
        wrangler.finalize_potentials(potentials)
    })?;

    info!("fmm complete");

    Ok(FmmEvaluation {
        potentials,
        pass_times: recorder.times,
    })
}
