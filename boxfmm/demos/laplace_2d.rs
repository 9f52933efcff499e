use boxfmm::{
    drive_fmm_timed,
    fmm::helpers::relative_l2_error,
    tree::helpers::{points_fixture, points_fixture_clustered, weights_fixture},
    wrangler::direct_potentials,
    FmmConfig, Laplace2dWrangler, Traversal, TreeBuilder,
};

fn main() {
    // Setup clustered sources and uniform targets
    let n_sources = 4000;
    let n_targets = 2000;
    let sources = points_fixture_clustered::<f64>(n_sources / 2, n_sources / 2, 0.05, Some(0));
    let targets = points_fixture::<f64>(n_targets, None, None, Some(1));
    let weights = weights_fixture::<f64>(n_sources, Some(2));

    let tree = TreeBuilder::new()
        .adaptive(30, 12)
        .build(&sources, Some(&targets))
        .unwrap();
    println!("tree: {} boxes over {} levels", tree.nboxes(), tree.nlevels());

    let traversal = Traversal::new(tree).unwrap();
    let wrangler = Laplace2dWrangler::new(&traversal.tree, 12)
        .unwrap()
        .with_precision(1e-3)
        .unwrap();

    let evaluation = drive_fmm_timed(
        &traversal,
        &wrangler,
        &weights,
        FmmConfig::new().timed(true),
    )
    .unwrap();

    for time in evaluation.pass_times.iter() {
        println!("{}: {} ms", time.pass, time.millis());
    }

    let expected = direct_potentials(&sources, &weights, &targets).unwrap();
    println!(
        "relative l2 error {:e}",
        relative_l2_error(&evaluation.potentials, &expected)
    );
}
