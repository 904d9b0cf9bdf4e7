//! Integration tests for carbon-policy sweeps and objective comparisons on the simple demo.
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wfe_nexus::analysis::{compare_objectives, run_sweep};
use wfe_nexus::model::Model;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("simple")
}

#[test]
fn test_run_sweep() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let dir = tempdir().unwrap();
    let points = run_sweep(&model, dir.path(), false).unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].options.carbon_policy, "no_tax");
    assert_eq!(points[1].options.carbon_policy, "high_tax");

    // A carbon tax never makes the cost-optimal plan dirtier (up to the MIP gap)
    let untaxed = points[0].kpis.emissions.value();
    let taxed = points[1].kpis.emissions.value();
    assert!(taxed <= untaxed * 1.01 + 1e-6);

    // Heat can only come from the CHP unit
    for results in &points {
        assert!(results.investment("chp").unwrap().built);
    }

    let sensitivity = fs::read_to_string(dir.path().join("sensitivity.csv")).unwrap();
    let mut lines = sensitivity.lines();
    assert_eq!(
        lines.next().unwrap(),
        "carbon_policy,carbon_tax,total_cost,emissions,renewable_capacity,battery_capacity,\
         electrolysis_capacity,hydrogen_storage_capacity"
    );
    assert_eq!(lines.count(), 2);
}

#[test]
fn test_compare_objectives() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let dir = tempdir().unwrap();
    let comparison = compare_objectives(&model, "no_tax", dir.path(), false).unwrap();

    let cost = &comparison.cost_optimal.kpis;
    let emission = &comparison.emission_optimal.kpis;
    assert!(emission.emissions.value() <= cost.emissions.value() * 1.01 + 1e-6);
    assert!(emission.total_cost.value() >= cost.total_cost.value() * 0.99);

    let text = fs::read_to_string(dir.path().join("objective_comparison.txt")).unwrap();
    assert!(text.contains("Cost-optimal plan"));
    assert!(text.contains("Emission-optimal plan"));
}
