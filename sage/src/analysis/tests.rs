//! End-to-end scenarios over synthetic libraries.

use super::*;
use crate::grid::LogGrid;
use crate::result::BestType;
use crate::testing;

fn ia_input() -> Spectrum {
    testing::synthetic_spectrum(&testing::ia_features(), 1.0)
}

#[test]
fn exact_template_with_forced_zero_redshift() {
    testing::init_tracing();
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 3, 3);

    let config = AnalysisConfig {
        scoring: ScoringConfig {
            forced_redshift: Some(0.0),
            ..ScoringConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let result = analyze(
        ia_input().into(),
        &library,
        &config,
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert!(result.success);
    assert_eq!(result.best_type, BestType::Known("Ia".to_string()));
    // The input IS the epoch-0 Ia template, so it must rank first.
    assert_eq!(result.top_matches[0].name, "sn_ia_00");
    assert!(result.rlap_best.unwrap() > 4.0);
    let cluster = result.winning_cluster.expect("cluster expected");
    assert!(cluster.z.abs() < 1e-4, "z = {}", cluster.z);
}

#[test]
fn shifted_template_recovers_the_shift() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 3, 3);

    // Shift by exactly 20 grid bins.
    let z_injected = (20.0 * grid.dlnw()).exp() - 1.0;
    let input = testing::redshift_spectrum(&ia_input(), z_injected);

    let result = analyze(
        input.into(),
        &library,
        &AnalysisConfig::default(),
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert_eq!(result.best_type, BestType::Known("Ia".to_string()));
    let z = result.z.expect("consensus redshift expected");
    assert!(
        ((1.0 + z).ln() - 20.0 * grid.dlnw()).abs() < 0.5 * grid.dlnw(),
        "recovered z = {z}, injected {z_injected}"
    );
}

#[test]
fn pure_noise_is_unknown() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 3, 3);

    let wave: Vec<f64> = (0..3000).map(|i| 3500.0 + i as f64 * 2.0).collect();
    let flat = Spectrum {
        wave: wave.clone(),
        flux: vec![100.0; 3000],
    };
    let noise = testing::add_noise(&flat, 0.2, 99);

    let result = analyze(
        noise.into(),
        &library,
        &AnalysisConfig::default(),
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert!(result.success);
    assert_eq!(result.best_type, BestType::Unknown);
    assert!(result.winning_cluster.is_none());
    assert!(result.z.is_none());
    assert!(result.type_fractions.is_empty());
}

#[test]
fn mixed_library_classifies_a_noisy_ia() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 10, 10);

    let z_injected = 0.03;
    let input = testing::add_noise(
        &testing::redshift_spectrum(&ia_input(), z_injected),
        0.02,
        7,
    );

    let result = analyze(
        input.into(),
        &library,
        &AnalysisConfig::default(),
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert_eq!(result.best_type, BestType::Known("Ia".to_string()));
    let ia_fraction = result.type_fractions.get("Ia").copied().unwrap_or(0.0);
    let ii_fraction = result.type_fractions.get("II").copied().unwrap_or(0.0);
    assert!(ia_fraction > ii_fraction);

    let z = result.z.unwrap();
    assert!((z - z_injected).abs() < 1e-3, "z = {z}");
    assert!(result.age.is_some());
}

#[test]
fn forcing_a_wrong_redshift_collapses_to_unknown() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 5, 0);

    let input = testing::redshift_spectrum(&ia_input(), 0.02);
    let config = AnalysisConfig {
        scoring: ScoringConfig {
            forced_redshift: Some(0.5),
            ..ScoringConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let result = analyze(
        input.into(),
        &library,
        &config,
        &CancelToken::new(),
        None,
    )
    .unwrap();

    // Either nothing is accepted, or whatever survives cannot form an
    // eligible cluster.
    assert_eq!(result.best_type, BestType::Unknown);
    assert!(result.winning_cluster.is_none());
}

#[test]
fn cancellation_propagates() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 4, 4);

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = analyze(
        ia_input().into(),
        &library,
        &AnalysisConfig::default(),
        &cancel,
        None,
    );
    assert!(matches!(result, Err(crate::Error::Cancelled { .. })));
}

#[test]
fn classification_is_invariant_under_flux_scaling() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 4, 4);
    let config = AnalysisConfig::default();

    let base = analyze(
        ia_input().into(),
        &library,
        &config,
        &CancelToken::new(),
        None,
    )
    .unwrap();
    let scaled_input = testing::synthetic_spectrum(&testing::ia_features(), 41.0);
    let scaled = analyze(
        scaled_input.into(),
        &library,
        &config,
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert_eq!(base.best_type, scaled.best_type);
    let accepted = |r: &AnalysisResult| -> Vec<(String, bool)> {
        r.filtered_matches
            .iter()
            .map(|m| (m.name.clone(), m.rejected))
            .collect()
    };
    assert_eq!(accepted(&base), accepted(&scaled));
    for (a, b) in base.filtered_matches.iter().zip(&scaled.filtered_matches) {
        assert!(
            (a.rlap - b.rlap).abs() < 1e-2 * a.rlap.abs().max(1.0),
            "{}: rlap {} vs {}",
            a.name,
            a.rlap,
            b.rlap
        );
    }
}

#[test]
fn trace_records_every_stage() {
    let grid = LogGrid::default();
    let library = testing::build_test_library(&grid, 3, 0);

    let result = analyze(
        ia_input().into(),
        &library,
        &AnalysisConfig::default(),
        &CancelToken::new(),
        None,
    )
    .unwrap();

    let stages: Vec<&str> = result.trace.stages.iter().map(|s| s.stage).collect();
    assert!(stages.contains(&"preprocess"));
    assert!(stages.contains(&"scoring"));
    assert!(stages.contains(&"clustering"));
}
