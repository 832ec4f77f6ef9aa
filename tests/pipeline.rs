//! End-to-end pipeline tests: simulate -> calibrate -> score -> fit test,
//! plus equating across two administrations.

use irt_engine::{
    calibrate, equate, score_respondents, simulation, test_fit, AnchorParameters,
    CalibrationMethod, EngineConfig, EngineWarning, ItemParameters, ParameterSet, ResponseMatrix,
};
use ndarray::Array2;

fn known_bank(n: usize) -> ParameterSet {
    let items = (0..n)
        .map(|j| ItemParameters {
            item_id: format!("q{j}"),
            a: 0.8 + 0.1 * (j % 5) as f64,
            b: -1.5 + 3.0 * j as f64 / n as f64,
            c: 0.15,
            is_anchor: false,
            calibrated: true,
        })
        .collect();
    ParameterSet::new(items, true)
}

fn simulated_matrix(seed: u64) -> ResponseMatrix {
    let bank = known_bank(8);
    let thetas = simulation::draw_thetas(60, 0.0, 1.0, seed);
    simulation::simulate_responses(&thetas, &bank, 1.7, 0.05, seed).unwrap()
}

#[test]
fn calibrate_score_and_fit_on_simulated_data() {
    let config = EngineConfig::default();
    let matrix = simulated_matrix(101);

    let anchors = vec![
        AnchorParameters {
            item_id: "q0".into(),
            a: 0.8,
            b: -1.5,
            c: 0.15,
        },
        AnchorParameters {
            item_id: "q4".into(),
            a: 1.2,
            b: 0.0,
            c: 0.15,
        },
    ];

    for method in [CalibrationMethod::Ml, CalibrationMethod::Mlf] {
        let cal = calibrate(&matrix, Some(&anchors), method, &config, None).unwrap();
        assert!(cal.set.is_complete());
        assert_eq!(cal.set.len(), 8);

        // Anchors pass through untouched, independent of method.
        for anchor in &anchors {
            let item = cal.set.get(&anchor.item_id).unwrap();
            assert!(item.is_anchor);
            assert_eq!(item.a.to_bits(), anchor.a.to_bits());
            assert_eq!(item.b.to_bits(), anchor.b.to_bits());
            assert_eq!(item.c.to_bits(), anchor.c.to_bits());
        }

        // Free items respect the search box (and hence the fence under MLF).
        for item in cal.set.items().iter().filter(|p| p.calibrated) {
            assert!(item.a > 0.0);
            assert!((0.0..=0.5).contains(&item.c));
        }

        let table = score_respondents(&matrix, &cal.set, &config, None).unwrap();
        assert!(table.complete);
        assert_eq!(table.rows.len(), 60);
        let (lower, upper) = config.theta_bounds;
        for row in &table.rows {
            assert!(row.theta >= lower && row.theta <= upper);
            assert!(row.reporting_score >= config.reporting.min);
            assert!(row.reporting_score <= config.reporting.max);
            assert!(row.total_items == 8);
        }

        let thetas: Vec<f64> = table.rows.iter().map(|r| r.theta).collect();
        let report = test_fit(&matrix, &thetas, &cal.set, &config).unwrap();
        assert_eq!(report.degrees_of_freedom, config.fit_bins - 1);
        assert!(report.chi_square >= 0.0);
        assert!((0.0..=1.0).contains(&report.p_value));
    }
}

#[test]
fn full_pipeline_is_bit_deterministic() {
    let config = EngineConfig::default();
    let matrix = simulated_matrix(7);

    let run = || {
        let cal = calibrate(&matrix, None, CalibrationMethod::Mlf, &config, None).unwrap();
        let table = score_respondents(&matrix, &cal.set, &config, None).unwrap();
        (
            serde_json::to_string(&cal.set).unwrap(),
            serde_json::to_string(&table).unwrap(),
        )
    };

    let (params_a, table_a) = run();
    let (params_b, table_b) = run();
    assert_eq!(params_a, params_b);
    assert_eq!(table_a, table_b);
}

#[test]
fn sparse_items_degrade_with_warnings_not_errors() {
    // Column q1 has only 4 valid responses; everything else is healthy.
    let mut data = Array2::zeros((12, 3));
    for i in 0..12 {
        data[[i, 0]] = i32::from(i % 3 != 0);
        data[[i, 1]] = if i < 4 { 1 } else { -1 };
        data[[i, 2]] = i32::from(i % 2 == 0);
    }
    let matrix = ResponseMatrix::new(
        data,
        (0..12).map(|i| format!("r{i}")).collect(),
        vec!["q0".into(), "q1".into(), "q2".into()],
    )
    .unwrap();

    let config = EngineConfig::default();
    let cal = calibrate(&matrix, None, CalibrationMethod::Ml, &config, None).unwrap();
    assert_eq!(cal.set.len(), 3);

    let q1 = cal.set.get("q1").unwrap();
    assert!(!q1.calibrated);
    assert_eq!((q1.a, q1.b, q1.c), (1.0, 0.0, 0.2));
    assert!(cal
        .warnings
        .iter()
        .any(|w| matches!(w, EngineWarning::DataInsufficiency { id, .. } if id == "q1")));

    // The healthy items still calibrated.
    assert!(cal.set.get("q0").unwrap().calibrated);
    assert!(cal.set.get("q2").unwrap().calibrated);
}

#[test]
fn equating_aligns_two_administrations() {
    let config = EngineConfig::default();

    // Reference scale and a target scale shifted by 0.4 and stretched by 1.25.
    let ids: Vec<String> = (0..6).map(|i| format!("q{i}")).collect();
    let ref_b = [-1.2, -0.6, -0.1, 0.3, 0.8, 1.4];
    let reference = ParameterSet::new(
        ids.iter()
            .zip(ref_b)
            .map(|(id, b)| ItemParameters {
                item_id: id.clone(),
                a: 1.0,
                b,
                c: 0.2,
                is_anchor: true,
                calibrated: false,
            })
            .collect(),
        true,
    );
    let target = ParameterSet::new(
        ids.iter()
            .zip(ref_b)
            .map(|(id, b)| ItemParameters {
                item_id: id.clone(),
                a: 1.0,
                b: 1.25 * b + 0.4,
                c: 0.2,
                is_anchor: true,
                calibrated: false,
            })
            .collect(),
        true,
    );

    let result = equate(&reference, &target, &ids, &config).unwrap();
    assert!(result.warnings.is_empty());
    let t = &result.transform;
    assert!((t.slope - 1.0 / 1.25).abs() < 1e-9);

    // The transform recovers the reference difficulties from the target.
    let aligned = t.apply(&target);
    for (orig, back) in reference.items().iter().zip(aligned.items()) {
        assert!((orig.b - back.b).abs() < 1e-9);
    }

    // Round trip within 1e-6.
    let back = t.invert().apply(&aligned);
    for (orig, recovered) in target.items().iter().zip(back.items()) {
        assert!((orig.b - recovered.b).abs() < 1e-6);
    }
}
