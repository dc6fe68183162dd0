mod common;

use common::{
    ADV_PD, Call, DEFAULT_GDB, RecordingEngine, SCRATCH_GDB, SITE_A, SITE_P, default_fc, fc, gdb,
    request, wkid,
};
use proxprep_core::config::{CollisionPolicy, PrepConfig};
use proxprep_core::error::{ConfigError, PrepError, SpatialReferenceError};
use proxprep_core::{DataPrepper, GeoEngine, LayerName, LayerRole, PrepRequest, Wkid};

fn with_config(update: impl FnOnce(&mut PrepConfig)) -> PrepRequest {
    let mut config = PrepConfig::default();
    update(&mut config);
    request().with_config(config)
}

fn process_inputs(engine: &RecordingEngine) -> Vec<proxprep_core::ProcessInputs> {
    engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Process(inputs) => Some(inputs),
            _ => None,
        })
        .collect()
}

/// Layers already in the target projection are used as-is
#[test]
fn test_pass_through_without_reprojection() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);

    let report = DataPrepper::new(&engine).run(&request()).unwrap();

    assert!(report.reprojected.is_empty());
    assert!(
        !engine
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Reproject { .. }))
    );

    let copies: Vec<Call> = engine
        .writes()
        .into_iter()
        .filter(|call| matches!(call, Call::CopyRename { .. }))
        .collect();
    assert_eq!(
        copies,
        vec![
            Call::CopyRename {
                src: default_fc("Indigenous_autouc"),
                dst: default_fc("INDIG_AUTOCH_A"),
            },
            Call::CopyRename {
                src: default_fc("bld_p"),
                dst: default_fc("BUILDING_P"),
            },
        ]
    );

    let inputs = process_inputs(&engine);
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].site_areas, fc(SITE_A));
    assert_eq!(inputs[0].advanced_site_areas, fc(ADV_PD));
    assert_eq!(inputs[0].site_points, fc(SITE_P));
}

/// Every layer handed onward ends up in the requested spatial reference
#[test]
fn test_outputs_in_target_spatial_reference() {
    let engine = RecordingEngine::with_inputs(wkid(3857));
    engine.set_layer(default_fc("Indigenous_autouc"), Some(wkid(3347)));
    engine.set_layer(fc(SITE_P), Some(wkid(3347)));
    let sr = wkid(3347);

    let report = DataPrepper::new(&engine)
        .run(&with_config(|c| c.sr = sr))
        .unwrap();

    let roles: Vec<LayerRole> = report.reprojected.iter().map(|r| r.role).collect();
    assert_eq!(
        roles,
        vec![
            LayerRole::Buildings,
            LayerRole::SiteAreas,
            LayerRole::AdvancedSiteAreas,
        ]
    );
    assert_eq!(
        report.reprojected[1].target,
        gdb(SCRATCH_GDB).feature_class(LayerName::new("site_a_3347").unwrap())
    );
    assert!(report.reprojected.iter().all(|r| r.from == wkid(3857)));

    for output in [&report.indigenous_areas, &report.buildings, &report.output] {
        assert_eq!(engine.layer_wkid(output), Some(sr), "{output}");
    }

    let inputs = &process_inputs(&engine)[0];
    assert_eq!(inputs.spatial_reference, sr);
    for layer in [
        &inputs.indigenous_areas,
        &inputs.buildings,
        &inputs.site_areas,
        &inputs.advanced_site_areas,
        &inputs.site_points,
    ] {
        assert_eq!(engine.layer_wkid(layer), Some(sr), "{layer}");
    }
}

/// Unset optional parameters fall back to their documented defaults
#[test]
fn test_default_names_and_spatial_reference() {
    let engine = RecordingEngine::with_inputs(wkid(3347));

    let report = DataPrepper::new(&engine).run(&request()).unwrap();

    assert_eq!(report.indigenous_areas, default_fc("INDIG_AUTOCH_A"));
    assert_eq!(report.buildings, default_fc("BUILDING_P"));
    assert_eq!(report.output, default_fc("bld_p_processed"));
    assert_eq!(report.reprojected.len(), 5);
    assert_eq!(process_inputs(&engine)[0].spatial_reference.code(), 4326);
    assert_eq!(report.summary.features_written, 3);
}

#[test]
fn test_missing_building_layer_writes_nothing() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.remove_layer(&default_fc("bld_p"));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    match err {
        PrepError::MissingLayer { gdb: g, layer } => {
            assert_eq!(g, gdb(DEFAULT_GDB));
            assert_eq!(layer.as_str(), "bld_p");
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(engine.calls().is_empty());
}

#[test]
fn test_missing_default_gdb() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.remove_geodatabase(&gdb(DEFAULT_GDB));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();
    assert!(matches!(
        err,
        PrepError::MissingInput {
            parameter: "default_gdb",
            ..
        }
    ));
}

#[test]
fn test_missing_site_points_names_parameter() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.remove_layer(&fc(SITE_P));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    match &err {
        PrepError::MissingInput { parameter, path } => {
            assert_eq!(*parameter, "site_p_path");
            assert_eq!(path, &fc(SITE_P).path());
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.user_message().contains("site_p_path"));
    assert!(engine.calls().is_empty());
}

/// An unwritable scratch geodatabase fails before any reprojection
#[test]
fn test_unwritable_scratch_fails_before_reprojection() {
    let mut engine = RecordingEngine::with_inputs(wkid(3857));
    engine.mark_unwritable(gdb(SCRATCH_GDB));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    assert!(matches!(
        err,
        PrepError::WritePermission {
            parameter: "scratch_gdb",
            ..
        }
    ));
    assert!(engine.writes().is_empty());
}

#[test]
fn test_unwritable_default_gdb() {
    let mut engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.mark_unwritable(gdb(DEFAULT_GDB));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    assert!(matches!(
        err,
        PrepError::WritePermission {
            parameter: "default_gdb",
            ..
        }
    ));
    assert!(engine.calls().is_empty());
}

/// A lock refused for lack of access is reported against its parameter
#[test]
fn test_lock_permission_denied_is_write_permission() {
    let mut engine = RecordingEngine::with_inputs(wkid(3857));
    engine.deny_lock(gdb(DEFAULT_GDB));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    match err {
        PrepError::WritePermission { parameter, path } => {
            assert_eq!(parameter, "default_gdb");
            assert_eq!(path, gdb(DEFAULT_GDB).as_path());
        },
        other => panic!("expected WritePermission, got {other:?}"),
    }
    assert!(engine.writes().is_empty());
}

#[test]
fn test_scratch_lock_permission_denied() {
    let mut engine = RecordingEngine::with_inputs(wkid(3857));
    engine.deny_lock(gdb(SCRATCH_GDB));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    assert!(matches!(
        err,
        PrepError::WritePermission {
            parameter: "scratch_gdb",
            ..
        }
    ));
    assert!(engine.writes().is_empty());
}

/// A missing scratch geodatabase is created once validation has passed
#[test]
fn test_missing_scratch_is_created() {
    let engine = RecordingEngine::with_inputs(wkid(3857));
    engine.remove_geodatabase(&gdb(SCRATCH_GDB));

    DataPrepper::new(&engine).run(&request()).unwrap();

    let calls = engine.calls();
    assert_eq!(calls[0], Call::CreateGeodatabase(gdb(SCRATCH_GDB)));
    assert!(engine.geodatabase_exists(&gdb(SCRATCH_GDB)));
}

/// A failed validation never creates the scratch geodatabase
#[test]
fn test_missing_scratch_not_created_when_validation_fails() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.remove_geodatabase(&gdb(SCRATCH_GDB));
    engine.set_layer(fc(ADV_PD), None);

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    assert!(matches!(
        err,
        PrepError::SpatialReference(SpatialReferenceError::Undefined { .. })
    ));
    assert!(engine.calls().is_empty());
}

#[test]
fn test_second_run_overwrites_by_default() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    let prepper = DataPrepper::new(&engine);

    let first = prepper.run(&request()).unwrap();
    let second = prepper.run(&request()).unwrap();

    assert_eq!(first, second);
    assert_eq!(process_inputs(&engine).len(), 2);
}

#[test]
fn test_second_run_collides_with_error_policy() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    let prepper = DataPrepper::new(&engine);
    let request = with_config(|c| c.on_collision = CollisionPolicy::Error);

    prepper.run(&request).unwrap();
    engine.clear_calls();
    let err = prepper.run(&request).unwrap_err();

    match err {
        PrepError::Collision { target } => assert_eq!(target, default_fc("INDIG_AUTOCH_A")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(engine.calls().is_empty());
}

#[test]
fn test_undefined_spatial_reference() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.set_layer(fc(SITE_A), None);

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    match err {
        PrepError::SpatialReference(SpatialReferenceError::Undefined { layer }) => {
            assert_eq!(layer, fc(SITE_A));
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(engine.calls().is_empty());
}

#[test]
fn test_unsupported_layer_spatial_reference() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.set_layer(default_fc("Indigenous_autouc"), Some(wkid(2154)));

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();

    assert!(matches!(
        err,
        PrepError::SpatialReference(SpatialReferenceError::Unsupported { wkid, .. })
            if wkid.code() == 2154
    ));
}

#[test]
fn test_unknown_target_spatial_reference() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);

    let err = DataPrepper::new(&engine)
        .run(&with_config(|c| c.sr = wkid(999_999)))
        .unwrap_err();

    assert!(matches!(
        err,
        PrepError::SpatialReference(SpatialReferenceError::Unknown { wkid }) if wkid.code() == 999_999
    ));
    assert_eq!(
        err.to_string(),
        "Parameter sr: 999999 does not correspond to a known coordinate system"
    );
    assert!(engine.calls().is_empty());
}

/// Output names may not replace the source layers
#[test]
fn test_reserved_output_name() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);

    let err = DataPrepper::new(&engine)
        .run(&with_config(|c| {
            c.bld_p_name = LayerName::new("BLD_P").unwrap();
        }))
        .unwrap_err();

    assert!(matches!(
        err,
        PrepError::Config(ConfigError::ReservedName {
            parameter: "bld_p_nme",
            ..
        })
    ));
    assert!(engine.calls().is_empty());
}

/// Locks are released when a later step fails
#[test]
fn test_locks_released_on_error() {
    let mut engine = RecordingEngine::with_inputs(Wkid::WGS84);
    engine.fail_process();

    let err = DataPrepper::new(&engine).run(&request()).unwrap_err();
    assert!(matches!(err, PrepError::Engine(_)));

    let calls = engine.calls();
    let locks: Vec<&Call> = calls
        .iter()
        .filter(|call| matches!(call, Call::Lock(_) | Call::Unlock(_)))
        .collect();
    assert_eq!(
        locks,
        vec![
            &Call::Lock(gdb(DEFAULT_GDB)),
            &Call::Lock(gdb(SCRATCH_GDB)),
            &Call::Unlock(gdb(SCRATCH_GDB)),
            &Call::Unlock(gdb(DEFAULT_GDB)),
        ]
    );
    assert!(matches!(calls.last(), Some(Call::Unlock(_))));
}

/// A scratch geodatabase equal to the default one is locked once
#[test]
fn test_shared_geodatabase_locked_once() {
    let engine = RecordingEngine::with_inputs(wkid(3857));
    let mut request = request();
    request.scratch_gdb = gdb(DEFAULT_GDB);

    let report = DataPrepper::new(&engine).run(&request).unwrap();

    let locks = engine
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Lock(_)))
        .count();
    assert_eq!(locks, 1);
    assert!(
        report
            .reprojected
            .iter()
            .all(|r| r.target.gdb() == &gdb(DEFAULT_GDB))
    );
}

/// Site points stored under the building copy name would be replaced by the copy
#[test]
fn test_output_name_matching_input_layer_writes_nothing() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    let mut request = request();
    request.site_p = default_fc("building_p");
    engine.set_layer(request.site_p.clone(), Some(Wkid::WGS84));

    let err = DataPrepper::new(&engine).run(&request).unwrap_err();

    match err {
        PrepError::InputOverwrite { target, parameter } => {
            assert_eq!(target, default_fc("BUILDING_P"));
            assert_eq!(parameter, "site_p_path");
        },
        other => panic!("expected InputOverwrite, got {other:?}"),
    }
    assert!(engine.calls().is_empty());
}

/// A reprojected copy may not land on an input layer in the scratch geodatabase
#[test]
fn test_scratch_copy_matching_input_layer_writes_nothing() {
    let engine = RecordingEngine::with_inputs(wkid(3857));
    let mut request = with_config(|config| config.sr = wkid(3347));
    request.site_a = fc(&format!("{SCRATCH_GDB}/site_a_3347"));
    engine.set_layer(request.site_a.clone(), Some(wkid(3857)));

    let err = DataPrepper::new(&engine).run(&request).unwrap_err();

    assert!(matches!(
        err,
        PrepError::InputOverwrite {
            parameter: "site_a_path",
            ..
        }
    ));
    assert!(engine.calls().is_empty());
}

/// An input already in the target projection is read in place, so its scratch name is free
#[test]
fn test_scratch_name_free_when_layer_is_not_reprojected() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    let mut request = request();
    request.site_a = fc(&format!("{SCRATCH_GDB}/site_a_4326"));
    engine.set_layer(request.site_a.clone(), Some(Wkid::WGS84));

    let report = DataPrepper::new(&engine).run(&request).unwrap();

    assert!(report.reprojected.is_empty());
}

/// The augmented building layer may not replace an input in the scratch geodatabase
#[test]
fn test_augmented_buildings_matching_input_layer() {
    let engine = RecordingEngine::with_inputs(Wkid::WGS84);
    let mut request = request();
    request.adv_pd = fc(&format!("{SCRATCH_GDB}/BUILDING_P_ap"));
    engine.set_layer(request.adv_pd.clone(), Some(Wkid::WGS84));

    let err = DataPrepper::new(&engine).run(&request).unwrap_err();

    assert!(matches!(
        err,
        PrepError::InputOverwrite {
            parameter: "adv_pd_path",
            ..
        }
    ));
    assert!(engine.calls().is_empty());
}
