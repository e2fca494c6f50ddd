use std::sync::Arc;

use serde_json::{json, Value};

use beamsig::connection::mock::MockConnection;
use beamsig::{synthesize, SimConnection, SimKind, SynthesisOptions};

fn srw_tes_connection() -> Arc<MockConnection> {
    Arc::new(MockConnection::new(
        SimKind::Srw,
        json!({
            "simulationType": "srw",
            "models": {
                "beamline": [
                    {
                        "title": "Aperture",
                        "type": "aperture",
                        "position": 20.5,
                        "horizontalSize": 0.2,
                        "verticalSize": 1.0,
                    },
                    {
                        "title": "Toroid",
                        "type": "toroidalMirror",
                        "position": 22.0,
                        "grazingAngle": 2.5,
                        "normalVectorX": 0.0,
                        "normalVectorY": 0.999_996_875,
                        "normalVectorZ": -0.002_499_997,
                        "tangentialVectorX": 0.0,
                        "tangentialVectorY": 0.002_499_997,
                    },
                    {"title": "W9", "type": "watch", "id": 12, "position": 23.0},
                ],
                "intensityReport": {"title": "Spectrum", "initialEnergy": 100.0, "finalEnergy": 20_000.0},
            },
        }),
    ))
}

#[test]
fn beamline_elements_as_objects() {
    let conn = srw_tes_connection();
    let synthesis = synthesize(conn.clone(), SynthesisOptions::default()).unwrap();

    assert_eq!(synthesis.objects.names(), ["aperture", "toroid", "w9"]);

    // Every field's readback equals the entry's raw document value.
    let snapshot = conn.document().snapshot().unwrap();
    for (i, (name, object)) in synthesis.objects.iter().enumerate() {
        let entry = snapshot["models"]["beamline"][i].as_object().unwrap();
        for (key, raw) in entry {
            let attr = if key == "position" {
                "element_position"
            } else {
                key.as_str()
            };
            assert_eq!(&object.get(attr).unwrap(), raw, "{name}.{attr}");
        }
    }
}

#[test]
fn beamline_elements_set_put() {
    for use_put in [false, true] {
        let conn = srw_tes_connection();
        let synthesis = synthesize(conn.clone(), SynthesisOptions::default()).unwrap();

        for (i, name) in ["aperture", "toroid", "w9"].iter().enumerate() {
            let object = synthesis.objects.get(name).unwrap();

            let old_value = object.get("element_position").unwrap().as_f64().unwrap();
            let snapshot = conn.document().snapshot().unwrap();
            let old_doc_value = snapshot["models"]["beamline"][i]["position"].as_f64().unwrap();
            assert!((old_value - old_doc_value).abs() < 1e-8);

            let target = Value::from(old_value + 100.0);
            if use_put {
                object.put("element_position", target).unwrap();
            } else {
                object.set("element_position", target).unwrap();
            }

            let new_value = object.get("element_position").unwrap().as_f64().unwrap();
            let snapshot = conn.document().snapshot().unwrap();
            let new_doc_value = snapshot["models"]["beamline"][i]["position"].as_f64().unwrap();
            assert!((new_value - new_doc_value).abs() < 1e-8);
            assert!((new_value - (old_value + 100.0)).abs() < 1e-8);
        }
    }
}

#[test]
fn grazing_angle_calculation() {
    let conn = srw_tes_connection();
    let synthesis = synthesize(conn.clone(), SynthesisOptions::default()).unwrap();
    let toroid = synthesis.objects.get("toroid").unwrap();

    let mut params_before = conn
        .document()
        .entry_map(toroid.address())
        .unwrap();
    params_before.remove("grazingAngle");

    toroid.put("grazingAngle", json!(10.0)).unwrap();

    let mut params_after = conn.document().entry_map(toroid.address()).unwrap();
    params_after.remove("grazingAngle");

    // The recomputation changed at least one sibling in the document.
    assert_ne!(params_before, params_after);

    let expected = [
        ("normalVectorX", 0.0),
        ("normalVectorY", 0.999_950_000_416_665_3),
        ("normalVectorZ", -0.009_999_833_334_166_664),
        ("tangentialVectorX", 0.0),
        ("tangentialVectorY", 0.009_999_833_334_166_664),
    ];
    for (attr, value) in expected {
        let actual = toroid.get(attr).unwrap().as_f64().unwrap();
        assert!(
            (actual - value).abs() < 1e-12,
            "{attr}: {actual} != {value}"
        );
    }
}

#[test]
fn extra_model_fields_are_addressable() {
    let options = SynthesisOptions {
        extra_model_fields: vec!["intensityReport".to_string()],
        ..SynthesisOptions::default()
    };
    let conn = srw_tes_connection();
    let synthesis = synthesize(conn.clone(), options).unwrap();

    let spectrum = synthesis.objects.get("spectrum").unwrap();
    spectrum.put("initialEnergy", json!(20.0)).unwrap();
    spectrum.put("finalEnergy", json!(1100.0)).unwrap();

    let snapshot = conn.document().snapshot().unwrap();
    assert_eq!(snapshot["models"]["intensityReport"]["initialEnergy"], json!(20.0));
    assert_eq!(snapshot["models"]["intensityReport"]["finalEnergy"], json!(1100.0));
}

#[test]
fn madx_elements_set_put() {
    let conn = Arc::new(MockConnection::new(
        SimKind::Madx,
        json!({
            "simulationType": "madx",
            "models": {
                "elements": [
                    {"name": "QF1", "l": 0.5, "k1": 0.8},
                    {"name": "DRIFT0", "l": 1.0},
                ],
            },
        }),
    ));
    let synthesis = synthesize(conn.clone(), SynthesisOptions::default()).unwrap();
    assert_eq!(synthesis.objects.names(), ["qf1", "drift0"]);

    for (i, name) in ["qf1", "drift0"].iter().enumerate() {
        let object = synthesis.objects.get(name).unwrap();
        let old_value = object.get("l").unwrap().as_f64().unwrap();

        object.put("l", Value::from(old_value + 10.0)).unwrap();

        let snapshot = conn.document().snapshot().unwrap();
        let doc_value = snapshot["models"]["elements"][i]["l"].as_f64().unwrap();
        assert!((doc_value - (old_value + 10.0)).abs() < 1e-8);
        // The class-name key is reachable under its translated attribute.
        assert!(object.get("element_name").unwrap().is_string());
    }
}

#[test]
fn distinct_documents_never_alias() {
    let a = synthesize(srw_tes_connection(), SynthesisOptions::default()).unwrap();
    let b = synthesize(srw_tes_connection(), SynthesisOptions::default()).unwrap();

    assert_eq!(a.classes.names(), b.classes.names());

    a.objects
        .get("aperture")
        .unwrap()
        .set("horizontalSize", json!(5.0))
        .unwrap();
    assert_eq!(
        b.objects.get("aperture").unwrap().get("horizontalSize").unwrap(),
        json!(0.2)
    );
}
