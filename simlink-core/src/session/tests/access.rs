//! Reading, writing and describing named entries.

use super::{ready_session, typed};
use crate::buffer::SourceArray;
use crate::datatype::{AbstractType, NativeScalar, ScalarValue};
use crate::errors::SimlinkError;
use crate::in_memory::InMemoryModel;
use crate::mapping::Orientation;
use crate::session::{ModelSession, SessionConfig};
use is_close::is_close;

#[test]
fn model_param_view() {
    let mut session = ready_session();
    let view = session.model_param("ctrl", "offsets").unwrap();
    assert_eq!(view.element(), AbstractType::Float32);
    assert_eq!(view.shape(), &[3, 1]);
    assert_eq!(view.strides(), &[4, 4]);
    assert!(view.readonly());
    assert_eq!(
        unsafe { view.to_vec::<f32>() }.unwrap(),
        vec![0.5, 1.5, 2.5]
    );
}

#[test]
fn scalar_views_have_no_axes() {
    let mut session = ready_session();
    let view = session.block_param("ctrl", "ctrl/Gain", "Gain").unwrap();
    assert_eq!(view.ndim(), 0);
    assert_eq!(view.strides(), &[8]);
    assert_eq!(unsafe { view.first() }.unwrap(), ScalarValue::Float64(3.0));
}

#[test]
fn repeated_lookups_hit_the_cache() {
    let mut session = ready_session();
    let first = session.signal("ctrl", Some("ctrl/Sum"), Some("error")).unwrap();
    assert_eq!(session.cached_lookups(), 1);
    let second = session.signal("ctrl", Some("ctrl/Sum"), Some("error")).unwrap();
    assert_eq!(session.cached_lookups(), 1);
    assert_eq!(first.ptr(), second.ptr());
}

#[test]
fn same_parameter_name_in_two_models() {
    let mut session = ready_session();
    let root = session.model_param_value("ctrl", "gain").unwrap();
    let plant = session.model_param_value("ctrl/Plant", "gain").unwrap();
    assert_eq!(root, ScalarValue::Float64(1.0));
    assert_eq!(plant, ScalarValue::Float64(10.0));
    assert_eq!(session.cached_lookups(), 2);

    session
        .set_model_param_value("ctrl/Plant", "gain", ScalarValue::Float64(20.0))
        .unwrap();
    assert_eq!(
        session.model_param_value("ctrl", "gain").unwrap(),
        ScalarValue::Float64(1.0)
    );
    assert_eq!(
        session.model_param_value("ctrl/Plant", "gain").unwrap(),
        ScalarValue::Float64(20.0)
    );
}

#[test]
fn name_only_signal_lookup_returns_first_match() {
    let mut session = ready_session();
    let by_name = session.signal("ctrl", None, Some("u")).unwrap();
    let gain = session.signal("ctrl", Some("ctrl/Gain"), Some("u")).unwrap();
    let sat = session.signal("ctrl", Some("ctrl/Sat"), Some("u")).unwrap();
    assert_eq!(by_name.ptr(), gain.ptr());
    assert_ne!(by_name.ptr(), sat.ptr());

    let unnamed = session.signal("ctrl", Some("ctrl/Counter"), None).unwrap();
    assert_eq!(unnamed.element(), AbstractType::UInt16);
}

#[test]
fn arguments_are_validated_before_lookup() {
    let mut session = ready_session();
    assert!(matches!(
        session.model_param("", "gain"),
        Err(SimlinkError::InvalidArgument(_))
    ));
    // An empty name wins over an unknown model
    assert!(matches!(
        session.block_param("missing", "", "Gain"),
        Err(SimlinkError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.signal("missing", None, None),
        Err(SimlinkError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.signal("ctrl", None, Some("")),
        Err(SimlinkError::InvalidArgument(_))
    ));
    assert_eq!(session.cached_lookups(), 0);
}

#[test]
fn unknown_names_are_not_found() {
    let mut session = ready_session();
    let err = session.model_param("missing", "gain").unwrap_err();
    assert!(matches!(err, SimlinkError::NotFound { kind: "Model", .. }));

    let err = session.model_param("ctrl", "missing").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Model parameter (missing) does not exist in model 'root'"
    );
    assert!(matches!(
        session.block_param("ctrl", "ctrl/Gain", "Missing"),
        Err(SimlinkError::NotFound { .. })
    ));
    assert!(matches!(
        session.signal("ctrl/Plant", None, Some("error")),
        Err(SimlinkError::NotFound { .. })
    ));
}

#[test]
fn set_block_param_copies_values() {
    let mut session = ready_session();
    let shape = [2, 3];
    let values = [6i32, 5, 4, 3, 2, 1];
    session
        .set_block_param(
            "ctrl",
            "ctrl/Lookup",
            "Table",
            &SourceArray::from_slice(&values, &shape),
        )
        .unwrap();

    let view = session.block_param("ctrl", "ctrl/Lookup", "Table").unwrap();
    assert_eq!(view.strides(), &[4, 8]);
    // Stored column by column
    assert_eq!(
        unsafe { view.to_vec::<i32>() }.unwrap(),
        vec![6, 4, 2, 5, 3, 1]
    );
}

#[test]
fn set_rejects_mismatched_arrays() {
    let mut session = ready_session();

    let transposed = [3, 2];
    let values = [0i32; 6];
    assert!(matches!(
        session.set_block_param(
            "ctrl",
            "ctrl/Lookup",
            "Table",
            &SourceArray::from_slice(&values, &transposed),
        ),
        Err(SimlinkError::InvalidArgument(_))
    ));

    let shape = [3, 1];
    let doubles = [1.0f64, 2.0, 3.0];
    assert!(matches!(
        session.set_model_param("ctrl", "offsets", &SourceArray::from_slice(&doubles, &shape)),
        Err(SimlinkError::TypeMismatch(_))
    ));

    let flat = [3];
    let floats = [1.0f32, 2.0, 3.0];
    assert!(matches!(
        session.set_model_param("ctrl", "offsets", &SourceArray::from_slice(&floats, &flat)),
        Err(SimlinkError::InvalidArgument(_))
    ));

    let view = session.model_param("ctrl", "offsets").unwrap();
    assert_eq!(
        unsafe { view.to_vec::<f32>() }.unwrap(),
        vec![0.5, 1.5, 2.5]
    );
}

#[test]
fn scalar_value_access_checks_the_entry() {
    let mut session = ready_session();
    assert_eq!(
        session.model_param_value("ctrl", "mode").unwrap(),
        ScalarValue::Int8(2)
    );
    assert!(matches!(
        session.model_param_value("ctrl", "offsets"),
        Err(SimlinkError::TypeMismatch(_))
    ));
    assert!(matches!(
        session.model_param_value("ctrl", "ptr"),
        Err(SimlinkError::TypeMismatch(_))
    ));
    assert!(matches!(
        session.set_block_param_value("ctrl", "ctrl/Gain", "Gain", ScalarValue::Float32(1.0)),
        Err(SimlinkError::TypeMismatch(_))
    ));

    session
        .set_block_param_value("ctrl", "ctrl/Gain", "Gain", ScalarValue::Float64(4.5))
        .unwrap();
    let value = session.block_param_value("ctrl", "ctrl/Gain", "Gain").unwrap();
    assert!(is_close!(value.to_f64(), 4.5));
}

#[test]
fn opaque_types_are_rejected_on_access() {
    let mut session = ready_session();
    assert!(matches!(
        session.block_param("ctrl", "ctrl/Bus", "Init"),
        Err(SimlinkError::Datatype(_))
    ));
    assert!(matches!(
        session.describe_block_param("ctrl", "ctrl/Bus", "Init"),
        Err(SimlinkError::Datatype(_))
    ));
}

#[test]
fn describe_entries() {
    let mut session = ready_session();

    let info = session.describe_block_param("ctrl", "ctrl/Lookup", "Table").unwrap();
    assert_eq!(info.c_type, "int");
    assert_eq!(info.abstract_type, "int32");
    assert_eq!(info.dims, vec![2, 3]);
    assert_eq!(info.orientation, Orientation::MatrixColMajor);

    let info = session.describe_model_param("ctrl/Plant", "gain").unwrap();
    assert_eq!(info.to_string(), "float64 (double) dims: [1, 1] order: scalar");

    let info = session
        .describe_signal("ctrl/Plant", Some("ctrl/Plant/Integrator"), None)
        .unwrap();
    assert_eq!(info.orientation, Orientation::Vector);
}

#[test]
fn params_snapshot_every_model() {
    let session = ready_session();
    let params = session.params().unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].model_name, "ctrl");
    assert_eq!(params[0].model_params.len(), 4);
    assert_eq!(params[0].block_params[2].data_type.abstract_type, "void");
    assert_eq!(params[0].signals[3].signal_name, "Null");
    assert_eq!(params[1].model_name, "ctrl/Plant");

    let report = session.params_report().unwrap();
    assert!(report.contains("Parameters for model at 'ctrl'"));
    assert!(report.contains("Parameters for model at 'ctrl/Plant'"));
}

fn round_trip<T: NativeScalar>(initial: [T; 4], replacement: [T; 4]) {
    let mut session =
        ModelSession::new(InMemoryModel::new(1.0, typed(initial)), SessionConfig::default())
            .unwrap();
    session.reset().unwrap();

    let before = session.model_param("root", "p").unwrap();
    assert_eq!(before.element(), T::TYPE);
    assert_eq!(before.item_size(), std::mem::size_of::<T>());

    let shape = [2, 2];
    session
        .set_model_param("root", "p", &SourceArray::from_slice(&replacement, &shape))
        .unwrap();

    let after = session.model_param("root", "p").unwrap();
    assert_eq!(after.ptr(), before.ptr());
    let values = unsafe { after.as_array::<T>() }.unwrap();
    // Column-major storage: element (i, j) lives at j * 2 + i
    for i in 0..2 {
        for j in 0..2 {
            assert_eq!(values[&[i, j][..]], replacement[j * 2 + i]);
        }
    }
}

#[test]
fn round_trip_every_native_type() {
    round_trip([1i8, 2, 3, 4], [-1i8, -2, 127, -128]);
    round_trip([1u8, 2, 3, 4], [255u8, 0, 7, 8]);
    round_trip([1i16, 2, 3, 4], [-300i16, 300, i16::MIN, i16::MAX]);
    round_trip([1u16, 2, 3, 4], [65535u16, 1, 2, 3]);
    round_trip([1i32, 2, 3, 4], [-70000i32, 70000, 0, 1]);
    round_trip([1u32, 2, 3, 4], [u32::MAX, 0, 9, 10]);
    round_trip([1.0f32, 2.0, 3.0, 4.0], [0.25f32, -1.5, 1e10, -0.0]);
    round_trip([1.0f64, 2.0, 3.0, 4.0], [0.1f64, -2.75, 1e-300, 6.02e23]);
}
