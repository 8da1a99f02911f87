mod access;

use crate::datatype::NativeScalar;
use crate::in_memory::{EntrySpec, InMemoryMapping, InMemoryModel};
use crate::mapping::Orientation;
use crate::session::{ModelSession, SessionConfig};

/// Controller model with one referenced plant model.
///
/// The root carries a parameter named `gain` and so does the plant.
fn controller() -> InMemoryMapping {
    let plant = InMemoryMapping::builder(Some("ctrl/Plant"))
        .model_param("gain", EntrySpec::scalar(10.0f64))
        .signal(Some("ctrl/Plant/Integrator"), Some("x"), EntrySpec::vector(&[0.0f64, 0.0]))
        .build();

    InMemoryMapping::builder(None)
        .model_param("gain", EntrySpec::scalar(1.0f64))
        .model_param("mode", EntrySpec::scalar(2i8))
        .model_param("offsets", EntrySpec::vector(&[0.5f32, 1.5, 2.5]))
        .model_param("ptr", EntrySpec::scalar(0u32).pointer())
        .block_param("ctrl/Gain", "Gain", EntrySpec::scalar(3.0f64))
        .block_param(
            "ctrl/Lookup",
            "Table",
            EntrySpec::matrix(
                Orientation::MatrixColMajor,
                &[2, 3],
                &[1i32, 2, 3, 4, 5, 6],
            ),
        )
        .block_param("ctrl/Bus", "Init", EntrySpec::opaque("struct_T", 16, &[1, 1]))
        .signal(Some("ctrl/Sum"), Some("error"), EntrySpec::scalar(0.0f64))
        .signal(Some("ctrl/Gain"), Some("u"), EntrySpec::scalar(0.0f64))
        .signal(Some("ctrl/Sat"), Some("u"), EntrySpec::scalar(0.0f64))
        .signal(Some("ctrl/Counter"), None, EntrySpec::scalar(0u16))
        .child(plant)
        .build()
}

fn model() -> InMemoryModel {
    InMemoryModel::new(0.001, controller)
}

fn session(model: InMemoryModel) -> ModelSession<InMemoryModel> {
    ModelSession::new(model, SessionConfig::new("ctrl")).unwrap()
}

fn ready_session() -> ModelSession<InMemoryModel> {
    let mut session = session(model());
    session.reset().unwrap();
    session
}

/// Mapping with a single 2x2 column-major parameter of `T`
fn typed<T: NativeScalar>(values: [T; 4]) -> impl Fn() -> InMemoryMapping {
    move || {
        InMemoryMapping::builder(None)
            .model_param(
                "p",
                EntrySpec::matrix(Orientation::MatrixColMajor, &[2, 2], &values),
            )
            .build()
    }
}
