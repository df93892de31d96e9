use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array2;
use tagihan::{
    BillEstimator, EstimatorError, FeatureSchema, LinearModel, Model, ModelCache, ModelError,
    ModelFormat, OnnxElement, RawInput, Regressor,
};

// ONNX TensorProto.DataType codes
const FLOAT: u64 = 1;
const INT64: u64 = 7;
const DOUBLE: u64 = 11;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tagihan-onnx-{}-{}", std::process::id(), name));
    fs::create_dir_all(&dir).unwrap();
    dir
}

// Minimal protobuf writer, enough to assemble a ModelProto by hand

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_uint(buf: &mut Vec<u8>, field: u64, value: u64) {
    put_varint(buf, field << 3);
    put_varint(buf, value);
}

fn put_bytes(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    put_varint(buf, (field << 3) | 2);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn put_str(buf: &mut Vec<u8>, field: u64, s: &str) {
    put_bytes(buf, field, s.as_bytes());
}

fn raw_data(elem_type: u64, values: &[f64]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        match elem_type {
            FLOAT => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DOUBLE => out.extend_from_slice(&v.to_le_bytes()),
            INT64 => out.extend_from_slice(&(v as i64).to_le_bytes()),
            other => panic!("unsupported element type {}", other),
        }
    }
    out
}

fn initializer(name: &str, dims: &[u64], elem_type: u64, values: &[f64]) -> Vec<u8> {
    let mut tensor = Vec::new();
    for &d in dims {
        put_uint(&mut tensor, 1, d);
    }
    put_uint(&mut tensor, 2, elem_type);
    put_str(&mut tensor, 8, name);
    put_bytes(&mut tensor, 9, &raw_data(elem_type, values));
    tensor
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> Vec<u8> {
    let mut node = Vec::new();
    for input in inputs {
        put_str(&mut node, 1, input);
    }
    put_str(&mut node, 2, output);
    put_str(&mut node, 3, &op_type.to_lowercase());
    put_str(&mut node, 4, op_type);
    node
}

// `[N, width]` tensor with a symbolic batch dimension
fn value_info(name: &str, elem_type: u64, width: u64) -> Vec<u8> {
    let mut batch = Vec::new();
    put_str(&mut batch, 2, "N");
    let mut cols = Vec::new();
    put_uint(&mut cols, 1, width);

    let mut shape = Vec::new();
    put_bytes(&mut shape, 1, &batch);
    put_bytes(&mut shape, 1, &cols);

    let mut tensor_type = Vec::new();
    put_uint(&mut tensor_type, 1, elem_type);
    put_bytes(&mut tensor_type, 2, &shape);

    let mut type_proto = Vec::new();
    put_bytes(&mut type_proto, 1, &tensor_type);

    let mut info = Vec::new();
    put_str(&mut info, 1, name);
    put_bytes(&mut info, 2, &type_proto);
    info
}

/// `Y = X @ W + B` with `W: [n, 1]` and `B: [1]`, as a linear regressor
/// export produces it.
fn linear_graph(elem_type: u64, coefficients: &[f64], intercept: f64) -> Vec<u8> {
    let n = coefficients.len() as u64;

    let mut graph = Vec::new();
    put_bytes(&mut graph, 1, &node("MatMul", &["X", "W"], "XW"));
    put_bytes(&mut graph, 1, &node("Add", &["XW", "B"], "Y"));
    put_str(&mut graph, 2, "bill_regression");
    put_bytes(&mut graph, 5, &initializer("W", &[n, 1], elem_type, coefficients));
    put_bytes(&mut graph, 5, &initializer("B", &[1], elem_type, &[intercept]));
    put_bytes(&mut graph, 11, &value_info("X", elem_type, n));
    put_bytes(&mut graph, 12, &value_info("Y", elem_type, 1));

    let mut opset = Vec::new();
    put_uint(&mut opset, 2, 13);

    let mut model = Vec::new();
    put_uint(&mut model, 1, 7);
    put_str(&mut model, 2, "tagihan-tests");
    put_bytes(&mut model, 7, &graph);
    put_bytes(&mut model, 8, &opset);
    model
}

// Binary-exact in f32 as well, so both precisions agree exactly
fn coefficients() -> Vec<f64> {
    vec![
        1444.5, 25000.0, 8000.0, 15000.0, 32000.0, 12000.0, -4000.0, 2000.0, 30000.0, 26000.0,
        -1000.0, 9000.0, 7000.0, 18000.0, 21000.0, 50000.0, 120000.0,
    ]
}

fn linear_reference() -> BillEstimator {
    let names: Vec<&str> = FeatureSchema::shared().column_names().collect();
    let model = LinearModel::new(names, coefficients(), 10000.0).unwrap();
    BillEstimator::builder()
        .with_model(Arc::new(Model::from_linear(model)))
        .unwrap()
        .build()
        .unwrap()
}

fn write_graph(name: &str, elem_type: u64) -> PathBuf {
    let path = scratch_dir(name).join("linear_regression_model.onnx");
    fs::write(&path, linear_graph(elem_type, &coefficients(), 10000.0)).unwrap();
    path
}

fn households() -> Vec<RawInput> {
    vec![
        RawInput::default(),
        RawInput {
            kwh: 420.0,
            ac_units: 2,
            ac_hours_per_day: 7.5,
            family_size: 5,
            month_name: "Jul".into(),
            tariff_class: "R2".into(),
        },
        RawInput { month_name: "Apr".into(), tariff_class: "R3".into(), ..RawInput::default() },
    ]
}

fn assert_matches_linear(path: &PathBuf) -> Result<(), EstimatorError> {
    let onnx = BillEstimator::builder().with_model_path(path)?.build()?;
    assert_eq!(onnx.model().format(), ModelFormat::Onnx);
    assert_eq!(onnx.model().regressor().n_features(), Some(17));

    let linear = linear_reference();
    for raw in households() {
        let expected = linear.estimate(&raw)?;
        let actual = onnx.estimate(&raw)?;
        assert!(actual.is_finite());
        assert!(
            (actual - expected).abs() <= expected.abs() * 1e-6,
            "onnx {} vs linear {} for {:?}",
            actual,
            expected,
            raw
        );
    }
    Ok(())
}

#[test]
fn test_float_graph_matches_linear_model() -> Result<(), EstimatorError> {
    let path = write_graph("float", FLOAT);
    assert_matches_linear(&path)
}

#[test]
fn test_double_graph_matches_linear_model() -> Result<(), EstimatorError> {
    let path = write_graph("double", DOUBLE);
    assert_matches_linear(&path)
}

#[test]
fn test_graph_element_type_is_detected() -> Result<(), ModelError> {
    let cache = ModelCache::new();
    for (name, elem_type, expected) in [
        ("detect-float", FLOAT, OnnxElement::Float32),
        ("detect-double", DOUBLE, OnnxElement::Float64),
    ] {
        let path = write_graph(name, elem_type);
        let bytes = fs::read(&path)?;
        let model = tagihan::OnnxModel::from_bytes(&path, &bytes, &Default::default())?;
        assert_eq!(model.input_element(), expected);
        assert!(cache.get_or_load(&path).is_ok());
    }
    Ok(())
}

#[test]
fn test_integer_graph_is_corrupt() {
    let path = write_graph("int64", INT64);
    let err = ModelCache::new().get_or_load(&path).unwrap_err();
    match err {
        ModelError::Corrupt { reason, .. } => {
            assert!(reason.contains("float or double"), "unexpected reason: {}", reason)
        }
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_runtime_failure_is_prediction_error() -> Result<(), ModelError> {
    let path = write_graph("narrow", DOUBLE);
    let model = ModelCache::new().get_or_load(&path)?;

    // Bypasses the predictor's width check so the runtime itself rejects the row
    let narrow = Array2::<f64>::zeros((1, 3));
    let err = model.regressor().predict(&narrow).unwrap_err();
    assert!(matches!(err, EstimatorError::PredictionError(_)));
    assert!(err.to_string().contains("ONNX Runtime"), "unexpected message: {}", err);
    Ok(())
}
