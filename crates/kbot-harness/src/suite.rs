//! Test suites and their safetensors encoding.
//!
//! A suite is stored as a single safetensors blob with one tensor per input
//! (`test{i}.in.{j}`) and one per expected output (`test{i}.out`). The
//! header metadata records the suite name, its operation count and the
//! number of cases.

use std::collections::{BTreeMap, HashMap};

use kbot_core::{DType, HostTensor, Shape};
use safetensors::tensor::{serialize, TensorView};
use safetensors::{Dtype, SafeTensors};

use crate::{HarnessError, Result};

pub const FORMAT: &str = "kbot-suite";
pub const VERSION: &str = "1";

/// One set of inputs and the output the reference produced for them.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub inputs: Vec<HostTensor>,
    pub expected: HostTensor,
}

/// An ordered, named, immutable collection of test cases.
///
/// All cases share input arity, and each input position (and the output)
/// has the same dtype and shape in every case.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    name: String,
    ops: u64,
    cases: Vec<TestCase>,
}

impl TestSuite {
    /// Build a suite, checking that every case has the same layout as the first.
    pub fn new(name: impl Into<String>, ops: u64, cases: Vec<TestCase>) -> Result<Self> {
        check_layout(&cases).map_err(HarnessError::InvalidArgument)?;
        Ok(Self { name: name.into(), ops, cases })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Estimated operations per kernel invocation.
    pub fn ops(&self) -> u64 {
        self.ops
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Number of inputs per case.
    pub fn arity(&self) -> usize {
        self.cases.first().map_or(0, |c| c.inputs.len())
    }

    pub fn dtype(&self) -> Option<DType> {
        self.cases.first().map(|c| c.expected.dtype())
    }

    pub fn input_shapes(&self) -> Vec<Shape> {
        self.cases
            .first()
            .map(|c| c.inputs.iter().map(|t| t.shape().clone()).collect())
            .unwrap_or_default()
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.cases.first().map(|c| c.expected.shape().clone())
    }

    /// Serialize to a safetensors blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut views = Vec::new();
        for (i, case) in self.cases.iter().enumerate() {
            for (j, input) in case.inputs.iter().enumerate() {
                views.push((format!("test{i}.in.{j}"), view_of(input)?));
            }
            views.push((format!("test{i}.out"), view_of(&case.expected)?));
        }

        let metadata: HashMap<String, String> = [
            ("name", self.name.clone()),
            ("ops", self.ops.to_string()),
            ("tests", self.cases.len().to_string()),
            ("format", FORMAT.to_string()),
            ("version", VERSION.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        serialize(views, &Some(metadata))
            .map_err(|e| HarnessError::InvalidArgument(format!("safetensors serialize error: {e}")))
    }

    /// Decode a safetensors blob. Anything that does not form a complete,
    /// consistent suite with at least one case is `MalformedSuite`.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        let (_, header) = SafeTensors::read_metadata(blob)
            .map_err(|e| HarnessError::malformed(format!("safetensors parse error: {e}")))?;
        let tensors = SafeTensors::deserialize(blob)
            .map_err(|e| HarnessError::malformed(format!("safetensors parse error: {e}")))?;
        let meta = header.metadata().clone().unwrap_or_default();

        if let Some(format) = meta.get("format") {
            if format != FORMAT {
                return Err(HarnessError::malformed(format!("unknown suite format '{format}'")));
            }
        }
        let name = meta.get("name").cloned().unwrap_or_default();
        let ops = match meta.get("ops") {
            Some(s) => s
                .parse::<u64>()
                .map_err(|_| HarnessError::malformed(format!("invalid op count '{s}'")))?,
            None => 0,
        };

        let mut inputs: BTreeMap<usize, BTreeMap<usize, HostTensor>> = BTreeMap::new();
        let mut outputs: BTreeMap<usize, HostTensor> = BTreeMap::new();
        for (key, view) in tensors.tensors() {
            let tensor = tensor_of(&key, &view)?;
            match parse_key(&key) {
                Some(Key::Input(i, j)) => {
                    inputs.entry(i).or_default().insert(j, tensor);
                }
                Some(Key::Output(i)) => {
                    outputs.insert(i, tensor);
                }
                None => return Err(HarnessError::malformed(format!("unexpected tensor '{key}'"))),
            }
        }

        let count = outputs.len();
        if count == 0 {
            return Err(HarnessError::malformed("suite has no test cases"));
        }
        if let Some(declared) = meta.get("tests") {
            if declared.parse::<usize>().ok() != Some(count) {
                return Err(HarnessError::malformed(format!(
                    "header declares {declared} tests but {count} were found"
                )));
            }
        }

        let mut cases = Vec::with_capacity(count);
        for (position, (i, expected)) in outputs.into_iter().enumerate() {
            if i != position {
                return Err(HarnessError::malformed(format!("missing output for test{position}")));
            }
            let case_inputs = inputs.remove(&i).unwrap_or_default();
            let mut ordered = Vec::with_capacity(case_inputs.len());
            for (position, (j, tensor)) in case_inputs.into_iter().enumerate() {
                if j != position {
                    return Err(HarnessError::malformed(format!("missing test{i}.in.{position}")));
                }
                ordered.push(tensor);
            }
            cases.push(TestCase { inputs: ordered, expected });
        }
        if let Some(i) = inputs.keys().next() {
            return Err(HarnessError::malformed(format!("test{i} has inputs but no output")));
        }

        check_layout(&cases).map_err(HarnessError::malformed)?;
        Ok(Self { name, ops, cases })
    }
}

enum Key {
    Input(usize, usize),
    Output(usize),
}

fn parse_key(key: &str) -> Option<Key> {
    let rest = key.strip_prefix("test")?;
    let (index, tail) = rest.split_once('.')?;
    let i = parse_index(index)?;
    if tail == "out" {
        return Some(Key::Output(i));
    }
    let j = parse_index(tail.strip_prefix("in.")?)?;
    Some(Key::Input(i, j))
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn check_layout(cases: &[TestCase]) -> std::result::Result<(), String> {
    let Some(first) = cases.first() else {
        return Ok(());
    };
    for (i, case) in cases.iter().enumerate() {
        if case.inputs.len() != first.inputs.len() {
            return Err(format!(
                "test{i} has {} inputs, test0 has {}",
                case.inputs.len(),
                first.inputs.len()
            ));
        }
        for (j, (input, reference)) in case.inputs.iter().zip(&first.inputs).enumerate() {
            input
                .check_layout(reference)
                .map_err(|e| format!("test{i}.in.{j}: {e}"))?;
        }
        case.expected
            .check_layout(&first.expected)
            .map_err(|e| format!("test{i}.out: {e}"))?;
    }
    Ok(())
}

fn view_of(tensor: &HostTensor) -> Result<TensorView<'_>> {
    let dtype = match tensor.dtype() {
        DType::F16 => Dtype::F16,
        DType::F32 => Dtype::F32,
        DType::F64 => Dtype::F64,
    };
    TensorView::new(dtype, tensor.shape().dims().to_vec(), tensor.as_bytes())
        .map_err(|e| HarnessError::InvalidArgument(format!("safetensors view error: {e}")))
}

fn tensor_of(key: &str, view: &TensorView<'_>) -> Result<HostTensor> {
    let dtype = match view.dtype() {
        Dtype::F16 => DType::F16,
        Dtype::F32 => DType::F32,
        Dtype::F64 => DType::F64,
        other => {
            return Err(HarnessError::malformed(format!("{key}: unsupported dtype {other:?}")));
        }
    };
    HostTensor::from_bytes(dtype, Shape::new(view.shape()), view.data().to_vec())
        .map_err(|e| HarnessError::malformed(format!("{key}: {e}")))
}
