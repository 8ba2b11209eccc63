//! Result records and the provenance graph that traces them to a batch
//!
//! Each estimated property records the protocol schemas that produced it.
//! The batch id is recovered from the one input path that encodes it:
//! reweighted properties name the batch in the stored simulation data path
//! of their "unpack data" protocol, everything else in the force field path
//! of the "assign parameters" protocol.

use crate::config::TimingConfig;
use crate::error::{Result, TimingError};
use crate::interval::Layer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const UNPACK_DATA_MARKER: &str = "unpack_data";
const ASSIGN_PARAMETERS_MARKER: &str = "assign_parameters";
const SIMULATION_DATA_PATH: &str = ".simulation_data_path";
const FORCE_FIELD_PATH: &str = ".force_field_path";

/// A path input that may arrive bare or wrapped in a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValue {
    Scalar(String),
    List(Vec<String>),
}

impl PathValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(path) => Some(PathValue::Scalar(path.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(PathValue::List),
            _ => None,
        }
    }

    /// The path itself; a list contributes its first entry
    pub fn into_scalar(self) -> Option<String> {
        match self {
            PathValue::Scalar(path) => Some(path),
            PathValue::List(paths) => paths.into_iter().next(),
        }
    }
}

/// One protocol of a provenance graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub protocol_type: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
}

impl ProtocolDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol_type: None,
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    fn input(&self, key: &str) -> Result<&Value> {
        self.inputs.get(key).ok_or_else(|| {
            TimingError::Provenance(format!("protocol {} has no {} input", self.id, key))
        })
    }

    /// Stored simulation data path, unwrapping the surrounding tuple and at
    /// most one further level of list nesting
    pub fn simulation_data_path(&self) -> Result<String> {
        let raw = self.input(SIMULATION_DATA_PATH)?;
        let first = match raw {
            Value::Array(items) => items.first(),
            scalar => Some(scalar),
        };
        first
            .and_then(PathValue::from_json)
            .and_then(PathValue::into_scalar)
            .ok_or_else(|| {
                TimingError::Provenance(format!(
                    "protocol {} has an unreadable {} input: {}",
                    self.id, SIMULATION_DATA_PATH, raw
                ))
            })
    }

    pub fn force_field_path(&self) -> Result<String> {
        let raw = self.input(FORCE_FIELD_PATH)?;
        raw.as_str().map(str::to_string).ok_or_else(|| {
            TimingError::Provenance(format!(
                "protocol {} has a non-string {} input: {}",
                self.id, FORCE_FIELD_PATH, raw
            ))
        })
    }
}

/// Decoded provenance of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub protocol_schemas: Vec<ProtocolDescriptor>,
}

/// Provenance as stored: usually a JSON document embedded in a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvenanceField {
    Encoded(String),
    Inline(Provenance),
}

/// Where a property estimate came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySource {
    pub fidelity: String,
    pub provenance: ProvenanceField,
}

/// One estimated property of a request result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Fully qualified class of the property, e.g. `openff.evaluator.properties.Density`
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub source: PropertySource,
}

impl PropertyRecord {
    pub fn new(
        type_tag: impl Into<String>,
        fidelity: Layer,
        schemas: Vec<ProtocolDescriptor>,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            source: PropertySource {
                fidelity: fidelity.to_string(),
                provenance: ProvenanceField::Inline(Provenance {
                    protocol_schemas: schemas,
                }),
            },
        }
    }

    /// Short result type (class name without its module path)
    pub fn result_type(&self) -> &str {
        self.type_tag.rsplit('.').next().unwrap_or(&self.type_tag)
    }

    pub fn fidelity(&self) -> Result<Layer> {
        self.source
            .fidelity
            .parse()
            .map_err(|reason| {
                TimingError::Provenance(format!("{} property: {}", self.result_type(), reason))
            })
    }

    pub fn provenance(&self) -> Result<Provenance> {
        match &self.source.provenance {
            ProvenanceField::Encoded(text) => Ok(serde_json::from_str(text)?),
            ProvenanceField::Inline(provenance) => Ok(provenance.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
}

/// Results returned for one estimation request (one iteration)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    #[serde(default)]
    pub estimated_properties: PropertySet,
}

impl RequestResult {
    pub fn from_properties(properties: Vec<PropertyRecord>) -> Self {
        Self {
            estimated_properties: PropertySet { properties },
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn properties(&self) -> &[PropertyRecord] {
        &self.estimated_properties.properties
    }
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split(&['/', '\\'][..]).collect()
}

fn batch_id_from_reweighting(descriptor: &ProtocolDescriptor) -> Result<String> {
    let path = descriptor.simulation_data_path()?;
    let segments = path_segments(&path);
    let layer_name = Layer::ReweightingLayer.as_str();

    segments
        .iter()
        .position(|segment| *segment == layer_name)
        .and_then(|index| segments.get(index + 1))
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(|| {
            TimingError::Provenance(format!(
                "simulation data path '{}' of {} has no segment after {}",
                path, descriptor.id, layer_name
            ))
        })
}

fn batch_id_from_force_field(descriptor: &ProtocolDescriptor, segment: usize) -> Result<String> {
    let path = descriptor.force_field_path()?;
    path_segments(&path)
        .get(segment)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(|| {
            TimingError::Provenance(format!(
                "force field path '{}' of {} has no segment {}",
                path, descriptor.id, segment
            ))
        })
}

/// Recover the id of the batch that produced a property
///
/// # Example
/// ```
/// use evaltime::config::TimingConfig;
/// use evaltime::interval::Layer;
/// use evaltime::provenance::{extract_batch_id, ProtocolDescriptor};
/// use serde_json::json;
///
/// let schemas = vec![ProtocolDescriptor::new("assign_parameters_0")
///     .with_input(".force_field_path", json!("working-data/SimulationLayer/b1/ff.json"))];
///
/// let batch = extract_batch_id(Layer::SimulationLayer, &schemas, &TimingConfig::default()).unwrap();
/// assert_eq!(batch, "b1");
/// ```
pub fn extract_batch_id(
    fidelity: Layer,
    descriptors: &[ProtocolDescriptor],
    config: &TimingConfig,
) -> Result<String> {
    let marker = match fidelity {
        Layer::ReweightingLayer => UNPACK_DATA_MARKER,
        Layer::SimulationLayer => ASSIGN_PARAMETERS_MARKER,
    };

    let mut batch_ids = descriptors
        .iter()
        .filter(|descriptor| descriptor.id.contains(marker))
        .map(|descriptor| match fidelity {
            Layer::ReweightingLayer => batch_id_from_reweighting(descriptor),
            Layer::SimulationLayer => {
                batch_id_from_force_field(descriptor, config.force_field_batch_segment)
            }
        })
        .collect::<Result<Vec<String>>>()?;

    batch_ids.sort_unstable();
    batch_ids.dedup();
    match batch_ids.as_slice() {
        [] => Err(TimingError::Provenance(format!(
            "no {} protocol in a {} provenance graph",
            marker, fidelity
        ))),
        [batch_id] => Ok(batch_id.clone()),
        several => Err(TimingError::Provenance(format!(
            "{} protocols disagree on the batch id: {:?}",
            marker, several
        ))),
    }
}
