//! Object templates: per-game schemas describing each object type's parameters.
//!
//! Templates are supplied by the caller before every load. They drive
//! type-directed decoding (the binary formats store no per-parameter type
//! information apart from the tag-prefixed format) and default synthesis.
//!
//! Two on-disk layouts are accepted:
//! - one JSON file mapping type name to template
//! - a directory holding one `<TypeName>.json` per object type

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{DataType, ParamGroup, Parameter, SetObject};
use crate::util::{Error, Result};

/// Name of the extra holding the declared parameter block length.
pub const EXTRA_RAW_BYTE_LENGTH: &str = "RawByteLength";

/// Free-form template metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateExtra {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// One parameter slot of a template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sub-parameters of a [`DataType::Group`] slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TemplateParam>,
    /// Alignment override of a [`DataType::Group`] slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
}

impl TemplateParam {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
            description: None,
            children: Vec::new(),
            padding: None,
        }
    }

    pub fn with_default(mut self, default: Parameter) -> Self {
        self.default = Some(default);
        self
    }

    /// Group slot holding `children`.
    pub fn group(name: impl Into<String>, children: Vec<TemplateParam>, padding: Option<u32>) -> Self {
        Self {
            children,
            padding,
            ..Self::new(name, DataType::Group)
        }
    }

    /// Declared default, or the zero value of the slot type.
    ///
    /// Defaults whose type disagrees with the slot are ignored.
    pub fn default_value(&self) -> Parameter {
        if self.data_type == DataType::Group {
            let params = self.children.iter().map(TemplateParam::default_value).collect();
            return Parameter::Group(ParamGroup::new(params, self.padding));
        }
        match &self.default {
            Some(value) if value.data_type() == self.data_type => value.clone(),
            _ => self.data_type.zero_value(),
        }
    }
}

/// Schema of one object type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetObjectType {
    #[serde(default)]
    pub parameters: Vec<TemplateParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<TemplateExtra>,
}

impl SetObjectType {
    pub fn new(parameters: Vec<TemplateParam>) -> Self {
        Self { parameters, extras: Vec::new() }
    }

    pub fn with_extra(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.push(TemplateExtra {
            kind: kind.into(),
            value: value.into(),
            condition: None,
        });
        self
    }

    /// First extra of the given kind.
    pub fn extra(&self, kind: &str) -> Option<&TemplateExtra> {
        self.extras.iter().find(|e| e.kind == kind)
    }

    /// Declared length of the parameter block, if the template gives one.
    pub fn raw_byte_length(&self) -> Option<u32> {
        self.extra(EXTRA_RAW_BYTE_LENGTH)
            .and_then(|e| e.value.trim().parse().ok())
    }

    /// Index of the parameter named `name`.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// Template default for every slot, in order.
    pub fn default_parameters(&self) -> Vec<Parameter> {
        self.parameters.iter().map(TemplateParam::default_value).collect()
    }

    /// New object of this type with default parameters.
    pub fn create_object(&self, object_type: impl Into<String>, object_id: u32) -> SetObject {
        SetObject::new(object_type, object_id).with_parameters(self.default_parameters())
    }
}

/// Template dictionary for one game, keyed by object type name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Templates {
    types: BTreeMap<String, SetObjectType>,
}

impl Templates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, template: SetObjectType) {
        self.types.insert(name.into(), template);
    }

    pub fn with(mut self, name: impl Into<String>, template: SetObjectType) -> Self {
        self.insert(name, template);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&SetObjectType> {
        self.types.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SetObjectType)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a dictionary from a JSON object mapping names to templates.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load templates from a JSON file or from a directory of per-type files.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            return Self::load_dir(path);
        }
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    fn load_dir(dir: &Path) -> Result<Self> {
        let mut templates = Self::new();
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();

        for path in entries {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let template: SetObjectType = serde_json::from_str(&fs::read_to_string(&path)?)?;
            debug!(name, params = template.parameters.len(), "loaded template");
            templates.insert(name, template);
        }
        Ok(templates)
    }
}
