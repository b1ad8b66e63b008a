//! Placed objects and their transforms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CustomKey, Parameter};
use crate::template::SetObjectType;
use crate::util::{Quat, Vec3};

/// Placement of an object or of one of its child instances.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation, scale: Vec3::ONE }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One placed object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetObject {
    pub object_type: String,
    pub object_id: u32,
    pub transform: Transform,
    /// Extra instances packed into this object. Empty when there are none.
    #[serde(default)]
    pub children: Vec<Transform>,
    /// Values ordered like the template's parameter list.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub custom_data: BTreeMap<CustomKey, Parameter>,
}

impl SetObject {
    /// Create an object with no parameters.
    pub fn new(object_type: impl Into<String>, object_id: u32) -> Self {
        Self {
            object_type: object_type.into(),
            object_id,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_custom(mut self, key: CustomKey, value: Parameter) -> Self {
        self.custom_data.insert(key, value);
        self
    }

    /// Get a custom data entry.
    #[inline]
    pub fn custom(&self, key: &CustomKey) -> Option<&Parameter> {
        self.custom_data.get(key)
    }

    /// Display name, if the format stores one.
    pub fn name(&self) -> Option<&str> {
        self.custom(&CustomKey::Name).and_then(Parameter::as_str)
    }

    /// Look up a parameter by its template name.
    pub fn param_by_name<'a>(&'a self, template: &SetObjectType, name: &str) -> Option<&'a Parameter> {
        let index = template.param_index(name)?;
        self.parameters.get(index)
    }

    /// Number of transforms written for this object (own placement plus children).
    #[inline]
    pub fn transform_count(&self) -> usize {
        self.children.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use crate::template::TemplateParam;

    #[test]
    fn test_builder() {
        let obj = SetObject::new("Ring", 5)
            .with_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .with_custom(CustomKey::Name, Parameter::String("Ring5".into()));
        assert_eq!(obj.name(), Some("Ring5"));
        assert_eq!(obj.transform.scale, Vec3::ONE);
        assert_eq!(obj.transform_count(), 1);
    }

    #[test]
    fn test_param_by_name() {
        let template = SetObjectType::new(vec![
            TemplateParam::new("Speed", DataType::F32),
            TemplateParam::new("Active", DataType::Bool),
        ]);
        let obj = SetObject::new("Ring", 0)
            .with_parameters(vec![Parameter::F32(1.5), Parameter::Bool(true)]);
        assert_eq!(obj.param_by_name(&template, "Active"), Some(&Parameter::Bool(true)));
        assert_eq!(obj.param_by_name(&template, "Missing"), None);
    }
}
