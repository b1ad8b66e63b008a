//! Stage sets.

use serde::{Deserialize, Serialize};

use super::SetObject;
use crate::bina::BinaHeader;

/// Group table bytes a codec reads but does not interpret.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGroupTable {
    pub count: u32,
    pub bytes: Vec<u8>,
}

/// All objects placed in one stage, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetData {
    pub name: String,
    pub objects: Vec<SetObject>,
    /// Container header of the file this set was loaded from, echoed on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BinaHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_table: Option<RawGroupTable>,
}

impl SetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn push(&mut self, object: SetObject) {
        self.objects.push(object);
    }

    /// Iterate objects of one type.
    pub fn objects_of_type<'a>(&'a self, object_type: &'a str) -> impl Iterator<Item = &'a SetObject> + 'a {
        self.objects.iter().filter(move |o| o.object_type == object_type)
    }

    /// Smallest id greater than every id in use.
    pub fn next_free_id(&self) -> u32 {
        self.objects.iter().map(|o| o.object_id + 1).max().unwrap_or(0)
    }

    /// Distinct object types in order of first appearance, with their object indices.
    pub fn group_by_type(&self) -> Vec<(&str, Vec<usize>)> {
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for (index, obj) in self.objects.iter().enumerate() {
            match groups.iter_mut().find(|(ty, _)| *ty == obj.object_type) {
                Some((_, indices)) => indices.push(index),
                None => groups.push((obj.object_type.as_str(), vec![index])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_type_keeps_first_appearance() {
        let mut set = SetData::new("stage");
        set.push(SetObject::new("Spring", 0));
        set.push(SetObject::new("Ring", 1));
        set.push(SetObject::new("Spring", 2));

        let groups = set.group_by_type();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], ("Spring", vec![0, 2]));
        assert_eq!(groups[1], ("Ring", vec![1]));
    }

    #[test]
    fn test_next_free_id() {
        let mut set = SetData::default();
        assert_eq!(set.next_free_id(), 0);
        set.push(SetObject::new("Ring", 7));
        set.push(SetObject::new("Ring", 3));
        assert_eq!(set.next_free_id(), 8);
        assert_eq!(set.objects_of_type("Ring").count(), 2);
    }
}
