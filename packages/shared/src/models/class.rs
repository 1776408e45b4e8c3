use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::group::GroupAssignment;
use crate::models::student::Student;

pub const MIN_GROUP_COUNT: usize = 2;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_group_structure")]
    pub group_structure: Vec<Vec<String>>,
    #[serde(default = "default_group_count")]
    pub group_count: usize,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_group_count() -> usize {
    MIN_GROUP_COUNT
}

impl Class {
    pub fn new(name: &str, group_count: usize) -> Self {
        let mut class = Class {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            students: Vec::new(),
            group_names: Vec::new(),
            group_structure: Vec::new(),
            group_count,
            created_at: Utc::now(),
        };
        class.normalize();
        class
    }

    /// Enforces the group invariants. Called on every write.
    pub fn normalize(&mut self) {
        self.group_count = self.group_count.max(MIN_GROUP_COUNT);
        self.group_structure.resize_with(self.group_count, Vec::new);
    }

    pub fn student_names(&self) -> Vec<String> {
        self.students.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_saved_structure(&self) -> bool {
        self.group_structure.iter().any(|group| !group.is_empty())
    }

    /// Stores an assignment as the class's fixed structure and stamps each
    /// student with its group ordinal.
    pub fn apply_assignment(&mut self, assignment: &GroupAssignment) {
        self.group_count = assignment.groups.len();
        self.group_structure = assignment.to_structure();
        for student in self.students.iter_mut() {
            student.group = assignment
                .groups
                .iter()
                .find(|g| g.members.iter().any(|m| m.name == student.name))
                .map(|g| g.id);
        }
        self.normalize();
    }

    /// Remote representation. The structure is stored as an index-keyed map
    /// because the document store does not accept nested arrays.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            fields.insert(
                "groupStructure".to_string(),
                encode_group_structure(&self.group_structure),
            );
        }
        Ok(value)
    }

    pub fn from_document(id: &str, data: Value) -> Result<Self, serde_json::Error> {
        let mut class: Class = serde_json::from_value(data)?;
        class.id = id.to_string();
        class.group_structure.resize_with(class.group_count, Vec::new);
        Ok(class)
    }
}

enum GroupStructureShape<'a> {
    List(&'a [Value]),
    Keyed(&'a Map<String, Value>),
    Absent,
}

impl<'a> GroupStructureShape<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => GroupStructureShape::List(items),
            Value::Object(map) => GroupStructureShape::Keyed(map),
            _ => GroupStructureShape::Absent,
        }
    }
}

pub fn encode_group_structure(structure: &[Vec<String>]) -> Value {
    let map = structure
        .iter()
        .enumerate()
        .map(|(index, members)| {
            let members = members.iter().cloned().map(Value::String).collect();
            (index.to_string(), Value::Array(members))
        })
        .collect::<Map<String, Value>>();
    Value::Object(map)
}

/// Decodes either the array form or the legacy index-keyed map form, padded
/// with empty groups up to `min_count`.
pub fn decode_group_structure(value: &Value, min_count: usize) -> Vec<Vec<String>> {
    let mut groups = match GroupStructureShape::of(value) {
        GroupStructureShape::List(items) => items.iter().map(member_names).collect(),
        GroupStructureShape::Keyed(map) => {
            let mut entries: Vec<(Option<u64>, &String, &Value)> = map
                .iter()
                .map(|(key, members)| (group_key_index(key), key, members))
                .collect();
            // Parsed keys first in numeric order, unparsable ones after.
            entries.sort_by(|a, b| match (a.0, b.0) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(b.1)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.1.cmp(b.1),
            });
            entries
                .into_iter()
                .map(|(_, _, members)| member_names(members))
                .collect()
        }
        GroupStructureShape::Absent => Vec::new(),
    };
    if groups.len() < min_count {
        groups.resize_with(min_count, Vec::new);
    }
    groups
}

fn group_key_index(key: &str) -> Option<u64> {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn member_names(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(fields) => match fields.get("members") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| item.as_str())
        .map(str::to_string)
        .collect()
}

fn deserialize_group_structure<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decode_group_structure(&value, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::group::{Group, GroupMember};
    use serde_json::json;

    #[test]
    fn test_new_class_enforces_minimum_group_count() {
        let class = Class::new("3-1", 0);
        assert_eq!(class.group_count, 2);
        assert_eq!(class.group_structure.len(), 2);
    }

    #[test]
    fn test_normalize_pads_and_truncates() {
        let mut class = Class::new("3-1", 4);
        class.group_structure = vec![vec!["A".to_string()]];
        class.normalize();
        assert_eq!(class.group_structure.len(), 4);

        class.group_count = 2;
        class.group_structure = vec![vec![], vec![], vec!["Z".to_string()]];
        class.normalize();
        assert_eq!(class.group_structure.len(), 2);
    }

    #[test]
    fn test_decode_array_shape() {
        let value = json!([["A", "B"], ["C"]]);
        let groups = decode_group_structure(&value, 3);
        assert_eq!(
            groups,
            vec![
                vec!["A".to_string(), "B".to_string()],
                vec!["C".to_string()],
                vec![]
            ]
        );
    }

    #[test]
    fn test_decode_keyed_shape_sorts_numerically() {
        let value = json!({
            "group10": ["J"],
            "group2": ["B"],
            "leftovers": ["X"],
            "group1": {"members": ["A"]},
        });
        let groups = decode_group_structure(&value, 0);
        assert_eq!(
            groups,
            vec![
                vec!["A".to_string()],
                vec!["B".to_string()],
                vec!["J".to_string()],
                vec!["X".to_string()],
            ]
        );
    }

    #[test]
    fn test_decode_unexpected_shape_is_empty_padded() {
        assert_eq!(decode_group_structure(&json!("oops"), 2).len(), 2);
        assert!(decode_group_structure(&Value::Null, 0).is_empty());
    }

    #[test]
    fn test_document_round_trip_through_keyed_encoding() {
        let mut class = Class::new("3-1", 3);
        class.group_structure[0] = vec!["A".to_string(), "B".to_string()];
        class.group_structure[2] = vec!["C".to_string()];

        let document = class.to_document().unwrap();
        assert!(document["groupStructure"].is_object());

        let decoded = Class::from_document(&class.id, document).unwrap();
        assert_eq!(decoded, class);
    }

    #[test]
    fn test_from_document_tolerates_drift() {
        let data = json!({
            "id": "ignored",
            "name": "4-2",
            "groupCount": 4,
            "groupStructure": {"0": ["A"]},
        });
        let class = Class::from_document("c1", data).unwrap();
        assert_eq!(class.id, "c1");
        assert_eq!(class.group_structure.len(), 4);
        assert!(class.has_saved_structure());
    }

    #[test]
    fn test_from_document_drops_groups_beyond_the_count() {
        let data = json!({
            "name": "4-2",
            "groupCount": 2,
            "groupStructure": {"0": ["A", "C"], "1": ["B", "D"], "2": ["C"], "3": ["D"]},
        });
        let class = Class::from_document("c1", data).unwrap();
        assert_eq!(
            class.group_structure,
            vec![
                vec!["A".to_string(), "C".to_string()],
                vec!["B".to_string(), "D".to_string()],
            ]
        );
    }

    #[test]
    fn test_apply_assignment_records_structure_and_student_groups() {
        let mut class = Class::new("3-1", 2);
        class.students = vec![Student::new("A", 1), Student::new("B", 2)];
        let assignment = GroupAssignment {
            groups: vec![
                Group {
                    id: 1,
                    name: "1모둠".to_string(),
                    members: vec![GroupMember::new("B")],
                },
                Group {
                    id: 2,
                    name: "2모둠".to_string(),
                    members: vec![GroupMember::new("A")],
                },
            ],
            unassigned: vec![],
        };

        class.apply_assignment(&assignment);

        assert_eq!(class.group_structure, vec![vec!["B"], vec!["A"]]);
        assert_eq!(class.students[0].group, Some(2));
        assert_eq!(class.students[1].group, Some(1));
    }
}
