use serde::{Deserialize, Serialize};

/// Display name used when a class has no name for ordinal `n`.
pub fn default_group_name(n: u32) -> String {
    format!("{}모둠", n)
}

/// Resolves the name of group `n` (1-based) from a class's name list.
pub fn group_name(names: &[String], n: u32) -> String {
    names
        .get((n as usize).wrapping_sub(1))
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_group_name(n))
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub name: String,
    #[serde(default)]
    pub is_leader: bool,
}

impl GroupMember {
    pub fn new(name: &str) -> Self {
        GroupMember {
            name: name.to_string(),
            is_leader: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(id: u32, name: String) -> Self {
        Group {
            id,
            name,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn leader(&self) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.is_leader)
    }
}

/// Result of a group assignment: the groups plus everyone left over.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct GroupAssignment {
    pub groups: Vec<Group>,
    pub unassigned: Vec<String>,
}

impl GroupAssignment {
    /// Saved-structure form (member names only) used by `Class::group_structure`.
    pub fn to_structure(&self) -> Vec<Vec<String>> {
        self.groups.iter().map(Group::member_names).collect()
    }
}
