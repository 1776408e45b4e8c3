use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

// Older rosters stored free text here ("M", "여", ""), anything unrecognised is Unknown.
impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Gender::parse(&raw))
    }
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" | "남" | "남자" => Gender::Male,
            "female" | "f" | "여" | "여자" => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// A roster entry. `id` is the identity; `name` may change freely.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub ability: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
}

impl Student {
    pub fn new(name: &str, number: u32) -> Self {
        Student {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            number,
            gender: Gender::Unknown,
            ability: String::new(),
            tags: Vec::new(),
            note: String::new(),
            group: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}
