use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

pub const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(anyhow!("invalid priority: {other} (expected high, medium or low)")),
        }
    }
}

/// One to-do entry.
///
/// Field names serialize in camelCase so records written by earlier
/// versions of the widget (`text`, `completed`, `dueDate`, `priority`)
/// load unchanged. Records without an `id` get a fresh one on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub id: TaskId,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<String>,

    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// First eight hex digits of the id, as printed by `list`.
    pub fn short_id(&self) -> String {
        let mut simple = self.id.simple().to_string();
        simple.truncate(SHORT_ID_LEN);
        simple
    }

    pub fn new(text: String, due_date: Option<String>, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            completed: false,
            due_date: due_date.filter(|d| !d.trim().is_empty()),
            priority,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}
