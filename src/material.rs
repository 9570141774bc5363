use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaterialKind {
    Pdf,
    Link,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Pdf => "PDF",
            MaterialKind::Link => "LINK",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PDF" => Ok(MaterialKind::Pdf),
            "LINK" => Ok(MaterialKind::Link),
            other => Err(format!("unknown material type '{other}'")),
        }
    }
}

/// Reference to an external learning resource. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
}

impl Material {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: MaterialKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            url: url.into(),
            uploaded_by: None,
        }
    }

    /// A bare link attached from a session form; titled "Link" with a fresh id.
    pub fn link(url: impl Into<String>) -> Self {
        Self::new(crate::task::new_record_id(), "Link", MaterialKind::Link, url)
    }

    pub fn uploaded_by(mut self, user_id: impl Into<String>) -> Self {
        self.uploaded_by = Some(user_id.into());
        self
    }

    /// Library search: case-insensitive substring of the title or the type name.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.kind.as_str().to_lowercase().contains(&query)
    }
}
