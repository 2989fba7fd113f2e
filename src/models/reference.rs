use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticalArea {
    pub id: i64,
    pub name: String,
    /// Display color used by the dashboards, e.g. `#1f77b4`.
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Politician {
    pub id: i64,
    pub name: String,
    /// Current party affiliation.
    #[serde(default)]
    pub party_id: Option<i64>,
    #[serde(default)]
    pub political_area_ids: Vec<i64>,
    /// Alternative spellings that should match exactly, e.g. "Söder, Markus".
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// File format accepted by `--import-reference`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub political_areas: Vec<PoliticalArea>,
    #[serde(default)]
    pub politicians: Vec<Politician>,
}
