use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{AppError, INVALID_INCIDENT_TYPE};
use crate::normalize::timestamps::wire;

/// Incident categories tracked on the board.
///
/// Serialized with the hosted store's values (`PRIMARIA` for primary links). Decoding goes
/// through `FromStr`, so stored values are matched the same way on every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum IncidentType {
    #[serde(rename = "BACKBONE")]
    Backbone,
    #[serde(rename = "PRIMARIA")]
    Primary,
    #[serde(rename = "GPON")]
    Gpon,
    #[serde(rename = "POP")]
    Pop,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        IncidentType::Backbone,
        IncidentType::Primary,
        IncidentType::Gpon,
        IncidentType::Pop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::Backbone => "BACKBONE",
            IncidentType::Primary => "PRIMARIA",
            IncidentType::Gpon => "GPON",
            IncidentType::Pop => "POP",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IncidentType::Backbone => "BACKBONE",
            IncidentType::Primary => "PRIMÁRIA",
            IncidentType::Gpon => "GPON",
            IncidentType::Pop => "POP",
        }
    }

    /// Spacing between escalation checkpoints; `None` when the type has no escalation policy.
    pub fn escalation_interval(self) -> Option<Duration> {
        match self {
            IncidentType::Backbone | IncidentType::Primary => Some(Duration::hours(4)),
            IncidentType::Gpon => Some(Duration::hours(12)),
            IncidentType::Pop => None,
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncidentType {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_uppercase();
        match key.as_str() {
            "" => Err(AppError::missing_field("type")),
            "BACKBONE" => Ok(IncidentType::Backbone),
            "PRIMARIA" | "PRIMÁRIA" | "PRIMARY" => Ok(IncidentType::Primary),
            "GPON" => Ok(IncidentType::Gpon),
            "POP" => Ok(IncidentType::Pop),
            _ => Err(
                AppError::new(INVALID_INCIDENT_TYPE, "Unknown incident type")
                    .with_details(format!("value={}", raw.trim())),
            ),
        }
    }
}

impl TryFrom<String> for IncidentType {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// The three follow-up checkpoints of a card. All absent for types without a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Escalations {
    pub first: Option<OffsetDateTime>,
    pub second: Option<OffsetDateTime>,
    pub third: Option<OffsetDateTime>,
}

impl Escalations {
    pub const NONE: Escalations = Escalations {
        first: None,
        second: None,
        third: None,
    };

    pub fn as_array(&self) -> [Option<OffsetDateTime>; 3] {
        [self.first, self.second, self.third]
    }

    pub fn is_none(&self) -> bool {
        self.as_array().iter().all(Option::is_none)
    }
}

fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// A tracked network incident as held by the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentCard {
    pub id: i64,
    #[serde(rename = "trecho_cidade")]
    pub location: String,
    #[serde(rename = "tipo")]
    pub incident_type: IncidentType,
    #[serde(rename = "descricao", default, deserialize_with = "text_or_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub ticket: String,
    #[serde(rename = "afetacao", default, deserialize_with = "text_or_empty")]
    pub affected: String,
    #[serde(rename = "grupo_acionado", default, deserialize_with = "text_or_empty")]
    pub assigned_group: String,
    #[serde(rename = "data_criacao", with = "wire")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "escala_1", default, with = "wire::option")]
    pub escalation_1: Option<OffsetDateTime>,
    #[serde(rename = "escala_2", default, with = "wire::option")]
    pub escalation_2: Option<OffsetDateTime>,
    #[serde(rename = "escala_3", default, with = "wire::option")]
    pub escalation_3: Option<OffsetDateTime>,
    /// Stored at create/edit time; legacy rows may lack it.
    #[serde(rename = "cor_atual", default)]
    pub color: Option<String>,
}

impl IncidentCard {
    pub fn escalations(&self) -> Escalations {
        Escalations {
            first: self.escalation_1,
            second: self.escalation_2,
            third: self.escalation_3,
        }
    }

    /// Stored color, or the type's color when the row predates stored colors.
    pub fn display_color(&self) -> &str {
        match self.color.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => crate::color::color_for(self.incident_type),
        }
    }
}

/// Insert payload produced by the Draft → Active transition.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewCard {
    #[serde(rename = "trecho_cidade")]
    pub location: String,
    #[serde(rename = "tipo")]
    pub incident_type: IncidentType,
    #[serde(rename = "descricao")]
    pub description: String,
    pub ticket: String,
    #[serde(rename = "afetacao")]
    pub affected: String,
    #[serde(rename = "grupo_acionado")]
    pub assigned_group: String,
    #[serde(rename = "data_criacao", with = "wire")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "escala_1", with = "wire::option")]
    pub escalation_1: Option<OffsetDateTime>,
    #[serde(rename = "escala_2", with = "wire::option")]
    pub escalation_2: Option<OffsetDateTime>,
    #[serde(rename = "escala_3", with = "wire::option")]
    pub escalation_3: Option<OffsetDateTime>,
    #[serde(rename = "cor_atual")]
    pub color: String,
}

/// Update payload of an edit. Carries no creation timestamp, which is fixed after creation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CardPatch {
    #[serde(rename = "trecho_cidade")]
    pub location: String,
    #[serde(rename = "tipo")]
    pub incident_type: IncidentType,
    #[serde(rename = "descricao")]
    pub description: String,
    pub ticket: String,
    #[serde(rename = "afetacao")]
    pub affected: String,
    #[serde(rename = "grupo_acionado")]
    pub assigned_group: String,
    #[serde(rename = "escala_1", with = "wire::option")]
    pub escalation_1: Option<OffsetDateTime>,
    #[serde(rename = "escala_2", with = "wire::option")]
    pub escalation_2: Option<OffsetDateTime>,
    #[serde(rename = "escala_3", with = "wire::option")]
    pub escalation_3: Option<OffsetDateTime>,
    #[serde(rename = "cor_atual")]
    pub color: String,
}

/// Append-only note attached to a card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateEntry {
    pub id: i64,
    pub card_id: i64,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "data_registro", with = "wire")]
    pub recorded_at: OffsetDateTime,
}

/// Who the auth collaborator vouched for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionIdentity {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
