use crate::domain::IncidentType;
use crate::error::{AppError, INVALID_INCIDENT_TYPE};

pub const BACKBONE_RED: &str = "#ff6159";
pub const PRIMARY_BLUE: &str = "#9999ff";
pub const GPON_YELLOW: &str = "#ffff99";
pub const POP_GREEN: &str = "#00cc00";

/// Triage color of a card, fixed per type.
pub fn color_for(incident_type: IncidentType) -> &'static str {
    match incident_type {
        IncidentType::Backbone => BACKBONE_RED,
        IncidentType::Primary => PRIMARY_BLUE,
        IncidentType::Gpon => GPON_YELLOW,
        IncidentType::Pop => POP_GREEN,
    }
}

/// Color lookup for a free-text type value. Unknown values fail instead of defaulting.
pub fn color_for_type_name(raw: &str) -> Result<&'static str, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::new(INVALID_INCIDENT_TYPE, "Unknown incident type")
            .with_details("value is blank"));
    }
    let incident_type: IncidentType = raw.parse()?;
    Ok(color_for(incident_type))
}
