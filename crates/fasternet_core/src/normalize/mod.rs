pub mod timestamps;

use crate::error::AppError;

/// Free-text card fields normalized on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Location,
    Description,
    Ticket,
    Affected,
    AssignedGroup,
}

impl CardField {
    pub fn name(self) -> &'static str {
        match self {
            CardField::Location => "location",
            CardField::Description => "description",
            CardField::Ticket => "ticket",
            CardField::Affected => "affected",
            CardField::AssignedGroup => "assigned_group",
        }
    }
}

/// Data-entry convention for card text: trimmed and upper-cased.
///
/// Idempotent: `normalize_field(&normalize_field(s)) == normalize_field(s)`.
pub fn normalize_field(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalize a field that must not end up empty.
pub fn normalize_required(field: CardField, raw: &str) -> Result<String, AppError> {
    let normalized = normalize_field(raw);
    if normalized.is_empty() {
        return Err(AppError::missing_field(field.name()));
    }
    Ok(normalized)
}

/// Update notes keep their casing; only surrounding whitespace goes.
pub fn normalize_update_text(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing_field("text"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_cases_and_trims() {
        assert_eq!(normalize_field("  são paulo / centro "), "SÃO PAULO / CENTRO");
        assert_eq!(normalize_field(""), "");
    }

    #[test]
    fn required_rejects_blank() {
        let err = normalize_required(CardField::Location, " \t").unwrap_err();
        assert_eq!(err.code, crate::error::MISSING_REQUIRED_FIELD);
        assert_eq!(err.details.as_deref(), Some("field=location"));
    }

    #[test]
    fn update_text_keeps_case() {
        assert_eq!(
            normalize_update_text("  técnico no local ").unwrap(),
            "técnico no local"
        );
        assert!(normalize_update_text("   ").is_err());
    }
}
