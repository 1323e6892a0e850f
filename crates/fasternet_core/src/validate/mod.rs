use time::OffsetDateTime;

use crate::color::color_for;
use crate::domain::{IncidentCard, ValidationWarning};
use crate::error::AppError;
use crate::escalation::compute_escalations;
use crate::normalize::normalize_field;
use crate::store::CardStore;

use serde::{Deserialize, Serialize};

fn fmt_ts(ts: Option<OffsetDateTime>) -> String {
    ts.map(|t| t.to_string()).unwrap_or_else(|| "NONE".to_string())
}

/// Audit a stored card against the rules that produced it.
///
/// Rows written by other clients (or edited by hand in the hosted store) can drift: checkpoints
/// out of order, checkpoints that no longer match the type, or a stored color from another type.
/// Nothing here rewrites the card.
pub fn validate_card(card: &IncidentCard) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let stored = card.escalations();

    let present: Vec<OffsetDateTime> = stored.as_array().iter().flatten().copied().collect();
    if !present.is_empty() && present.len() < 3 {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_ESCALATION_PARTIAL",
                "Only some escalation checkpoints are set",
            )
            .with_details(format!(
                "escala_1={}; escala_2={}; escala_3={}",
                fmt_ts(stored.first),
                fmt_ts(stored.second),
                fmt_ts(stored.third)
            )),
        );
    }

    if let Some(first) = present.first() {
        if *first < card.created_at {
            warnings.push(
                ValidationWarning::new(
                    "VALIDATION_ESCALATION_BEFORE_CREATION",
                    "Escalation checkpoint precedes creation",
                )
                .with_details(format!("data_criacao={}; escala={}", card.created_at, first)),
            );
        }
    }
    if present.windows(2).any(|w| w[0] > w[1]) {
        warnings.push(ValidationWarning::new(
            "VALIDATION_ESCALATION_ORDER_VIOLATION",
            "Escalation checkpoints must be in ascending order",
        ));
    }

    match compute_escalations(card.incident_type, card.created_at) {
        Ok(expected) if expected != stored => warnings.push(
            ValidationWarning::new(
                "VALIDATION_ESCALATION_MISMATCH",
                format!(
                    "Escalation checkpoints do not match the {} policy",
                    card.incident_type.label()
                ),
            )
            .with_details(format!(
                "expected={}/{}/{}; stored={}/{}/{}",
                fmt_ts(expected.first),
                fmt_ts(expected.second),
                fmt_ts(expected.third),
                fmt_ts(stored.first),
                fmt_ts(stored.second),
                fmt_ts(stored.third)
            )),
        ),
        Ok(_) => {}
        Err(e) => warnings.push(
            ValidationWarning::new("VALIDATION_ESCALATION_OVERFLOW", e.message)
                .with_details(e.details.unwrap_or_default()),
        ),
    }

    let expected_color = color_for(card.incident_type);
    match card.color.as_deref().map(str::trim) {
        None | Some("") => warnings.push(ValidationWarning::new(
            "VALIDATION_COLOR_MISSING",
            "Stored color is empty; the type color is shown",
        )),
        Some(c) if !c.eq_ignore_ascii_case(expected_color) => warnings.push(
            ValidationWarning::new(
                "VALIDATION_COLOR_MISMATCH",
                "Stored color does not match the incident type",
            )
            .with_details(format!("expected={expected_color}; stored={c}")),
        ),
        Some(_) => {}
    }

    let text_fields = [
        ("trecho_cidade", &card.location),
        ("descricao", &card.description),
        ("ticket", &card.ticket),
        ("afetacao", &card.affected),
        ("grupo_acionado", &card.assigned_group),
    ];
    for (column, value) in text_fields {
        if normalize_field(value) != *value {
            warnings.push(
                ValidationWarning::new(
                    "VALIDATION_NOT_NORMALIZED",
                    "Card text is not in normalized form",
                )
                .with_details(format!("{column}={value:?}")),
            );
        }
    }

    warnings
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardValidationReportItem {
    pub id: i64,
    pub location: String,
    pub warnings: Vec<ValidationWarning>,
}

/// Audit every card in the store; cards without warnings are left out. Ordered by id.
pub fn validate_all_cards(store: &dyn CardStore) -> Result<Vec<CardValidationReportItem>, AppError> {
    let mut cards = store.list_cards()?;
    cards.sort_by_key(|c| c.id);
    Ok(cards
        .into_iter()
        .filter_map(|card| {
            let warnings = validate_card(&card);
            (!warnings.is_empty()).then(|| CardValidationReportItem {
                id: card.id,
                location: card.location,
                warnings,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IncidentType;
    use time::macros::datetime;

    fn card(incident_type: IncidentType) -> IncidentCard {
        let created_at = datetime!(2024-01-01 8:00 UTC);
        let e = compute_escalations(incident_type, created_at).unwrap();
        IncidentCard {
            id: 1,
            location: "CENTRO".to_string(),
            incident_type,
            description: String::new(),
            ticket: String::new(),
            affected: String::new(),
            assigned_group: String::new(),
            created_at,
            escalation_1: e.first,
            escalation_2: e.second,
            escalation_3: e.third,
            color: Some(color_for(incident_type).to_string()),
        }
    }

    fn codes(card: &IncidentCard) -> Vec<String> {
        validate_card(card).into_iter().map(|w| w.code).collect()
    }

    #[test]
    fn freshly_derived_cards_are_clean() {
        for t in IncidentType::ALL {
            assert!(codes(&card(t)).is_empty(), "{t}");
        }
    }

    #[test]
    fn type_changed_without_recompute_is_flagged() {
        let mut c = card(IncidentType::Backbone);
        c.incident_type = IncidentType::Gpon;
        assert_eq!(
            codes(&c),
            vec!["VALIDATION_ESCALATION_MISMATCH", "VALIDATION_COLOR_MISMATCH"]
        );
    }

    #[test]
    fn swapped_checkpoints_are_out_of_order() {
        let mut c = card(IncidentType::Primary);
        std::mem::swap(&mut c.escalation_1, &mut c.escalation_3);
        let got = codes(&c);
        assert!(got.contains(&"VALIDATION_ESCALATION_ORDER_VIOLATION".to_string()));
        assert!(got.contains(&"VALIDATION_ESCALATION_MISMATCH".to_string()));
    }

    #[test]
    fn every_text_field_is_checked_for_normalization() {
        let mut c = card(IncidentType::Gpon);
        c.description = "rompimento".to_string();
        c.ticket = " INC-1".to_string();
        c.affected = "200".to_string();
        c.assigned_group = "noc".to_string();
        let details: Vec<String> = validate_card(&c)
            .into_iter()
            .filter(|w| w.code == "VALIDATION_NOT_NORMALIZED")
            .filter_map(|w| w.details)
            .collect();
        assert_eq!(
            details,
            vec![
                r#"descricao="rompimento""#.to_string(),
                r#"ticket=" INC-1""#.to_string(),
                r#"grupo_acionado="noc""#.to_string(),
            ]
        );
    }

    #[test]
    fn legacy_row_without_color() {
        let mut c = card(IncidentType::Pop);
        c.color = None;
        assert_eq!(codes(&c), vec!["VALIDATION_COLOR_MISSING"]);
    }
}
