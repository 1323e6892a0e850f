//! Card lifecycle: Draft → Active → Deleted.
//!
//! Creation and edits derive escalations and color from the type at the moment of the
//! transition and freeze them into the record. The creation timestamp never changes after
//! creation. Deletion needs an explicit confirmation token.

pub mod board;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::color::color_for;
use crate::domain::{CardPatch, IncidentCard, IncidentType, NewCard, UpdateEntry};
use crate::error::{AppError, CONFIRMATION_MISMATCH};
use crate::escalation::compute_escalations;
use crate::normalize::{normalize_field, normalize_required, normalize_update_text, CardField};
use crate::store::CardStore;

pub use board::{CardState, IncidentBoard};

/// Card form as submitted by a user, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    pub location: String,
    /// Free text from the form; must name one of the incident types.
    pub incident_type: String,
    pub description: String,
    pub ticket: String,
    pub affected: String,
    pub assigned_group: String,
    pub created_at: OffsetDateTime,
}

impl CardDraft {
    pub fn new(
        location: impl Into<String>,
        incident_type: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            location: location.into(),
            incident_type: incident_type.into(),
            description: String::new(),
            ticket: String::new(),
            affected: String::new(),
            assigned_group: String::new(),
            created_at,
        }
    }

    /// Validate, normalize and derive. Nothing is derived when validation fails.
    pub fn into_new_card(&self) -> Result<NewCard, AppError> {
        let location = normalize_required(CardField::Location, &self.location)?;
        let incident_type: IncidentType = self.incident_type.parse()?;
        let escalations = compute_escalations(incident_type, self.created_at)?;

        Ok(NewCard {
            location,
            incident_type,
            description: normalize_field(&self.description),
            ticket: normalize_field(&self.ticket),
            affected: normalize_field(&self.affected),
            assigned_group: normalize_field(&self.assigned_group),
            created_at: self.created_at,
            escalation_1: escalations.first,
            escalation_2: escalations.second,
            escalation_3: escalations.third,
            color: color_for(incident_type).to_string(),
        })
    }
}

/// Edit form of an existing card. Prefilled from the card; the creation timestamp is not part
/// of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEdit {
    pub location: String,
    pub incident_type: String,
    pub description: String,
    pub ticket: String,
    pub affected: String,
    pub assigned_group: String,
}

impl CardEdit {
    pub fn from_card(card: &IncidentCard) -> Self {
        Self {
            location: card.location.clone(),
            incident_type: card.incident_type.as_str().to_string(),
            description: card.description.clone(),
            ticket: card.ticket.clone(),
            affected: card.affected.clone(),
            assigned_group: card.assigned_group.clone(),
        }
    }

    /// Build the patch for `card`, recomputing escalations and color from the (possibly new)
    /// type and the card's stored creation timestamp.
    pub fn apply_to(&self, card: &IncidentCard) -> Result<CardPatch, AppError> {
        let location = normalize_required(CardField::Location, &self.location)?;
        let incident_type: IncidentType = self.incident_type.parse()?;
        let escalations = compute_escalations(incident_type, card.created_at)?;

        Ok(CardPatch {
            location,
            incident_type,
            description: normalize_field(&self.description),
            ticket: normalize_field(&self.ticket),
            affected: normalize_field(&self.affected),
            assigned_group: normalize_field(&self.assigned_group),
            escalation_1: escalations.first,
            escalation_2: escalations.second,
            escalation_3: escalations.third,
            color: color_for(incident_type).to_string(),
        })
    }
}

pub const DEFAULT_DELETE_TOKEN: &str = "excluir";

/// The literal a user must type to delete a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    pub token: String,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for DeleteConfirmation {
    fn default() -> Self {
        Self {
            token: DEFAULT_DELETE_TOKEN.to_string(),
            case_sensitive: true,
        }
    }
}

impl DeleteConfirmation {
    pub fn matches(&self, supplied: &str) -> bool {
        if self.case_sensitive {
            supplied == self.token
        } else {
            supplied.to_lowercase() == self.token.to_lowercase()
        }
    }

    pub fn check(&self, supplied: &str) -> Result<(), AppError> {
        if self.matches(supplied) {
            return Ok(());
        }
        Err(AppError::new(
            CONFIRMATION_MISMATCH,
            format!("Type \"{}\" to confirm deletion", self.token),
        )
        .with_details(format!("supplied={supplied:?}")))
    }
}

/// Drives lifecycle transitions against a store and hands back what the store recorded.
pub struct CardLifecycle<'a> {
    store: &'a dyn CardStore,
    confirmation: DeleteConfirmation,
}

impl<'a> CardLifecycle<'a> {
    pub fn new(store: &'a dyn CardStore, confirmation: DeleteConfirmation) -> Self {
        Self {
            store,
            confirmation,
        }
    }

    pub fn store(&self) -> &'a dyn CardStore {
        self.store
    }

    /// Draft → Active.
    pub fn create(&self, draft: &CardDraft) -> Result<IncidentCard, AppError> {
        let new_card = draft.into_new_card()?;
        let card = self.store.insert_card(&new_card)?;
        info!(card_id = card.id, incident_type = card.incident_type.as_str(), "card created");
        Ok(card)
    }

    /// Active → Active (edit).
    pub fn edit(&self, card_id: i64, edit: &CardEdit) -> Result<IncidentCard, AppError> {
        let current = self.store.get_card(card_id)?;
        let patch = edit.apply_to(&current)?;
        let card = self.store.update_card(card_id, &patch)?;
        info!(card_id, incident_type = card.incident_type.as_str(), "card edited");
        Ok(card)
    }

    /// Active → Active (append update). Card fields are untouched.
    pub fn append_update(&self, card_id: i64, text: &str) -> Result<UpdateEntry, AppError> {
        let text = normalize_update_text(text)?;
        let entry = self.store.append_update(card_id, &text)?;
        info!(card_id, update_id = entry.id, "card update recorded");
        Ok(entry)
    }

    pub fn history(&self, card_id: i64) -> Result<Vec<UpdateEntry>, AppError> {
        self.store.list_updates(card_id)
    }

    /// Active → Deleted. A wrong token leaves the card active and the store untouched.
    pub fn delete(&self, card_id: i64, confirmation: &str) -> Result<(), AppError> {
        if let Err(e) = self.confirmation.check(confirmation) {
            warn!(card_id, "deletion rejected: confirmation mismatch");
            return Err(e);
        }
        self.store.delete_card(card_id)?;
        info!(card_id, "card deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn draft_requires_location_before_anything_else() {
        let draft = CardDraft::new("  ", "NOT A TYPE", datetime!(2024-01-01 0:00 UTC));
        let err = draft.into_new_card().unwrap_err();
        assert_eq!(err.code, crate::error::MISSING_REQUIRED_FIELD);
    }

    #[test]
    fn draft_rejects_unknown_type() {
        let draft = CardDraft::new("centro", "METRO", datetime!(2024-01-01 0:00 UTC));
        let err = draft.into_new_card().unwrap_err();
        assert_eq!(err.code, crate::error::INVALID_INCIDENT_TYPE);
    }

    #[test]
    fn draft_normalizes_and_derives() {
        let mut draft = CardDraft::new(" campinas ", "gpon", datetime!(2024-01-01 0:00 UTC));
        draft.ticket = "inc-1".to_string();
        let card = draft.into_new_card().unwrap();
        assert_eq!(card.location, "CAMPINAS");
        assert_eq!(card.ticket, "INC-1");
        assert_eq!(card.escalation_1, Some(datetime!(2024-01-01 12:00 UTC)));
        assert_eq!(card.color, crate::color::GPON_YELLOW);
    }

    #[test]
    fn confirmation_respects_case_setting() {
        let strict = DeleteConfirmation::default();
        assert!(strict.matches("excluir"));
        assert!(!strict.matches("Excluir"));
        assert!(!strict.matches(" excluir"));
        assert!(!strict.matches(""));

        let relaxed = DeleteConfirmation {
            token: "delete".to_string(),
            case_sensitive: false,
        };
        assert!(relaxed.matches("DELETE"));
        assert_eq!(
            relaxed.check("excluir").unwrap_err().code,
            CONFIRMATION_MISMATCH
        );
    }
}
