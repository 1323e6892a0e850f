use crate::domain::{CardPatch, IncidentCard, NewCard, SessionIdentity, UpdateEntry};
use crate::error::AppError;

/// Record store holding cards and their update log.
///
/// Implementations assign ids and `recorded_at`, and return what they stored so callers never
/// have to refetch after a write.
pub trait CardStore {
    /// All cards, newest (highest id) first.
    fn list_cards(&self) -> Result<Vec<IncidentCard>, AppError>;

    fn get_card(&self, id: i64) -> Result<IncidentCard, AppError>;

    fn insert_card(&self, card: &NewCard) -> Result<IncidentCard, AppError>;

    fn update_card(&self, id: i64, patch: &CardPatch) -> Result<IncidentCard, AppError>;

    /// Removes the card and, with it, its update log.
    fn delete_card(&self, id: i64) -> Result<(), AppError>;

    /// Updates of one card in insertion order.
    fn list_updates(&self, card_id: i64) -> Result<Vec<UpdateEntry>, AppError>;

    fn append_update(&self, card_id: i64, text: &str) -> Result<UpdateEntry, AppError>;
}

/// Credential check delegated to the auth collaborator.
pub trait Authenticator {
    /// `Ok(None)` means the credentials were checked and rejected.
    fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<SessionIdentity>, AppError>;
}
