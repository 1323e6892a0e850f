use std::collections::BTreeSet;

use crate::domain::{IncidentCard, UpdateEntry};
use crate::error::{AppError, CARD_DELETED};
use crate::store::CardStore;

use super::{CardDraft, CardEdit, CardLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Active,
    Deleted,
}

/// Front-end view of the board. Loaded once, then kept current from the records that
/// mutations return.
#[derive(Debug, Clone, Default)]
pub struct IncidentBoard {
    cards: Vec<IncidentCard>,
    deleted: BTreeSet<i64>,
}

impl IncidentBoard {
    pub fn load(store: &dyn CardStore) -> Result<Self, AppError> {
        Ok(Self::from_cards(store.list_cards()?))
    }

    pub fn from_cards(mut cards: Vec<IncidentCard>) -> Self {
        cards.sort_by(|a, b| b.id.cmp(&a.id));
        Self {
            cards,
            deleted: BTreeSet::new(),
        }
    }

    /// Newest first.
    pub fn cards(&self) -> &[IncidentCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&IncidentCard> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn state(&self, id: i64) -> Option<CardState> {
        if self.deleted.contains(&id) {
            Some(CardState::Deleted)
        } else if self.get(id).is_some() {
            Some(CardState::Active)
        } else {
            None
        }
    }

    pub fn ensure_active(&self, id: i64) -> Result<&IncidentCard, AppError> {
        if self.deleted.contains(&id) {
            return Err(AppError::new(CARD_DELETED, "Card was deleted")
                .with_details(format!("id={id}")));
        }
        self.get(id).ok_or_else(|| AppError::not_found("Card", id))
    }

    pub fn apply_created(&mut self, card: IncidentCard) {
        self.cards.retain(|c| c.id != card.id);
        let pos = self
            .cards
            .iter()
            .position(|c| c.id < card.id)
            .unwrap_or(self.cards.len());
        self.cards.insert(pos, card);
    }

    pub fn apply_edited(&mut self, card: IncidentCard) {
        match self.cards.iter_mut().find(|c| c.id == card.id) {
            Some(slot) => *slot = card,
            None => self.apply_created(card),
        }
    }

    pub fn apply_deleted(&mut self, id: i64) {
        self.cards.retain(|c| c.id != id);
        self.deleted.insert(id);
    }

    pub fn create(
        &mut self,
        lifecycle: &CardLifecycle<'_>,
        draft: &CardDraft,
    ) -> Result<&IncidentCard, AppError> {
        let card = lifecycle.create(draft)?;
        let id = card.id;
        self.apply_created(card);
        self.ensure_active(id)
    }

    pub fn edit(
        &mut self,
        lifecycle: &CardLifecycle<'_>,
        id: i64,
        edit: &CardEdit,
    ) -> Result<&IncidentCard, AppError> {
        self.ensure_active(id)?;
        let card = lifecycle.edit(id, edit)?;
        self.apply_edited(card);
        self.ensure_active(id)
    }

    pub fn append_update(
        &mut self,
        lifecycle: &CardLifecycle<'_>,
        id: i64,
        text: &str,
    ) -> Result<UpdateEntry, AppError> {
        self.ensure_active(id)?;
        lifecycle.append_update(id, text)
    }

    pub fn delete(
        &mut self,
        lifecycle: &CardLifecycle<'_>,
        id: i64,
        confirmation: &str,
    ) -> Result<(), AppError> {
        self.ensure_active(id)?;
        lifecycle.delete(id, confirmation)?;
        self.apply_deleted(id);
        Ok(())
    }
}
