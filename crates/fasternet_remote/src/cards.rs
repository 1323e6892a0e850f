use fasternet_core::domain::{CardPatch, IncidentCard, NewCard, UpdateEntry};
use fasternet_core::error::AppError;
use fasternet_core::store::CardStore;
use serde::Serialize;
use tracing::info;

use crate::client::{eq, to_body, QueryPairs, RestClient};

pub const CARDS_TABLE: &str = "cards";
pub const UPDATES_TABLE: &str = "card_updates";

pub fn list_cards_query() -> QueryPairs {
    vec![("select", "*".to_string()), ("order", "id.desc".to_string())]
}

pub fn card_by_id_query(id: i64) -> QueryPairs {
    vec![("select", "*".to_string()), ("id", eq(id))]
}

pub fn updates_query(card_id: i64) -> QueryPairs {
    vec![
        ("select", "*".to_string()),
        ("card_id", eq(card_id)),
        ("order", "id.asc".to_string()),
    ]
}

#[derive(Debug, Serialize)]
struct NewUpdateRow<'a> {
    card_id: i64,
    texto: &'a str,
}

fn single<T>(table: &str, rows: Vec<T>) -> Result<T, AppError> {
    rows.into_iter().next().ok_or_else(|| {
        AppError::new("STORE_DECODE_FAILED", "Hosted store returned no row for a write")
            .with_details(format!("table={table}"))
    })
}

/// A foreign-key violation (HTTP 409, Postgres `23503`) means the card still has updates the
/// schema does not cascade to.
pub fn delete_conflict(id: i64, err: AppError) -> AppError {
    let blocked = err.is("STORE_REQUEST_FAILED")
        && err
            .details
            .as_deref()
            .is_some_and(|d| d.contains("status=409") || d.contains("23503"));
    if !blocked {
        return err;
    }
    AppError::new(
        "CARD_DELETE_BLOCKED",
        "Hosted store kept the card because its updates do not cascade",
    )
    .with_details(format!("id={id}; {}", err.details.unwrap_or_default()))
}

/// Card store backed by the hosted PostgREST tables `cards` and `card_updates`.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: RestClient,
}

impl RestStore {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

impl CardStore for RestStore {
    fn list_cards(&self) -> Result<Vec<IncidentCard>, AppError> {
        self.client.get(CARDS_TABLE, &list_cards_query())
    }

    fn get_card(&self, id: i64) -> Result<IncidentCard, AppError> {
        let rows: Vec<IncidentCard> = self.client.get(CARDS_TABLE, &card_by_id_query(id))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Card", id))
    }

    fn insert_card(&self, card: &NewCard) -> Result<IncidentCard, AppError> {
        let rows: Vec<IncidentCard> =
            self.client
                .write("POST", CARDS_TABLE, &Vec::new(), Some(to_body(card)?))?;
        let card = single(CARDS_TABLE, rows)?;
        info!(card_id = card.id, "inserted hosted card");
        Ok(card)
    }

    fn update_card(&self, id: i64, patch: &CardPatch) -> Result<IncidentCard, AppError> {
        let rows: Vec<IncidentCard> = self.client.write(
            "PATCH",
            CARDS_TABLE,
            &vec![("id", eq(id))],
            Some(to_body(patch)?),
        )?;
        let card = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Card", id))?;
        info!(card_id = id, "updated hosted card");
        Ok(card)
    }

    /// Only the card row is deleted; its updates go with it through the schema's
    /// `ON DELETE CASCADE`. A schema without the cascade rejects the delete, and nothing changes.
    fn delete_card(&self, id: i64) -> Result<(), AppError> {
        let rows: Vec<serde_json::Value> = self
            .client
            .write("DELETE", CARDS_TABLE, &vec![("id", eq(id))], None)
            .map_err(|e| delete_conflict(id, e))?;
        if rows.is_empty() {
            return Err(AppError::not_found("Card", id));
        }
        info!(card_id = id, "deleted hosted card");
        Ok(())
    }

    fn list_updates(&self, card_id: i64) -> Result<Vec<UpdateEntry>, AppError> {
        self.client.get(UPDATES_TABLE, &updates_query(card_id))
    }

    fn append_update(&self, card_id: i64, text: &str) -> Result<UpdateEntry, AppError> {
        self.get_card(card_id)?;
        let body = to_body(&NewUpdateRow {
            card_id,
            texto: text,
        })?;
        let rows: Vec<UpdateEntry> =
            self.client
                .write("POST", UPDATES_TABLE, &Vec::new(), Some(body))?;
        let entry = single(UPDATES_TABLE, rows)?;
        info!(card_id, update_id = entry.id, "appended hosted card update");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_in_insertion_order() {
        assert_eq!(
            updates_query(7),
            vec![
                ("select", "*".to_string()),
                ("card_id", "eq.7".to_string()),
                ("order", "id.asc".to_string()),
            ]
        );
    }

    #[test]
    fn foreign_key_rejection_is_reported_as_blocked_delete() {
        let fk = AppError::new("STORE_REQUEST_FAILED", "rejected")
            .with_details(r#"table=cards; status=409; body={"code":"23503"}"#);
        let err = delete_conflict(4, fk);
        assert_eq!(err.code, "CARD_DELETE_BLOCKED");
        assert!(err.details.unwrap().starts_with("id=4; "));

        let denied = AppError::new("STORE_REQUEST_FAILED", "rejected")
            .with_details("table=cards; status=403; body={}");
        assert_eq!(delete_conflict(4, denied.clone()), denied);
    }

    #[test]
    fn update_row_uses_store_columns() {
        let v = to_body(&NewUpdateRow {
            card_id: 3,
            texto: "ok",
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({ "card_id": 3, "texto": "ok" }));
    }
}
