use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::domain::{CardPatch, IncidentCard, NewCard, UpdateEntry};
use crate::error::AppError;
use crate::normalize::timestamps::{parse_stored_timestamp, to_rfc3339_utc};
use crate::store::CardStore;

const CARD_COLUMNS: &str = r#"
  id, trecho_cidade, tipo, descricao, ticket, afetacao, grupo_acionado,
  data_criacao, escala_1, escala_2, escala_3, cor_atual
"#;

/// Local board store on SQLite.
pub struct SqliteStore {
    conn: Connection,
}

struct CardRow {
    id: i64,
    location: String,
    incident_type: String,
    description: String,
    ticket: String,
    affected: String,
    assigned_group: String,
    created_at: String,
    escalation_1: Option<String>,
    escalation_2: Option<String>,
    escalation_3: Option<String>,
    color: Option<String>,
}

fn read_card_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        location: row.get(1)?,
        incident_type: row.get(2)?,
        description: row.get(3)?,
        ticket: row.get(4)?,
        affected: row.get(5)?,
        assigned_group: row.get(6)?,
        created_at: row.get(7)?,
        escalation_1: row.get(8)?,
        escalation_2: row.get(9)?,
        escalation_3: row.get(10)?,
        color: row.get(11)?,
    })
}

fn decode_ts(field: &str, raw: &str) -> Result<time::OffsetDateTime, AppError> {
    parse_stored_timestamp(raw).map_err(|e| {
        AppError::new("DB_DECODE_FAILED", format!("Stored {field} is not a timestamp"))
            .with_details(e.details.unwrap_or(e.message))
    })
}

fn decode_opt_ts(field: &str, raw: Option<String>) -> Result<Option<time::OffsetDateTime>, AppError> {
    raw.as_deref().map(|s| decode_ts(field, s)).transpose()
}

fn encode_opt_ts(dt: Option<time::OffsetDateTime>) -> Result<Option<String>, AppError> {
    dt.map(to_rfc3339_utc).transpose()
}

impl CardRow {
    fn into_card(self) -> Result<IncidentCard, AppError> {
        let incident_type = self.incident_type.parse().map_err(|e: AppError| {
            AppError::new("DB_DECODE_FAILED", "Stored card has an unknown type")
                .with_details(format!("id={}; {}", self.id, e.details.unwrap_or_default()))
        })?;
        Ok(IncidentCard {
            id: self.id,
            location: self.location,
            incident_type,
            description: self.description,
            ticket: self.ticket,
            affected: self.affected,
            assigned_group: self.assigned_group,
            created_at: decode_ts("data_criacao", &self.created_at)?,
            escalation_1: decode_opt_ts("escala_1", self.escalation_1)?,
            escalation_2: decode_opt_ts("escala_2", self.escalation_2)?,
            escalation_3: decode_opt_ts("escala_3", self.escalation_3)?,
            color: self.color,
        })
    }
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) and migrate the database at `path`.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Ok(Self::new(crate::db::open_board_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = crate::db::open_in_memory()?;
        crate::db::migrate(&mut conn)?;
        Ok(Self::new(conn))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count_cards(&self) -> Result<i64, AppError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to count cards").with_details(e.to_string())
            })
    }

    /// Every update on the board, grouped by card and in insertion order within a card.
    pub fn list_all_updates(&self) -> Result<Vec<UpdateEntry>, AppError> {
        self.query_updates(
            "SELECT id, card_id, texto, data_registro FROM card_updates ORDER BY card_id ASC, id ASC",
            [],
        )
    }

    fn query_updates<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<UpdateEntry>, AppError> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare card updates query")
                .with_details(e.to_string())
        })?;

        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to query card updates")
                    .with_details(e.to_string())
            })?;

        let mut out = Vec::new();
        for r in rows {
            let (id, card_id, text, recorded_at) = r.map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to decode card update row")
                    .with_details(e.to_string())
            })?;
            out.push(UpdateEntry {
                id,
                card_id,
                text,
                recorded_at: decode_ts("data_registro", &recorded_at)?,
            });
        }
        Ok(out)
    }

    fn get_update(&self, id: i64) -> Result<UpdateEntry, AppError> {
        self.query_updates(
            "SELECT id, card_id, texto, data_registro FROM card_updates WHERE id = ?1",
            [id],
        )?
        .pop()
        .ok_or_else(|| AppError::not_found("Card update", id))
    }
}

impl CardStore for SqliteStore {
    fn list_cards(&self) -> Result<Vec<IncidentCard>, AppError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY id DESC");
        let mut stmt = self.conn.prepare(&sql).map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare cards query")
                .with_details(e.to_string())
        })?;

        let rows = stmt.query_map([], read_card_row).map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query cards").with_details(e.to_string())
        })?;

        let mut out = Vec::new();
        for r in rows {
            let row = r.map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to decode card row")
                    .with_details(e.to_string())
            })?;
            out.push(row.into_card()?);
        }
        debug!(count = out.len(), "listed cards");
        Ok(out)
    }

    fn get_card(&self, id: i64) -> Result<IncidentCard, AppError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, [id], read_card_row)
            .optional()
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to query card").with_details(e.to_string())
            })?;
        row.ok_or_else(|| AppError::not_found("Card", id))?
            .into_card()
    }

    fn insert_card(&self, card: &NewCard) -> Result<IncidentCard, AppError> {
        self.conn
            .execute(
                r#"
          INSERT INTO cards(
            trecho_cidade, tipo, descricao, ticket, afetacao, grupo_acionado,
            data_criacao, escala_1, escala_2, escala_3, cor_atual
          ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
          "#,
                params![
                    card.location,
                    card.incident_type.as_str(),
                    card.description,
                    card.ticket,
                    card.affected,
                    card.assigned_group,
                    to_rfc3339_utc(card.created_at)?,
                    encode_opt_ts(card.escalation_1)?,
                    encode_opt_ts(card.escalation_2)?,
                    encode_opt_ts(card.escalation_3)?,
                    card.color,
                ],
            )
            .map_err(|e| {
                AppError::new("DB_WRITE_FAILED", "Failed to insert card").with_details(e.to_string())
            })?;

        let id = self.conn.last_insert_rowid();
        info!(card_id = id, incident_type = card.incident_type.as_str(), "inserted card");
        self.get_card(id)
    }

    fn update_card(&self, id: i64, patch: &CardPatch) -> Result<IncidentCard, AppError> {
        let changed = self
            .conn
            .execute(
                r#"
          UPDATE cards SET
            trecho_cidade = ?1, tipo = ?2, descricao = ?3, ticket = ?4, afetacao = ?5,
            grupo_acionado = ?6, escala_1 = ?7, escala_2 = ?8, escala_3 = ?9, cor_atual = ?10
          WHERE id = ?11
          "#,
                params![
                    patch.location,
                    patch.incident_type.as_str(),
                    patch.description,
                    patch.ticket,
                    patch.affected,
                    patch.assigned_group,
                    encode_opt_ts(patch.escalation_1)?,
                    encode_opt_ts(patch.escalation_2)?,
                    encode_opt_ts(patch.escalation_3)?,
                    patch.color,
                    id,
                ],
            )
            .map_err(|e| {
                AppError::new("DB_WRITE_FAILED", "Failed to update card").with_details(e.to_string())
            })?;

        if changed == 0 {
            return Err(AppError::not_found("Card", id));
        }
        info!(card_id = id, "updated card");
        self.get_card(id)
    }

    fn delete_card(&self, id: i64) -> Result<(), AppError> {
        let changed = self
            .conn
            .execute("DELETE FROM cards WHERE id = ?1", [id])
            .map_err(|e| {
                AppError::new("DB_WRITE_FAILED", "Failed to delete card").with_details(e.to_string())
            })?;

        if changed == 0 {
            return Err(AppError::not_found("Card", id));
        }
        info!(card_id = id, "deleted card");
        Ok(())
    }

    fn list_updates(&self, card_id: i64) -> Result<Vec<UpdateEntry>, AppError> {
        self.query_updates(
            "SELECT id, card_id, texto, data_registro FROM card_updates WHERE card_id = ?1 ORDER BY id ASC",
            [card_id],
        )
    }

    fn append_update(&self, card_id: i64, text: &str) -> Result<UpdateEntry, AppError> {
        // Fail with NOT_FOUND rather than a bare foreign-key violation.
        self.get_card(card_id)?;

        self.conn
            .execute(
                "INSERT INTO card_updates(card_id, texto) VALUES (?1, ?2)",
                params![card_id, text],
            )
            .map_err(|e| {
                AppError::new("DB_WRITE_FAILED", "Failed to append card update")
                    .with_details(e.to_string())
            })?;

        let id = self.conn.last_insert_rowid();
        info!(card_id, update_id = id, "appended card update");
        self.get_update(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IncidentType;
    use time::macros::datetime;

    fn new_card(location: &str) -> NewCard {
        NewCard {
            location: location.to_string(),
            incident_type: IncidentType::Pop,
            description: String::new(),
            ticket: String::new(),
            affected: String::new(),
            assigned_group: String::new(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            escalation_1: None,
            escalation_2: None,
            escalation_3: None,
            color: crate::color::color_for(IncidentType::Pop).to_string(),
        }
    }

    #[test]
    fn lists_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert_card(&new_card("A")).unwrap();
        let b = store.insert_card(&new_card("B")).unwrap();
        let ids: Vec<i64> = store.list_cards().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn missing_card_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_card(42).unwrap_err().code, crate::error::NOT_FOUND);
        assert_eq!(store.delete_card(42).unwrap_err().code, crate::error::NOT_FOUND);
        assert_eq!(
            store.append_update(42, "x").unwrap_err().code,
            crate::error::NOT_FOUND
        );
    }
}
