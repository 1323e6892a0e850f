use serde::{Deserialize, Serialize};
use time::macros::datetime;
use time::Duration;
use tracing::info;

use crate::auth::register_user;
use crate::domain::IncidentType;
use crate::error::AppError;
use crate::lifecycle::{CardDraft, CardLifecycle, DeleteConfirmation};
use crate::repo::SqliteStore;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";

const LOCATIONS: [&str; 6] = [
    "Campinas - Sumaré",
    "Jundiaí",
    "Centro / Anel Norte",
    "Valinhos",
    "Hortolândia - Paulínia",
    "Americana",
];
const GROUPS: [&str; 3] = ["NOC N1", "Campo", "Backbone N2"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    pub cards: usize,
    pub updates: usize,
    pub users: usize,
}

/// Fill an empty local board with a deterministic set of cards across every type.
///
/// Cards are created through the normal lifecycle so escalations and colors are derived the
/// same way user-created cards are. Base time: 2026-01-01T00:00:00Z.
pub fn seed_demo_board(store: &SqliteStore) -> Result<DemoSeedSummary, AppError> {
    if store.count_cards()? > 0 {
        return Err(AppError::new(
            "DEMO_BOARD_NOT_EMPTY",
            "Demo data can only be seeded into an empty board",
        ));
    }

    let lifecycle = CardLifecycle::new(store, DeleteConfirmation::default());
    let base = datetime!(2026-01-01 0:00 UTC);
    let mut summary = DemoSeedSummary {
        cards: 0,
        updates: 0,
        users: 0,
    };

    for i in 0..12usize {
        let incident_type = IncidentType::ALL[i % IncidentType::ALL.len()];
        let mut draft = CardDraft::new(
            LOCATIONS[i % LOCATIONS.len()],
            incident_type.as_str(),
            base + Duration::hours(3 * i as i64),
        );
        draft.description = format!("demo incident {}", i + 1);
        draft.ticket = format!("INC-{:04}", 1000 + i);
        draft.affected = format!("{} clientes", 10 * (i + 1));
        draft.assigned_group = GROUPS[i % GROUPS.len()].to_string();

        let card = lifecycle.create(&draft)?;
        summary.cards += 1;

        for n in 0..(i % 3) {
            lifecycle.append_update(card.id, &format!("acompanhamento {}", n + 1))?;
            summary.updates += 1;
        }
    }

    match register_user(store, DEMO_USERNAME, DEMO_PASSWORD) {
        Ok(()) => summary.users += 1,
        Err(e) if e.is("AUTH_USER_EXISTS") => {}
        Err(e) => return Err(e),
    }

    info!(
        cards = summary.cards,
        updates = summary.updates,
        "seeded demo board"
    );
    Ok(summary)
}
