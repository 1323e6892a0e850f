use time::{OffsetDateTime, UtcOffset};

use crate::domain::{IncidentCard, IncidentType, UpdateEntry};
use crate::error::AppError;
use crate::escalation::{escalation_status, EscalationStatus};
use crate::normalize::timestamps::{format_display, format_display_short};
use crate::store::CardStore;
use crate::theme::Theme;
use crate::validate::validate_card;

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

/// One-line escalation summary for a card at `now`.
pub fn describe_status(status: &EscalationStatus, offset: UtcOffset) -> String {
    match status {
        EscalationStatus::NoPolicy => "no escalation policy".to_string(),
        EscalationStatus::Pending {
            reached: 0,
            next_level,
            due_at,
        } => format!(
            "escalation {next_level} due {}",
            format_display(*due_at, offset)
        ),
        EscalationStatus::Pending {
            reached,
            next_level,
            due_at,
        } => format!(
            "OVERDUE: level {reached} reached; escalation {next_level} due {}",
            format_display(*due_at, offset)
        ),
        EscalationStatus::Exhausted => "OVERDUE: all escalation levels reached".to_string(),
    }
}

/// Plain-text rendering of one card, as the board shows it.
pub fn render_card(card: &IncidentCard, now: OffsetDateTime, offset: UtcOffset) -> String {
    let status = escalation_status(&card.escalations(), now);
    let mut out = String::new();
    out.push_str(&format!(
        "#{} [{}] {} {}\n",
        card.id,
        card.display_color(),
        card.incident_type.label(),
        card.location
    ));
    out.push_str(&format!("  description: {}\n", or_dash(&card.description)));
    out.push_str(&format!("  ticket: {}\n", or_dash(&card.ticket)));
    out.push_str(&format!("  affected: {}\n", or_dash(&card.affected)));
    out.push_str(&format!("  group: {}\n", or_dash(&card.assigned_group)));
    out.push_str(&format!(
        "  created: {}\n",
        format_display(card.created_at, offset)
    ));
    for (level, at) in card.escalations().as_array().iter().enumerate() {
        if let Some(at) = at {
            out.push_str(&format!(
                "  escalation {}: {}\n",
                level + 1,
                format_display(*at, offset)
            ));
        }
    }
    out.push_str(&format!("  status: {}\n", describe_status(&status, offset)));
    out
}

/// Whole board, newest card first, under a header naming the theme palette.
pub fn render_board(
    cards: &[IncidentCard],
    theme: Theme,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> String {
    let palette = theme.palette();
    let mut out = format!(
        "Fasternet board ({} theme: background {}, text {}) {} card(s)\n\n",
        theme,
        palette.background,
        palette.text,
        cards.len()
    );
    if cards.is_empty() {
        out.push_str("No incidents.\n");
        return out;
    }
    for card in cards {
        out.push_str(&render_card(card, now, offset));
        out.push('\n');
    }
    out
}

/// Update history lines: `DD/MM HH:MM - text`, oldest first.
pub fn render_history(updates: &[UpdateEntry], offset: UtcOffset) -> String {
    if updates.is_empty() {
        return "No updates.\n".to_string();
    }
    updates
        .iter()
        .map(|u| format!("{} - {}\n", format_display_short(u.recorded_at, offset), u.text))
        .collect()
}

fn escape_cell(s: &str) -> String {
    or_dash(s).replace('|', "\\|").replace('\n', " ")
}

/// Deterministic Markdown report of the board at `now`.
///
/// Sections: counts by type, overdue cards (most levels reached first), the full card table by
/// id, and an appendix of audit warnings. Ordering is stable so output is snapshot-testable.
pub fn generate_board_markdown(
    store: &dyn CardStore,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<String, AppError> {
    let mut cards = store.list_cards()?;
    cards.sort_by_key(|c| c.id);

    let statuses: Vec<EscalationStatus> = cards
        .iter()
        .map(|c| escalation_status(&c.escalations(), now))
        .collect();

    let mut out = String::new();
    out.push_str("# Fasternet incident board\n\n");
    out.push_str(&format!("As of: **{}**\n\n", format_display(now, offset)));
    out.push_str(&format!("Open cards: **{}**\n\n", cards.len()));

    out.push_str("## Cards by type\n\n");
    out.push_str("| Type | Color | Cards | Overdue |\n");
    out.push_str("|---|---|---:|---:|\n");
    for t in IncidentType::ALL {
        let total = cards.iter().filter(|c| c.incident_type == t).count();
        let overdue = cards
            .iter()
            .zip(&statuses)
            .filter(|(c, s)| c.incident_type == t && s.is_overdue())
            .count();
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            t.label(),
            crate::color::color_for(t),
            total,
            overdue
        ));
    }
    out.push('\n');

    out.push_str("## Overdue escalations\n\n");
    let mut overdue: Vec<(&IncidentCard, &EscalationStatus)> = cards
        .iter()
        .zip(&statuses)
        .filter(|(_, s)| s.is_overdue())
        .collect();
    overdue.sort_by(|a, b| b.1.reached().cmp(&a.1.reached()).then(a.0.id.cmp(&b.0.id)));
    if overdue.is_empty() {
        out.push_str("None.\n");
    }
    for (card, status) in &overdue {
        out.push_str(&format!(
            "- #{} {} {}: {}\n",
            card.id,
            card.incident_type.label(),
            card.location,
            describe_status(status, offset)
        ));
    }
    out.push('\n');

    out.push_str("## Cards\n\n");
    out.push_str("| ID | Type | Location | Ticket | Group | Created | Level |\n");
    out.push_str("|---:|---|---|---|---|---|---:|\n");
    for (card, status) in cards.iter().zip(&statuses) {
        let level = match status {
            EscalationStatus::NoPolicy => "-".to_string(),
            other => other.reached().to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            card.id,
            card.incident_type.label(),
            escape_cell(&card.location),
            escape_cell(&card.ticket),
            escape_cell(&card.assigned_group),
            format_display(card.created_at, offset),
            level
        ));
    }
    out.push('\n');

    out.push_str("## Audit appendix\n\n");
    let mut any = false;
    for card in &cards {
        let mut codes: Vec<String> = validate_card(card).into_iter().map(|w| w.code).collect();
        if codes.is_empty() {
            continue;
        }
        codes.sort();
        any = true;
        out.push_str(&format!("- #{}: {}\n", card.id, codes.join(", ")));
    }
    if !any {
        out.push_str("No warnings.\n");
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn pending_and_overdue_wording() {
        let due = datetime!(2024-01-01 12:00 UTC);
        let pending = EscalationStatus::Pending {
            reached: 0,
            next_level: 1,
            due_at: due,
        };
        assert_eq!(
            describe_status(&pending, offset!(-3)),
            "escalation 1 due 01/01/2024 09:00"
        );
        let overdue = EscalationStatus::Pending {
            reached: 2,
            next_level: 3,
            due_at: due,
        };
        assert!(describe_status(&overdue, UtcOffset::UTC).starts_with("OVERDUE: level 2"));
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_history(&[], UtcOffset::UTC), "No updates.\n");
    }

    #[test]
    fn table_cells_escape_pipes() {
        assert_eq!(escape_cell("A|B"), "A\\|B");
        assert_eq!(escape_cell(""), "-");
    }
}
