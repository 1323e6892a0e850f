use std::fs;
use std::path::Path;

use fasternet_core::auth::register_user;
use fasternet_core::config::{AppConfig, StoreConfig};
use fasternet_core::demo::seed_demo_board;
use fasternet_core::domain::{IncidentCard, IncidentType, UpdateEntry};
use fasternet_core::error::AppError;
use fasternet_core::escalation::{compute_escalations, escalation_status};
use fasternet_core::export::export_board_csv;
use fasternet_core::lifecycle::{CardDraft, CardEdit, CardLifecycle};
use fasternet_core::normalize::timestamps::{
    format_display, format_display_short, parse_created_at, to_rfc3339_utc,
};
use fasternet_core::repo::SqliteStore;
use fasternet_core::report::{
    describe_status, generate_board_markdown, render_board, render_card, render_history,
};
use fasternet_core::session::{load_state, save_state, LocalState, Session};
use fasternet_core::store::{Authenticator, CardStore};
use fasternet_core::theme::Theme;
use fasternet_core::validate::validate_all_cards;
use fasternet_remote::{RestAuthenticator, RestStore};
use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use crate::cli::{Command, CreateArgs, DemoCommand, EditArgs, UserCommand};

/// Where cards and credentials live.
pub enum Backend {
    Local(SqliteStore),
    Remote {
        store: RestStore,
        auth: RestAuthenticator,
    },
}

impl Backend {
    pub fn open(config: &StoreConfig) -> Result<Self, AppError> {
        match config {
            StoreConfig::Local { db_path } => {
                debug!(path = %db_path.display(), "opening local board");
                Ok(Backend::Local(SqliteStore::open(db_path)?))
            }
            StoreConfig::Remote {
                url,
                api_key,
                timeout_ms,
            } => {
                debug!(url = %url, "using hosted board");
                let (store, auth) = fasternet_remote::connect(url, api_key, *timeout_ms)?;
                Ok(Backend::Remote { store, auth })
            }
        }
    }

    pub fn store(&self) -> &dyn CardStore {
        match self {
            Backend::Local(s) => s,
            Backend::Remote { store, .. } => store,
        }
    }

    pub fn auth(&self) -> &dyn Authenticator {
        match self {
            Backend::Local(s) => s,
            Backend::Remote { auth, .. } => auth,
        }
    }

    fn local(&self, action: &str) -> Result<&SqliteStore, AppError> {
        match self {
            Backend::Local(s) => Ok(s),
            Backend::Remote { .. } => Err(AppError::new(
                "LOCAL_STORE_REQUIRED",
                format!("{action} is only available with the local store"),
            )),
        }
    }
}

/// Resolved configuration, open backend and the user's saved state.
pub struct App {
    pub config: AppConfig,
    pub backend: Backend,
    pub state: LocalState,
    pub offset: UtcOffset,
    pub json: bool,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| {
            AppError::new("OUTPUT_ENCODE_FAILED", "Failed to encode output")
                .with_details(e.to_string())
        })
}

impl App {
    pub fn open(config: AppConfig, json: bool) -> Result<Self, AppError> {
        config.validate()?;
        let offset = config.offset()?;
        let backend = Backend::open(&config.store)?;
        let state = load_state(&config.state_path, config.default_theme)?;
        Ok(Self {
            config,
            backend,
            state,
            offset,
            json,
        })
    }

    pub fn lifecycle(&self) -> CardLifecycle<'_> {
        CardLifecycle::new(self.backend.store(), self.config.delete_confirmation.clone())
    }

    pub fn require_session(&self) -> Result<&Session, AppError> {
        self.state.require_session(OffsetDateTime::now_utc())
    }

    fn save_state(&self) -> Result<(), AppError> {
        save_state(&self.config.state_path, &self.state)
    }

    /// `--now` value, or the current time.
    pub fn instant(&self, raw: Option<&str>) -> Result<OffsetDateTime, AppError> {
        match raw {
            Some(raw) => parse_created_at(raw, self.offset),
            None => Ok(OffsetDateTime::now_utc()),
        }
    }

    pub fn show_card(&self, card: &IncidentCard) -> Result<String, AppError> {
        if self.json {
            return to_json(card);
        }
        Ok(render_card(card, OffsetDateTime::now_utc(), self.offset))
    }

    pub fn show_update(&self, entry: &UpdateEntry) -> Result<String, AppError> {
        if self.json {
            return to_json(entry);
        }
        Ok(format!(
            "#{} {} - {}\n",
            entry.card_id,
            format_display_short(entry.recorded_at, self.offset),
            entry.text
        ))
    }

    pub fn show_board(
        &self,
        cards: &[IncidentCard],
        now: OffsetDateTime,
    ) -> Result<String, AppError> {
        if self.json {
            return to_json(&cards);
        }
        Ok(render_board(cards, self.state.theme, now, self.offset))
    }

    pub fn draft(&self, args: &CreateArgs) -> Result<CardDraft, AppError> {
        let created_at = match args.created_at.as_deref() {
            Some(raw) => parse_created_at(raw, self.offset)?,
            None => OffsetDateTime::now_utc(),
        };
        let mut draft = CardDraft::new(&args.location, &args.incident_type, created_at);
        draft.description = args.description.clone();
        draft.ticket = args.ticket.clone();
        draft.affected = args.affected.clone();
        draft.assigned_group = args.group.clone();
        Ok(draft)
    }

    /// Form prefilled from `current`, with the flags given on the command line applied.
    pub fn edit_form(current: &IncidentCard, args: &EditArgs) -> CardEdit {
        let mut edit = CardEdit::from_card(current);
        let overrides = [
            (&mut edit.location, &args.location),
            (&mut edit.incident_type, &args.incident_type),
            (&mut edit.description, &args.description),
            (&mut edit.ticket, &args.ticket),
            (&mut edit.affected, &args.affected),
            (&mut edit.assigned_group, &args.group),
        ];
        for (field, value) in overrides {
            if let Some(v) = value {
                field.clone_from(v);
            }
        }
        edit
    }

    pub fn dispatch(&mut self, command: &Command) -> Result<String, AppError> {
        match command {
            Command::Login { user, password } => {
                let now = OffsetDateTime::now_utc();
                let session = self
                    .state
                    .login(self.backend.auth(), user, password, now)?
                    .clone();
                self.save_state()?;
                Ok(format!(
                    "Logged in as {} until {}\n",
                    session.username,
                    format_display(session.expires_at, self.offset)
                ))
            }
            Command::Logout => {
                self.state.logout();
                self.save_state()?;
                Ok("Logged out\n".to_string())
            }
            Command::Whoami => {
                let session = self.require_session()?;
                Ok(format!(
                    "{} (session until {})\n",
                    session.username,
                    format_display(session.expires_at, self.offset)
                ))
            }
            Command::Theme { mode } => {
                let theme = match mode.as_deref() {
                    None => return Ok(format!("{}\n", self.state.theme)),
                    Some("toggle") => self.state.toggle_theme(),
                    Some(raw) => {
                        self.state.theme = raw.parse::<Theme>()?;
                        self.state.theme
                    }
                };
                self.save_state()?;
                info!(theme = %theme, "theme changed");
                Ok(format!("{theme}\n"))
            }
            Command::List(now) => {
                self.require_session()?;
                let now = self.instant(now.now.as_deref())?;
                let cards = self.backend.store().list_cards()?;
                self.show_board(&cards, now)
            }
            Command::Create(args) => {
                self.require_session()?;
                let card = self.lifecycle().create(&self.draft(args)?)?;
                self.show_card(&card)
            }
            Command::Edit(args) => {
                self.require_session()?;
                let lifecycle = self.lifecycle();
                let current = lifecycle.store().get_card(args.id)?;
                let card = lifecycle.edit(args.id, &Self::edit_form(&current, args))?;
                self.show_card(&card)
            }
            Command::Update { id, text } => {
                self.require_session()?;
                let entry = self.lifecycle().append_update(*id, text)?;
                self.show_update(&entry)
            }
            Command::History { id } => {
                self.require_session()?;
                let updates = self.lifecycle().history(*id)?;
                if self.json {
                    return to_json(&updates);
                }
                Ok(render_history(&updates, self.offset))
            }
            Command::Delete { id, confirm } => {
                self.require_session()?;
                self.lifecycle().delete(*id, confirm)?;
                Ok(format!("Deleted card #{id}\n"))
            }
            Command::Escalations {
                incident_type,
                created_at,
                now,
            } => self.escalations(incident_type, created_at, now.as_deref()),
            Command::Report { now, out } => {
                self.require_session()?;
                let now = self.instant(now.now.as_deref())?;
                let md = generate_board_markdown(self.backend.store(), now, self.offset)?;
                match out {
                    Some(path) => write_file(path, &md),
                    None => Ok(md),
                }
            }
            Command::Audit => {
                self.require_session()?;
                let items = validate_all_cards(self.backend.store())?;
                if self.json {
                    return to_json(&items);
                }
                if items.is_empty() {
                    return Ok("No warnings.\n".to_string());
                }
                let mut out = String::new();
                for item in &items {
                    for w in &item.warnings {
                        out.push_str(&format!(
                            "#{} {}: [{}] {}\n",
                            item.id, item.location, w.code, w.message
                        ));
                    }
                }
                Ok(out)
            }
            Command::Export { dest } => {
                self.require_session()?;
                let export_time = to_rfc3339_utc(OffsetDateTime::now_utc())?;
                let res = export_board_csv(
                    self.backend.store(),
                    dest,
                    &export_time,
                    env!("CARGO_PKG_VERSION"),
                )?;
                if self.json {
                    return to_json(&res);
                }
                Ok(format!(
                    "Exported {} card(s) and {} update(s) to {}\n",
                    res.card_count, res.update_count, res.export_dir
                ))
            }
            Command::User(UserCommand::Add { user, password }) => {
                register_user(self.backend.local("Creating users")?, user, password)?;
                Ok(format!("Created user {}\n", user.trim()))
            }
            Command::Demo(DemoCommand::Seed) => {
                let summary = seed_demo_board(self.backend.local("Demo seeding")?)?;
                if self.json {
                    return to_json(&summary);
                }
                Ok(format!(
                    "Seeded {} card(s), {} update(s), {} user(s)\n",
                    summary.cards, summary.updates, summary.users
                ))
            }
            Command::Shell => Err(AppError::new(
                "SHELL_NESTED",
                "Already inside the interactive shell",
            )),
            Command::About => Ok(format!(
                "fasternet {} (commit {})\n",
                env!("CARGO_PKG_VERSION"),
                option_env!("GIT_COMMIT_HASH").unwrap_or("unknown")
            )),
        }
    }

    fn escalations(
        &self,
        incident_type: &str,
        created_at: &str,
        now: Option<&str>,
    ) -> Result<String, AppError> {
        let incident_type: IncidentType = incident_type.parse()?;
        let created_at = parse_created_at(created_at, self.offset)?;
        let escalations = compute_escalations(incident_type, created_at)?;
        if self.json {
            #[derive(Serialize)]
            struct Checkpoints {
                #[serde(rename = "tipo")]
                incident_type: IncidentType,
                escala_1: Option<String>,
                escala_2: Option<String>,
                escala_3: Option<String>,
            }
            let fmt = |t: Option<OffsetDateTime>| t.map(to_rfc3339_utc).transpose();
            return to_json(&Checkpoints {
                incident_type,
                escala_1: fmt(escalations.first)?,
                escala_2: fmt(escalations.second)?,
                escala_3: fmt(escalations.third)?,
            });
        }

        let mut out = format!(
            "{} created {}\n",
            incident_type.label(),
            format_display(created_at, self.offset)
        );
        if escalations.is_none() {
            out.push_str("no escalation policy\n");
            return Ok(out);
        }
        for (level, at) in escalations.as_array().iter().enumerate() {
            if let Some(at) = at {
                out.push_str(&format!(
                    "escalation {}: {}\n",
                    level + 1,
                    format_display(*at, self.offset)
                ));
            }
        }
        if let Some(raw) = now {
            let now = parse_created_at(raw, self.offset)?;
            out.push_str(&format!(
                "status: {}\n",
                describe_status(&escalation_status(&escalations, now), self.offset)
            ));
        }
        Ok(out)
    }
}

fn write_file(path: &Path, text: &str) -> Result<String, AppError> {
    fs::write(path, text).map_err(|e| {
        AppError::new("REPORT_WRITE_FAILED", "Failed to write report")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    Ok(format!("Wrote {}\n", path.display()))
}
