use std::path::{Path, PathBuf};

use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use fasternet_core::error::AppError;
use fasternet_lib::cli::Cli;
use fasternet_lib::execute;

struct Workspace {
    _tmp: TempDir,
    config: PathBuf,
    root: PathBuf,
}

fn workspace() -> Workspace {
    let tmp = tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let config = root.join("fasternet.json");
    let body = serde_json::json!({
        "store": { "kind": "local", "db_path": root.join("board.sqlite") },
        "state_path": root.join("state.json"),
        "utc_offset": "-03:00"
    });
    std::fs::write(&config, body.to_string()).unwrap();
    Workspace {
        _tmp: tmp,
        config,
        root,
    }
}

fn run_with_input(config: &Path, args: &[&str], input: &str) -> Result<String, AppError> {
    let config = config.to_string_lossy().to_string();
    let mut argv = vec!["fasternet", "--config", config.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("valid arguments");
    let mut out = Vec::new();
    execute(&cli, |_| None, &mut input.as_bytes(), &mut out)?;
    Ok(String::from_utf8(out).expect("utf8 output"))
}

fn run(config: &Path, args: &[&str]) -> Result<String, AppError> {
    run_with_input(config, args, "")
}

fn login(ws: &Workspace) {
    run(&ws.config, &["user", "add", "--user", "ana", "--password", "pw"]).expect("user add");
    run(&ws.config, &["login", "--user", "ana", "--password", "pw"]).expect("login");
}

#[test]
fn board_commands_require_a_session() {
    let ws = workspace();
    for args in [
        vec!["list"],
        vec!["create", "--location", "centro", "--type", "POP"],
        vec!["delete", "--id", "1", "--confirm", "excluir"],
        vec!["whoami"],
    ] {
        let err = run(&ws.config, &args).unwrap_err();
        assert_eq!(err.code, "AUTH_REQUIRED", "{args:?}");
    }

    run(&ws.config, &["user", "add", "--user", "ana", "--password", "pw"]).expect("user add");
    let err = run(&ws.config, &["login", "--user", "ana", "--password", "nope"]).unwrap_err();
    assert_eq!(err.code, "AUTH_FAILED");
}

#[test]
fn create_update_and_delete_through_the_cli() {
    let ws = workspace();
    login(&ws);
    assert!(run(&ws.config, &["whoami"]).unwrap().starts_with("ana (session until "));

    let created = run(
        &ws.config,
        &[
            "create",
            "--location",
            "campinas",
            "--type",
            "gpon",
            "--ticket",
            "inc-7",
            "--created-at",
            "2024-01-01T09:00",
        ],
    )
    .expect("create");
    assert!(created.starts_with("#1 [#ffff99] GPON CAMPINAS\n"), "{created}");
    assert!(created.contains("  created: 01/01/2024 09:00\n"));
    assert!(created.contains("  escalation 1: 01/01/2024 21:00\n"));

    let update = run(&ws.config, &["update", "--id", "1", "--text", "equipe a caminho"])
        .expect("update");
    assert!(update.ends_with(" - equipe a caminho\n"));

    let history = run(&ws.config, &["history", "--id", "1"]).expect("history");
    assert_eq!(history.lines().count(), 1);

    let edited = run(&ws.config, &["edit", "--id", "1", "--type", "backbone"]).expect("edit");
    assert!(edited.contains("  escalation 1: 01/01/2024 13:00\n"), "{edited}");
    assert!(edited.contains("  ticket: INC-7\n"));

    let err = run(&ws.config, &["delete", "--id", "1", "--confirm", "Excluir"]).unwrap_err();
    assert_eq!(err.code, "CONFIRMATION_MISMATCH");
    run(&ws.config, &["delete", "--id", "1", "--confirm", "excluir"]).expect("delete");

    let listing = run(&ws.config, &["list"]).expect("list");
    assert!(listing.ends_with("No incidents.\n"));
}

#[test]
fn json_output_uses_store_columns() {
    let ws = workspace();
    login(&ws);
    let out = run(
        &ws.config,
        &[
            "--json",
            "create",
            "--location",
            "centro",
            "--type",
            "PRIMARIA",
            "--created-at",
            "2024-01-01T00:00:00Z",
        ],
    )
    .expect("create");
    let v: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(v["tipo"], "PRIMARIA");
    assert_eq!(v["trecho_cidade"], "CENTRO");
    assert_eq!(v["cor_atual"], "#9999ff");
    assert_eq!(v["escala_1"], "2024-01-01T04:00:00Z");
}

#[test]
fn escalation_calculator_needs_no_login() {
    let ws = workspace();
    let out = run(
        &ws.config,
        &[
            "escalations",
            "--type",
            "BACKBONE",
            "--created-at",
            "2024-01-01T00:00",
            "--now",
            "2024-01-01T05:00",
        ],
    )
    .expect("escalations");
    assert_eq!(
        out,
        "BACKBONE created 01/01/2024 00:00\n\
         escalation 1: 01/01/2024 04:00\n\
         escalation 2: 01/01/2024 08:00\n\
         escalation 3: 01/01/2024 12:00\n\
         status: OVERDUE: level 1 reached; escalation 2 due 01/01/2024 08:00\n"
    );

    let pop = run(
        &ws.config,
        &["escalations", "--type", "pop", "--created-at", "2024-01-01T00:00"],
    )
    .expect("pop");
    assert!(pop.ends_with("no escalation policy\n"));

    let err = run(
        &ws.config,
        &["escalations", "--type", "metro", "--created-at", "2024-01-01T00:00"],
    )
    .unwrap_err();
    assert_eq!(err.code, "INVALID_INCIDENT_TYPE");
}

#[test]
fn theme_survives_logout() {
    let ws = workspace();
    login(&ws);
    assert_eq!(run(&ws.config, &["theme"]).unwrap(), "dark\n");
    assert_eq!(run(&ws.config, &["theme", "toggle"]).unwrap(), "light\n");
    run(&ws.config, &["logout"]).expect("logout");
    assert_eq!(run(&ws.config, &["theme"]).unwrap(), "light\n");
    assert_eq!(
        run(&ws.config, &["theme", "sepia"]).unwrap_err().code,
        "CONFIG_INVALID_THEME"
    );
}

#[test]
fn report_export_and_demo() {
    let ws = workspace();
    let seeded = run(&ws.config, &["demo", "seed"]).expect("seed");
    assert_eq!(seeded, "Seeded 12 card(s), 12 update(s), 1 user(s)\n");
    run(&ws.config, &["login", "--user", "demo", "--password", "demo"]).expect("login");

    let report = run(&ws.config, &["report", "--now", "2026-01-02T00:00:00Z"]).expect("report");
    assert!(report.starts_with("# Fasternet incident board\n"));
    assert!(report.contains("Open cards: **12**"));

    assert_eq!(run(&ws.config, &["audit"]).unwrap(), "No warnings.\n");

    let exported = run(&ws.config, &["export", "--dest", ws.root.to_str().unwrap()])
        .expect("export");
    assert!(exported.starts_with("Exported 12 card(s) and 12 update(s) to "));
}

#[test]
fn shell_keeps_the_board_in_memory() {
    let ws = workspace();
    login(&ws);
    let script = "\
create --location centro --type pop --created-at 2024-01-01T00:00
create --location 'vila nova' --type gpon --created-at 2024-01-01T00:00
update --id 1 --text \"fibra emendada\"
delete --id 1 --confirm excluir
update --id 1 --text tarde
bogus
list --now 2024-01-01T01:00
exit
";
    let out = run_with_input(&ws.config, &["shell"], script).expect("shell");
    assert!(out.starts_with("0 card(s) loaded."));
    assert!(out.contains("#2 [#ffff99] GPON VILA NOVA\n"));
    assert!(out.contains("Deleted card #1\n"));
    assert!(out.contains("[CARD_DELETED] Card was deleted\n"));
    assert!(out.contains("unrecognized subcommand 'bogus'"));
    assert!(out.contains("1 card(s)\n"), "{out}");
}

#[test]
fn shell_reloads_the_board_after_logging_back_in() {
    let ws = workspace();
    login(&ws);
    run(
        &ws.config,
        &["create", "--location", "centro", "--type", "pop", "--created-at", "2024-01-01T00:00"],
    )
    .expect("create");
    run(&ws.config, &["update", "--id", "1", "--text", "fibra emendada"]).expect("update");

    let script = "\
logout
list
login --user ana --password pw
list --now 2024-01-01T01:00
history --id 1
";
    let out = run_with_input(&ws.config, &["shell"], script).expect("shell");
    assert!(out.starts_with("1 card(s) loaded."), "{out}");
    assert!(out.contains("[AUTH_REQUIRED]"), "{out}");
    assert!(out.contains("Logged in as ana until "), "{out}");
    assert!(out.contains("#1 [#00cc00] POP CENTRO\n"), "{out}");
    assert!(out.contains(" - fibra emendada\n"), "{out}");
    assert!(!out.contains("DB_NOT_FOUND"), "{out}");
}
