use pretty_assertions::assert_eq;
use tempfile::tempdir;
use time::macros::datetime;
use time::Duration;

use fasternet_core::auth::register_user;
use fasternet_core::error::{AUTH_FAILED, AUTH_REQUIRED};
use fasternet_core::repo::SqliteStore;
use fasternet_core::session::{load_state, save_state, LocalState};
use fasternet_core::store::Authenticator;
use fasternet_core::theme::Theme;

#[test]
fn registered_user_can_log_in() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(&tmp.path().join("board.sqlite")).expect("open");
    register_user(&store, "operador", "s3nha").expect("register");

    let ok = store.check_credentials(" operador ", "s3nha").expect("check");
    assert_eq!(ok.map(|i| i.username), Some("operador".to_string()));
    assert_eq!(store.check_credentials("operador", "S3NHA").expect("check"), None);
    assert_eq!(store.check_credentials("ninguem", "s3nha").expect("check"), None);
}

#[test]
fn login_starts_a_seven_day_session() {
    let store = SqliteStore::open_in_memory().expect("store");
    register_user(&store, "ana", "pw").expect("register");
    let now = datetime!(2024-03-01 9:00 UTC);

    let mut state = LocalState::default();
    let err = state.login(&store, "ana", "wrong", now).unwrap_err();
    assert_eq!(err.code, AUTH_FAILED);
    assert_eq!(state.session, None);

    let session = state.login(&store, "ana", "pw", now).expect("login").clone();
    assert_eq!(session.username, "ana");
    assert_eq!(session.expires_at, now + Duration::days(7));

    assert!(state.require_session(now + Duration::days(6)).is_ok());
    assert_eq!(
        state
            .require_session(now + Duration::days(7))
            .unwrap_err()
            .code,
        AUTH_REQUIRED
    );
}

#[test]
fn state_round_trips_through_disk_and_theme_survives_logout() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nested").join("state.json");
    let store = SqliteStore::open_in_memory().expect("store");
    register_user(&store, "ana", "pw").expect("register");
    let now = datetime!(2024-03-01 9:00 UTC);

    let mut state = load_state(&path, Theme::Dark).expect("fresh");
    assert_eq!(state, LocalState::with_theme(Theme::Dark));

    state.login(&store, "ana", "pw", now).expect("login");
    assert_eq!(state.toggle_theme(), Theme::Light);
    save_state(&path, &state).expect("save");

    let mut loaded = load_state(&path, Theme::Dark).expect("load");
    assert_eq!(loaded, state);

    loaded.logout();
    save_state(&path, &loaded).expect("save");
    let after = load_state(&path, Theme::Dark).expect("load");
    assert_eq!(after.session, None);
    assert_eq!(after.theme, Theme::Light);
}

#[test]
fn malformed_state_file_is_reported() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("state.json");
    std::fs::write(&path, "{not json").unwrap();
    let err = load_state(&path, Theme::Dark).unwrap_err();
    assert_eq!(err.code, "SESSION_DECODE_FAILED");
}
