//! Integration tests for registration, login, lockout, and logout.

mod helpers;

use meshauth_auth::facade::request::{LogoutRequest, TokenRequest, UserRequest};
use meshauth_core::ErrorKind;
use meshauth_core::error::INVALID_CREDENTIALS_MESSAGE;

use std::sync::Arc;

use meshauth_store::MemoryStores;

use helpers::{FlakyProfiles, TestApp, login_request, register_request, test_config};

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new();
    let registered = app.register("carol", "carol@example.com", "Passw0rd").await;
    assert_eq!(registered.user.username, "carol");
    assert_eq!(registered.user.first_name.as_deref(), Some("Test"));
    assert!(!registered.user.email_verified);

    let login = app.login("carol", "Passw0rd").await;
    assert_eq!(login.user.id, registered.user.id);
    assert_eq!(login.tokens.session_id, login.session.id);
    assert_ne!(login.session.id, registered.session.id);
}

#[tokio::test]
async fn test_login_with_email() {
    let app = TestApp::new();
    let registered = app.register("dave", "dave@example.com", "Passw0rd").await;

    let login = app.login("DAVE@example.com", "Passw0rd").await;
    assert_eq!(login.user.id, registered.user.id);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = TestApp::new();
    app.register("erin", "erin@example.com", "Passw0rd").await;

    let err = app
        .facade
        .register(
            &app.ctx(),
            register_request("erin", "other@example.com", "Passw0rd"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.context.as_deref(), Some("register"));
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = TestApp::new();
    let err = app
        .facade
        .register(
            &app.ctx(),
            register_request("frank", "frank@example.com", "password"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_alike() {
    let app = TestApp::new();
    app.register("gina", "gina@example.com", "Passw0rd").await;

    let unknown = app
        .facade
        .login(&app.ctx(), login_request("nobody", "Passw0rd"))
        .await
        .unwrap_err();
    let wrong = app
        .facade
        .login(&app.ctx(), login_request("gina", "Wrong0ne"))
        .await
        .unwrap_err();

    assert_eq!(unknown.kind, ErrorKind::InvalidCredentials);
    assert_eq!(wrong.kind, ErrorKind::InvalidCredentials);
    assert_eq!(unknown.message, wrong.message);
    assert_eq!(wrong.message, INVALID_CREDENTIALS_MESSAGE);
}

#[tokio::test]
async fn test_lockout_blocks_correct_password_until_window_elapses() {
    let app = TestApp::new();
    app.register("hank", "hank@example.com", "Passw0rd").await;
    let threshold = app.services.config.auth.max_failed_attempts;

    for _ in 0..threshold {
        let err = app
            .facade
            .login(&app.ctx(), login_request("hank", "Wrong0ne"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    let locked = app
        .facade
        .login(&app.ctx(), login_request("hank", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(locked.kind, ErrorKind::AccountLocked);
    assert_eq!(locked.message, INVALID_CREDENTIALS_MESSAGE);

    let stats = app.facade.get_stats(&app.ctx()).await.unwrap();
    assert_eq!(stats.locked_accounts, 1);
    assert_eq!(stats.logins_failed, u64::from(threshold) + 1);

    let window = app.services.config.auth.lockout_duration_minutes as i64;
    app.advance_secs(window * 60 + 1);

    app.login("hank", "Passw0rd").await;
    let stats = app.facade.get_stats(&app.ctx()).await.unwrap();
    assert_eq!(stats.locked_accounts, 0);
    assert_eq!(stats.logins_succeeded, 1);
}

#[tokio::test]
async fn test_validation_rejects_missing_fields() {
    let app = TestApp::new();

    let err = app
        .facade
        .login(&app.ctx(), login_request("", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .facade
        .register(&app.ctx(), register_request("ivy", "not-an-email", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .facade
        .validate_token(
            &app.ctx(),
            TokenRequest {
                token: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let stats = app.facade.get_stats(&app.ctx()).await.unwrap();
    assert_eq!(stats.logins_failed, 0);
    assert_eq!(stats.tokens_issued, 0);
}

#[tokio::test]
async fn test_alice_logout_revokes_access_token() {
    let app = TestApp::new();
    let registered = app
        .facade
        .register(
            &app.ctx(),
            meshauth_auth::facade::request::RegisterRequest {
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                password: "Passw0rd".to_string(),
                first_name: "Alice".to_string(),
                last_name: "A".to_string(),
                device: Default::default(),
            },
        )
        .await
        .unwrap();
    let alice = registered.user.id;

    app.advance_secs(1);
    let login = app.login("alice", "Passw0rd").await;

    let claims = app
        .facade
        .validate_token(
            &app.ctx(),
            TokenRequest {
                token: login.tokens.access_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(claims.user_id, alice);
    assert_eq!(claims.session_id, login.session.id);

    app.facade
        .logout(
            &app.ctx(),
            LogoutRequest {
                user_id: alice,
                session_id: None,
                all_sessions: false,
            },
        )
        .await
        .unwrap();

    let err = app
        .facade
        .validate_token(
            &app.ctx(),
            TokenRequest {
                token: login.tokens.access_token,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TokenRevoked);

    // The registration session is untouched by a single-session logout.
    let sessions = app
        .facade
        .list_sessions(&app.ctx(), UserRequest { user_id: alice })
        .await
        .unwrap()
        .sessions;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, registered.session.id);
}

#[tokio::test]
async fn test_logout_all_sessions() {
    let app = TestApp::new();
    let registered = app.register("jack", "jack@example.com", "Passw0rd").await;
    let login = app.login("jack", "Passw0rd").await;

    app.facade
        .logout(
            &app.ctx(),
            LogoutRequest {
                user_id: registered.user.id,
                session_id: None,
                all_sessions: true,
            },
        )
        .await
        .unwrap();

    for token in [registered.tokens.access_token, login.tokens.access_token] {
        let err = app
            .facade
            .validate_token(&app.ctx(), TokenRequest { token })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
    }
}

#[tokio::test]
async fn test_logout_rejects_foreign_session() {
    let app = TestApp::new();
    let kim = app.register("kim", "kim@example.com", "Passw0rd").await;
    let lee = app.register("lee", "lee@example.com", "Passw0rd").await;

    let err = app
        .facade
        .logout(
            &app.ctx(),
            LogoutRequest {
                user_id: kim.user.id,
                session_id: Some(lee.session.id),
                all_sessions: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionNotFound);

    let sessions = app
        .facade
        .list_sessions(&app.ctx(), UserRequest { user_id: lee.user.id })
        .await
        .unwrap()
        .sessions;
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn test_change_password_ends_sessions() {
    let app = TestApp::new();
    let registered = app.register("mia", "mia@example.com", "Passw0rd").await;

    let err = app
        .facade
        .change_password(
            &app.ctx(),
            meshauth_auth::facade::request::ChangePasswordRequest {
                user_id: registered.user.id,
                current_password: "Wrong0ne".to_string(),
                new_password: "NewPassw0rd".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCredentials);

    app.facade
        .change_password(
            &app.ctx(),
            meshauth_auth::facade::request::ChangePasswordRequest {
                user_id: registered.user.id,
                current_password: "Passw0rd".to_string(),
                new_password: "NewPassw0rd".to_string(),
            },
        )
        .await
        .unwrap();

    let err = app
        .facade
        .validate_token(
            &app.ctx(),
            TokenRequest {
                token: registered.tokens.access_token,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TokenRevoked);

    let err = app
        .facade
        .login(&app.ctx(), login_request("mia", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    app.login("mia", "NewPassw0rd").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_wrong_passwords_stop_at_threshold() {
    let app = TestApp::new();
    app.register("nina", "nina@example.com", "Passw0rd").await;
    let threshold = app.services.config.auth.max_failed_attempts as usize;

    let mut handles = Vec::new();
    for n in 0..16 {
        let facade = app.facade.clone();
        handles.push(tokio::spawn(async move {
            facade
                .login(
                    &Default::default(),
                    login_request("nina", &format!("Wrong{n}pass")),
                )
                .await
        }));
    }

    let mut checked = 0;
    let mut locked = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap_err().kind {
            ErrorKind::InvalidCredentials => checked += 1,
            ErrorKind::AccountLocked => locked += 1,
            other => panic!("unexpected error kind {other:?}"),
        }
    }
    assert_eq!(checked, threshold);
    assert_eq!(locked, 16 - threshold);

    let err = app
        .facade
        .login(&app.ctx(), login_request("nina", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AccountLocked);
}

#[tokio::test]
async fn test_failed_registration_can_be_retried() {
    let profiles = Arc::new(FlakyProfiles::default());
    let stores = MemoryStores {
        profiles: profiles.clone(),
        ..MemoryStores::new()
    };
    let app = TestApp::with_stores(test_config(), stores);

    profiles.upsert.arm(1);
    let err = app
        .facade
        .register(
            &app.ctx(),
            register_request("omar", "omar@example.com", "Passw0rd"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TransientStoreFailure);

    let err = app
        .facade
        .login(&app.ctx(), login_request("omar", "Passw0rd"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCredentials);

    let registered = app.register("omar", "omar@example.com", "Passw0rd").await;
    let login = app.login("omar@example.com", "Passw0rd").await;
    assert_eq!(login.user.id, registered.user.id);
}
