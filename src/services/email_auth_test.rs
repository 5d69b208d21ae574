use super::*;

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  USER@Example.com "), Some("user@example.com".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("user"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("user@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

#[test]
fn normalize_code_accepts_lowercase_input() {
    let code = generate_access_code();
    assert_eq!(normalize_code(&code), Some(code.clone()));
    assert_eq!(normalize_code(" abc234 "), Some("ABC234".to_owned()));
}

#[test]
fn normalize_code_rejects_ambiguous_and_wrong_length() {
    assert_eq!(normalize_code("abc23"), None);
    assert_eq!(normalize_code("abc2345"), None);
    // 0, 1, I and O are excluded from the alphabet.
    assert_eq!(normalize_code("ABC1I0"), None);
    assert_eq!(normalize_code("ABC23!"), None);
}

#[test]
fn generate_access_code_shape() {
    let code = generate_access_code();
    assert_eq!(code.len(), 6);
    assert!(code.bytes().all(|c| CODE_ALPHABET.contains(&c)));
}

#[test]
fn hash_access_code_is_stable_hex() {
    let a = hash_access_code("ABC234");
    assert_eq!(a, hash_access_code("ABC234"));
    assert_ne!(a, hash_access_code("ABC235"));
    assert_eq!(a.len(), 64);
}

#[test]
fn name_from_email_uses_local_part() {
    assert_eq!(name_from_email("jane@shop.test"), "jane");
}

#[test]
fn render_template_injects_email_and_code() {
    let html = render_login_code_template("user@example.com", "ABC234");
    assert!(html.contains("user@example.com"));
    assert!(html.contains("ABC234"));
    assert!(!html.contains("{{EMAIL}}"));
    assert!(!html.contains("{{CODE}}"));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::state::test_helpers::live_app_state;

    fn unique_email() -> String {
        format!("{}@example.com", Uuid::new_v4().simple())
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let state = live_app_state().await;
        let pool = state.pool.clone();
        let email = unique_email();
        let code = request_access_code(&pool, &email, &state.config).await.unwrap();

        let user_id = verify_access_code(&pool, &email, &code.to_ascii_lowercase()).await.unwrap();
        let again = verify_access_code(&pool, &email, &code).await;
        assert!(matches!(again, Err(EmailAuthError::VerificationFailed)));

        let code = request_access_code(&pool, &email, &state.config).await.unwrap();
        assert_eq!(verify_access_code(&pool, &email, &code).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn new_code_replaces_previous() {
        let state = live_app_state().await;
        let pool = state.pool.clone();
        let email = unique_email();
        let first = request_access_code(&pool, &email, &state.config).await.unwrap();
        let second = request_access_code(&pool, &email, &state.config).await.unwrap();
        if first != second {
            assert!(verify_access_code(&pool, &email, &first).await.is_err());
        }
        assert!(verify_access_code(&pool, &email, &second).await.is_ok());
    }

    #[tokio::test]
    async fn code_is_burnt_after_repeated_failures() {
        let state = live_app_state().await;
        let pool = state.pool.clone();
        let email = unique_email();
        let code = request_access_code(&pool, &email, &state.config).await.unwrap();
        let wrong = if code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };

        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert!(verify_access_code(&pool, &email, wrong).await.is_err());
        }
        assert!(matches!(
            verify_access_code(&pool, &email, &code).await,
            Err(EmailAuthError::VerificationFailed)
        ));
    }

    #[tokio::test]
    async fn configured_admin_email_is_promoted() {
        let state = live_app_state().await;
        let email = unique_email();
        let mut config = (*state.config).clone();
        config.admin_emails = vec![email.clone()];

        let code = request_access_code(&state.pool, &email.to_ascii_uppercase(), &config).await.unwrap();
        let user_id = verify_access_code(&state.pool, &email, &code).await.unwrap();
        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(role, "admin");
    }
}
