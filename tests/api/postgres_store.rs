use chrono::{DateTime, Duration, TimeZone, Utc};
use claims::{assert_none, assert_some};
use sqlx::PgPool;

use sheandsoul::domain::{Age, BodyMeasure, NickName, OtpCode, ProfileName, ProfilePatch};
use sheandsoul::store::{NewOtp, OtpStore, PatchOutcome, PostgresStore, ProfileStore, UserStore};

use crate::helpers::configure_database;

type ProfileRow = (String, Option<String>, Option<i32>, Option<f64>, Option<f64>);

async fn insert_user(pool: &PgPool, email: &str) -> i64 {
    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO users (email, password) VALUES ($1, $2) RETURNING id")
            .bind(email)
            .bind("$argon2id$v=19$m=15000,t=2,p=1$c2FsdA$aGFzaA")
            .fetch_one(pool)
            .await
            .expect("Failed to insert user.");
    id
}

async fn insert_profile(pool: &PgPool, user_id: i64) {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, name, nick_name, age, height, weight)
            VALUES ($1, 'Asha', 'Ash', 29, 162.5, 58.0)
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .expect("Failed to insert profile.");
}

async fn profile_row(pool: &PgPool, user_id: i64) -> ProfileRow {
    sqlx::query_as("SELECT name, nick_name, age, height, weight FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch profile.")
}

async fn user_with_profile(pool: &PgPool) -> i64 {
    let user_id = insert_user(pool, "asha@example.com").await;
    insert_profile(pool, user_id).await;
    user_id
}

fn nick_name(value: &str) -> Option<Option<NickName>> {
    Some(Some(NickName::parse(value.into()).unwrap()))
}

fn otp(email: &str, code: &str, expires_at: DateTime<Utc>) -> NewOtp {
    NewOtp {
        email: email.into(),
        code: OtpCode::parse(code.into()).unwrap(),
        created_at: expires_at - Duration::minutes(10),
        expires_at,
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn a_partial_patch_leaves_other_columns_alone() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let user_id = user_with_profile(&pool).await;

    let patch = ProfilePatch {
        age: Some(Age::parse(30).unwrap()),
        ..ProfilePatch::default()
    };
    let outcome = store.patch_profile_basic(user_id, &patch).await.unwrap();

    assert_eq!(outcome, PatchOutcome::Applied);
    assert_eq!(
        profile_row(&pool, user_id).await,
        ("Asha".into(), Some("Ash".into()), Some(30), Some(162.5), Some(58.0))
    );
}

#[tokio::test]
async fn a_full_patch_overwrites_every_field() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let user_id = user_with_profile(&pool).await;

    let patch = ProfilePatch {
        name: Some(ProfileName::parse("Meera".into()).unwrap()),
        nick_name: nick_name("Mee"),
        age: Some(Age::parse(41).unwrap()),
        height: Some(BodyMeasure::parse(170.0, "Height").unwrap()),
        weight: Some(BodyMeasure::parse(64.5, "Weight").unwrap()),
    };
    store.patch_profile_basic(user_id, &patch).await.unwrap();

    assert_eq!(
        profile_row(&pool, user_id).await,
        ("Meera".into(), Some("Mee".into()), Some(41), Some(170.0), Some(64.5))
    );
}

#[tokio::test]
async fn nick_name_can_be_set_kept_and_cleared() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let user_id = user_with_profile(&pool).await;

    // Set
    let patch = ProfilePatch {
        nick_name: nick_name("Kiki"),
        ..ProfilePatch::default()
    };
    store.patch_profile_basic(user_id, &patch).await.unwrap();
    assert_eq!(profile_row(&pool, user_id).await.1.as_deref(), Some("Kiki"));

    // Absent: untouched
    let patch = ProfilePatch {
        age: Some(Age::parse(31).unwrap()),
        ..ProfilePatch::default()
    };
    store.patch_profile_basic(user_id, &patch).await.unwrap();
    assert_eq!(profile_row(&pool, user_id).await.1.as_deref(), Some("Kiki"));

    // Null: cleared
    let patch = ProfilePatch {
        nick_name: Some(None),
        ..ProfilePatch::default()
    };
    store.patch_profile_basic(user_id, &patch).await.unwrap();
    let row = profile_row(&pool, user_id).await;
    assert_none!(row.1);
    assert_eq!(row.2, Some(31));
}

#[tokio::test]
async fn a_missing_profile_row_is_reported() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let user_id = insert_user(&pool, "no-profile@example.com").await;
    let patch = ProfilePatch {
        age: Some(Age::parse(30).unwrap()),
        ..ProfilePatch::default()
    };

    let outcome = store.patch_profile_basic(user_id, &patch).await.unwrap();
    assert_eq!(outcome, PatchOutcome::ProfileMissing);

    let outcome = store.patch_profile_basic(user_id + 1000, &patch).await.unwrap();
    assert_eq!(outcome, PatchOutcome::ProfileMissing);
}

#[tokio::test]
async fn users_are_found_by_email_and_marked_verified() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let user_id = insert_user(&pool, "asha@example.com").await;

    let user = assert_some!(store.find_user_by_email("asha@example.com").await.unwrap());
    assert_eq!(user.id, user_id);
    assert_eq!(user.email, "asha@example.com");
    assert_none!(store.find_user_by_email("ghost@example.com").await.unwrap());

    store.mark_email_verified("asha@example.com").await.unwrap();
    let (verified,): (bool,) =
        sqlx::query_as("SELECT is_email_verified FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(verified);
}

#[tokio::test]
async fn an_otp_is_valid_strictly_before_it_expires() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool);
    let expires_at = noon();
    store
        .store_otp(&otp("asha@example.com", "012345", expires_at))
        .await
        .unwrap();

    let just_before = expires_at - Duration::seconds(1);
    assert!(store
        .is_otp_valid("asha@example.com", "012345", just_before)
        .await
        .unwrap());
    assert!(!store
        .is_otp_valid("asha@example.com", "012345", expires_at)
        .await
        .unwrap());
    assert!(!store
        .is_otp_valid("asha@example.com", "543210", just_before)
        .await
        .unwrap());
    assert!(!store
        .is_otp_valid("other@example.com", "012345", just_before)
        .await
        .unwrap());

    store.mark_otps_used("asha@example.com").await.unwrap();
    assert!(!store
        .is_otp_valid("asha@example.com", "012345", just_before)
        .await
        .unwrap());
}

#[tokio::test]
async fn purging_removes_otps_expiring_at_or_before_now() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool.clone());
    let now = noon();
    for (email, expires_at) in [
        ("past@example.com", now - Duration::seconds(1)),
        ("boundary@example.com", now),
        ("future@example.com", now + Duration::seconds(1)),
    ] {
        store.store_otp(&otp(email, "123456", expires_at)).await.unwrap();
    }

    let removed = store.delete_expired_otps(now).await.unwrap();

    assert_eq!(removed, 2);
    let remaining: Vec<(String,)> = sqlx::query_as("SELECT email FROM otps")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, vec![("future@example.com".to_string(),)]);
}

#[tokio::test]
async fn clearing_otps_only_touches_one_email() {
    let pool = configure_database().await;
    let store = PostgresStore::new(pool);
    let expires_at = noon();
    store
        .store_otp(&otp("asha@example.com", "111111", expires_at))
        .await
        .unwrap();
    store
        .store_otp(&otp("meera@example.com", "222222", expires_at))
        .await
        .unwrap();

    store.clear_otps("asha@example.com").await.unwrap();

    let before = expires_at - Duration::minutes(1);
    assert!(!store
        .is_otp_valid("asha@example.com", "111111", before)
        .await
        .unwrap());
    assert!(store
        .is_otp_valid("meera@example.com", "222222", before)
        .await
        .unwrap());
}
