mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use ohmnyom_api::database::{AccountStore, PetStore};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn deleting_co_owners_unwinds_the_pet() -> Result<()> {
    let app = TestApp::new();
    let a = app.sign_up("A", "a@x.com", "secret1").await?;
    let b = app.sign_up("B", "b@x.com", "secret2").await?;
    let pet_id = app.add_pet(&a, "nabi").await?;
    app.call(
        Method::POST,
        &format!("/pets/{}/feeders", pet_id),
        Some(b.token.as_str()),
        None,
    )
    .await?;

    let (status, _) = app.call(Method::DELETE, "/account", Some(a.token.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let pet = PetStore::get(app.store.as_ref(), pet_id).await?.expect("b still feeds it");
    assert!(!pet.is_fed_by(a.id));
    assert!(pet.is_fed_by(b.id));
    assert!(AccountStore::get(app.store.as_ref(), a.id).await?.is_none());

    // a's token is still well-formed but the account is gone
    let (status, _) = app.call(Method::GET, "/account", Some(a.token.as_str()), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.sign_in("a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::DELETE, "/account", Some(b.token.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(PetStore::get(app.store.as_ref(), pet_id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn interrupted_account_deletion_can_be_retried() -> Result<()> {
    let app = TestApp::new();
    let a = app.sign_up("A", "a@x.com", "secret1").await?;
    let pet_id = app.add_pet(&a, "nabi").await?;

    app.store.fail_next("pet.delete");
    let (status, _) = app.call(Method::DELETE, "/account", Some(a.token.as_str()), None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(AccountStore::get(app.store.as_ref(), a.id).await?.is_some());

    let (status, _) = app.call(Method::DELETE, "/account", Some(a.token.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(PetStore::get(app.store.as_ref(), pet_id).await?.is_none());
    assert!(AccountStore::get(app.store.as_ref(), a.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn account_update_rehashes_password() -> Result<()> {
    let app = TestApp::new();
    let a = app.sign_up("A", "a@x.com", "secret1").await?;

    let (status, body) = app
        .call(
            Method::PATCH,
            "/account",
            Some(a.token.as_str()),
            Some(json!({ "name": "Alice", "password": "secret9" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Alice");

    let (status, _) = app.sign_in("a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.sign_in("a@x.com", "secret9").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::PATCH,
            "/account",
            Some(a.token.as_str()),
            Some(json!({ "email": "new@x.com" })),
        )
        .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn account_photo_is_released_with_the_account() -> Result<()> {
    let app = TestApp::new();
    let a = app.sign_up("A", "a@x.com", "secret1").await?;

    let (status, body) = app
        .upload("/account/photo", &a.token, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(app.media.paths().await.len(), 1);
    assert!(body["data"]["photo_url"]
        .as_str()
        .is_some_and(|url| url.contains(&format!("users/{}/profiles/", a.id))));

    app.call(Method::DELETE, "/account", Some(a.token.as_str()), None).await?;
    assert!(app.media.paths().await.is_empty());
    Ok(())
}
