mod common;

use common::{png, profile_form, TestApp};
use geoprofiles::db::models::Coordinates;
use reqwest::multipart::Form;
use serde_json::Value;

async fn create(app: &TestApp, client: &reqwest::Client) -> Value {
    let res = client
        .post(app.url("/api/profiles"))
        .multipart(profile_form())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Profile created successfully");
    body["profile"].clone()
}

#[tokio::test]
async fn admin_creates_and_anyone_signed_in_reads() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let profile = create(&app, &admin).await;

    assert_eq!(profile["name"], "Apple Park");
    assert_eq!(profile["address"]["city"], "Cupertino");
    assert_eq!(profile["address"]["coordinates"]["lat"], 37.33);
    assert_eq!(profile["address"]["coordinates"]["lng"], -122.03);
    let photo = profile["photo"].as_str().unwrap();
    assert!(photo.starts_with("/uploads/"));

    let user = app.user().await;
    let id = profile["id"].as_str().unwrap();
    let fetched: Value = user
        .get(app.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, profile);

    let listed: Vec<Value> = user
        .get(app.url("/api/profiles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, vec![profile.clone()]);

    // the stored photo is publicly served
    let served = reqwest::get(app.url(photo)).await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().as_ref(), b"\x89PNG\r\n\x1a\nfake");
}

#[tokio::test]
async fn location_returns_map_link() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let profile = create(&app, &admin).await;
    let id = profile["id"].as_str().unwrap();

    let location: Value = admin
        .get(app.url(&format!("/api/profiles/{}/location", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(location["lat"], 37.33);
    assert_eq!(location["lng"], -122.03);
    assert_eq!(
        location["mapUrl"],
        "https://www.google.com/maps?q=37.33,-122.03"
    );
}

#[tokio::test]
async fn unauthenticated_requests_never_reach_the_store() {
    let app = TestApp::spawn().await;
    let anonymous = reqwest::Client::new();

    let list = anonymous.get(app.url("/api/profiles")).send().await.unwrap();
    assert_eq!(list.status(), 401);
    let created = anonymous
        .post(app.url("/api/profiles"))
        .multipart(profile_form())
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 401);
    let deleted = anonymous
        .delete(app.url("/api/profiles/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 401);

    assert_eq!(app.store_calls(), 0);
    assert_eq!(app.stored_photos(), 0);
}

#[tokio::test]
async fn non_admin_cannot_write() {
    let app = TestApp::spawn().await;
    let user = app.user().await;

    let res = user
        .post(app.url("/api/profiles"))
        .multipart(profile_form())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Access denied, admin only");

    assert_eq!(app.store_calls(), 0);
    assert_eq!(app.geocode_calls(), 0);
    assert_eq!(app.stored_photos(), 0);
}

#[tokio::test]
async fn create_without_photo_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let form = Form::new()
        .text("name", "No Photo")
        .text("description", "Missing")
        .text("address[street]", "1 Infinite Loop")
        .text("address[city]", "Cupertino")
        .text("address[country]", "USA");
    let res = admin
        .post(app.url("/api/profiles"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let listed: Vec<Value> = admin
        .get(app.url("/api/profiles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let script = reqwest::multipart::Part::bytes(b"#!/bin/sh".to_vec())
        .file_name("run.sh")
        .mime_str("text/x-shellscript")
        .unwrap();
    let form = Form::new()
        .text("name", "Bad")
        .text("description", "Upload")
        .text("address[street]", "1 Infinite Loop")
        .text("address[city]", "Cupertino")
        .text("address[country]", "USA")
        .part("photo", script);
    let res = admin
        .post(app.url("/api/profiles"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Only images (jpeg, jpg, png, gif) are allowed");
    assert_eq!(app.stored_photos(), 0);
}

#[tokio::test]
async fn geocoding_failure_creates_nothing() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    app.geocoder.set(None);

    let res = admin
        .post(app.url("/api/profiles"))
        .multipart(profile_form())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Geolocation lookup failed.");
    assert_eq!(app.stored_photos(), 0);
}

#[tokio::test]
async fn update_description_only() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let profile = create(&app, &admin).await;
    let id = profile["id"].as_str().unwrap();

    let res = admin
        .put(app.url(&format!("/api/profiles/{}", id)))
        .multipart(Form::new().text("description", "Spaceship campus"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Profile updated successfully");

    let updated = &body["profile"];
    assert_eq!(updated["description"], "Spaceship campus");
    assert_eq!(updated["name"], profile["name"]);
    assert_eq!(updated["photo"], profile["photo"]);
    assert_eq!(updated["address"], profile["address"]);
    assert_eq!(app.geocode_calls(), 1);
}

#[tokio::test]
async fn update_with_new_address_and_photo() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let profile = create(&app, &admin).await;
    let id = profile["id"].as_str().unwrap();
    app.geocoder.set(Some(Coordinates {
        lat: 51.5034,
        lng: -0.1276,
    }));

    let form = Form::new()
        .text(
            "address",
            r#"{"street":"10 Downing Street","city":"London","country":"UK"}"#,
        )
        .part("photo", png("new.png"));
    let body: Value = admin
        .put(app.url(&format!("/api/profiles/{}", id)))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let updated = &body["profile"];
    assert_eq!(updated["address"]["city"], "London");
    assert!(updated["address"].get("state").is_none());
    assert_eq!(updated["address"]["coordinates"]["lat"], 51.5034);
    assert_ne!(updated["photo"], profile["photo"]);

    // old photo gone, new one served
    let old = reqwest::get(app.url(profile["photo"].as_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(old.status(), 404);
    assert_eq!(app.stored_photos(), 1);
}

#[tokio::test]
async fn update_missing_profile_is_404() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let res = admin
        .put(app.url("/api/profiles/missing"))
        .multipart(Form::new().text("name", "Ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Profile not found");
}

#[tokio::test]
async fn delete_removes_profile_and_photo() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let profile = create(&app, &admin).await;
    let id = profile["id"].as_str().unwrap();

    let res = admin
        .delete(app.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Profile deleted successfully");
    assert_eq!(app.stored_photos(), 0);

    let again = admin
        .get(app.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn delete_missing_profile_is_404() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    create(&app, &admin).await;

    let res = admin
        .delete(app.url("/api/profiles/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(app.stored_photos(), 1);
}
