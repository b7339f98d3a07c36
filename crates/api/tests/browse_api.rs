//! HTTP-level tests for directory browsing and the tree JSON.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, fixture, get, get_auth, get_with_language, token_for};

fn names(items: &serde_json::Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Directory view
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_anonymous_browse_collapses_versions_and_applies_part_rules() {
    let tmp = fixture();
    let response = get(build_test_app(&tmp), "/api/v1/browse/ds1/widgets").await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["ds"], "ds1");
    assert_eq!(data["path"], "widgets");
    assert_eq!(data["label"], "Widgets");
    assert_eq!(data["parent_url"], "/browse/ds1");
    assert_eq!(data["icon_url"], "/static/ds/ds1/widgets/0000-index/logo.png");

    assert_eq!(names(&data["parts"]), ["gear.asm", "part.prt.2"]);
    let gear = &data["parts"][0];
    let part = &data["parts"][1];
    assert_eq!(gear["accessible"], true);
    assert_eq!(part["accessible"], false);
    assert_eq!(part["version"], 2);
    assert_eq!(part["marked"], false);
    assert_eq!(part["values"]["diameter"], "12");
    assert_eq!(
        part["thumbnail"]["url"],
        "/static/ds/ds1/widgets/0000-index/thumbnails/part.png"
    );
    assert!(gear["thumbnail"].is_null());

    assert_eq!(data["columns"][0]["handle"], "diameter");
    assert_eq!(data["columns"][0]["label"], "Diameter");
    assert_eq!(data["columns"][0]["type"], "number");
}

#[tokio::test]
async fn test_logged_in_user_gets_own_part_rules() {
    let tmp = fixture();
    let response = get_auth(
        build_test_app(&tmp),
        "/api/v1/browse/ds1/widgets",
        &token_for("alice"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["parts"][0]["accessible"], false);
    assert_eq!(data["parts"][1]["accessible"], true);
}

#[tokio::test]
async fn test_accept_language_selects_labels() {
    let tmp = fixture();
    let response = get_with_language(
        build_test_app(&tmp),
        "/api/v1/browse/ds1/widgets",
        "de-DE,de;q=0.9",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["label"], "Bauteile");
    assert_eq!(data["columns"][0]["label"], "Durchmesser");
}

#[tokio::test]
async fn test_unknown_language_falls_back_to_first_declared() {
    let tmp = fixture();
    let response =
        get_with_language(build_test_app(&tmp), "/api/v1/browse/ds1/widgets", "fr").await;

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["label"], "Widgets");
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_root_listing_hides_denied_directories() {
    let tmp = fixture();

    let anonymous = body_json(get(build_test_app(&tmp), "/api/v1/browse/ds1").await).await;
    assert_eq!(names(&anonymous["data"]["directories"]), ["widgets"]);
    assert!(anonymous["data"]["parent_url"].is_null());

    let bob = body_json(
        get_auth(build_test_app(&tmp), "/api/v1/browse/ds1", &token_for("bob")).await,
    )
    .await;
    assert_eq!(names(&bob["data"]["directories"]), ["secret", "widgets"]);
    assert_eq!(bob["data"]["directories"][1]["url"], "/browse/ds1/widgets");
}

#[tokio::test]
async fn test_acl_protected_directory() {
    let tmp = fixture();

    let denied = get(build_test_app(&tmp), "/api/v1/browse/ds1/secret").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    let json = body_json(denied).await;
    assert_eq!(json["error"], "Access denied");

    let alice = get_auth(
        build_test_app(&tmp),
        "/api/v1/browse/ds1/secret",
        &token_for("alice"),
    )
    .await;
    assert_eq!(alice.status(), StatusCode::FORBIDDEN);

    let bob = get_auth(
        build_test_app(&tmp),
        "/api/v1/browse/ds1/secret",
        &token_for("bob"),
    )
    .await;
    assert_eq!(bob.status(), StatusCode::OK);
    let data = body_json(bob).await["data"].clone();
    assert_eq!(names(&data["parts"]), ["plans.prt"]);
    assert_eq!(data["parts"][0]["accessible"], true);
}

#[tokio::test]
async fn test_paths_outside_the_data_source_are_denied() {
    let tmp = fixture();
    for uri in [
        "/api/v1/browse/ds1/widgets/../../outside",
        "/api/v1/browse/ds1/..",
        "/api/v1/browse/nope",
        "/api/v1/browse/ds1/missing",
        "/api/v1/browse/ds1/widgets/0000-index",
    ] {
        let response = get(build_test_app(&tmp), uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

// ---------------------------------------------------------------------------
// Tree JSON
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tree_is_opened_to_target() {
    let tmp = fixture();
    let response = get(build_test_app(&tmp), "/api/v1/tree/ds1/widgets").await;
    assert_eq!(response.status(), StatusCode::OK);

    let root = body_json(response).await["data"].clone();
    assert_eq!(root["id"], "");
    assert_eq!(root["state"]["opened"], true);

    let children = root["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    let widgets = &children[0];
    assert_eq!(widgets["id"], "widgets");
    assert_eq!(widgets["text"], "Widgets");
    assert_eq!(widgets["url"], "/browse/ds1/widgets");
    assert_eq!(widgets["state"]["selected"], true);
    assert_eq!(widgets["children"], false);
}

#[tokio::test]
async fn test_tree_rejects_escaping_path() {
    let tmp = fixture();
    let response = get(build_test_app(&tmp), "/api/v1/tree/ds1/../x").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
