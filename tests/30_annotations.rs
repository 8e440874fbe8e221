mod common;

use anyhow::Result;
use common::Api;
use reqwest::StatusCode;
use serde_json::json;

async fn create_team(api: &Api, name: &str) -> Result<()> {
    let res = api.post("/api/1.0/teams", &json!({ "name": name })).await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED);
    Ok(())
}

async fn create_dragable(api: &Api, hash: &str, team: &str) -> Result<()> {
    let res = api
        .post(
            "/api/1.0/dragables",
            &json!({
                "hash": hash,
                "team": team,
                "url": "http://www.example.com/",
                "xpath": "foo/bar/baz",
            }),
        )
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn create_note_annotation() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice1", "pw").await?;
    create_team(&alice, "ann-team1").await?;
    create_dragable(&alice, "ann-drag1", "ann-team1").await?;

    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-note1",
                "dragable": "ann-drag1",
                "type": "note",
                "note": "hello, world!",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let annotation = common::data(alice.get("/api/1.0/annotations/ann-note1").await?).await?;
    assert_eq!(annotation["type"], json!("note"));
    assert_eq!(annotation["note"], json!("hello, world!"));
    assert_eq!(annotation["dragable"], json!({ "hash": "ann-drag1" }));
    assert_eq!(annotation["created_by"], json!({ "username": "ann_alice1" }));
    Ok(())
}

#[tokio::test]
async fn url_image_and_video_share_the_url_path() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice2", "pw").await?;
    create_team(&alice, "ann-team2").await?;
    create_dragable(&alice, "ann-drag2", "ann-team2").await?;

    for kind in ["url", "image", "video"] {
        let hash = format!("ann-{}-2", kind);
        let res = alice
            .post(
                "/api/1.0/annotations",
                &json!({
                    "hash": hash,
                    "dragable": "ann-drag2",
                    "type": kind,
                    "url": "http://example.com/thing",
                    "description": "bla blub",
                }),
            )
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED, "creating {} failed", kind);

        let annotation =
            common::data(alice.get(&format!("/api/1.0/annotations/{}", hash)).await?).await?;
        assert_eq!(annotation["type"], json!(kind));
        assert_eq!(annotation["url"], json!("http://example.com/thing"));
        assert_eq!(annotation["description"], json!("bla blub"));
    }

    // missing url is rejected for all three
    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({ "hash": "ann-nourl-2", "dragable": "ann-drag2", "type": "image" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn file_annotations_take_the_url_path_for_now() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice3", "pw").await?;
    create_team(&alice, "ann-team3").await?;
    create_dragable(&alice, "ann-drag3", "ann-team3").await?;

    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-file3",
                "dragable": "ann-drag3",
                "type": "file",
                "url": "http://example.com/report.pdf",
                "filename": "report.pdf",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let annotation = common::data(alice.get("/api/1.0/annotations/ann-file3").await?).await?;
    assert_eq!(annotation["type"], json!("file"));
    assert_eq!(annotation["filename"], json!("report.pdf"));
    Ok(())
}

#[tokio::test]
async fn create_validates_core_fields() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice4", "pw").await?;
    create_team(&alice, "ann-team4").await?;
    create_dragable(&alice, "ann-drag4", "ann-team4").await?;

    let full = json!({
        "hash": "ann-h4",
        "dragable": "ann-drag4",
        "type": "note",
        "note": "hi",
    });

    for field in ["hash", "dragable", "type"] {
        let mut body = full.clone();
        body.as_object_mut().unwrap().remove(field);
        let res = alice.post("/api/1.0/annotations", &body).await?;
        assert_eq!(
            res.status(),
            StatusCode::BAD_REQUEST,
            "missing {} should be rejected",
            field
        );
    }

    // unknown discriminator
    let mut body = full.clone();
    body["type"] = json!("sticker");
    let res = alice.post("/api/1.0/annotations", &body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // note annotations need their note
    let mut body = full.clone();
    body.as_object_mut().unwrap().remove("note");
    let res = alice.post("/api/1.0/annotations", &body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // unknown dragable reference
    let mut body = full.clone();
    body["dragable"] = json!("ann-ghost");
    let res = alice.post("/api/1.0/annotations", &body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn duplicate_hash_is_invalid_input_not_conflict() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice5", "pw").await?;
    create_team(&alice, "ann-team5").await?;
    create_dragable(&alice, "ann-drag5", "ann-team5").await?;

    let body = json!({
        "hash": "ann-dup5",
        "dragable": "ann-drag5",
        "type": "note",
        "note": "first",
    });
    assert_eq!(
        alice.post("/api/1.0/annotations", &body).await?.status(),
        StatusCode::CREATED
    );
    // the annotation create path collapses constraint violations into 400
    assert_eq!(
        alice.post("/api/1.0/annotations", &body).await?.status(),
        StatusCode::BAD_REQUEST
    );
    Ok(())
}

#[tokio::test]
async fn create_requires_membership_and_credentials() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice6", "pw").await?;
    let mallory = common::register(server, "ann_mallory6", "pw").await?;
    create_team(&alice, "ann-team6").await?;
    create_dragable(&alice, "ann-drag6", "ann-team6").await?;

    let body = json!({
        "hash": "ann-h6",
        "dragable": "ann-drag6",
        "type": "note",
        "note": "hi",
    });

    let res = mallory.post("/api/1.0/annotations", &body).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = common::Api::anonymous(server)
        .post("/api/1.0/annotations", &body)
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn connection_annotation_links_two_dragables() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice7", "pw").await?;
    create_team(&alice, "ann-team7").await?;
    create_dragable(&alice, "ann-drag7a", "ann-team7").await?;
    create_dragable(&alice, "ann-drag7b", "ann-team7").await?;

    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-conn7",
                "dragable": "ann-drag7a",
                "type": "connection",
                "connected_to": "ann-drag7b",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // the stored target is exactly the input hash
    let annotation = common::data(alice.get("/api/1.0/annotations/ann-conn7").await?).await?;
    assert_eq!(annotation["type"], json!("connection"));
    assert_eq!(annotation["connected_to"], json!({ "hash": "ann-drag7b" }));
    Ok(())
}

#[tokio::test]
async fn connection_cannot_be_reflexive_or_dangling() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice8", "pw").await?;
    create_team(&alice, "ann-team8").await?;
    create_dragable(&alice, "ann-drag8", "ann-team8").await?;

    // self-connection
    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-self8",
                "dragable": "ann-drag8",
                "type": "connection",
                "connected_to": "ann-drag8",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // unknown target
    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-dangle8",
                "dragable": "ann-drag8",
                "type": "connection",
                "connected_to": "ann-ghost",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // missing target entirely
    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-missing8",
                "dragable": "ann-drag8",
                "type": "connection",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn reads_follow_the_dragable_visibility_chain() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice9", "pw").await?;
    let bob = common::register(server, "ann_bob9", "pw").await?;
    create_team(&alice, "ann-team9a").await?;
    create_team(&bob, "ann-team9b").await?;
    create_dragable(&alice, "ann-drag9a", "ann-team9a").await?;
    create_dragable(&bob, "ann-drag9b", "ann-team9b").await?;

    alice
        .post(
            "/api/1.0/annotations",
            &json!({ "hash": "ann-a9", "dragable": "ann-drag9a", "type": "note", "note": "mine" }),
        )
        .await?;
    bob.post(
        "/api/1.0/annotations",
        &json!({ "hash": "ann-b9", "dragable": "ann-drag9b", "type": "note", "note": "his" }),
    )
    .await?;

    // unknown hash: input error
    let res = alice.get("/api/1.0/annotations/ann-ghost").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // known but behind a foreign team: forbidden
    let res = alice.get("/api/1.0/annotations/ann-b9").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // listings are scoped to teams the caller belongs to
    let annotations = common::data(alice.get("/api/1.0/annotations").await?).await?;
    let hashes: Vec<&str> = annotations
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["hash"].as_str().unwrap())
        .collect();
    assert!(hashes.contains(&"ann-a9"));
    assert!(!hashes.contains(&"ann-b9"));
    Ok(())
}

#[tokio::test]
async fn dragable_filter_checks_existence_then_membership() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice10", "pw").await?;
    let bob = common::register(server, "ann_bob10", "pw").await?;
    create_team(&alice, "ann-team10a").await?;
    create_team(&bob, "ann-team10b").await?;
    create_dragable(&alice, "ann-drag10a", "ann-team10a").await?;
    create_dragable(&bob, "ann-drag10b", "ann-team10b").await?;
    alice
        .post(
            "/api/1.0/annotations",
            &json!({ "hash": "ann-h10", "dragable": "ann-drag10a", "type": "note", "note": "x" }),
        )
        .await?;

    let res = alice.get("/api/1.0/annotations?dragable=ann-drag10a").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let annotations = common::data(res).await?;
    assert_eq!(annotations.as_array().unwrap().len(), 1);
    assert_eq!(annotations[0]["hash"], json!("ann-h10"));

    let res = alice.get("/api/1.0/annotations?dragable=ann-ghost").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = alice.get("/api/1.0/annotations?dragable=ann-drag10b").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn dragable_deletion_cascades_to_annotations() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice11", "pw").await?;
    create_team(&alice, "ann-team11").await?;
    create_dragable(&alice, "ann-drag11", "ann-team11").await?;
    alice
        .post(
            "/api/1.0/annotations",
            &json!({ "hash": "ann-h11", "dragable": "ann-drag11", "type": "note", "note": "x" }),
        )
        .await?;

    let res = alice.delete("/api/1.0/dragables/ann-drag11").await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = alice.get("/api/1.0/annotations/ann-h11").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn annotations_have_no_update_or_delete_surface() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice12", "pw").await?;
    create_team(&alice, "ann-team12").await?;
    create_dragable(&alice, "ann-drag12", "ann-team12").await?;
    alice
        .post(
            "/api/1.0/annotations",
            &json!({ "hash": "ann-h12", "dragable": "ann-drag12", "type": "note", "note": "x" }),
        )
        .await?;

    let res = alice
        .put("/api/1.0/annotations/ann-h12", &json!({ "note": "changed" }))
        .await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = alice.delete("/api/1.0/annotations/ann-h12").await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let unchanged = common::data(alice.get("/api/1.0/annotations/ann-h12").await?).await?;
    assert_eq!(unchanged["note"], json!("x"));
    Ok(())
}

#[tokio::test]
async fn connection_may_cross_teams_by_default() -> Result<()> {
    let server = common::ensure_server().await?;
    let alice = common::register(server, "ann_alice13", "pw").await?;
    create_team(&alice, "ann-team13a").await?;
    create_team(&alice, "ann-team13b").await?;
    create_dragable(&alice, "ann-drag13a", "ann-team13a").await?;
    create_dragable(&alice, "ann-drag13b", "ann-team13b").await?;

    // permissive default: the target may live in a different team
    let res = alice
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "ann-cross13",
                "dragable": "ann-drag13a",
                "type": "connection",
                "connected_to": "ann-drag13b",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}
