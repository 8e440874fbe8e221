mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

/// The full walk through the resource surface: team, dragable, annotation,
/// and a foreign user bouncing off the ownership rule.
#[tokio::test]
async fn team_dragable_annotation_lifecycle() -> Result<()> {
    let server = common::ensure_server().await?;
    let u1 = common::register(server, "e2e_u1", "pw1").await?;
    let u2 = common::register(server, "e2e_u2", "pw2").await?;

    // u1 creates a team without a password: public, u1 a member
    let res = u1.post("/api/1.0/teams", &json!({ "name": "t1" })).await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let teams = common::data(u1.get("/api/1.0/teams/t1").await?).await?;
    let team = &teams[0];
    assert_eq!(team["public"], json!(true));
    assert!(team["members"]
        .as_array()
        .unwrap()
        .contains(&json!({ "username": "e2e_u1" })));

    // u1 captures a dragable into it
    let res = u1
        .post(
            "/api/1.0/dragables",
            &json!({
                "hash": "h1",
                "team": "t1",
                "url": "http://x",
                "xpath": "a/b",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // and retitles it
    let res = u1
        .put("/api/1.0/dragables/h1", &json!({ "title": "new" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let dragable = common::data(u1.get("/api/1.0/dragables/h1").await?).await?;
    assert_eq!(dragable["title"], json!("new"));

    // a note goes on the dragable
    let res = u1
        .post(
            "/api/1.0/annotations",
            &json!({
                "hash": "a1",
                "dragable": "h1",
                "type": "note",
                "note": "hi",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let annotation = common::data(u1.get("/api/1.0/annotations/a1").await?).await?;
    assert_eq!(annotation["note"], json!("hi"));

    // u2 is neither owner nor member: team mutation is forbidden
    let res = u2
        .put("/api/1.0/teams/t1", &json!({ "description": "mine now" }))
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // and the team is untouched
    let teams = common::data(u1.get("/api/1.0/teams/t1").await?).await?;
    assert_eq!(teams[0]["description"], json!(""));
    Ok(())
}

#[tokio::test]
async fn service_banner_and_health() -> Result<()> {
    let server = common::ensure_server().await?;
    let anon = common::Api::anonymous(server);

    let res = anon.get("/").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["endpoints"].is_object());

    let res = anon.get("/health").await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn wrong_credentials_are_challenged() -> Result<()> {
    let server = common::ensure_server().await?;
    common::register(server, "e2e_u3", "rightpw").await?;

    let bad = common::Api::user(server, "e2e_u3", "wrongpw");
    let res = bad.get("/api/1.0/teams").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let challenge = res
        .headers()
        .get("www-authenticate")
        .expect("401 must carry a challenge")
        .to_str()?;
    assert!(challenge.starts_with("Basic realm="));
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let server = common::ensure_server().await?;
    common::register(server, "e2e_u4", "pw").await?;

    let res = common::Api::anonymous(server)
        .post(
            "/auth/register",
            &json!({ "username": "e2e_u4", "password": "other" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // registration validates its inputs
    let res = common::Api::anonymous(server)
        .post("/auth/register", &json!({ "username": "  " }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
