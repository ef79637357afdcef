use std::sync::Arc;

use serde_json::json;
use taleforge::prelude::*;

const FRONTEND: &str = "http://localhost:5173";

// ---------------------------------------------------------------------------
// Walkthrough: one player from sign-up to password reset
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), TaleforgeError> {
    let config = TaleforgeConfig::from_env()?;
    taleforge::telemetry::init(&config.log_filter);

    let store = Arc::new(MemoryStore::new());
    store
        .seed_story(StartingStory {
            id: StoryId(1),
            story: Some("You wake on a ship that is not yours.".into()),
            image: Some("ship.png".into()),
        })
        .await;

    let core = Taleforge::builder().config(config).build(store);

    // Sign up: the link would normally go out by email.
    let pending = core
        .identity()
        .request_registration("ayla@example.com", "open sesame")
        .await?;
    let email = core.activation_link(FRONTEND, &pending);
    println!("{}\n  {}", email.subject, email.url);

    let token = core.identity().confirm_registration(&pending).await?;
    let player = core.authenticate(&token).await?;
    println!("registered {player}");

    // Play: start from a seeded story, save twice.
    let opening = core.saves().starting_story(StoryId(1)).await?;
    let id = core
        .saves()
        .save(
            player,
            SaveRequest {
                id: None,
                protagonist_name: "Ayla".into(),
                session_name: "Stowaway".into(),
                inventory: Inventory(json!({ "lantern": 1 })),
                scenes: vec![Scene(json!(opening.story))],
                image: Some(opening.image),
            },
        )
        .await?;
    core.saves()
        .save(
            player,
            SaveRequest {
                id: Some(id),
                protagonist_name: "Ayla".into(),
                session_name: "Stowaway".into(),
                inventory: Inventory(json!({ "lantern": 1, "rope": 1 })),
                scenes: vec![Scene(json!("You find a coil of rope below deck."))],
                image: None,
            },
        )
        .await?;

    for session in core.saves().load_all(player).await? {
        println!(
            "{} \"{}\": {} scenes, last played {}",
            session.id,
            session.session_name,
            session.scenes.len(),
            session.last_played
        );
    }

    // Forgot password: reset and get signed straight back in.
    let reset = core
        .identity()
        .request_password_reset("ayla@example.com")
        .await?;
    println!("{}", core.reset_link(FRONTEND, &reset).url);
    let token = core.complete_password_reset(&reset, "new sesame").await?;

    let profile = core.saves().user_profile(core.authenticate(&token).await?).await?;
    println!("signed back in as {}", profile.email);

    // A stale token renders as a client-facing failure.
    if let Err(err) = core.authenticate("not-a-token").await {
        let failure = err.failure();
        tracing::info!(status = failure.status(), kind = %failure.kind, "rejected stale token");
    }

    Ok(())
}
