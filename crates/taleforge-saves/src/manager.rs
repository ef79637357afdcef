//! Save manager: stores, extends, and lists a user's playthroughs.

use std::sync::Arc;

use taleforge_protocol::{
    Clock, GameSessionId, NewGameSession, SaveRequest, SceneAppend, SessionSummary, StoryId,
    StoryView, SystemClock, UserId, UserProfile,
};
use taleforge_store::{Store, StoreError, Transaction, tables};

use crate::SaveError;

/// Saves and loads game sessions on behalf of authenticated users.
///
/// Every method takes the caller's [`UserId`] as resolved from an access
/// token. Sessions belonging to other users are invisible: they can't be
/// appended to and aren't listed.
pub struct SaveManager<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> SaveManager<S> {
    /// Creates a manager stamping saves with the system clock.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for `updated_at` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Saves progress and returns the session's id.
    ///
    /// Without an id a new session is created holding exactly the request's
    /// scenes. With an id the request's scenes are appended after the
    /// stored ones (never deduplicated or reordered), and the session name,
    /// inventory, image, and timestamp are replaced.
    ///
    /// # Errors
    /// - [`SaveError::SessionNotFound`] if `user_id` owns no session with
    ///   the given id.
    /// - [`SaveError::UserNotFound`] if the user row is gone.
    pub async fn save(
        &self,
        user_id: UserId,
        request: SaveRequest,
    ) -> Result<GameSessionId, SaveError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let id = match request.id {
            None => {
                let scenes = request.scenes.len();
                let created = tx
                    .insert_game_session(NewGameSession {
                        user_id,
                        protagonist_name: request.protagonist_name,
                        session_name: request.session_name,
                        inventory: request.inventory,
                        scenes: request.scenes,
                        last_image: request.image,
                        updated_at: now,
                    })
                    .await
                    .map_err(|e| missing_owner(e, user_id))?;
                tracing::info!(%user_id, session_id = %created.id, scenes, "game session created");
                created.id
            }
            Some(id) => {
                let appended = request.scenes.len();
                let updated = tx
                    .append_scenes(
                        id,
                        user_id,
                        SceneAppend {
                            session_name: request.session_name,
                            inventory: request.inventory,
                            scenes: request.scenes,
                            last_image: request.image,
                            updated_at: now,
                        },
                    )
                    .await?
                    .ok_or(SaveError::SessionNotFound(id))?;
                tracing::info!(
                    %user_id,
                    session_id = %id,
                    appended,
                    total = updated.scenes.len(),
                    "game session extended"
                );
                id
            }
        };

        tx.commit().await?;
        Ok(id)
    }

    /// Every session `user_id` owns, oldest first.
    pub async fn load_all(&self, user_id: UserId) -> Result<Vec<SessionSummary>, SaveError> {
        let mut tx = self.store.begin().await?;
        let sessions = tx.game_sessions(user_id).await?;

        tracing::debug!(%user_id, count = sessions.len(), "game sessions loaded");
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    /// A starting story with both its text and its image.
    ///
    /// # Errors
    /// [`SaveError::StoryNotFound`] if the row is missing or incomplete.
    pub async fn starting_story(&self, story_id: StoryId) -> Result<StoryView, SaveError> {
        let mut tx = self.store.begin().await?;
        let row = tx.starting_story(story_id).await?;

        match row {
            Some(row) => match (row.story, row.image) {
                (Some(story), Some(image)) => Ok(StoryView {
                    id: row.id,
                    story,
                    image,
                }),
                _ => {
                    tracing::warn!(%story_id, "starting story is incomplete");
                    Err(SaveError::StoryNotFound(story_id))
                }
            },
            None => Err(SaveError::StoryNotFound(story_id)),
        }
    }

    /// The public profile of `user_id`.
    pub async fn user_profile(&self, user_id: UserId) -> Result<UserProfile, SaveError> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .user_by_id(user_id)
            .await?
            .ok_or(SaveError::UserNotFound(user_id))?;

        Ok(UserProfile::from(&user))
    }
}

fn missing_owner(err: StoreError, user_id: UserId) -> SaveError {
    match err {
        StoreError::ForeignKeyViolation { table, .. } if table == tables::GAME_SESSIONS => {
            tracing::warn!(%user_id, "save for a user that does not exist");
            SaveError::UserNotFound(user_id)
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;
    use taleforge_protocol::{
        Email, Inventory, ManualClock, Scene, StartingStory, User,
    };
    use taleforge_store::MemoryStore;

    // =====================================================================
    // Helpers
    // =====================================================================

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        saves: SaveManager<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let saves = SaveManager::new(Arc::clone(&store)).with_clock(clock.clone());
        Fixture {
            store,
            clock,
            saves,
        }
    }

    async fn user(f: &Fixture, email: &str) -> UserId {
        let id = UserId::random();
        let mut tx = f.store.begin().await.unwrap();
        tx.insert_user(User {
            id,
            email: Email::parse(email).unwrap(),
            password_hash: "hash".into(),
            is_active: true,
            first_name: Some("Alice".into()),
            last_name: None,
            created_at: Some(Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        id
    }

    fn scenes(labels: &[&str]) -> Vec<Scene> {
        labels.iter().map(|l| Scene(json!({ "text": l }))).collect()
    }

    fn request(id: Option<GameSessionId>, labels: &[&str]) -> SaveRequest {
        SaveRequest {
            id,
            protagonist_name: "Ayla".into(),
            session_name: "The Long Road".into(),
            inventory: Inventory(json!({ "torch": 1 })),
            scenes: scenes(labels),
            image: Some("cover.png".into()),
        }
    }

    // =====================================================================
    // save()
    // =====================================================================

    #[tokio::test]
    async fn test_save_without_id_creates_session_with_exact_scenes() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;

        let id = f.saves.save(alice, request(None, &["a", "b"])).await.unwrap();
        let loaded = f.saves.load_all(alice).await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!(loaded[0].scenes, scenes(&["a", "b"]));
        assert_eq!(loaded[0].image.as_deref(), Some("cover.png"));
        assert_eq!(loaded[0].last_played, f.clock.now());
    }

    #[tokio::test]
    async fn test_save_with_id_appends_and_replaces_metadata() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        let id = f.saves.save(alice, request(None, &["a", "b"])).await.unwrap();

        f.clock.advance(TimeDelta::minutes(5));
        let mut second = request(Some(id), &["b", "c"]);
        second.session_name = "Renamed".into();
        second.inventory = Inventory(json!({ "torch": 0, "key": 1 }));
        second.image = None;
        assert_eq!(f.saves.save(alice, second).await.unwrap(), id);

        let loaded = f.saves.load_all(alice).await.unwrap();
        assert_eq!(loaded[0].scenes, scenes(&["a", "b", "b", "c"]));
        assert_eq!(loaded[0].session_name, "Renamed");
        assert_eq!(loaded[0].inventory, Inventory(json!({ "torch": 0, "key": 1 })));
        assert_eq!(loaded[0].image, None);
        assert_eq!(loaded[0].last_played, f.clock.now());
    }

    #[tokio::test]
    async fn test_save_with_id_and_no_scenes_keeps_existing() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        let id = f.saves.save(alice, request(None, &["a"])).await.unwrap();

        f.saves.save(alice, request(Some(id), &[])).await.unwrap();
        let loaded = f.saves.load_all(alice).await.unwrap();
        assert_eq!(loaded[0].scenes, scenes(&["a"]));
    }

    #[tokio::test]
    async fn test_save_to_unknown_id_is_not_found() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        let err = f
            .saves
            .save(alice, request(Some(GameSessionId(99)), &["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::SessionNotFound(GameSessionId(99))));
    }

    #[tokio::test]
    async fn test_save_to_foreign_session_is_not_found_and_untouched() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        let mallory = user(&f, "mallory@example.com").await;
        let id = f.saves.save(alice, request(None, &["a"])).await.unwrap();

        let err = f
            .saves
            .save(mallory, request(Some(id), &["evil"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::SessionNotFound(_)));
        assert_eq!(f.saves.load_all(alice).await.unwrap()[0].scenes, scenes(&["a"]));
    }

    #[tokio::test]
    async fn test_save_for_missing_user_is_user_not_found() {
        let f = fixture();
        let ghost = UserId::random();
        let err = f.saves.save(ghost, request(None, &["a"])).await.unwrap_err();
        assert!(matches!(err, SaveError::UserNotFound(id) if id == ghost));
    }

    // =====================================================================
    // load_all()
    // =====================================================================

    #[tokio::test]
    async fn test_load_all_orders_by_id_and_scopes_to_owner() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        let bob = user(&f, "bob@example.com").await;

        let first = f.saves.save(alice, request(None, &["1"])).await.unwrap();
        f.saves.save(bob, request(None, &["x"])).await.unwrap();
        let second = f.saves.save(alice, request(None, &["2"])).await.unwrap();

        let ids: Vec<_> = f
            .saves
            .load_all(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_load_all_without_sessions_is_empty() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;
        assert!(f.saves.load_all(alice).await.unwrap().is_empty());
    }

    // =====================================================================
    // starting_story()
    // =====================================================================

    #[tokio::test]
    async fn test_starting_story_complete_row_is_returned() {
        let f = fixture();
        f.store
            .seed_story(StartingStory {
                id: StoryId(1),
                story: Some("Once upon a time".into()),
                image: Some("castle.png".into()),
            })
            .await;

        let view = f.saves.starting_story(StoryId(1)).await.unwrap();
        assert_eq!(view.story, "Once upon a time");
        assert_eq!(view.image, "castle.png");
    }

    #[tokio::test]
    async fn test_starting_story_missing_text_or_image_is_not_found() {
        let f = fixture();
        f.store
            .seed_story(StartingStory {
                id: StoryId(2),
                story: Some("No picture".into()),
                image: None,
            })
            .await;

        assert!(matches!(
            f.saves.starting_story(StoryId(2)).await,
            Err(SaveError::StoryNotFound(StoryId(2)))
        ));
        assert!(matches!(
            f.saves.starting_story(StoryId(3)).await,
            Err(SaveError::StoryNotFound(StoryId(3)))
        ));
    }

    // =====================================================================
    // user_profile()
    // =====================================================================

    #[tokio::test]
    async fn test_user_profile_formats_registration_date() {
        let f = fixture();
        let alice = user(&f, "alice@example.com").await;

        let profile = f.saves.user_profile(alice).await.unwrap();
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.first_name, "Alice");
        assert_eq!(profile.last_name, "");
        assert_eq!(profile.registered_at.as_deref(), Some("2024-03-09"));
    }

    #[tokio::test]
    async fn test_user_profile_missing_is_not_found() {
        let f = fixture();
        let err = f.saves.user_profile(UserId::random()).await.unwrap_err();
        assert_eq!(err.kind(), taleforge_protocol::ErrorKind::NotFound);
    }
}
