//! Optimistic bookmark mutations
//!
//! A toggle is visible locally before the network answers. Each mutation
//! keeps its own snapshot of the set it changed and puts that snapshot
//! back if the server rejects it. Observers follow along through a
//! broadcast channel of [`BookmarkEvent`]s.

use crate::error::{Result, SdkError};
use crate::retry::RetryPolicy;
use grant_api_client::{ApiError, EntityType, GrantApi};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub type UserId = i64;
pub type EntityId = i64;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One user's bookmarks of one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookmarkScope {
    pub entity_type: EntityType,
    pub user_id: UserId,
}

impl BookmarkScope {
    pub fn new(entity_type: EntityType, user_id: UserId) -> Self {
        Self {
            entity_type,
            user_id,
        }
    }
}

/// Bookmark lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkEvent {
    /// Local state changed ahead of the server
    Applied {
        scope: BookmarkScope,
        entity_id: EntityId,
        mutation_id: u64,
        bookmarked: bool,
    },
    /// Server accepted the mutation
    Committed {
        scope: BookmarkScope,
        entity_id: EntityId,
        mutation_id: u64,
        bookmarked: bool,
    },
    /// Server rejected the mutation; the pre-mutation set is back
    RolledBack {
        scope: BookmarkScope,
        entity_id: EntityId,
        mutation_id: u64,
        error: String,
    },
    /// Set replaced from the server
    Loaded { scope: BookmarkScope, count: usize },
}

/// Coordinates optimistic bookmark toggles against the backend
pub struct BookmarkCoordinator {
    api: Arc<dyn GrantApi>,
    retry: RetryPolicy,
    sets: Mutex<HashMap<BookmarkScope, BTreeSet<EntityId>>>,
    next_mutation: AtomicU64,
    events: broadcast::Sender<BookmarkEvent>,
}

impl BookmarkCoordinator {
    pub fn new(api: Arc<dyn GrantApi>, retry: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            retry,
            sets: Mutex::new(HashMap::new()),
            next_mutation: AtomicU64::new(0),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.events.subscribe()
    }

    /// Flip the bookmark on `entity_id`
    ///
    /// `currently_bookmarked` is the state the caller saw; the inverse is
    /// applied immediately and sent as a create or delete. Returns the new
    /// state once the server accepted it. Without a user the call fails
    /// with `SdkError::AuthRequired` before touching anything.
    pub async fn toggle(
        &self,
        entity_type: EntityType,
        user_id: Option<UserId>,
        entity_id: EntityId,
        currently_bookmarked: bool,
    ) -> Result<bool> {
        let user_id = user_id.ok_or_else(|| {
            SdkError::AuthRequired(format!("sign in to bookmark {} {}", entity_type, entity_id))
        })?;
        let scope = BookmarkScope::new(entity_type, user_id);
        let bookmarked = !currently_bookmarked;
        let mutation_id = self.next_mutation.fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot = {
            let mut sets = self.sets.lock().await;
            let set = sets.entry(scope).or_default();
            let snapshot = set.clone();
            if bookmarked {
                set.insert(entity_id);
            } else {
                set.remove(&entity_id);
            }
            snapshot
        };
        debug!(
            entity_type = %entity_type,
            entity_id,
            mutation_id,
            bookmarked,
            "Bookmark applied optimistically"
        );
        self.emit(BookmarkEvent::Applied {
            scope,
            entity_id,
            mutation_id,
            bookmarked,
        });

        let result = self
            .retry
            .execute(move || self.send(scope, entity_id, bookmarked))
            .await;

        match result {
            Ok(()) => {
                self.emit(BookmarkEvent::Committed {
                    scope,
                    entity_id,
                    mutation_id,
                    bookmarked,
                });
                Ok(bookmarked)
            }
            Err(err) => {
                self.sets.lock().await.insert(scope, snapshot);
                warn!(
                    entity_type = %entity_type,
                    entity_id,
                    mutation_id,
                    error = %err,
                    "Bookmark rejected, rolled back"
                );
                self.emit(BookmarkEvent::RolledBack {
                    scope,
                    entity_id,
                    mutation_id,
                    error: err.to_string(),
                });
                Err(SdkError::Network(err))
            }
        }
    }

    /// Replace the local set for a user with the server's
    pub async fn load(&self, entity_type: EntityType, user_id: UserId) -> Result<BTreeSet<EntityId>> {
        let scope = BookmarkScope::new(entity_type, user_id);
        let ids = self
            .retry
            .execute(move || self.api.bookmarked_ids(entity_type, user_id))
            .await?;

        let set: BTreeSet<EntityId> = ids.into_iter().collect();
        self.sets.lock().await.insert(scope, set.clone());
        info!(entity_type = %entity_type, user_id, count = set.len(), "Bookmarks loaded");
        self.emit(BookmarkEvent::Loaded {
            scope,
            count: set.len(),
        });
        Ok(set)
    }

    pub async fn is_bookmarked(&self, scope: BookmarkScope, entity_id: EntityId) -> bool {
        self.sets
            .lock()
            .await
            .get(&scope)
            .is_some_and(|set| set.contains(&entity_id))
    }

    pub async fn snapshot(&self, scope: BookmarkScope) -> BTreeSet<EntityId> {
        self.sets
            .lock()
            .await
            .get(&scope)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget every local set (e.g. on sign-out)
    pub async fn clear(&self) {
        self.sets.lock().await.clear();
    }

    async fn send(
        &self,
        scope: BookmarkScope,
        entity_id: EntityId,
        bookmarked: bool,
    ) -> std::result::Result<(), ApiError> {
        if bookmarked {
            self.api
                .create_bookmark(scope.entity_type, entity_id, scope.user_id)
                .await
        } else {
            self.api
                .delete_bookmark(scope.entity_type, entity_id, scope.user_id)
                .await
        }
    }

    fn emit(&self, event: BookmarkEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
