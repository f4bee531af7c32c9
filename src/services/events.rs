// src/services/events.rs

//! Domain events decouple profile writes from their downstream effects.
//! A write path emits one event; the independent handlers here keep the
//! popularity ledger, the cached-match store and the profile cache in
//! step without the write path enumerating them inline.

use sqlx::PgPool;

use crate::cache::{self, Cache};
use crate::services::{matching, popularity};

#[derive(Debug)]
pub enum DomainEvent {
    /// A user's skills or availability changed (registration, profile
    /// update, calendar sync or deletion). `previous_offered` and
    /// `current_offered` are equal when only availability moved.
    ProfileSkillsChanged {
        uid: String,
        previous_offered: Vec<String>,
        current_offered: Vec<String>,
    },
}

/// Runs every handler for the event. Handlers are independent: one
/// failing is logged and does not stop the others, and none of them fail
/// the originating request.
pub async fn dispatch(pool: &PgPool, cache: &Cache, event: DomainEvent) {
    match event {
        DomainEvent::ProfileSkillsChanged {
            uid,
            previous_offered,
            current_offered,
        } => {
            if let Err(e) =
                popularity::apply_skill_diff(pool, &previous_offered, &current_offered).await
            {
                tracing::error!("Popularity ledger update failed for {}: {}", uid, e);
            }

            // Cached scores derive from skills and availability; they are
            // stale the moment either changes.
            if let Err(e) = matching::clear_cached(pool, &uid).await {
                tracing::error!("Cached-match invalidation failed for {}: {}", uid, e);
            }

            cache.delete(&cache::profile_key(&uid)).await;
        }
    }
}
