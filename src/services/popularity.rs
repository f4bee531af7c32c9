// src/services/popularity.rs

//! Global per-skill popularity counters, keyed by lowercased skill name
//! with display casing preserved. Adjusted whenever a user's offered
//! skills change; used for discovery suggestions.

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::matching::PopularSkill;

/// Case-insensitive diff between two offered-skill sets.
/// Returns (added, removed), preserving display casing from their side.
pub fn skill_diff(previous: &[String], current: &[String]) -> (Vec<String>, Vec<String>) {
    let contains = |haystack: &[String], needle: &str| {
        haystack.iter().any(|s| s.eq_ignore_ascii_case(needle))
    };
    let added = current
        .iter()
        .filter(|skill| !contains(previous, skill))
        .cloned()
        .collect();
    let removed = previous
        .iter()
        .filter(|skill| !contains(current, skill))
        .cloned()
        .collect();
    (added, removed)
}

/// Applies counter adjustments for an offered-skill change in one
/// transaction. Decrements are unguarded: counters can go negative under
/// concurrent removals.
pub async fn apply_skill_diff(
    pool: &PgPool,
    previous: &[String],
    current: &[String],
) -> Result<(), AppError> {
    let (added, removed) = skill_diff(previous, current);
    if added.is_empty() && removed.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for skill in &added {
        sqlx::query(
            r#"
            INSERT INTO skill_popularity (skill_key, name, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (skill_key)
            DO UPDATE SET count = skill_popularity.count + 1, updated_at = NOW()
            "#,
        )
        .bind(skill.to_lowercase())
        .bind(skill)
        .execute(&mut *tx)
        .await?;
    }

    for skill in &removed {
        sqlx::query(
            r#"
            UPDATE skill_popularity
            SET count = count - 1, updated_at = NOW()
            WHERE skill_key = $1
            "#,
        )
        .bind(skill.to_lowercase())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        "Skill popularity adjusted: +{} -{}",
        added.len(),
        removed.len()
    );
    Ok(())
}

/// Top-N skills for suggestions, most popular first.
pub async fn top_skills(pool: &PgPool, limit: i64) -> Result<Vec<PopularSkill>, AppError> {
    let skills = sqlx::query_as::<_, PopularSkill>(
        r#"
        SELECT name, count AS popularity
        FROM skill_popularity
        ORDER BY count DESC, skill_key ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(skills)
}
