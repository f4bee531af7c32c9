// src/services/scoring.rs

//! Pure match scoring over user snapshots.
//!
//! Two policies coexist: the weighted additive legacy model (0-100,
//! symmetric in principle, computed from the querying user's perspective)
//! and the flat-bonus redesigned mentor-search model. Both consume the
//! case-insensitive skill overlap below.

use crate::models::user::User;

/// Flat bonus when the learner wants anything the mentor offers.
const SKILL_MATCH_POINTS: f64 = 5.0;
/// Flat bonus when the pair can plausibly meet.
const AVAILABILITY_POINTS: f64 = 2.0;

/// Case-insensitive set intersection. The result preserves the casing of
/// the `wanted` side, so "Python" matches "python" and comes back as
/// "Python".
pub fn skill_intersection(wanted: &[String], offered: &[String]) -> Vec<String> {
    wanted
        .iter()
        .filter(|skill| {
            offered
                .iter()
                .any(|other| other.eq_ignore_ascii_case(skill))
        })
        .cloned()
        .collect()
}

/// Shared manual-availability units: common weekday names plus common
/// time-range strings, counted together. Unlike skills, day and time
/// strings are compared verbatim.
pub fn availability_overlap_units(a: &User, b: &User) -> usize {
    let common_days = a
        .availability_days
        .iter()
        .filter(|day| b.availability_days.contains(day))
        .count();
    let common_times = a
        .availability_times
        .iter()
        .filter(|time| b.availability_times.contains(time))
        .count();
    common_days + common_times
}

/// Students learning from mentors get the bonus; peer-to-peer (same role)
/// also qualifies.
pub fn roles_compatible(role_a: &str, role_b: &str) -> bool {
    if (role_a == "student" && role_b == "mentor")
        || (role_a == "mentor" && role_b == "student")
    {
        return true;
    }
    role_a == role_b
}

/// Legacy score breakdown for one candidate, computed from `user_a`'s
/// perspective.
#[derive(Debug, Clone)]
pub struct LegacyMatch {
    /// Final score, clamped to [0, 100].
    pub score: i64,
    /// Skills `user_a` wants that the candidate offers.
    pub skills_they_can_teach: Vec<String>,
    /// Skills the candidate wants that `user_a` offers.
    pub skills_i_can_teach: Vec<String>,
}

/// Weighted additive legacy policy.
pub fn legacy_score(user_a: &User, user_b: &User) -> LegacyMatch {
    let mut score: f64 = 0.0;

    let skills_a_wants = skill_intersection(&user_a.skills_wanted, &user_b.skills_offered);
    let skills_b_wants = skill_intersection(&user_b.skills_wanted, &user_a.skills_offered);

    if !skills_a_wants.is_empty() && !skills_b_wants.is_empty() {
        // Mutual benefit: both users can teach each other something.
        score += 50.0;
        score += skills_a_wants.len() as f64 * 10.0;
        score += skills_b_wants.len() as f64 * 10.0;
    } else if !skills_a_wants.is_empty() || !skills_b_wants.is_empty() {
        score += 25.0;
        score += skills_a_wants.len().max(skills_b_wants.len()) as f64 * 5.0;
    }

    let overlap = availability_overlap_units(user_a, user_b);
    if overlap > 0 {
        score += 20.0 + overlap as f64 * 5.0;
    }

    if roles_compatible(&user_a.role, &user_b.role) {
        score += 10.0;
    }

    // Experienced users get a slight preference, capped at 10 points.
    let avg_badges = (user_a.badge_count + user_b.badge_count) as f64 / 2.0;
    score += (avg_badges * 2.0).min(10.0);

    LegacyMatch {
        score: (score.round() as i64).clamp(0, 100),
        skills_they_can_teach: skills_a_wants,
        skills_i_can_teach: skills_b_wants,
    }
}

/// Redesigned score breakdown for one mentor candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RedesignedScore {
    /// skill + reputation + availability, rounded to 1 decimal.
    pub total: f64,
    pub skill_points: f64,
    pub availability_points: f64,
}

/// Redesigned mentor-search policy: a flat skill bonus, the mentor's
/// badge score scaled from 0-5 to 0-3, and a flat availability bonus.
pub fn redesigned_score(learner: &User, mentor: &User) -> RedesignedScore {
    let skill_points = if skill_intersection(&learner.skills_wanted, &mentor.skills_offered)
        .is_empty()
    {
        0.0
    } else {
        SKILL_MATCH_POINTS
    };

    let reputation = mentor.badge_score * 3.0 / 5.0;

    let availability_points = if learner.calendar_synced && mentor.calendar_synced {
        // Resolved slots already exclude booked sessions; overlap is an
        // instant comparison, not a string comparison.
        let shared = learner
            .available_slots
            .iter()
            .any(|slot| mentor.available_slots.contains(slot));
        if shared { AVAILABILITY_POINTS } else { 0.0 }
    } else {
        // Manual day and time strings match verbatim, like the legacy
        // overlap units. Only skill identity is case-insensitive.
        let days = learner
            .availability_days
            .iter()
            .any(|day| mentor.availability_days.contains(day));
        let times = learner
            .availability_times
            .iter()
            .any(|time| mentor.availability_times.contains(time));
        if days && times { AVAILABILITY_POINTS } else { 0.0 }
    };

    let total = skill_points + reputation + availability_points;

    RedesignedScore {
        total: round1(total),
        skill_points,
        availability_points,
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
