//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `engine/migrations`.

diesel::table! {
    /// Level ladder; thresholds are unique.
    levels (id) {
        id -> Uuid,
        name -> Text,
        xp_required -> Int8,
        tier -> Int4,
    }
}

diesel::table! {
    /// Badge catalogue; slugs are unique.
    badges (id) {
        id -> Uuid,
        name -> Text,
        slug -> Text,
        description -> Text,
        badge_type -> Text,
        icon_path -> Nullable<Text>,
        xp_reward -> Int8,
        is_active -> Bool,
    }
}

diesel::table! {
    /// Task templates.
    tasks (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        frequency -> Text,
        xp_reward -> Int8,
        is_active -> Bool,
    }
}

diesel::table! {
    /// Cached per-user progression state guarded by `revision`.
    user_progress (user_id) {
        user_id -> Uuid,
        total_xp -> Int8,
        streak_days -> Int4,
        last_active_at -> Nullable<Timestamptz>,
        revision -> Int4,
    }
}

diesel::table! {
    /// Append-only XP ledger.
    xp_log_entries (id) {
        id -> Uuid,
        user_id -> Uuid,
        event_type -> Text,
        xp_amount -> Int8,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Badge awards; one row per `(user_id, badge_id)`.
    user_badges (user_id, badge_id) {
        user_id -> Uuid,
        badge_id -> Uuid,
        awarded_at -> Timestamptz,
    }
}

diesel::table! {
    /// Task assignments, unique per period key (or per open one-off).
    user_tasks (id) {
        id -> Uuid,
        user_id -> Uuid,
        task_id -> Uuid,
        status -> Text,
        period_key -> Nullable<Text>,
        assigned_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Append-only achievement log; `seq` orders entries of one commit.
    achievement_log (id) {
        id -> Uuid,
        user_id -> Uuid,
        achievement_type -> Text,
        metadata -> Jsonb,
        created_at -> Timestamptz,
        seq -> Int8,
    }
}

diesel::table! {
    /// Audit trail of delivered events, keyed by event id.
    achievement_event_audit (event_id) {
        event_id -> Uuid,
        user_id -> Uuid,
        event_type -> Text,
        payload -> Jsonb,
        occurred_at -> Timestamptz,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    /// Single-instance leases for background jobs.
    job_leases (job) {
        job -> Text,
        holder -> Uuid,
        expires_at -> Timestamptz,
    }
}

diesel::joinable!(user_badges -> badges (badge_id));
diesel::joinable!(user_tasks -> tasks (task_id));

diesel::allow_tables_to_appear_in_same_query!(
    levels,
    badges,
    tasks,
    user_progress,
    xp_log_entries,
    user_badges,
    user_tasks,
    achievement_log,
    achievement_event_audit,
    job_leases,
);
