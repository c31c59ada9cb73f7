//! Progression HTTP handlers.
//!
//! ```text
//! POST /api/v1/users/{user_id}/xp
//! POST /api/v1/users/{user_id}/tasks/{task_id}/assign
//! POST /api/v1/users/{user_id}/tasks/{task_id}/complete
//! POST /api/v1/users/{user_id}/badges/{badge_id}
//! POST /api/v1/users/{user_id}/answers/verified
//! GET  /api/v1/users/{user_id}/progress
//! GET  /api/v1/users/{user_id}/badges
//! GET  /api/v1/users/{user_id}/tasks?frequency=daily
//! GET  /api/v1/users/{user_id}/achievements?limit=50
//! GET  /api/v1/badges
//! ```

use actix_web::{HttpRequest, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{
    ActionOutcome, AnswerVerifiedRequest, GrantXpRequest, ProgressSnapshot, TaskView,
};
use crate::domain::{AchievementLogEntry, AwardedBadge, Badge, Error, Level, Metadata};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::{ActionOutcomeSchema, ErrorSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    DEFAULT_HISTORY_LIMIT, parse_frequency, parse_user_id, parse_uuid,
};

#[derive(Debug, Deserialize)]
struct UserPath {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct UserTaskPath {
    user_id: String,
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct UserBadgePath {
    user_id: String,
    badge_id: String,
}

/// Request payload for an XP grant.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GrantXpBody {
    #[schema(example = "answer_accepted")]
    pub event_type: String,
    #[schema(example = 15)]
    pub amount: i64,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

/// Request payload for a verified answer.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnswerVerifiedBody {
    pub answer_id: String,
    pub question_id: String,
    pub score: i64,
}

/// Query parameters for the task listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskListQuery {
    /// `daily`, `weekly` or `one-off`.
    pub frequency: Option<String>,
}

/// Query parameters for the achievement history.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Newest entries to return; capped by the engine.
    pub limit: Option<usize>,
}

/// One rung of the level ladder.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelResponse {
    pub id: String,
    pub name: String,
    pub xp_required: i64,
    pub tier: i32,
}

impl From<Level> for LevelResponse {
    fn from(level: Level) -> Self {
        Self {
            id: level.id.to_string(),
            name: level.name,
            xp_required: level.xp_required,
            tier: level.tier,
        }
    }
}

/// A user's level position.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub user_id: String,
    pub total_xp: i64,
    pub streak_days: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub current_level: Option<LevelResponse>,
    pub next_level: Option<LevelResponse>,
    pub xp_to_next: i64,
}

impl From<ProgressSnapshot> for ProgressResponse {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            user_id: snapshot.user_id.to_string(),
            total_xp: snapshot.total_xp,
            streak_days: snapshot.streak_days,
            last_active_at: snapshot.last_active_at,
            current_level: snapshot.current_level.map(LevelResponse::from),
            next_level: snapshot.next_level.map(LevelResponse::from),
            xp_to_next: snapshot.xp_to_next,
        }
    }
}

/// A catalogue badge.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BadgeResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "type")]
    #[schema(example = "milestone")]
    pub kind: String,
    pub icon_path: Option<String>,
    pub xp_reward: i64,
}

impl From<Badge> for BadgeResponse {
    fn from(badge: Badge) -> Self {
        Self {
            id: badge.id.to_string(),
            name: badge.name,
            slug: badge.slug,
            description: badge.description,
            kind: badge.kind.as_str().to_owned(),
            icon_path: badge.icon_path,
            xp_reward: badge.xp_reward,
        }
    }
}

/// A badge held by a user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardedBadgeResponse {
    pub badge: BadgeResponse,
    pub awarded_at: DateTime<Utc>,
}

impl From<AwardedBadge> for AwardedBadgeResponse {
    fn from(awarded: AwardedBadge) -> Self {
        Self {
            badge: awarded.badge.into(),
            awarded_at: awarded.awarded_at,
        }
    }
}

/// A task with its assignment for the current period.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskViewResponse {
    pub task_id: String,
    pub title: String,
    pub description: String,
    #[schema(example = "daily")]
    pub frequency: String,
    pub xp_reward: i64,
    pub assignment_id: String,
    #[schema(example = "pending")]
    pub status: String,
    pub period_key: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TaskView> for TaskViewResponse {
    fn from(view: TaskView) -> Self {
        let TaskView { task, assignment } = view;
        Self {
            task_id: task.id.to_string(),
            title: task.title,
            description: task.description,
            frequency: task.frequency.as_str().to_owned(),
            xp_reward: task.xp_reward,
            assignment_id: assignment.id.to_string(),
            status: assignment.status.as_str().to_owned(),
            period_key: assignment.period_key,
            assigned_at: assignment.assigned_at,
            completed_at: assignment.completed_at,
        }
    }
}

/// One achievement log entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AchievementResponse {
    pub id: String,
    #[serde(rename = "type")]
    #[schema(example = "xp_gained")]
    pub kind: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<AchievementLogEntry> for AchievementResponse {
    fn from(entry: AchievementLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            kind: entry.kind.as_str().to_owned(),
            metadata: entry.metadata,
            created_at: entry.created_at,
        }
    }
}

/// JSON extractor configuration that reports malformed bodies as
/// `invalid_request` errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        Error::invalid_request(format!("invalid JSON body: {err}")).into()
    })
}

/// Query extractor configuration matching [`json_config`].
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        Error::invalid_request(format!("invalid query string: {err}")).into()
    })
}

/// Grant XP to a user.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/xp",
    request_body = GrantXpBody,
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "XP granted", body = ActionOutcomeSchema),
        (status = 400, description = "Invalid request or negative amount", body = ErrorSchema),
        (status = 409, description = "Concurrent updates exhausted the retry budget", body = ErrorSchema),
        (status = 503, description = "Store unavailable", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "grantXp"
)]
#[post("/users/{user_id}/xp")]
pub async fn grant_xp(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
    payload: web::Json<GrantXpBody>,
) -> ApiResult<web::Json<ActionOutcome>> {
    let user_id = parse_user_id(&path.user_id)?;
    let body = payload.into_inner();
    let outcome = state
        .command
        .grant_xp(GrantXpRequest {
            user_id,
            event_type: body.event_type,
            amount: body.amount,
            metadata: body.metadata.unwrap_or_default(),
        })
        .await?;
    Ok(web::Json(outcome))
}

/// Assign a task for the current period.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/tasks/{task_id}/assign",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("task_id" = String, Path, description = "Task identifier")
    ),
    responses(
        (status = 200, description = "Task assigned or existing assignment returned", body = ActionOutcomeSchema),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 404, description = "Unknown or inactive task", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "assignTask"
)]
#[post("/users/{user_id}/tasks/{task_id}/assign")]
pub async fn assign_task(
    state: web::Data<HttpState>,
    path: web::Path<UserTaskPath>,
) -> ApiResult<web::Json<ActionOutcome>> {
    let user_id = parse_user_id(&path.user_id)?;
    let task_id = parse_uuid(&path.task_id, "taskId")?;
    let outcome = state.command.assign_task(user_id, task_id).await?;
    Ok(web::Json(outcome))
}

/// Complete the current period's assignment of a task.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/tasks/{task_id}/complete",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("task_id" = String, Path, description = "Task identifier")
    ),
    responses(
        (status = 200, description = "Task completed or already completed", body = ActionOutcomeSchema),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 404, description = "Unknown task", body = ErrorSchema),
        (status = 409, description = "No assignment for the current period", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "completeTask"
)]
#[post("/users/{user_id}/tasks/{task_id}/complete")]
pub async fn complete_task(
    state: web::Data<HttpState>,
    path: web::Path<UserTaskPath>,
) -> ApiResult<web::Json<ActionOutcome>> {
    let user_id = parse_user_id(&path.user_id)?;
    let task_id = parse_uuid(&path.task_id, "taskId")?;
    let outcome = state.command.complete_task(user_id, task_id).await?;
    Ok(web::Json(outcome))
}

/// Award a badge to a user.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/badges/{badge_id}",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("badge_id" = String, Path, description = "Badge identifier")
    ),
    responses(
        (status = 200, description = "Badge awarded or already held", body = ActionOutcomeSchema),
        (status = 400, description = "Invalid identifier", body = ErrorSchema),
        (status = 404, description = "Unknown or inactive badge", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "awardBadge"
)]
#[post("/users/{user_id}/badges/{badge_id}")]
pub async fn award_badge(
    state: web::Data<HttpState>,
    path: web::Path<UserBadgePath>,
) -> ApiResult<web::Json<ActionOutcome>> {
    let user_id = parse_user_id(&path.user_id)?;
    let badge_id = parse_uuid(&path.badge_id, "badgeId")?;
    let outcome = state.command.award_badge(user_id, badge_id).await?;
    Ok(web::Json(outcome))
}

/// Record a verified answer.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/answers/verified",
    request_body = AnswerVerifiedBody,
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Verification recorded", body = ActionOutcomeSchema),
        (status = 400, description = "Invalid request", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "verifyAnswer"
)]
#[post("/users/{user_id}/answers/verified")]
pub async fn verify_answer(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
    payload: web::Json<AnswerVerifiedBody>,
) -> ApiResult<web::Json<ActionOutcome>> {
    let user_id = parse_user_id(&path.user_id)?;
    let body = payload.into_inner();
    let request = AnswerVerifiedRequest {
        user_id,
        answer_id: parse_uuid(&body.answer_id, "answerId")?,
        question_id: parse_uuid(&body.question_id, "questionId")?,
        score: body.score,
    };
    let outcome = state.command.verify_answer(request).await?;
    Ok(web::Json(outcome))
}

/// Fetch a user's XP total and level position.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/progress",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Level progress", body = ProgressResponse),
        (status = 400, description = "Invalid identifier", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "getProgress"
)]
#[get("/users/{user_id}/progress")]
pub async fn get_progress(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
) -> ApiResult<web::Json<ProgressResponse>> {
    let user_id = parse_user_id(&path.user_id)?;
    let snapshot = state.query.level_progress(&user_id).await?;
    Ok(web::Json(snapshot.into()))
}

/// List the badges a user holds, most recent first.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/badges",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Badges held", body = [AwardedBadgeResponse]),
        (status = 400, description = "Invalid identifier", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "listUserBadges"
)]
#[get("/users/{user_id}/badges")]
pub async fn list_user_badges(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
) -> ApiResult<web::Json<Vec<AwardedBadgeResponse>>> {
    let user_id = parse_user_id(&path.user_id)?;
    let badges = state.query.user_badges(&user_id).await?;
    Ok(web::Json(badges.into_iter().map(Into::into).collect()))
}

/// List the active badge catalogue.
#[utoipa::path(
    get,
    path = "/api/v1/badges",
    responses((status = 200, description = "Active badges", body = [BadgeResponse])),
    tags = ["progression"],
    operation_id = "listBadges"
)]
#[get("/badges")]
pub async fn list_badges(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<BadgeResponse>>> {
    let badges = state.query.active_badges().await?;
    Ok(web::Json(badges.into_iter().map(Into::into).collect()))
}

/// List a user's tasks for the current period.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/tasks",
    params(("user_id" = String, Path, description = "User identifier"), TaskListQuery),
    responses(
        (status = 200, description = "Tasks for the current period", body = [TaskViewResponse]),
        (status = 400, description = "Invalid identifier or frequency", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "listUserTasks"
)]
#[get("/users/{user_id}/tasks")]
pub async fn list_user_tasks(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
    query: web::Query<TaskListQuery>,
) -> ApiResult<web::Json<Vec<TaskViewResponse>>> {
    let user_id = parse_user_id(&path.user_id)?;
    let frequency = parse_frequency(query.frequency.as_deref())?;
    let views = state.query.tasks_for_user(&user_id, frequency).await?;
    Ok(web::Json(views.into_iter().map(Into::into).collect()))
}

/// List a user's newest achievement log entries.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/achievements",
    params(("user_id" = String, Path, description = "User identifier"), HistoryQuery),
    responses(
        (status = 200, description = "Achievement history, newest first", body = [AchievementResponse]),
        (status = 400, description = "Invalid identifier or limit", body = ErrorSchema)
    ),
    tags = ["progression"],
    operation_id = "listAchievements"
)]
#[get("/users/{user_id}/achievements")]
pub async fn list_achievements(
    state: web::Data<HttpState>,
    path: web::Path<UserPath>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<web::Json<Vec<AchievementResponse>>> {
    let user_id = parse_user_id(&path.user_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = state.query.achievement_history(&user_id, limit).await?;
    Ok(web::Json(entries.into_iter().map(Into::into).collect()))
}

/// Register every progression handler on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(grant_xp)
        .service(assign_task)
        .service(complete_task)
        .service(award_badge)
        .service(verify_answer)
        .service(get_progress)
        .service(list_user_badges)
        .service(list_badges)
        .service(list_user_tasks)
        .service(list_achievements);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::{MockProgressionCommand, MockProgressionQuery, OutcomeKind};
    use crate::domain::{
        AchievementKind, BadgeKind, Task, TaskFrequency, TaskStatus, UserId, UserTask,
    };
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;
    use uuid::Uuid;

    const USER: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    fn user() -> UserId {
        UserId::new(USER).expect("fixture user id")
    }

    fn state(command: MockProgressionCommand, query: MockProgressionQuery) -> web::Data<HttpState> {
        web::Data::new(HttpState::new(Arc::new(command), Arc::new(query)))
    }

    async fn call(
        state: web::Data<HttpState>,
        request: actix_test::TestRequest,
    ) -> (StatusCode, Value) {
        let app = actix_test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await;
        let response = actix_test::call_service(&app, request.to_request()).await;
        let status = response.status();
        let body = actix_test::read_body(response).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("response is JSON")
        };
        (status, value)
    }

    #[actix_web::test]
    async fn grant_xp_forwards_the_body() {
        let mut command = MockProgressionCommand::new();
        command
            .expect_grant_xp()
            .withf(|request| {
                request.user_id == user()
                    && request.event_type == "answer_accepted"
                    && request.amount == 15
                    && request.metadata.get("answerId") == Some(&json!("a-1"))
            })
            .times(1)
            .return_once(|_| {
                Ok(ActionOutcome::success(
                    OutcomeKind::XpGained,
                    json!({"totalXp": 15}),
                ))
            });

        let (status, body) = call(
            state(command, MockProgressionQuery::new()),
            actix_test::TestRequest::post()
                .uri(&format!("/api/v1/users/{USER}/xp"))
                .set_json(json!({
                    "eventType": "answer_accepted",
                    "amount": 15,
                    "metadata": {"answerId": "a-1"},
                })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["type"], "xp_gained");
        assert_eq!(body["payload"]["totalXp"], 15);
    }

    #[actix_web::test]
    async fn negative_amounts_surface_as_bad_request() {
        let mut command = MockProgressionCommand::new();
        command
            .expect_grant_xp()
            .return_once(|_| Err(Error::invalid_amount("amount must not be negative")));

        let (status, body) = call(
            state(command, MockProgressionQuery::new()),
            actix_test::TestRequest::post()
                .uri(&format!("/api/v1/users/{USER}/xp"))
                .set_json(json!({"eventType": "manual", "amount": -5})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_amount");
    }

    #[rstest]
    #[case("/api/v1/users/not-a-uuid/progress", "userId")]
    #[case("/api/v1/users/not-a-uuid/badges", "userId")]
    #[actix_web::test]
    async fn malformed_user_ids_are_rejected(#[case] uri: &str, #[case] field: &str) {
        let (status, body) = call(
            state(MockProgressionCommand::new(), MockProgressionQuery::new()),
            actix_test::TestRequest::get().uri(uri),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
        assert_eq!(body["details"]["field"], field);
    }

    #[actix_web::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let (status, body) = call(
            state(MockProgressionCommand::new(), MockProgressionQuery::new()),
            actix_test::TestRequest::post()
                .uri(&format!("/api/v1/users/{USER}/xp"))
                .set_json(json!({"eventType": "manual"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
    }

    #[actix_web::test]
    async fn completing_without_assignment_conflicts() {
        let task_id = Uuid::new_v4();
        let mut command = MockProgressionCommand::new();
        command
            .expect_complete_task()
            .withf(move |user_id, id| *user_id == user() && *id == task_id)
            .return_once(|_, _| Err(Error::no_pending_assignment("no assignment for period")));

        let (status, body) = call(
            state(command, MockProgressionQuery::new()),
            actix_test::TestRequest::post()
                .uri(&format!("/api/v1/users/{USER}/tasks/{task_id}/complete")),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "no_pending_assignment");
    }

    #[actix_web::test]
    async fn badge_awards_report_repeat_awards() {
        let badge_id = Uuid::new_v4();
        let mut command = MockProgressionCommand::new();
        command
            .expect_award_badge()
            .withf(move |_, id| *id == badge_id)
            .return_once(|_, _| {
                Ok(ActionOutcome::success(
                    OutcomeKind::BadgeAlreadyAwarded,
                    json!({}),
                ))
            });

        let (status, body) = call(
            state(command, MockProgressionQuery::new()),
            actix_test::TestRequest::post().uri(&format!("/api/v1/users/{USER}/badges/{badge_id}")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "badge_already_awarded");
    }

    #[actix_web::test]
    async fn verified_answers_require_uuid_identifiers() {
        let (status, body) = call(
            state(MockProgressionCommand::new(), MockProgressionQuery::new()),
            actix_test::TestRequest::post()
                .uri(&format!("/api/v1/users/{USER}/answers/verified"))
                .set_json(json!({"answerId": "nope", "questionId": USER, "score": 3})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "answerId");
    }

    #[actix_web::test]
    async fn progress_reports_level_position() {
        let mut query = MockProgressionQuery::new();
        query
            .expect_level_progress()
            .withf(|user_id| *user_id == user())
            .return_once(|user_id| {
                Ok(ProgressSnapshot {
                    user_id: *user_id,
                    total_xp: 450,
                    streak_days: 2,
                    last_active_at: None,
                    current_level: Some(Level {
                        id: Uuid::nil(),
                        name: "Contributor".to_owned(),
                        xp_required: 100,
                        tier: 2,
                    }),
                    next_level: Some(Level {
                        id: Uuid::nil(),
                        name: "Expert".to_owned(),
                        xp_required: 500,
                        tier: 3,
                    }),
                    xp_to_next: 50,
                })
            });

        let (status, body) = call(
            state(MockProgressionCommand::new(), query),
            actix_test::TestRequest::get().uri(&format!("/api/v1/users/{USER}/progress")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalXp"], 450);
        assert_eq!(body["currentLevel"]["xpRequired"], 100);
        assert_eq!(body["nextLevel"]["xpRequired"], 500);
        assert_eq!(body["xpToNext"], 50);
    }

    #[actix_web::test]
    async fn task_listing_parses_frequency() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).single().expect("valid time");
        let task_id = Uuid::new_v4();
        let mut query = MockProgressionQuery::new();
        query
            .expect_tasks_for_user()
            .withf(|_, frequency| *frequency == Some(TaskFrequency::Daily))
            .return_once(move |user_id, _| {
                Ok(vec![TaskView {
                    task: Task {
                        id: task_id,
                        title: "Answer a question".to_owned(),
                        description: String::new(),
                        frequency: TaskFrequency::Daily,
                        xp_reward: 10,
                        is_active: true,
                    },
                    assignment: UserTask {
                        id: Uuid::new_v4(),
                        user_id: *user_id,
                        task_id,
                        status: TaskStatus::Pending,
                        period_key: Some("2026-03-04".to_owned()),
                        assigned_at: now,
                        completed_at: None,
                    },
                }])
            });

        let (status, body) = call(
            state(MockProgressionCommand::new(), query),
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/users/{USER}/tasks?frequency=daily")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["frequency"], "daily");
        assert_eq!(body[0]["status"], "pending");
        assert_eq!(body[0]["periodKey"], "2026-03-04");
    }

    #[actix_web::test]
    async fn unknown_frequency_is_a_bad_request() {
        let (status, body) = call(
            state(MockProgressionCommand::new(), MockProgressionQuery::new()),
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/users/{USER}/tasks?frequency=hourly")),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["code"], "invalid_frequency");
    }

    #[actix_web::test]
    async fn history_defaults_its_limit() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).single().expect("valid time");
        let mut query = MockProgressionQuery::new();
        query
            .expect_achievement_history()
            .withf(|_, limit| *limit == DEFAULT_HISTORY_LIMIT)
            .return_once(move |user_id, _| {
                Ok(vec![AchievementLogEntry {
                    id: Uuid::new_v4(),
                    user_id: *user_id,
                    kind: AchievementKind::XpGained,
                    metadata: json!({"amount": 5}),
                    created_at: now,
                }])
            });

        let (status, body) = call(
            state(MockProgressionCommand::new(), query),
            actix_test::TestRequest::get().uri(&format!("/api/v1/users/{USER}/achievements")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["type"], "xp_gained");
        assert_eq!(body[0]["metadata"]["amount"], 5);
    }

    #[actix_web::test]
    async fn transient_failures_are_retryable() {
        let mut query = MockProgressionQuery::new();
        query
            .expect_active_badges()
            .return_once(|| Err(Error::transient_store_failure("pool timed out")));

        let (status, body) = call(
            state(MockProgressionCommand::new(), query),
            actix_test::TestRequest::get().uri("/api/v1/badges"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "transient_store_failure");
    }

    #[actix_web::test]
    async fn badge_catalogue_exposes_type() {
        let mut query = MockProgressionQuery::new();
        query.expect_active_badges().return_once(|| {
            Ok(vec![Badge {
                id: Uuid::new_v4(),
                name: "First Answer".to_owned(),
                slug: "first-answer".to_owned(),
                description: String::new(),
                kind: BadgeKind::Milestone,
                icon_path: None,
                xp_reward: 25,
                is_active: true,
            }])
        });

        let (status, body) = call(
            state(MockProgressionCommand::new(), query),
            actix_test::TestRequest::get().uri("/api/v1/badges"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["type"], "milestone");
        assert_eq!(body[0]["slug"], "first-answer");
    }
}
