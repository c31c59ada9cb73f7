//! OpenAPI documentation for the engine's REST API.
//!
//! Registers every progression and health path together with the schema
//! wrappers from [`crate::inbound::http::schemas`]. Swagger UI serves it in
//! debug builds and `cargo run --bin openapi-dump` prints it for tooling.

use utoipa::OpenApi;

use crate::inbound::http::progression::{
    AchievementResponse, AnswerVerifiedBody, AwardedBadgeResponse, BadgeResponse, GrantXpBody,
    LevelResponse, ProgressResponse, TaskViewResponse,
};
use crate::inbound::http::schemas::{
    ActionOutcomeSchema, ErrorCodeSchema, ErrorSchema, OutcomeKindSchema,
};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Progression engine API",
        description = "XP grants, levels, badges, recurring tasks and achievement history."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::progression::grant_xp,
        crate::inbound::http::progression::assign_task,
        crate::inbound::http::progression::complete_task,
        crate::inbound::http::progression::award_badge,
        crate::inbound::http::progression::verify_answer,
        crate::inbound::http::progression::get_progress,
        crate::inbound::http::progression::list_user_badges,
        crate::inbound::http::progression::list_badges,
        crate::inbound::http::progression::list_user_tasks,
        crate::inbound::http::progression::list_achievements,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        ActionOutcomeSchema,
        OutcomeKindSchema,
        GrantXpBody,
        AnswerVerifiedBody,
        LevelResponse,
        ProgressResponse,
        BadgeResponse,
        AwardedBadgeResponse,
        TaskViewResponse,
        AchievementResponse,
    )),
    tags(
        (name = "progression", description = "XP, levels, badges and tasks"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
