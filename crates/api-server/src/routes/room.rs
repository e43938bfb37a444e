//! The `/api/*` surface (spec §6): one room-scoped command or read model
//! per handler, all resolving `project` the same way a WS connection does.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use hub_core::model::PresenceStatus;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

use super::default_project;

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    #[serde(default = "default_project")]
    pub project: String,
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default)]
    pub since: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    #[serde(default = "default_project")]
    pub project: String,
    pub agent: String,
}

async fn state_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<hub_core::model::RoomStateSummary>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_state().await?))
}

async fn stats_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<hub_core::model::SwarmStats>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_swarm_stats().await?))
}

async fn agents_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<hub_core::model::SwarmPulseSnapshot>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_swarm_pulse().await?))
}

async fn tasks_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<Vec<hub_core::model::TaskListEntry>>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_task_list().await?))
}

async fn events_handler(
    State(state): State<AppState>,
    Query(q): Query<SinceQuery>,
) -> Result<Json<Vec<hub_core::model::Event>>, ApiError> {
    let room = state.room(&q.project).await?;
    let mut events = room.get_events().await?;
    if let Some(since) = q.since {
        events.retain(|e| e.ts > since);
    }
    Ok(Json(events))
}

async fn timeline_handler(
    State(state): State<AppState>,
    Query(q): Query<SinceQuery>,
) -> Result<Json<Vec<hub_core::model::TimelineEntry>>, ApiError> {
    let room = state.room(&q.project).await?;
    let mut timeline = room.get_timeline().await?;
    if let Some(since) = q.since {
        timeline.retain(|e| e.ts() > since);
    }
    Ok(Json(timeline))
}

#[derive(Debug, Serialize)]
struct FrozenStatus {
    frozen: bool,
}

async fn check_frozen_handler(
    State(state): State<AppState>,
    Query(q): Query<AgentQuery>,
) -> Result<Json<FrozenStatus>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(FrozenStatus {
        frozen: room.is_frozen(&q.agent).await?,
    }))
}

async fn knowledge_search_handler(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<hub_core::model::KnowledgeEntry>>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.search_knowledge(&q.q).await?))
}

async fn urgent_list_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<Option<hub_core::model::UrgentRecord>>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_active_urgent().await?))
}

async fn pulse_get_handler(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<hub_core::model::SwarmPulseSnapshot>, ApiError> {
    let room = state.room(&q.project).await?;
    Ok(Json(room.get_swarm_pulse().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimTaskBody {
    #[serde(default = "default_project")]
    project: String,
    task_id: String,
    agent: String,
}

async fn claim_task_handler(
    State(state): State<AppState>,
    Json(body): Json<ClaimTaskBody>,
) -> Result<Json<hub_core::room::ClaimResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.claim_task(&body.task_id, &body.agent).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseTaskBody {
    #[serde(default = "default_project")]
    project: String,
    task_id: String,
    agent: String,
}

async fn release_task_handler(
    State(state): State<AppState>,
    Json(body): Json<ReleaseTaskBody>,
) -> Result<Json<hub_core::room::ReleaseResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.release_task(&body.task_id, &body.agent).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockFileBody {
    #[serde(default = "default_project")]
    project: String,
    path: String,
    agent: String,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    ttl_ms: Option<i64>,
}

async fn lock_file_handler(
    State(state): State<AppState>,
    Json(body): Json<LockFileBody>,
) -> Result<Json<hub_core::room::LockResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.lock_file(&body.path, &body.agent, body.exclusive, body.ttl_ms).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockFileBody {
    #[serde(default = "default_project")]
    project: String,
    path: String,
    agent: String,
}

async fn unlock_file_handler(
    State(state): State<AppState>,
    Json(body): Json<UnlockFileBody>,
) -> Result<Json<hub_core::room::UnlockResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.unlock_file(&body.path, &body.agent).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnounceTaskBody {
    #[serde(default = "default_project")]
    project: String,
    task_id: String,
    title: String,
    #[serde(default)]
    required_capabilities: Vec<String>,
}

async fn announce_task_handler(
    State(state): State<AppState>,
    Json(body): Json<AnnounceTaskBody>,
) -> Result<Json<hub_core::room::AnnounceResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.announce_task(&body.task_id, &body.title, body.required_capabilities).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BidTaskBody {
    #[serde(default = "default_project")]
    project: String,
    task_id: String,
    agent: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

async fn bid_task_handler(
    State(state): State<AppState>,
    Json(body): Json<BidTaskBody>,
) -> Result<Json<hub_core::room::BidResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.bid_task(&body.task_id, &body.agent, body.capabilities).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveAuctionBody {
    #[serde(default = "default_project")]
    project: String,
    task_id: String,
}

async fn resolve_auction_handler(
    State(state): State<AppState>,
    Json(body): Json<ResolveAuctionBody>,
) -> Result<Json<hub_core::room::ResolveAuctionResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.resolve_auction(&body.task_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeMcpsBody {
    #[serde(default = "default_project")]
    project: String,
    mcps: Vec<String>,
}

async fn authorize_mcps_handler(
    State(state): State<AppState>,
    Json(body): Json<AuthorizeMcpsBody>,
) -> Result<Json<hub_core::room::OkResult>, ApiError> {
    let room = state.room(&body.project).await?;
    room.authorize_mcps(body.mcps).await?;
    Ok(Json(hub_core::room::OkResult { ok: true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastBody {
    #[serde(default = "default_project")]
    project: String,
    #[serde(default)]
    agent: Option<String>,
    message: String,
    #[serde(default)]
    channel: Option<String>,
}

async fn broadcast_handler(
    State(state): State<AppState>,
    Json(body): Json<BroadcastBody>,
) -> Result<Json<hub_core::room::OkResult>, ApiError> {
    let room = state.room(&body.project).await?;
    room.broadcast_chat(body.agent.as_deref(), &body.message, body.channel.as_deref())
        .await?;
    Ok(Json(hub_core::room::OkResult { ok: true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreezeAgentBody {
    #[serde(default = "default_project")]
    project: String,
    agent: String,
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_reason() -> String {
    "manual freeze".to_string()
}

async fn freeze_agent_handler(
    State(state): State<AppState>,
    Json(body): Json<FreezeAgentBody>,
) -> Result<Json<hub_core::room::FreezeResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.freeze_agent(&body.agent, &body.reason).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnfreezeAgentBody {
    #[serde(default = "default_project")]
    project: String,
    agent: String,
}

async fn unfreeze_agent_handler(
    State(state): State<AppState>,
    Json(body): Json<UnfreezeAgentBody>,
) -> Result<Json<hub_core::room::UnfreezeResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.unfreeze_agent(&body.agent).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportActivityBody {
    #[serde(default = "default_project")]
    project: String,
    agent: String,
    actions: u64,
}

async fn report_activity_handler(
    State(state): State<AppState>,
    Json(body): Json<ReportActivityBody>,
) -> Result<Json<hub_core::room::ReportActivityResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.report_activity(&body.agent, body.actions).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PulseBody {
    #[serde(default = "default_project")]
    project: String,
    agent: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    current_file: Option<String>,
    #[serde(default)]
    current_task: Option<String>,
    #[serde(default = "default_presence")]
    status: PresenceStatus,
}

fn default_presence() -> PresenceStatus {
    PresenceStatus::Active
}

async fn pulse_post_handler(
    State(state): State<AppState>,
    Json(body): Json<PulseBody>,
) -> Result<Json<hub_core::model::Pulse>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.update_pulse(
            &body.agent,
            body.platform,
            body.branch,
            body.current_file,
            body.current_task,
            body.status,
        )
        .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerUrgentBody {
    #[serde(default = "default_project")]
    project: String,
    #[serde(default)]
    task_id: Option<String>,
    title: String,
    reason: String,
    initiator: String,
    #[serde(default)]
    affected_files: Vec<String>,
}

async fn trigger_urgent_handler(
    State(state): State<AppState>,
    Json(body): Json<TriggerUrgentBody>,
) -> Result<Json<hub_core::room::TriggerUrgentResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.trigger_urgent(
            body.task_id.as_deref(),
            &body.title,
            &body.reason,
            &body.initiator,
            body.affected_files,
        )
        .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveUrgentBody {
    #[serde(default = "default_project")]
    project: String,
    id: String,
}

async fn resolve_urgent_handler(
    State(state): State<AppState>,
    Json(body): Json<ResolveUrgentBody>,
) -> Result<Json<hub_core::room::ResolveUrgentResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(room.resolve_urgent(&body.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddKnowledgeBody {
    #[serde(default = "default_project")]
    project: String,
    agent: String,
    category: String,
    title: String,
    description: String,
    #[serde(default)]
    solution: Option<String>,
}

async fn add_knowledge_handler(
    State(state): State<AppState>,
    Json(body): Json<AddKnowledgeBody>,
) -> Result<Json<hub_core::room::AddKnowledgeResult>, ApiError> {
    let room = state.room(&body.project).await?;
    Ok(Json(
        room.add_knowledge(&body.agent, &body.category, &body.title, &body.description, body.solution)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StopBody {
    #[serde(default = "default_project")]
    project: String,
}

async fn stop_handler(
    State(state): State<AppState>,
    body: Option<Json<StopBody>>,
) -> Result<Json<hub_core::room::OkResult>, ApiError> {
    let project = body.map(|Json(b)| b.project).unwrap_or_else(default_project);
    let room = state.room(&project).await?;
    room.set_swarm_stopped(true).await?;
    Ok(Json(hub_core::room::OkResult { ok: true }))
}

async fn resume_handler(
    State(state): State<AppState>,
    body: Option<Json<StopBody>>,
) -> Result<Json<hub_core::room::OkResult>, ApiError> {
    let project = body.map(|Json(b)| b.project).unwrap_or_else(default_project);
    let room = state.room(&project).await?;
    room.set_swarm_stopped(false).await?;
    Ok(Json(hub_core::room::OkResult { ok: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/state", get(state_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/agents", get(agents_handler))
        .route("/api/tasks", get(tasks_handler))
        .route("/api/events", get(events_handler))
        .route("/api/timeline", get(timeline_handler))
        .route("/api/check_frozen", get(check_frozen_handler))
        .route("/api/knowledge", get(knowledge_search_handler).post(add_knowledge_handler))
        .route("/api/urgent", get(urgent_list_handler).post(trigger_urgent_handler))
        .route("/api/urgent/resolve", post(resolve_urgent_handler))
        .route("/api/pulse", get(pulse_get_handler).post(pulse_post_handler))
        .route("/api/claim_task", post(claim_task_handler))
        .route("/api/release_task", post(release_task_handler))
        .route("/api/lock_file", post(lock_file_handler))
        .route("/api/unlock_file", post(unlock_file_handler))
        .route("/api/announce_task", post(announce_task_handler))
        .route("/api/bid_task", post(bid_task_handler))
        .route("/api/resolve_auction", post(resolve_auction_handler))
        .route("/api/authorize_mcps", post(authorize_mcps_handler))
        .route("/api/broadcast", post(broadcast_handler))
        .route("/api/freeze_agent", post(freeze_agent_handler))
        .route("/api/unfreeze_agent", post(unfreeze_agent_handler))
        .route("/api/report_activity", post(report_activity_handler))
        .route("/api/stop", post(stop_handler))
        .route("/api/resume", post(resume_handler))
}
