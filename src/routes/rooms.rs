use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::room::{
        ActionResponse, CreateRoomRequest, HistoryQuery, JoinResponse, JoinRoomRequest,
        RoomDetail, RoomKeyQuery, RoomListItem, RoomQuery, RoomView, ScoreboardResponse,
        StatusChangeRequest, SubmissionResponse, SubmitAnswerRequest,
    },
    error::{AppError, ErrorBody},
    routes::extract::{ValidatedJson, query, room_id},
    services::room_service,
    state::SharedState,
};

/// Room lifecycle, roster, submission and ranking endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(welcome))
        .route("/rooms", get(list_rooms).post(create_room))
        .route(
            "/rooms/{id}",
            get(get_room)
                .post(join_room)
                .patch(change_status)
                .delete(delete_room),
        )
        .route(
            "/rooms/{id}/submissions",
            post(submit_answer).get(player_history),
        )
        .route("/rooms/{id}/scoreboard", get(get_scoreboard))
}

/// Greeting used by clients to check the API is reachable.
#[utoipa::path(
    get,
    path = "/",
    tag = "rooms",
    responses((status = 200, description = "Welcome message", body = ActionResponse))
)]
pub async fn welcome() -> Json<ActionResponse> {
    Json(ActionResponse {
        message: "welcome to the trivia api!".into(),
    })
}

/// Create a closed room owned by the caller.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomDetail),
        (status = 422, description = "Invalid room definition", body = ErrorBody)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    ValidatedJson(payload): ValidatedJson<CreateRoomRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(room_service::create_room(&state, payload).await?))
}

/// List every room without secrets or answers.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Room summaries", body = [RoomListItem]))
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
) -> Result<Json<Vec<RoomListItem>>, AppError> {
    Ok(Json(room_service::list_rooms(&state).await?))
}

/// Player view of a room, or the full room when the organizer key is supplied.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier"), RoomQuery),
    responses(
        (status = 200, description = "Room state or detail", body = RoomView),
        (status = 422, description = "Unknown room or wrong key", body = ErrorBody)
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<RoomQuery>, QueryRejection>,
) -> Result<Json<RoomView>, AppError> {
    let id = room_id(path)?;
    let params = query(params)?;
    Ok(Json(room_service::get_room(&state, id, params).await?))
}

/// Join an open room.
#[utoipa::path(
    post,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinResponse),
        (status = 422, description = "Duplicate name or room not open", body = ErrorBody)
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(payload): ValidatedJson<JoinRoomRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let id = room_id(path)?;
    Ok(Json(room_service::join_room(&state, id, payload.name).await?))
}

/// Overwrite the room status (organizer only).
#[utoipa::path(
    patch,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier"), RoomKeyQuery),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status updated", body = RoomDetail),
        (status = 422, description = "Wrong key or unknown status", body = ErrorBody)
    )
)]
pub async fn change_status(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<RoomKeyQuery>, QueryRejection>,
    ValidatedJson(payload): ValidatedJson<StatusChangeRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    let id = room_id(path)?;
    let room_key = query(params)?.room_key.or(payload.room_key);
    Ok(Json(
        room_service::change_status(&state, id, room_key, payload.status).await?,
    ))
}

/// Delete a room and its submissions (organizer only).
#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier"), RoomKeyQuery),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 422, description = "Unknown room or wrong key", body = ErrorBody)
    )
)]
pub async fn delete_room(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<RoomKeyQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let id = room_id(path)?;
    room_service::delete_room(&state, id, query(params)?.room_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer the active question.
#[utoipa::path(
    post,
    path = "/rooms/{id}/submissions",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SubmissionResponse),
        (status = 422, description = "Game not running, unknown player or already answered", body = ErrorBody)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(payload): ValidatedJson<SubmitAnswerRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let id = room_id(path)?;
    let submission =
        room_service::submit_answer(&state, id, payload.player, payload.response).await?;
    Ok(Json(submission))
}

/// Answers of one player ordered by question.
#[utoipa::path(
    get,
    path = "/rooms/{id}/submissions",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier"), HistoryQuery),
    responses(
        (status = 200, description = "Player history", body = [SubmissionResponse]),
        (status = 422, description = "Unknown room or player", body = ErrorBody)
    )
)]
pub async fn player_history(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<SubmissionResponse>>, AppError> {
    let id = room_id(path)?;
    let params = query(params)?;
    Ok(Json(
        room_service::player_history(&state, id, &params.player).await?,
    ))
}

/// Full ranking of a room.
#[utoipa::path(
    get,
    path = "/rooms/{id}/scoreboard",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Ranked players", body = ScoreboardResponse),
        (status = 422, description = "Unknown room", body = ErrorBody)
    )
)]
pub async fn get_scoreboard(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    let id = room_id(path)?;
    Ok(Json(room_service::get_scoreboard(&state, id).await?))
}
