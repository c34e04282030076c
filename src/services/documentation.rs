use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia room backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::welcome,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::change_status,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::submit_answer,
        crate::routes::rooms::player_history,
        crate::routes::rooms::get_scoreboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::QuestionInput,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::StatusChangeRequest,
            crate::dto::room::SubmitAnswerRequest,
            crate::dto::room::RoomDetail,
            crate::dto::room::QuestionDetail,
            crate::dto::room::RoomStateResponse,
            crate::dto::room::RoomView,
            crate::dto::room::JoinResponse,
            crate::dto::room::SubmissionResponse,
            crate::dto::room::ScoreboardResponse,
            crate::dto::room::ScoreLine,
            crate::dto::room::RoomListItem,
            crate::dto::room::ActionResponse,
            crate::state::room::RoomStatus,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Trivia rooms, players and answers"),
    )
)]
pub struct ApiDoc;
