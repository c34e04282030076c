//! Request extractors reporting malformed input with the same error body as the
//! services.

use axum::{
    Json,
    extract::{
        FromRequest, Path, Query, Request,
        rejection::{PathRejection, QueryRejection},
    },
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// JSON body that has been deserialized and passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Turn the `{id}` path segment into a room id; anything that is not a UUID cannot
/// name an existing room.
pub fn room_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| AppError::NotFound(format!("unknown room: {}", rejection.body_text())))
}

/// Unwrap a query string, reporting a malformed one like any other invalid input.
pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}
