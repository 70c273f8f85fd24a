use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("在庫がありません: {0}")]
    OutOfStock(String),
    #[error("すでにこの蔵書を借りています: {0}")]
    DuplicateLoan(String),
    #[error("すでにこの蔵書を予約しています: {0}")]
    DuplicateReservation(String),
    #[error("貸出可能な蔵書は予約できません: {0}")]
    AlreadyAvailable(String),
    #[error("貸出中の記録ではありません: {0}")]
    NotBorrowed(String),
    #[error("{0}")]
    EntityNotFound(String),
    // available_copies が total_copies を超えるなど、本来起こり得ない状態を検出したとき。
    // 黙ってクランプせず、必ずここで失敗させて audit_and_repair に委ねる。
    #[error("蔵書データの不整合を検出しました: {0}")]
    ConsistencyViolation(String),
    #[error("{0}")]
    ValidationError(#[from] garde::Report),
    // sqlx::Errorを引数にするヴァリアントが複数あるので、[from]は使えず、[source]で代用している
    #[error("トランザクションを実行できませんでした。")]
    TransactionError(#[source] sqlx::Error),
    #[error("データベース処理実行中にエラーが発生しました。")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("No rows affected: {0}")]
    NoRowAffectedError(String),
    #[error("{0}")]
    KeyValueStoreError(#[from] redis::RedisError),
    #[error("{0}")]
    ConvertToUuidError(#[from] uuid::Error),
    #[error("認証情報がありません")]
    UnauthenticatedError,
    #[error("許可されていない操作です")]
    ForbiddenOperation,
    #[error("{0}")]
    ConversionEntityError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            AppError::OutOfStock(_)
            | AppError::DuplicateLoan(_)
            | AppError::DuplicateReservation(_)
            | AppError::AlreadyAvailable(_)
            | AppError::NotBorrowed(_) => StatusCode::CONFLICT,
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::ConvertToUuidError(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnauthenticatedError => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenOperation => StatusCode::FORBIDDEN,
            e @ (AppError::ConsistencyViolation(_)
            | AppError::TransactionError(_)
            | AppError::SpecificOperationError(_)
            | AppError::NoRowAffectedError(_)
            | AppError::KeyValueStoreError(_)
            | AppError::ConversionEntityError(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected error happened"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status_code.into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
