use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Decode(_) | AppError::Multipart(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(%status, error = %self);

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_input_maps_to_400() {
        let resp = AppError::BadRequest("missing file".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let decode = image::load_from_memory(b"not an image").unwrap_err();
        let resp = AppError::from(decode).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_failure_maps_to_500() {
        let err = anyhow::Error::from(rusqlite::Error::InvalidQuery).context("append failed");
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
