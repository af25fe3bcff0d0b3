use thiserror::Error;

use crate::database::DatabaseError;
use crate::monitor::media::MediaError;
use crate::session::SessionError;

pub type Result<T> = core::result::Result<T, VigilError>;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}
