use thiserror::Error;

use super::session::SessionError;
use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Signed in, but the session could not be saved: {0}")]
    Session(#[from] SessionError),

    #[error("No user is signed in")]
    NotSignedIn,
}
