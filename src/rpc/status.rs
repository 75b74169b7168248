use crate::Error;
use tonic::Status;
use tracing::error;

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(message) => Self::invalid_argument(message),
            Error::NotFound => Self::not_found(err.to_string()),
            Error::Conflict => Self::already_exists(err.to_string()),
            Error::InvalidCredentials | Error::Unauthenticated => {
                Self::unauthenticated(err.to_string())
            }
            Error::Internal(ref source) => {
                error!("call failed: {source}");
                Self::internal(err.to_string())
            }
        }
    }
}
