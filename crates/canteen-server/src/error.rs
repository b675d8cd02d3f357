//! Server error types

use crate::request::RequestError;
use canteen_sched::SchedError;

/// Errors raised while serving connections.
///
/// Task-stage variants wrap the [`SchedError`] delivered through that task's
/// future, so the dispatcher knows which step of a request failed.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be set up
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Accept or socket configuration failure
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The scheduler rejected or discarded a task because it is shutting down
    #[error("scheduler is closed")]
    PoolClosed,

    /// Reading the request from the connection failed
    #[error("receive failed: {0}")]
    Receive(SchedError),

    /// The request line could not be parsed
    #[error("parse failed: {0}")]
    Parse(SchedError),

    /// The request path has no handler
    #[error(transparent)]
    Route(RequestError),

    /// Form fields were missing, out of order or could not be decoded
    #[error("decode failed: {0}")]
    Decode(SchedError),

    /// Writing the record to the store file failed
    #[error("persist failed: {0}")]
    Persist(SchedError),

    /// Writing the response failed
    #[error("respond failed: {0}")]
    Respond(SchedError),
}

impl ServerError {
    /// Whether the error means the scheduler is gone and serving must stop
    pub fn is_pool_closed(&self) -> bool {
        matches!(self, ServerError::PoolClosed)
    }

    /// Status code reported to the client for this failure
    pub fn status(&self) -> Status {
        match self {
            ServerError::Parse(_) | ServerError::Decode(_) => Status::BadRequest,
            ServerError::Route(_) => Status::NotFound,
            _ => Status::InternalError,
        }
    }
}

/// Response status written back to the client
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// 200
    Ok,
    /// 400
    BadRequest,
    /// 404
    NotFound,
    /// 500
    InternalError,
}

impl Status {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalError => 500,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalError => "Internal Server Error",
        }
    }
}

/// Server result
pub type ServerResult<T> = Result<T, ServerError>;
