//! Canteen server
//!
//! Accepts TCP connections and runs each request as a chain of scheduler
//! tasks. The only route, `/CreateStoreFile`, appends a store record built
//! from the query string to a flat file.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod request;
pub mod store;

pub use dispatcher::{Dispatcher, ShutdownHandle, BUFFER_SIZE};
pub use error::{ServerError, ServerResult, Status};
pub use request::{Request, RequestError, Route};
pub use store::{StoreError, StoreFile, StoreRecord, DEFAULT_STORE_FILE};
