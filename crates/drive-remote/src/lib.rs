// Contract between the bot core and a remote file service

pub mod auth;
pub mod drive;
pub mod error;
pub mod item;
pub mod query;

pub use auth::{AuthChallenge, DriveAuth};
pub use drive::{RemoteDrive, Retrieved};
pub use error::RemoteError;
pub use item::RemoteItem;
pub use query::ListQuery;
