// Google Drive v3 implementation of the remote facade

pub mod client;
pub mod oauth;
pub mod query;

pub use client::{GoogleDrive, GoogleDriveConfig};
