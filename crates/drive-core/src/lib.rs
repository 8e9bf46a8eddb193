// Bot core: gateway connection, per-user navigation over the remote drive,
// command dispatch and reply rendering

pub mod chat;
pub mod colour;
pub mod command;
pub mod config;
pub mod connection;
pub mod definitions;
pub mod dispatcher;
pub mod embed;
pub mod error;
pub mod format;
pub mod history;
pub mod pager;
pub mod protocol;
pub mod resolver;
pub mod rest;
pub mod scratch;
pub mod state;
pub mod transfer;
pub mod vpath;

#[cfg(test)]
mod testing;
