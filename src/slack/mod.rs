mod client;
mod connection;

pub use client::SlackClient;
pub use connection::SlackConnection;
