pub mod auth;
pub mod client;
mod models;

pub use auth::{authorize_url, Grant, SpotifyAuthenticator, SpotifyCredentials};
pub use client::{SpotifyClient, SpotifyClientBuilder};
