pub mod batch;
pub mod builder;
pub mod client;
pub mod errors;
pub mod playlist;
pub mod store;

pub use builder::*;
pub use client::*;
pub use errors::*;
pub use playlist::*;
pub use store::*;

pub use reqwest::Url;
pub use saturn_core::{Episode, MatchSource, SearchResult, episode_number};

pub mod prelude {
    pub use crate::builder::*;
    pub use crate::client::*;
    pub use crate::errors::*;
    pub use crate::playlist::*;
    pub use crate::store::*;
    pub use saturn_core::{Episode, MatchSource, SearchResult};
}
