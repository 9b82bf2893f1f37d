//! Common types shared by the TrackMe load-test actors.
//!
//! Everything the API returns passes through this crate once, at the
//! boundary, and comes out in the canonical shape the write endpoints accept:
//! plain-string labels, fixed-format UTC timestamps and known stages.

pub mod client;
pub mod envelope;
pub mod error;
pub mod label;
pub mod stage;
pub mod time;

pub use client::{ClientRecord, Contract, FetchedClient, FetchedContract, NewClient};
pub use envelope::{AuthData, Envelope, UserInfo};
pub use error::{ModelError, ModelResult};
pub use label::FlexLabel;
pub use stage::Stage;
pub use time::{canonical, is_canonical, LooseTimestamp, CANONICAL_FORMAT, FALLBACK_TIMESTAMP};
