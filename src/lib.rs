//! Client for the LINE object storage (OBS) endpoints used to move media
//! between chat messages, profiles and the home timeline.
//!
//! The `pict` binary wires these together into one run: download the object
//! attached to a message, set it as the account's profile picture, and remove
//! the temporary copy.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod headers;
pub mod obs_params;
pub mod pipeline;
pub mod ui;
