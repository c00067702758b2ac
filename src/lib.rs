//! Voice-command middleware between a voice assistant and a Kodi player
//! running on an Android TV box.
//!
//! The front-end delivers a normalized [`intent::Intent`]; the
//! [`pipeline::Pipeline`] wakes the device, resolves the spoken title
//! against TMDB, optionally merges the Trakt resume position, and
//! dispatches a player deep-link over Kodi's JSON-RPC interface. A
//! [`patcher::Patcher`] runs on its own interval and keeps the player
//! addon's external-playback block commented out.

pub mod adb;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod doctor;
pub mod intent;
pub mod kodi;
pub mod locale;
pub mod patcher;
pub mod pipeline;
pub mod resolver;
pub mod tmdb;
pub mod trakt;
