//! # RapidQ Library
//!
//! This library provides the live engine of a timed speed-quiz round. It
//! drives the pre-round countdown and the round clock, scores answers with a
//! decaying speed bonus, handles the skip, 50/50 and hint lifelines, stages
//! the next question in the background and ends the session exactly once.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
use serde::Serialize;

pub mod clock;
pub mod config;
pub mod constants;
pub mod countdown;
pub mod engine;
mod error;
pub mod lifeline;
pub mod memory;
pub mod names;
pub mod preload;
pub mod producer;
pub mod question;
pub mod quiz;
pub mod repository;
pub mod scoring;
pub mod session;
pub mod summary;
pub mod writer;

pub use error::Error;

/// Messages sent to update the presentation layer
///
/// Each engine concern contributes its own update enum; this wraps them so
/// a [`session::Tunnel`] deals with a single type.
#[derive(Debug, Serialize, Clone, PartialEq, derive_more::From)]
pub enum UpdateMessage {
    /// Pre-round countdown updates
    Countdown(countdown::UpdateMessage),
    /// Round clock updates
    Clock(clock::UpdateMessage),
    /// Lifeline updates
    Lifeline(lifeline::UpdateMessage),
    /// Question and score updates
    Quiz(quiz::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages delivered by the timed producers
///
/// Alarms travel on the session actor's alarm channel, stamped with the
/// epoch of the session that scheduled them.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::From)]
pub enum AlarmMessage {
    /// Pre-round countdown alarms
    Countdown(countdown::Alarm),
    /// 50/50 fade alarms
    Lifeline(lifeline::Alarm),
}
