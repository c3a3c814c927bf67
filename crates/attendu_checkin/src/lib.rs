//! Check-in client flow for AttendU
//!
//! This crate drives a student's face-scan check-in: camera capture,
//! submission to the face-recognition backend, and the pending-verification
//! countdown that autonomously finalizes an ambiguous scan when the user
//! takes no further action.
//!
//! # Design
//!
//! - The camera is an injected, exclusively-owned resource
//!   ([`camera::CameraSource`]); the real device never leaks into the flow
//!   logic.
//! - Both network calls go through the [`client::RecognitionClient`] seam;
//!   [`client::HttpRecognitionClient`] is the production implementation.
//! - [`session::CheckInSession`] owns the state machine and its timers.
//!   Dropping the session (or calling `shutdown`) cancels everything: no
//!   timer or network call fires afterwards.

pub mod camera;
pub mod client;
pub mod session;

#[cfg(test)]
mod session_test;

pub use camera::{CameraError, CameraSource, CapturedFrame};
pub use client::{
    CheckInError, FinalizeOutcome, HttpRecognitionClient, RecognitionClient, ScanOutcome,
};
pub use session::{CheckInSession, CheckInState, UserAlert};
