//! Guuber client - Firebase-backed onboarding.
//!
//! This crate connects the headless controllers of `guuber-core` to real
//! services:
//! - [`firebase::FirebaseGateway`]: the remote account gateway over the
//!   Firebase Identity Toolkit and Cloud Firestore REST APIs
//! - [`identity::IdTokenProvider`]: Google sign-in from a pre-issued ID token
//! - [`terminal`]: a line-based front-end for the registration forms
//!
//! Configuration is read from the environment, see [`config`].

pub mod config;
pub mod firebase;
pub mod firestore;
pub mod identity;
pub mod terminal;
