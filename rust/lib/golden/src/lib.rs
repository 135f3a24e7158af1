//! Golden tests for the LabTrack client.
//!
//! Run the client against a real HTTP server (see [`backend`]) and pin down
//! how it refreshes tokens, recovers from 401s and tracks the session.

pub mod backend;

mod auth_flow;
mod inventory;
