// ABOUTME: API module containing all HTTP handler functions for the prism playground API.
// ABOUTME: Organized into sub-modules for agent listing and streamed chat runs.

pub mod agents;
pub mod chat;
