// ABOUTME: API handler modules for the agentdock HTTP server.
// ABOUTME: Split by resource: apps, sessions, and the SSE event stream.

pub mod apps;
pub mod sessions;
pub mod stream;
