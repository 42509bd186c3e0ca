//! Scenario tests that drive the whole stack: services over the sync
//! coordinator over a real local store, with an in-process remote replica.
//!
//! Each scenario runs against every local store engine via `rstest` cases.
