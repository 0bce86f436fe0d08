//! HTTP surface of the pipeline. The `newsradar` binary wires this router
//! to the real stores and models; tests drive it with in-memory fakes.

pub mod http;
