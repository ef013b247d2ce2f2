//! Logstash operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Logstash controller.

pub mod logstash;
pub mod references;

pub use logstash::*;
pub use references::*;
