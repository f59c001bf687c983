//! Robots-policy compliance: parser, HTTP fetcher, and the gate that
//! decides whether a job may touch its target at all.

mod fetcher;
mod gate;
mod robots;

pub use fetcher::HttpRobotsFetcher;
pub use gate::{robots_url, ComplianceGate, GateDecision};
pub use robots::RobotsTxt;
