mod error;
mod group_report;
mod label;
mod network;
mod origin;
mod port;
mod rule;
mod verdict;

pub use error::NetError;
pub use group_report::{AmbiguousGroupingWarning, GroupReport, RuleGroup, ServiceWarning};
pub use label::ClassificationLabel;
pub use network::Ipv4Net;
pub use origin::{DeviceRole, RuleId, SourceLine};
pub use port::PortSpec;
pub use rule::{Action, Dialect, Protocol, Rule};
pub use verdict::LivenessVerdict;
