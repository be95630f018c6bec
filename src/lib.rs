//! Relationship analysis for firewall and router ACLs.
//!
//! Parses NX-OS, IOS-XE and ASA access-list lines into canonical [`Rule`]s,
//! relates them pairwise ([`covers`], [`equals`], [`reverse_matches`]),
//! groups redundant rules inside a block, classifies rules across sites and
//! device roles, and checks rule endpoints against observed live addresses.
//! Rows found redundant or stale can be turned into change scripts.

mod block;
mod classify;
mod config;
mod error;
mod group;
mod liveness;
mod parse;
mod predicate;
mod script;
#[cfg(feature = "binary-cache")]
mod snapshot;
mod types;

pub use block::{extract_blocks, is_acl_rule, AclBlock};
pub use classify::{
    classify_entries, classify_lines, classify_onto, is_local_noise, ClassificationReport,
    ClassifyOptions, CombinatorialLimitExceeded, LabelMap, Pass, PassOutcome,
    DEFAULT_COMBINATION_LIMIT,
};
pub use config::{ConfigError, EngineConfig};
pub use error::AclError;
pub use group::{group_block, group_rules, GroupingOptions};
pub use liveness::{
    ArpTable, ExemptPrefixes, LiveAddressSet, LivenessChecker, LivenessOptions, LivenessReport,
    LivenessSource,
};
pub use parse::{
    parse_line, ParseError, ParseErrorKind, ParseOptions, Parser, PortResolution, ServiceTable,
};
pub use predicate::{
    contributes_to, covers, covers_mirror, equals, joint_cover, jointly_covers, port_compatible,
    port_covers, proto_compatible, proto_covers, reverse_matches,
};
pub use script::{change_scripts, ChangeScripts};
#[cfg(feature = "binary-cache")]
pub use snapshot::{RestoreError, Snapshot, SnapshotError, FORMAT_VERSION};
pub use types::{
    Action, AmbiguousGroupingWarning, ClassificationLabel, DeviceRole, Dialect, GroupReport,
    Ipv4Net, LivenessVerdict, NetError, PortSpec, Protocol, Rule, RuleGroup, RuleId,
    ServiceWarning, SourceLine,
};
