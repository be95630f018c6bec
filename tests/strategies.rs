use std::net::Ipv4Addr;

use aclrel::{Action, DeviceRole, Ipv4Net, PortSpec, Rule, RuleId};
use proptest::prelude::*;

// --- Fixed universe ---
// Addresses are drawn from a handful of 10.x.y.0 seeds so that random
// networks overlap and nest often enough to exercise every predicate.

const PORTS: &[u16] = &[22, 53, 80, 443, 8080];
const PROTOCOLS: &[&str] = &["ip", "tcp", "udp"];
const PREFIXES: &[u8] = &[0, 8, 12, 16, 20, 24, 28, 32];
pub const SITES: &[&str] = &["east", "west"];

/// Generate a network inside (or equal to) `0.0.0.0/0` near `10.0.0.0/8`.
pub fn arb_net() -> impl Strategy<Value = Ipv4Net> {
    (
        0_u8..4,
        0_u8..4,
        prop::sample::select(&[0_u8, 64, 128, 200][..]),
        prop::sample::select(PREFIXES),
    )
        .prop_map(|(b, c, d, prefix)| {
            Ipv4Net::new(Ipv4Addr::new(10, b, c, d), prefix).expect("prefix within 0..=32")
        })
}

/// Generate a port constraint: `Any`, one port, or a set of two or three.
pub fn arb_ports() -> impl Strategy<Value = PortSpec> {
    prop_oneof![
        2 => Just(PortSpec::Any),
        2 => prop::sample::select(PORTS).prop_map(PortSpec::Single),
        1 => prop::sample::subsequence(PORTS, 2..=3).prop_map(PortSpec::from_ports),
    ]
}

pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![4 => Just(Action::Permit), 1 => Just(Action::Deny)]
}

/// Generate a rule over the fixed universe.
pub fn arb_rule() -> impl Strategy<Value = Rule> {
    (
        arb_action(),
        prop::sample::select(PROTOCOLS),
        arb_net(),
        arb_net(),
        arb_ports(),
        arb_ports(),
    )
        .prop_map(|(action, protocol, source, destination, sport, dport)| {
            Rule::new(action, protocol, source, destination)
                .with_source_ports(sport)
                .with_destination_ports(dport)
        })
}

/// Widen a network by `shorten` prefix bits.
pub fn widen_net(net: &Ipv4Net, shorten: u8) -> Ipv4Net {
    let prefix = net.prefix_len().saturating_sub(shorten);
    Ipv4Net::new(net.network(), prefix).expect("shorter prefix is valid")
}

/// Widen a port constraint: 0 keeps it, 1 drops it, 2 adds `extra`.
pub fn widen_ports(ports: &PortSpec, how: u8, extra: u16) -> PortSpec {
    match how {
        0 => ports.clone(),
        1 => PortSpec::Any,
        _ => ports.ports().map_or(PortSpec::Any, |mut set| {
            set.insert(extra);
            PortSpec::from_ports(set)
        }),
    }
}

/// Generate a rule that covers `rule` by construction.
pub fn arb_wider(rule: Rule) -> impl Strategy<Value = Rule> {
    (
        0_u8..=8,
        0_u8..=8,
        any::<bool>(),
        0_u8..3,
        0_u8..3,
        prop::sample::select(PORTS),
    )
        .prop_map(move |(src_by, dst_by, to_ip, sport_how, dport_how, extra)| {
            let protocol = if to_ip { "ip" } else { rule.protocol().as_str() };
            Rule::new(
                rule.action(),
                protocol,
                widen_net(rule.source(), src_by),
                widen_net(rule.destination(), dst_by),
            )
            .with_source_ports(widen_ports(rule.src_service(), sport_how, extra))
            .with_destination_ports(widen_ports(rule.dst_service(), dport_how, extra))
        })
}

/// Generate `rule`, a rule covering it and a rule covering that one.
pub fn arb_cover_chain() -> impl Strategy<Value = (Rule, Rule, Rule)> {
    arb_rule().prop_flat_map(|narrow| {
        arb_wider(narrow.clone()).prop_flat_map(move |middle| {
            let narrow = narrow.clone();
            arb_wider(middle.clone()).prop_map(move |wide| (wide, middle.clone(), narrow.clone()))
        })
    })
}

/// Generate an ACL block body: 0..=10 rules on ascending rows.
pub fn arb_block_rules() -> impl Strategy<Value = Vec<(u32, Rule)>> {
    prop::collection::vec(arb_rule(), 0..=10).prop_map(|rules| {
        rules
            .into_iter()
            .enumerate()
            .map(|(i, rule)| (u32::try_from(i).expect("small index") + 1, rule))
            .collect()
    })
}

fn arb_role() -> impl Strategy<Value = DeviceRole> {
    prop_oneof![
        Just(DeviceRole::Core),
        Just(DeviceRole::Access),
        Just(DeviceRole::OutOfBand),
    ]
}

/// Generate classifier input: 0..=12 rules spread over the two sites,
/// each with a distinct row.
pub fn arb_entries() -> impl Strategy<Value = Vec<(RuleId, Rule)>> {
    prop::collection::vec(
        (prop::sample::select(SITES), arb_role(), 1_u32..=3, arb_rule()),
        0..=12,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (site, role, column, rule))| {
                let row = u32::try_from(i).expect("small index") + 1;
                (RuleId::new(site, role, column, row), rule)
            })
            .collect()
    })
}

/// Generate a configuration column mixing ACL headers, entries and noise.
pub fn arb_config_column() -> impl Strategy<Value = Vec<(u32, String)>> {
    let line = prop_oneof![
        1 => prop::sample::select(&["A", "B", "extended WEB", "VTY-IN"][..])
            .prop_map(|name| format!("ip access-list {name}")),
        4 => arb_rule().prop_map(|rule| rule.to_string()),
        1 => Just("hostname edge-1".to_owned()),
        1 => Just(" remark permit all".to_owned()),
    ];
    prop::collection::vec(line, 0..=20).prop_map(|lines| {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| (u32::try_from(i).expect("small index") + 1, text))
            .collect()
    })
}
