use std::cell::Cell;
use std::net::Ipv4Addr;

use aclrel::{
    parse_line, ArpTable, DeviceRole, EngineConfig, ExemptPrefixes, Ipv4Net, LiveAddressSet,
    LivenessChecker, LivenessOptions, LivenessSource, LivenessVerdict, RuleId,
};

const ARP: &str = "\
Protocol  Address          Age (min)  Hardware Addr   Type   Interface
Internet  10.20.1.15             12   0050.56a1.0f01  ARPA   Vlan201
Internet  10.20.2.40              3   0050.56a1.0f02  ARPA   Vlan202
Internet  10.20.3.9               -   Incomplete      ARPA
Internet  10.30.108.4             0   0050.56a1.0f04  ARPA   Vlan108
";

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

/// Answers from a fixed list of networks and counts queries.
struct CountingSource {
    live: Vec<Ipv4Net>,
    queries: Cell<usize>,
}

impl LivenessSource for CountingSource {
    fn is_live_within(&self, query: &Ipv4Net) -> bool {
        self.queries.set(self.queries.get() + 1);
        self.live.iter().any(|n| n.overlaps(query))
    }
}

#[test]
fn destination_without_live_hosts_is_stale() {
    let live: LiveAddressSet = ArpTable::parse(ARP).into();
    let checker = LivenessChecker::new(live, LivenessOptions::default());
    let rule = parse_line("permit tcp 10.20.1.0/24 198.51.100.0/24 eq 443").unwrap();
    assert_eq!(
        checker.check(&rule),
        LivenessVerdict::StaleDestination {
            address: net("198.51.100.0/24")
        }
    );
}

#[test]
fn exempt_prefix_wins_over_stale() {
    let options = LivenessOptions {
        exempt: ExemptPrefixes::new(["198.51.100."]),
        scope: None,
    };
    let checker = LivenessChecker::new(LiveAddressSet::from(ArpTable::parse(ARP)), options);
    let rule = parse_line("permit tcp 10.20.1.0/24 198.51.100.0/24 eq 443").unwrap();
    assert_eq!(checker.check(&rule), LivenessVerdict::Confirmed);

    let rule = parse_line("permit tcp 10.99.0.0/16 198.51.100.0/24 eq 443").unwrap();
    assert_eq!(
        checker.check(&rule),
        LivenessVerdict::StaleSource {
            address: net("10.99.0.0/16")
        }
    );
}

#[test]
fn incomplete_and_ignored_arp_entries_are_not_live() {
    let config = EngineConfig::from_json(r#"{ "arp_ignore_third_octet": [108] }"#).unwrap();
    let table = config.arp_table(ARP);
    assert_eq!(table.addresses().len(), 2);
    assert_eq!(table.incomplete(), 1);
    assert_eq!(table.ignored(), 1);

    let checker = LivenessChecker::new(LiveAddressSet::from(table), config.liveness_options());
    let rule = parse_line("permit ip host 10.20.3.9 host 10.30.108.4").unwrap();
    assert!(matches!(checker.check(&rule), LivenessVerdict::StaleBoth { .. }));
}

#[test]
fn custom_source_is_not_queried_for_any_or_exempt_sides() {
    let source = CountingSource {
        live: vec![net("10.20.0.0/16")],
        queries: Cell::new(0),
    };
    let options = LivenessOptions {
        exempt: ExemptPrefixes::new(["192.0.2."]),
        scope: None,
    };
    let checker = LivenessChecker::new(&source, options);

    let rule = parse_line("permit ip any 192.0.2.0/24").unwrap();
    assert_eq!(checker.check(&rule), LivenessVerdict::Exempt);
    assert_eq!(source.queries.get(), 0);

    let rule = parse_line("permit ip 10.20.5.0/24 any").unwrap();
    assert_eq!(checker.check(&rule), LivenessVerdict::Confirmed);
    assert_eq!(source.queries.get(), 1);
}

#[test]
fn entries_report_by_row() {
    let live: LiveAddressSet = ["10.20.1.15", "10.20.2.40"]
        .iter()
        .map(|a| a.parse::<Ipv4Addr>().unwrap())
        .collect();
    let checker = LivenessChecker::new(live, LivenessOptions::default());
    let entries = vec![
        (
            RuleId::new("east", DeviceRole::Core, 1, 5),
            parse_line("permit tcp 10.20.1.0/24 10.20.2.0/24 eq 22").unwrap(),
        ),
        (
            RuleId::new("east", DeviceRole::Core, 1, 6),
            parse_line("permit tcp 10.20.1.0/24 10.40.0.0/16 eq 22").unwrap(),
        ),
        (
            RuleId::new("east", DeviceRole::Core, 2, 6),
            parse_line("permit tcp 10.20.1.0/24 10.40.0.0/16 eq 22").unwrap(),
        ),
    ];
    let report = checker.check_entries(&entries);
    assert_eq!(report.confirmed_count(), 1);
    assert_eq!(report.stale_count(), 2);

    let by_row = report.verdicts_by_row();
    assert_eq!(by_row.len(), 2);
    assert_eq!(by_row[&("east".to_owned(), 1)][&5], LivenessVerdict::Confirmed);
    assert_eq!(
        by_row[&("east".to_owned(), 2)][&6].stale_networks(),
        vec![net("10.40.0.0/16")]
    );
}
