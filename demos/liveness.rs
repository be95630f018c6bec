use aclrel::{parse_line, DeviceRole, EngineConfig, LiveAddressSet, LivenessChecker, RuleId};

const ARP: &str = "\
Protocol  Address          Age (min)  Hardware Addr   Type   Interface
Internet  10.20.1.15             12   0050.56a1.0f01  ARPA   Vlan201
Internet  10.20.2.40              3   0050.56a1.0f02  ARPA   Vlan202
Internet  10.20.3.9               -   Incomplete      ARPA
";

fn main() {
    let config = EngineConfig::from_json(r#"{ "exempt_prefixes": ["192.0.2."] }"#)
        .expect("invalid demo configuration");
    let live = LiveAddressSet::from(config.arp_table(ARP));
    let checker = LivenessChecker::new(live, config.liveness_options());

    let entries: Vec<_> = [
        "permit tcp 10.20.1.0/24 10.20.2.0/24 eq 22",
        "permit tcp 10.20.3.0/24 10.20.2.0/24 eq 22",
        "permit udp any 192.0.2.0/24 eq 514",
    ]
    .iter()
    .zip(1..)
    .map(|(line, row)| {
        let rule = parse_line(line).expect("demo rule should parse");
        (RuleId::new("east", DeviceRole::Core, 1, row), rule)
    })
    .collect();

    let report = checker.check_entries(&entries);
    println!("{report}");
    for (id, verdict) in report.verdicts() {
        println!("  {id}: {verdict}");
    }
}
