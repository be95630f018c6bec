use aclrel::{classify_lines, DeviceRole, EngineConfig, SourceLine};

const CONFIG: &str = r#"{
    "sites": {
        "east": ["10.1.0.0/16"],
        "west": ["10.2.0.0/16"]
    },
    "special": { "monitoring": ["172.16.0.0/16"] },
    "services": { "corp-app": 7443 }
}"#;

fn main() {
    let config = EngineConfig::from_json(CONFIG).expect("invalid demo configuration");
    let parser = config.parser();

    let lines = vec![
        SourceLine::new("east", DeviceRole::Core, 1, 10, "permit tcp 10.1.0.0/16 10.2.0.0/16"),
        SourceLine::new("east", DeviceRole::Access, 2, 20, "permit tcp 10.1.0.0/16 10.2.0.0/16 eq corp-app"),
        SourceLine::new("east", DeviceRole::Access, 2, 21, "permit udp 10.1.0.0/16 172.16.0.0/16 eq snmp"),
        SourceLine::new("west", DeviceRole::Core, 1, 30, "permit tcp 10.2.0.0/16 10.1.0.0/16"),
        SourceLine::new("west", DeviceRole::Access, 2, 40, "permit tcp 10.2.0.0/16 eq corp-app 10.1.0.0/16"),
    ];

    let report = classify_lines(&lines, &parser, &config.classify_options());
    println!("{report}");
    for (id, label) in report.labels() {
        println!("  {id}: {label}");
    }
    for cut in report.truncations() {
        println!("  {cut}");
    }
}
