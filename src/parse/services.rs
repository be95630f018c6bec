use std::collections::BTreeMap;

/// Well-known service names accepted after `eq`/`range`, as printed by
/// IOS, NX-OS and ASA.
const BUILTIN: &[(&str, u16)] = &[
    ("bgp", 179),
    ("bootpc", 68),
    ("bootps", 67),
    ("chargen", 19),
    ("cmd", 514),
    ("daytime", 13),
    ("discard", 9),
    ("domain", 53),
    ("echo", 7),
    ("exec", 512),
    ("finger", 79),
    ("ftp", 21),
    ("ftp-data", 20),
    ("gopher", 70),
    ("hostname", 101),
    ("http", 80),
    ("https", 443),
    ("ident", 113),
    ("imap", 143),
    ("imap4", 143),
    ("irc", 194),
    ("isakmp", 500),
    ("kerberos", 88),
    ("klogin", 543),
    ("kshell", 544),
    ("ldap", 389),
    ("ldaps", 636),
    ("login", 513),
    ("lpd", 515),
    ("ms-sql-s", 1433),
    ("ms-wbt-server", 3389),
    ("mysql", 3306),
    ("netbios-dgm", 138),
    ("netbios-ns", 137),
    ("netbios-ss", 139),
    ("netbios-ssn", 139),
    ("nfs", 2049),
    ("nntp", 119),
    ("non500-isakmp", 4500),
    ("ntp", 123),
    ("pop2", 109),
    ("pop3", 110),
    ("radius", 1812),
    ("radius-acct", 1813),
    ("rip", 520),
    ("smtp", 25),
    ("snmp", 161),
    ("snmptrap", 162),
    ("sqlnet", 1521),
    ("ssh", 22),
    ("sunrpc", 111),
    ("syslog", 514),
    ("tacacs", 49),
    ("talk", 517),
    ("telnet", 23),
    ("tftp", 69),
    ("time", 37),
    ("uucp", 540),
    ("whois", 43),
    ("www", 80),
];

/// Service-name to port lookup: built-in names plus caller-supplied extras.
///
/// Extras shadow built-in names.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    extra: BTreeMap<String, u16>,
}

impl ServiceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add site-specific names (case-insensitive).
    #[must_use]
    pub fn with_extra<'a>(mut self, names: impl IntoIterator<Item = (&'a String, &'a u16)>) -> Self {
        for (name, port) in names {
            self.extra.insert(name.to_ascii_lowercase(), *port);
        }
        self
    }

    /// Resolve a port token: a decimal number in `0..=65535` or a known name.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<u16> {
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token.parse::<u16>().ok();
        }
        let lower = token.to_ascii_lowercase();
        if let Some(port) = self.extra.get(&lower) {
            return Some(*port);
        }
        BUILTIN
            .binary_search_by(|(name, _)| (*name).cmp(lower.as_str()))
            .ok()
            .map(|i| BUILTIN[i].1)
    }
}
