use std::net::Ipv4Addr;

/// Configuration commands that may mention `permit`/`deny` but are not ACL
/// entries.
const EXCLUDED_PREFIXES: &[&str] = &[
    "ip access-list",
    "ip as-path access-list",
    "ip prefix-list",
    "ip community-list",
    "ipv6 access-list",
    "ipv6 prefix-list",
    "route-map",
    "remark",
    "logging",
    "certificate",
    "crypto",
    "interface",
    "router",
    "version",
    "hostname",
    "enable",
    "password",
    "username",
    "line ",
    "service ",
    "ntp ",
    "snmp",
    "tacacs",
    "radius",
    "no arp",
];

const PROTOCOLS: &[&str] = &[
    "ip", "tcp", "udp", "icmp", "igmp", "gre", "esp", "ahp", "eigrp", "ospf", "pim", "sctp",
    "nos", "pcp", "ipinip",
];

/// Whether a configuration line looks like an ACL entry.
///
/// Cheap prefilter ahead of full parsing: the line must carry `permit` or
/// `deny`, must not be a known non-ACL command, and must mention a protocol
/// keyword or an IPv4 address.
#[must_use]
pub fn is_acl_rule(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    let body = strip_sequence(&lower);
    if EXCLUDED_PREFIXES.iter().any(|p| body.starts_with(p)) {
        return false;
    }
    let mut words = body.split_whitespace();
    let has_action = words.clone().any(|w| w == "permit" || w == "deny");
    has_action && words.any(|w| PROTOCOLS.contains(&w) || w.split('/').next().is_some_and(is_ipv4))
}

fn strip_sequence(text: &str) -> &str {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && text[digits..].starts_with(char::is_whitespace) {
        text[digits..].trim_start()
    } else {
        text
    }
}

fn is_ipv4(word: &str) -> bool {
    word.parse::<Ipv4Addr>().is_ok()
}

/// One `ip access-list` definition and the ACL entries under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclBlock {
    /// Text after `ip access-list `, e.g. `extended WEB-IN`.
    pub name: String,
    pub header_row: u32,
    /// Last row belonging to the block (inclusive).
    pub end_row: u32,
    /// `(row, trimmed text)` of lines accepted by [`is_acl_rule`].
    pub lines: Vec<(u32, String)>,
}

impl AclBlock {
    #[must_use]
    pub fn contains_row(&self, row: u32) -> bool {
        (self.header_row..=self.end_row).contains(&row)
    }
}

/// Split one device column into ACL blocks.
///
/// Rows must be in ascending order. A header whose name mentions `vty` is a
/// login ACL: it closes the open block at the preceding row and nothing
/// after it is extracted.
pub fn extract_blocks<I, S>(lines: I) -> Vec<AclBlock>
where
    I: IntoIterator<Item = (u32, S)>,
    S: AsRef<str>,
{
    let mut blocks = Vec::new();
    let mut open: Option<AclBlock> = None;
    let mut last_row = 0;

    for (row, text) in lines {
        last_row = row;
        let text = text.as_ref().trim();
        if let Some(name) = header_name(text) {
            if let Some(mut block) = open.take() {
                block.end_row = row.saturating_sub(1).max(block.header_row);
                blocks.push(block);
            }
            if name.to_ascii_lowercase().contains("vty") {
                tracing::debug!(row, name, "login ACL reached, stopping block extraction");
                return blocks;
            }
            open = Some(AclBlock {
                name: name.to_owned(),
                header_row: row,
                end_row: row,
                lines: Vec::new(),
            });
        } else if let Some(block) = open.as_mut() {
            if is_acl_rule(text) {
                block.lines.push((row, text.to_owned()));
            }
        }
    }

    if let Some(mut block) = open {
        block.end_row = last_row;
        blocks.push(block);
    }
    blocks
}

fn header_name(text: &str) -> Option<&str> {
    const HEADER: &str = "ip access-list ";
    let head = text.get(..HEADER.len())?;
    if head.eq_ignore_ascii_case(HEADER) {
        Some(text[HEADER.len()..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rules_in_every_dialect() {
        assert!(is_acl_rule("10 permit tcp 10.0.0.0/24 10.0.1.0/24 eq 443"));
        assert!(is_acl_rule("permit ip host 10.1.1.1 any"));
        assert!(is_acl_rule("access-list OUT extended deny ip any 192.0.2.0 255.255.255.0"));
        assert!(is_acl_rule("  DENY UDP any any eq 53"));
    }

    #[test]
    fn rejects_non_rules() {
        assert!(!is_acl_rule("ip access-list extended WEB"));
        assert!(!is_acl_rule("10 remark permit web traffic"));
        assert!(!is_acl_rule("route-map RM permit 10"));
        assert!(!is_acl_rule("ip prefix-list PL seq 5 permit 10.0.0.0/8"));
        assert!(!is_acl_rule("permit"));
        assert!(!is_acl_rule("interface Ethernet1/1"));
        assert!(!is_acl_rule(""));
    }

    fn column(lines: &[&str]) -> Vec<(u32, String)> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| (i as u32 + 1, (*l).to_owned()))
            .collect()
    }

    #[test]
    fn splits_on_headers() {
        let col = column(&[
            "hostname core-1",
            "ip access-list WEB",
            "10 permit tcp any 10.0.1.0/24 eq 443",
            "20 remark permit legacy",
            "ip access-list DB",
            "10 permit tcp 10.0.1.0/24 10.0.2.0/24 eq 5432",
            "interface Ethernet1/1",
        ]);
        let blocks = extract_blocks(col);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "WEB");
        assert_eq!((blocks[0].header_row, blocks[0].end_row), (2, 4));
        assert_eq!(blocks[0].lines.len(), 1);
        assert_eq!(blocks[1].name, "DB");
        assert_eq!((blocks[1].header_row, blocks[1].end_row), (5, 7));
        assert_eq!(blocks[1].lines, vec![(6, "10 permit tcp 10.0.1.0/24 10.0.2.0/24 eq 5432".to_owned())]);
    }

    #[test]
    fn vty_header_stops_extraction() {
        let col = column(&[
            "ip access-list WEB",
            "permit ip any any",
            "ip access-list VTY-ACL-IP",
            "permit ip 10.0.0.0/8 any",
            "ip access-list LATER",
            "permit ip any any",
        ]);
        let blocks = extract_blocks(col);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end_row, 2);
        assert!(!blocks[0].contains_row(3));
    }

    #[test]
    fn lines_before_first_header_are_ignored() {
        let blocks = extract_blocks(column(&["permit ip any any", "version 9.3"]));
        assert!(blocks.is_empty());
    }
}
