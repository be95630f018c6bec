//! Change scripts for removing ACL entries and putting them back.
//!
//! Rows usually come from [`GroupReport::recycle_rows`](crate::GroupReport::recycle_rows)
//! or [`LivenessReport::stale_rows`](crate::LivenessReport::stale_rows) for
//! one device column, and are matched against that column's [`AclBlock`]s.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::AclBlock;

/// Remediation and rollback text for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeScripts {
    /// `no <seq>` per entry (or `no <entry>` when it has no sequence number).
    pub remediation: String,
    /// The original entries, re-added under the same headers.
    pub rollback: String,
    /// Entries written to each script.
    pub entries: usize,
}

impl ChangeScripts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Build both scripts for the entries of `blocks` found at `rows`.
///
/// Each block with at least one selected entry contributes an
/// `ip access-list NAME` header followed by its entries in row order, then a
/// blank line. A non-empty `device` is written first as `#####device#####`.
/// Rows outside every block are ignored.
#[must_use]
pub fn change_scripts(device: &str, blocks: &[AclBlock], rows: &[u32]) -> ChangeScripts {
    let wanted: BTreeSet<u32> = rows.iter().copied().collect();
    let mut scripts = ChangeScripts::default();
    if !device.is_empty() {
        let banner = format!("#####{device}#####\n");
        scripts.remediation.push_str(&banner);
        scripts.rollback.push_str(&banner);
    }

    for block in blocks {
        let selected: Vec<&str> = block
            .lines
            .iter()
            .filter(|(row, _)| wanted.contains(row))
            .map(|(_, text)| text.as_str())
            .collect();
        if selected.is_empty() {
            continue;
        }
        let header = format!("ip access-list {}\n", block.name);
        scripts.remediation.push_str(&header);
        scripts.rollback.push_str(&header);
        for text in &selected {
            // Writing into a String cannot fail.
            let _ = match sequence_number(text) {
                Some(seq) => writeln!(scripts.remediation, " no {seq}"),
                None => writeln!(scripts.remediation, " no {text}"),
            };
            let _ = writeln!(scripts.rollback, " {text}");
        }
        scripts.remediation.push('\n');
        scripts.rollback.push('\n');
        scripts.entries += selected.len();
    }

    let matched = scripts.entries;
    if matched < wanted.len() {
        tracing::debug!(device, requested = wanted.len(), matched, "rows outside every ACL block");
    }
    scripts
}

/// Leading sequence number of an entry, e.g. `20` in `20 permit ip any any`.
fn sequence_number(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    let rest = &text[digits..];
    (digits > 0 && rest.starts_with(char::is_whitespace)).then(|| &text[..digits])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract_blocks;

    fn blocks() -> Vec<AclBlock> {
        extract_blocks([
            (1, "ip access-list extended WEB-IN"),
            (2, " 10 permit tcp 10.0.0.0/24 10.0.1.0/24 eq 443"),
            (3, " 20 permit tcp 10.0.0.0/25 10.0.1.0/24 eq 443"),
            (4, "ip access-list MGMT"),
            (5, " permit udp any any eq 161"),
            (6, " 30 deny ip any any"),
        ])
    }

    #[test]
    fn sequence_numbers() {
        assert_eq!(sequence_number("20 permit ip any any"), Some("20"));
        assert_eq!(sequence_number("permit ip any any"), None);
        assert_eq!(sequence_number("20"), None);
    }

    #[test]
    fn scripts_follow_block_headers() {
        let scripts = change_scripts("core-01", &blocks(), &[3, 5, 99]);
        assert_eq!(scripts.entries, 2);
        assert_eq!(
            scripts.remediation,
            "#####core-01#####\n\
             ip access-list extended WEB-IN\n no 20\n\n\
             ip access-list MGMT\n no permit udp any any eq 161\n\n"
        );
        assert_eq!(
            scripts.rollback,
            "#####core-01#####\n\
             ip access-list extended WEB-IN\n 20 permit tcp 10.0.0.0/25 10.0.1.0/24 eq 443\n\n\
             ip access-list MGMT\n permit udp any any eq 161\n\n"
        );
    }

    #[test]
    fn nothing_selected() {
        let scripts = change_scripts("", &blocks(), &[1, 4]);
        assert!(scripts.is_empty());
        assert_eq!(scripts, ChangeScripts::default());
    }
}
