use std::net::Ipv4Addr;

use winnow::combinator::{alt, opt, preceded, repeat};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::{Action, Dialect};

// -- Grammar table ----------------------------------------------------------

/// Endpoint shapes a grammar accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Form {
    /// `any`
    Any,
    /// `host A.B.C.D`
    Host,
    /// `A.B.C.D/N`
    Cidr,
    /// `A.B.C.D W.X.Y.Z` (wildcard, or netmask on ASA)
    Mask,
    /// `A.B.C.D`
    Bare,
}

/// One dialect grammar: the endpoint forms it accepts on each side.
#[derive(Debug)]
pub(crate) struct Grammar {
    pub(crate) dialect: Dialect,
    pub(crate) source: &'static [Form],
    pub(crate) destination: &'static [Form],
    /// ASA accepts a port number without a preceding `eq`.
    pub(crate) bare_ports: bool,
}

const MIXED: &[Form] = &[Form::Host, Form::Mask, Form::Cidr];
const IOSXE_ANY: &[Form] = &[Form::Any, Form::Host, Form::Mask];
const ASA: &[Form] = &[Form::Any, Form::Host, Form::Cidr, Form::Bare];

/// Tried in order; the first grammar that matches the whole line wins.
pub(crate) const GRAMMARS: &[Grammar] = &[
    Grammar {
        dialect: Dialect::Nxos,
        source: &[Form::Cidr],
        destination: &[Form::Cidr],
        bare_ports: false,
    },
    Grammar {
        dialect: Dialect::IosXe,
        source: &[Form::Mask],
        destination: &[Form::Mask],
        bare_ports: false,
    },
    Grammar {
        dialect: Dialect::IosXe,
        source: &[Form::Host],
        destination: &[Form::Host],
        bare_ports: false,
    },
    Grammar {
        dialect: Dialect::IosXe,
        source: MIXED,
        destination: MIXED,
        bare_ports: false,
    },
    Grammar {
        dialect: Dialect::IosXe,
        source: IOSXE_ANY,
        destination: IOSXE_ANY,
        bare_ports: false,
    },
    Grammar {
        dialect: Dialect::Asa,
        source: ASA,
        destination: ASA,
        bare_ports: true,
    },
];

// -- Parse output -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Any,
    Host(Ipv4Addr),
    Cidr(Ipv4Addr, u8),
    Mask(Ipv4Addr, Ipv4Addr),
    Bare(Ipv4Addr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PortClause<'i> {
    Eq(Vec<&'i str>),
    Range(&'i str, &'i str),
}

/// A matched line before addresses and services are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRule<'i> {
    pub(crate) action: Action,
    pub(crate) protocol: &'i str,
    pub(crate) source: Endpoint,
    pub(crate) src_ports: Option<PortClause<'i>>,
    pub(crate) destination: Endpoint,
    pub(crate) dst_ports: Option<PortClause<'i>>,
    pub(crate) dialect: Dialect,
}

// -- Words ------------------------------------------------------------------

/// Port operators with no port-set meaning here. A line using one in any
/// position does not match.
const UNSUPPORTED_OPERATORS: &[&str] = &["gt", "lt", "neq"];

/// Words that end a port list: endpoint keywords and trailing options.
const STOP_WORDS: &[&str] = &[
    "any",
    "host",
    "eq",
    "range",
    "gt",
    "lt",
    "neq",
    "log",
    "log-input",
    "time-range",
    "established",
    "dscp",
    "precedence",
    "tos",
    "ttl",
    "fragments",
    "option",
    "inactive",
    "ack",
    "fin",
    "psh",
    "rst",
    "syn",
    "urg",
];

/// Trailing options without an argument.
const FLAGS: &[&str] = &[
    "log",
    "log-input",
    "established",
    "fragments",
    "inactive",
    "ack",
    "fin",
    "psh",
    "rst",
    "syn",
    "urg",
];

/// Trailing options followed by one argument.
const VALUED: &[&str] = &["time-range", "dscp", "precedence", "tos", "option"];

const ICMP_TYPES: &[&str] = &[
    "administratively-prohibited",
    "echo",
    "echo-reply",
    "host-unreachable",
    "information-reply",
    "information-request",
    "mask-reply",
    "mask-request",
    "net-unreachable",
    "packet-too-big",
    "parameter-problem",
    "port-unreachable",
    "protocol-unreachable",
    "redirect",
    "router-advertisement",
    "router-solicitation",
    "source-quench",
    "time-exceeded",
    "timestamp-reply",
    "timestamp-request",
    "traceroute",
    "unreachable",
];

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

fn ws1(input: &mut &str) -> ModalResult<()> {
    take_while(1.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

fn word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| !c.is_ascii_whitespace()).parse_next(input)
}

fn kw<'i>(keyword: &'static str) -> impl FnMut(&mut &'i str) -> ModalResult<&'i str> {
    move |input: &mut &'i str| word.verify(|w: &str| w == keyword).parse_next(input)
}

fn digits<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    word.verify(|w: &str| w.bytes().all(|b| b.is_ascii_digit()))
        .parse_next(input)
}

fn port_token<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    word.verify(|w: &str| !w.contains(|c: char| c == '.' || c == '/') && !STOP_WORDS.contains(&w))
        .parse_next(input)
}

// -- Endpoints --------------------------------------------------------------

fn ipv4(input: &mut &str) -> ModalResult<Ipv4Addr> {
    word.try_map(|w: &str| w.parse::<Ipv4Addr>())
        .parse_next(input)
}

fn cidr(input: &mut &str) -> ModalResult<Endpoint> {
    word.verify_map(|w: &str| {
        let (addr, len) = w.split_once('/')?;
        Some(Endpoint::Cidr(addr.parse().ok()?, len.parse().ok()?))
    })
    .parse_next(input)
}

fn host(input: &mut &str) -> ModalResult<Endpoint> {
    preceded((kw("host"), ws1), ipv4)
        .map(Endpoint::Host)
        .parse_next(input)
}

fn mask_pair(input: &mut &str) -> ModalResult<Endpoint> {
    (ipv4, ws1, ipv4)
        .map(|(addr, _, mask)| Endpoint::Mask(addr, mask))
        .parse_next(input)
}

fn endpoint(input: &mut &str, forms: &[Form]) -> ModalResult<Endpoint> {
    for form in forms {
        let checkpoint = input.checkpoint();
        let parsed = match form {
            Form::Any => kw("any").value(Endpoint::Any).parse_next(input),
            Form::Host => host(input),
            Form::Cidr => cidr(input),
            Form::Mask => mask_pair(input),
            Form::Bare => ipv4.map(Endpoint::Bare).parse_next(input),
        };
        match parsed {
            Ok(endpoint) => return Ok(endpoint),
            Err(ErrMode::Backtrack(_)) => input.reset(&checkpoint),
            Err(e) => return Err(e),
        }
    }
    Err(ErrMode::from_input(input))
}

// -- Ports ------------------------------------------------------------------

fn unsupported_operator(input: &mut &str) -> ModalResult<()> {
    let checkpoint = input.checkpoint();
    if word
        .verify(|w: &str| UNSUPPORTED_OPERATORS.contains(&w))
        .parse_next(input)
        .is_ok()
    {
        return Err(ErrMode::from_input(input).cut());
    }
    input.reset(&checkpoint);
    Ok(())
}

fn port_clause<'i>(input: &mut &'i str, bare: bool) -> ModalResult<PortClause<'i>> {
    unsupported_operator(input)?;
    let checkpoint = input.checkpoint();
    if (kw("eq"), ws1).parse_next(input).is_ok() {
        let first = port_token.parse_next(input)?;
        let rest: Vec<&'i str> = repeat(0.., preceded(ws1, port_token)).parse_next(input)?;
        let mut tokens = Vec::with_capacity(rest.len() + 1);
        tokens.push(first);
        tokens.extend(rest);
        return Ok(PortClause::Eq(tokens));
    }
    input.reset(&checkpoint);
    if (kw("range"), ws1).parse_next(input).is_ok() {
        let (start, _, end) = (port_token, ws1, port_token).parse_next(input)?;
        return Ok(PortClause::Range(start, end));
    }
    input.reset(&checkpoint);
    if bare {
        return digits.map(|p| PortClause::Eq(vec![p])).parse_next(input);
    }
    Err(ErrMode::from_input(input))
}

fn optional_ports<'i>(input: &mut &'i str, bare: bool) -> ModalResult<Option<PortClause<'i>>> {
    let checkpoint = input.checkpoint();
    let attempt = ws1
        .parse_next(input)
        .and_then(|()| port_clause(input, bare));
    match attempt {
        Ok(clause) => Ok(Some(clause)),
        Err(ErrMode::Backtrack(_)) => {
            input.reset(&checkpoint);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// -- Trailing options -------------------------------------------------------

/// One trailing option: a flag, an option with its argument, an ICMP type
/// name, or an ICMP type/code number.
fn trailing_option(input: &mut &str) -> ModalResult<()> {
    unsupported_operator(input)?;
    let checkpoint = input.checkpoint();
    let option = word.parse_next(input)?;
    if FLAGS.contains(&option)
        || ICMP_TYPES.contains(&option)
        || option.bytes().all(|b| b.is_ascii_digit())
    {
        return Ok(());
    }
    if VALUED.contains(&option) {
        return preceded(ws1, word).void().parse_next(input);
    }
    if option == "ttl" {
        return (ws1, kw("eq"), ws1, digits).void().parse_next(input);
    }
    input.reset(&checkpoint);
    Err(ErrMode::from_input(input))
}

// -- Rule line --------------------------------------------------------------

fn header(input: &mut &str) -> ModalResult<()> {
    ws.parse_next(input)?;
    // "10 permit ..."
    opt((digits, ws1)).parse_next(input)?;
    // "access-list OUTSIDE extended permit ..."
    opt((kw("access-list"), ws1, word, ws1, opt((kw("extended"), ws1)))).parse_next(input)?;
    Ok(())
}

fn action(input: &mut &str) -> ModalResult<Action> {
    alt((
        kw("permit").value(Action::Permit),
        kw("deny").value(Action::Deny),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "permit or deny",
    )))
    .parse_next(input)
}

fn rule_line<'i>(input: &mut &'i str, grammar: &Grammar) -> ModalResult<RawRule<'i>> {
    header(input)?;
    let action = action(input)?;
    ws1(input)?;
    let protocol = word(input)?;
    ws1(input)?;
    let source = endpoint(input, grammar.source)?;
    let src_ports = optional_ports(input, grammar.bare_ports)?;
    ws1(input)?;
    let destination = endpoint(input, grammar.destination)?;
    let dst_ports = optional_ports(input, grammar.bare_ports)?;
    let _: () = repeat(0.., preceded(ws1, trailing_option)).parse_next(input)?;
    ws(input)?;
    Ok(RawRule {
        action,
        protocol,
        source,
        src_ports,
        destination,
        dst_ports,
        dialect: grammar.dialect,
    })
}

/// Match a lowercased line against each dialect grammar in order.
pub(crate) fn parse_raw(line: &str) -> Option<RawRule<'_>> {
    GRAMMARS.iter().find_map(|grammar| {
        let mut input = line;
        match rule_line(&mut input, grammar) {
            Ok(raw) if input.is_empty() => Some(raw),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn nxos_cidr_with_destination_port() {
        let raw = parse_raw("10 permit tcp 10.0.0.0/24 10.0.1.0/24 eq 443").unwrap();
        assert_eq!(raw.dialect, Dialect::Nxos);
        assert_eq!(raw.action, Action::Permit);
        assert_eq!(raw.protocol, "tcp");
        assert_eq!(raw.source, Endpoint::Cidr(ip("10.0.0.0"), 24));
        assert_eq!(raw.src_ports, None);
        assert_eq!(raw.dst_ports, Some(PortClause::Eq(vec!["443"])));
    }

    #[test]
    fn source_side_port_list() {
        let raw = parse_raw("permit tcp 10.0.0.0/24 eq 80 22222 10.0.1.0/24").unwrap();
        assert_eq!(raw.src_ports, Some(PortClause::Eq(vec!["80", "22222"])));
        assert_eq!(raw.destination, Endpoint::Cidr(ip("10.0.1.0"), 24));
        assert_eq!(raw.dst_ports, None);
    }

    #[test]
    fn iosxe_wildcard_pair() {
        let raw =
            parse_raw("20 deny udp 10.10.0.0 0.0.255.255 10.20.0.0 0.0.255.255 eq domain ntp log")
                .unwrap();
        assert_eq!(raw.dialect, Dialect::IosXe);
        assert_eq!(raw.action, Action::Deny);
        assert_eq!(raw.source, Endpoint::Mask(ip("10.10.0.0"), ip("0.0.255.255")));
        assert_eq!(raw.dst_ports, Some(PortClause::Eq(vec!["domain", "ntp"])));
    }

    #[test]
    fn iosxe_host_range() {
        let raw = parse_raw("permit tcp host 10.65.130.233 range 6446 6447 host 10.66.231.8")
            .unwrap();
        assert_eq!(raw.source, Endpoint::Host(ip("10.65.130.233")));
        assert_eq!(raw.src_ports, Some(PortClause::Range("6446", "6447")));
    }

    #[test]
    fn iosxe_mixed_host_and_wildcard() {
        let raw = parse_raw("permit udp host 10.65.16.53 eq domain 10.70.130.0 0.0.0.255 log")
            .unwrap();
        assert_eq!(raw.dialect, Dialect::IosXe);
        assert_eq!(raw.destination, Endpoint::Mask(ip("10.70.130.0"), ip("0.0.0.255")));
        assert_eq!(raw.src_ports, Some(PortClause::Eq(vec!["domain"])));
    }

    #[test]
    fn iosxe_any() {
        let raw = parse_raw("permit tcp any host 10.1.1.1 eq www").unwrap();
        assert_eq!(raw.dialect, Dialect::IosXe);
        assert_eq!(raw.source, Endpoint::Any);
    }

    #[test]
    fn asa_any_and_cidr() {
        let raw = parse_raw("permit ip any 10.0.0.0/8").unwrap();
        assert_eq!(raw.dialect, Dialect::Asa);
        assert_eq!(raw.destination, Endpoint::Cidr(ip("10.0.0.0"), 8));
    }

    #[test]
    fn asa_prefix_bare_hosts_and_bare_port() {
        let raw =
            parse_raw("access-list outside extended permit tcp 10.1.1.1 10.2.2.2 443").unwrap();
        assert_eq!(raw.dialect, Dialect::Asa);
        assert_eq!(raw.source, Endpoint::Bare(ip("10.1.1.1")));
        assert_eq!(raw.destination, Endpoint::Bare(ip("10.2.2.2")));
        assert_eq!(raw.dst_ports, Some(PortClause::Eq(vec!["443"])));
    }

    #[test]
    fn trailing_options_are_ignored() {
        let raw = parse_raw("permit tcp 10.0.0.0/24 10.0.1.0/24 eq 22 log time-range office")
            .unwrap();
        assert_eq!(raw.dst_ports, Some(PortClause::Eq(vec!["22"])));
    }

    #[test]
    fn unknown_trailing_words_do_not_match() {
        assert!(parse_raw("permit tcp 10.0.0.0/24 10.0.1.0/24 eq 22 whatever").is_none());
        assert!(parse_raw("permit tcp 10.0.0.0/24 10.0.1.0/24 time-range").is_none());
        assert!(parse_raw("permit icmp any any 3 4 log").is_some());
        assert!(parse_raw("permit tcp any any ttl eq 5 established").is_some());
    }

    #[test]
    fn comparison_operators_never_match() {
        assert!(parse_raw("deny tcp any host 10.1.1.1 neq 22").is_none());
        assert!(parse_raw("permit tcp any any gt 1023").is_none());
        assert!(parse_raw("permit tcp any lt 1024 any").is_none());
        assert!(parse_raw("permit tcp 10.0.0.0/24 10.0.1.0/24 eq 22 gt 1023").is_none());
        assert!(parse_raw("permit tcp any any ttl gt 5").is_none());

        let mut input = "neq 22";
        assert!(matches!(port_clause(&mut input, false), Err(ErrMode::Cut(_))));
    }

    #[test]
    fn non_acl_lines_do_not_match() {
        assert!(parse_raw("interface vlan10").is_none());
        assert!(parse_raw("10 remark allow web").is_none());
        assert!(parse_raw("permit tcp").is_none());
        assert!(parse_raw("").is_none());
    }

    #[test]
    fn eq_without_ports_is_not_a_port_clause() {
        let mut input = "eq any";
        assert!(port_clause(&mut input, false).is_err());

        let raw = parse_raw("permit icmp any any echo-reply").unwrap();
        assert_eq!(raw.src_ports, None);
        assert_eq!(raw.dst_ports, None);
        assert_eq!(raw.destination, Endpoint::Any);
    }
}
