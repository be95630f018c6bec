//! Pairwise relationships between rules.
//!
//! All predicates are pure and total. `Any` ports accept everything; a
//! single port accepts only itself; a port set is compared as a set.
//!
//! - [`covers`] is a preorder: reflexive and transitive.
//! - [`equals`] and [`reverse_matches`] are symmetric.

use std::collections::BTreeSet;

use crate::{PortSpec, Protocol, Rule};

// -- Protocol ---------------------------------------------------------------

/// `ip` covers every protocol; otherwise protocols must be equal.
#[must_use]
pub fn proto_covers(a: &Protocol, b: &Protocol) -> bool {
    a.is_ip() || a == b
}

/// Either side is `ip`, or both are equal.
#[must_use]
pub fn proto_compatible(a: &Protocol, b: &Protocol) -> bool {
    a.is_ip() || b.is_ip() || a == b
}

// -- Ports ------------------------------------------------------------------

/// Whether constraint `a` accepts every port `b` accepts.
///
/// A single port never covers a multi-port set, and nothing narrower than
/// `Any` covers `Any`.
#[must_use]
pub fn port_covers(a: &PortSpec, b: &PortSpec) -> bool {
    match (a, b) {
        (PortSpec::Any, _) => true,
        (_, PortSpec::Any) => false,
        (PortSpec::Single(p), PortSpec::Single(q)) => p == q,
        (PortSpec::Single(_), PortSpec::Set(_)) => false,
        (PortSpec::Set(set), PortSpec::Single(q)) => set.contains(q),
        (PortSpec::Set(outer), PortSpec::Set(inner)) => inner.is_subset(outer),
    }
}

/// Symmetric port match used by [`reverse_matches`]: `Any` matches anything,
/// a single port matches itself or a set containing it, sets must be equal.
#[must_use]
pub fn port_compatible(a: &PortSpec, b: &PortSpec) -> bool {
    match (a, b) {
        (PortSpec::Any, _) | (_, PortSpec::Any) => true,
        (PortSpec::Single(p), PortSpec::Single(q)) => p == q,
        (PortSpec::Single(p), PortSpec::Set(set)) | (PortSpec::Set(set), PortSpec::Single(p)) => {
            set.contains(p)
        }
        (PortSpec::Set(x), PortSpec::Set(y)) => x == y,
    }
}

// -- Rule predicates --------------------------------------------------------

/// `a` matches every packet `b` matches.
#[must_use]
pub fn covers(a: &Rule, b: &Rule) -> bool {
    a.action() == b.action()
        && proto_covers(a.protocol(), b.protocol())
        && port_covers(a.src_service(), b.src_service())
        && port_covers(a.dst_service(), b.dst_service())
        && b.source().subnet_of(a.source())
        && b.destination().subnet_of(a.destination())
}

/// Same action, compatible protocol, identical ports, overlapping networks.
#[must_use]
pub fn equals(a: &Rule, b: &Rule) -> bool {
    a.action() == b.action()
        && proto_compatible(a.protocol(), b.protocol())
        && a.src_service() == b.src_service()
        && a.dst_service() == b.dst_service()
        && a.source().overlaps(b.source())
        && a.destination().overlaps(b.destination())
}

/// `b` is the return path of `a`: a's destination relates to b's source and
/// a's source to b's destination, with port roles swapped.
#[must_use]
pub fn reverse_matches(a: &Rule, b: &Rule) -> bool {
    a.action() == b.action()
        && proto_compatible(a.protocol(), b.protocol())
        && port_compatible(a.dst_service(), b.src_service())
        && port_compatible(a.src_service(), b.dst_service())
        && a.source().overlaps(b.destination())
        && a.destination().overlaps(b.source())
}

/// `cover` covers the return path of `x`.
#[must_use]
pub fn covers_mirror(cover: &Rule, x: &Rule) -> bool {
    covers(cover, &x.mirrored())
}

// -- Joint cover ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Destination,
}

fn side(rule: &Rule, side: Side) -> &PortSpec {
    match side {
        Side::Source => rule.src_service(),
        Side::Destination => rule.dst_service(),
    }
}

fn other(s: Side) -> Side {
    match s {
        Side::Source => Side::Destination,
        Side::Destination => Side::Source,
    }
}

/// `c` covers `target` except on `s`, where it declares a subset of the
/// target's explicit ports.
fn contributes_on(c: &Rule, target: &Rule, s: Side) -> bool {
    let PortSpec::Set(wanted) = side(target, s) else {
        return false;
    };
    let Some(offered) = side(c, s).ports() else {
        return false;
    };
    c.action() == target.action()
        && proto_covers(c.protocol(), target.protocol())
        && port_covers(side(c, other(s)), side(target, other(s)))
        && target.source().subnet_of(c.source())
        && target.destination().subnet_of(c.destination())
        && offered.is_subset(wanted)
}

/// Whether `c` can take part in a joint cover of `target`.
#[must_use]
pub fn contributes_to(c: &Rule, target: &Rule) -> bool {
    contributes_on(c, target, Side::Source) || contributes_on(c, target, Side::Destination)
}

/// Indices of `candidates` whose ports together cover every port of a
/// multi-port `target` on one side, the other side being covered by each
/// of them.
///
/// Returns `None` when no side can be covered this way.
#[must_use]
pub fn joint_cover(candidates: &[&Rule], target: &Rule) -> Option<Vec<usize>> {
    for s in [Side::Destination, Side::Source] {
        let PortSpec::Set(wanted) = side(target, s) else {
            continue;
        };
        let mut union = BTreeSet::new();
        let mut contributors = Vec::new();
        for (i, c) in candidates.iter().enumerate() {
            if contributes_on(c, target, s) {
                if let Some(ports) = side(c, s).ports() {
                    union.extend(ports);
                }
                contributors.push(i);
            }
        }
        if !contributors.is_empty() && wanted.is_subset(&union) {
            return Some(contributors);
        }
    }
    None
}

/// Several narrower rules together cover `target`.
#[must_use]
pub fn jointly_covers(candidates: &[&Rule], target: &Rule) -> bool {
    joint_cover(candidates, target).is_some()
}
