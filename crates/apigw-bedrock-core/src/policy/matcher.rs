// Matching primitives for policy evaluation: IAM wildcards and IP ranges.

use regex::RegexBuilder;
use std::net::IpAddr;

/// IAM wildcard match: `*` matches any run of characters (including `/`),
/// `?` matches exactly one.
pub fn wildcard_match(pattern: &str, value: &str, case_insensitive: bool) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return if case_insensitive {
            pattern.eq_ignore_ascii_case(value)
        } else {
            pattern == value
        };
    }

    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// A single address or CIDR block as used in `aws:SourceIp` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix_len: u8,
}

impl IpRange {
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        let (addr, prefix) = match value.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (value, None),
        };
        let network: IpAddr = addr
            .parse()
            .map_err(|_| format!("'{}' is not an IP address or CIDR block", value))?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix {
            Some(prefix) => prefix
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| format!("'{}' has an invalid prefix length", value))?,
            None => max,
        };
        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_u32(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

fn prefix_mask_u128(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*", "anything", false));
        assert!(wildcard_match(
            "execute-api:/*/*/*",
            "execute-api:/v1/POST/bedrock",
            false
        ));
        assert!(wildcard_match(
            "arn:aws:s3:::bucket/*",
            "arn:aws:s3:::bucket/a/b.png",
            false
        ));
        assert!(!wildcard_match(
            "arn:aws:s3:::bucket/*",
            "arn:aws:s3:::bucket",
            false
        ));
        assert!(!wildcard_match(
            "arn:aws:s3:::bucket/*",
            "arn:aws:s3:::bucket-other/a",
            false
        ));
        assert!(wildcard_match("s3:?etObject", "s3:GetObject", false));
        assert!(wildcard_match("S3:getobject", "s3:GetObject", true));
        assert!(!wildcard_match("S3:getobject", "s3:GetObject", false));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(wildcard_match("a.b", "a.b", false));
        assert!(!wildcard_match("a.b*", "axb", false));
        assert!(wildcard_match("(x)+*", "(x)+y", false));
    }

    #[test]
    fn test_single_address_range() {
        let range = IpRange::parse("203.0.113.5").unwrap();
        assert!(range.contains("203.0.113.5".parse().unwrap()));
        assert!(!range.contains("203.0.113.6".parse().unwrap()));
        assert!(!range.contains("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_ranges() {
        let v4 = IpRange::parse("198.51.100.0/24").unwrap();
        assert!(v4.contains("198.51.100.9".parse().unwrap()));
        assert!(!v4.contains("198.51.101.9".parse().unwrap()));

        let all = IpRange::parse("0.0.0.0/0").unwrap();
        assert!(all.contains("8.8.8.8".parse().unwrap()));

        let v6 = IpRange::parse("2001:db8::/32").unwrap();
        assert!(v6.contains("2001:db8:ffff::1".parse().unwrap()));
        assert!(!v6.contains("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(IpRange::parse("203.0.113.5/33").is_err());
        assert!(IpRange::parse("laptop").is_err());
        assert!(IpRange::parse("10.0.0.0/x").is_err());
    }
}
