use liveroute_model::Hop;

/// Parses raw tracer output into hops, one per line that carries an IPv4
/// address. Order follows the text; repeated addresses are kept.
pub fn parse_hops(text: &str) -> Vec<Hop> {
    let mut hops = Vec::new();
    let mut last_ttl: Option<u32> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_header(line) {
            continue;
        }

        if let Some(mut hop) = parse_hop_line(line) {
            match hop.ttl {
                Some(ttl) => last_ttl = Some(ttl),
                None => hop.ttl = last_ttl,
            }
            hops.push(hop);
        }
    }

    hops
}

/// Parses a single hop line. Returns `None` when the line has no dotted-quad
/// address, e.g. `* * *` or `Request timed out.`.
pub fn parse_hop_line(line: &str) -> Option<Hop> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let first = *tokens.first()?;

    let (ttl, rest) = match first.parse::<u32>() {
        Ok(ttl) => (Some(ttl), &tokens[1..]),
        Err(_) => (None, &tokens[..]),
    };

    let mut ip: Option<String> = None;
    let mut rtt_ms: Vec<f64> = Vec::new();

    let mut i = 0;
    while i < rest.len() {
        let tok = rest[i];

        if tok == "*" || tok.starts_with('!') {
            i += 1;
            continue;
        }

        let bare = strip_brackets(tok);
        if is_ipv4(bare) {
            if ip.is_none() {
                ip = Some(bare.to_string());
            }
            i += 1;
            continue;
        }

        let next = rest.get(i + 1).copied();
        if let Some((val, consumed_next)) = parse_rtt(tok, next) {
            rtt_ms.push(val);
            i += if consumed_next { 2 } else { 1 };
            continue;
        }

        i += 1;
    }

    ip.map(|ip| Hop { ttl, ip, rtt_ms })
}

fn is_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("traceroute")
        || lower.starts_with("tracing route")
        || lower.starts_with("over a maximum")
        || lower.starts_with("trace complete")
}

fn strip_brackets(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | ','))
}

fn is_ipv4(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 4 {
        return false;
    }

    parts.iter().all(|part| {
        !part.is_empty()
            && part.len() <= 3
            && part.chars().all(|c| c.is_ascii_digit())
            && part.parse::<u8>().is_ok()
    })
}

fn parse_rtt(token: &str, next: Option<&str>) -> Option<(f64, bool)> {
    // tracert reports sub-millisecond probes as "<1 ms"
    let token = token.strip_prefix('<').unwrap_or(token);

    if let Some(num) = token.strip_suffix("ms") {
        if let Ok(val) = num.parse::<f64>() {
            return Some((val, false));
        }
    }

    if let Ok(val) = token.parse::<f64>() {
        if matches!(next, Some(next_tok) if next_tok.starts_with("ms")) {
            return Some((val, true));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_lines_yield_no_hop() {
        assert!(parse_hop_line(" 4  * * *").is_none());
        assert!(parse_hop_line("  5     *        *        *     Request timed out.").is_none());
        assert!(parse_hop_line("Request timed out").is_none());
    }

    #[test]
    fn first_address_wins_and_all_timings_are_kept() {
        let hop = parse_hop_line("3  10.0.0.2  7.1 ms 10.0.0.3  7.4 ms  8ms").unwrap();
        assert_eq!(hop.ttl, Some(3));
        assert_eq!(hop.ip, "10.0.0.2");
        assert_eq!(hop.rtt_ms, vec![7.1, 7.4, 8.0]);
    }

    #[test]
    fn tracert_line_with_bracketed_address() {
        let hop = parse_hop_line("  2    <1 ms     1 ms    12 ms  gw.example.net [172.16.0.1]").unwrap();
        assert_eq!(hop.ttl, Some(2));
        assert_eq!(hop.ip, "172.16.0.1");
        assert_eq!(hop.rtt_ms, vec![1.0, 1.0, 12.0]);
    }

    #[test]
    fn rejects_out_of_range_octets() {
        assert!(parse_hop_line("1  300.1.1.1  1.0 ms").is_none());
        assert!(!is_ipv4("1.2.3"));
        assert!(is_ipv4(strip_brackets("(93.184.216.34)")));
    }

    #[test]
    fn continuation_line_inherits_ttl() {
        let text = " 1  10.0.0.1  1.0 ms\n    10.0.0.9  2.0 ms";
        let hops = parse_hops(text);
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[1].ttl, Some(1));
        assert_eq!(hops[1].ip, "10.0.0.9");
    }
}
