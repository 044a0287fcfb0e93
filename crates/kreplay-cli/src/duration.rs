//! Duration flags: bare seconds or a Go-style duration string.

/// Parse `90`, `1.5`, `60s`, `2m`, `1h30m` or `250ms` into seconds.
pub fn parse_secs(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return if secs.is_finite() && secs >= 0.0 {
            Ok(secs)
        } else {
            Err(format!("invalid duration '{s}'"))
        };
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let split = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let value: f64 = rest[..split]
            .parse()
            .map_err(|_| format!("invalid duration '{s}'"))?;
        rest = &rest[split..];

        let split = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..split] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            "" => return Err(format!("missing unit in duration '{s}'")),
            unit => return Err(format!("unknown unit '{unit}' in duration '{s}'")),
        };
        total += value * scale;
        rest = &rest[split..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_are_seconds() {
        assert_eq!(parse_secs("60"), Ok(60.0));
        assert_eq!(parse_secs("1.5"), Ok(1.5));
    }

    #[test]
    fn go_style_durations() {
        assert_eq!(parse_secs("60s"), Ok(60.0));
        assert_eq!(parse_secs("2m"), Ok(120.0));
        assert_eq!(parse_secs("1h30m"), Ok(5400.0));
        assert_eq!(parse_secs("1m0.5s"), Ok(60.5));
        assert_eq!(parse_secs("250ms"), Ok(0.25));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_secs("").is_err());
        assert!(parse_secs("-5").is_err());
        assert!(parse_secs("inf").is_err());
        assert!(parse_secs("10d").unwrap_err().contains("unknown unit 'd'"));
        assert!(parse_secs("s").is_err());
        assert!(parse_secs("1m30").unwrap_err().contains("missing unit"));
    }
}
