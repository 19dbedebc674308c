//! Integer literal parsing: signed decimal, hexadecimal (`0x`), octal
//! (`0o`) or binary (`0b`), same four bases `vasm` accepts, hand-rolled
//! here since there's no PEG grammar doing it for us.

pub fn parse_int(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = if let Some(digits) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        i64::from_str_radix(digits, 16).ok()?
    } else if let Some(digits) = unsigned.strip_prefix("0o").or_else(|| unsigned.strip_prefix("0O")) {
        i64::from_str_radix(digits, 8).ok()?
    } else if let Some(digits) = unsigned.strip_prefix("0b").or_else(|| unsigned.strip_prefix("0B")) {
        i64::from_str_radix(digits, 2).ok()?
    } else {
        unsigned.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal() {
        assert_eq!(parse_int("1234"), Some(1234));
        assert_eq!(parse_int("-1234"), Some(-1234));
    }

    #[test]
    fn hex_oct_bin() {
        assert_eq!(parse_int("0xFF"), Some(255));
        assert_eq!(parse_int("-0xFF"), Some(-255));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_int("label"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("0xZZ"), None);
    }
}
