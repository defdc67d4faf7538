use rust_decimal::Decimal;

/// Format a decimal as a dollar amount with thousands separators: $1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = val.abs().round_dp(2).to_string();
    let (int_part, dec_part) = match cents.split_once('.') {
        Some((i, d)) if d.len() == 1 => (i.to_string(), format!("{d}0")),
        Some((i, d)) => (i.to_string(), d.to_string()),
        None => (cents, "00".to_string()),
    };

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec("1234.56")), "$1,234.56");
        assert_eq!(money(dec("-500.00")), "-$500.00");
        assert_eq!(money(dec("0")), "$0.00");
        assert_eq!(money(dec("1000000.99")), "$1,000,000.99");
        assert_eq!(money(dec("42.1")), "$42.10");
        assert_eq!(money(dec("7")), "$7.00");
    }
}
