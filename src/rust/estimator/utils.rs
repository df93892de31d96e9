/// Formats a bill amount in rupiah: `Rp ` followed by the amount with comma
/// thousands separators and two decimals.
///
/// ```
/// use tagihan::format_rupiah;
///
/// assert_eq!(format_rupiah(1234567.891), "Rp 1,234,567.89");
/// ```
pub fn format_rupiah(value: f64) -> String {
    format!("Rp {}", group_thousands(value, 2))
}

pub(crate) fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let digits = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits.as_str(), None),
    };

    let mut out = String::with_capacity(digits.len() + int_part.len() / 3 + 1);
    if value.is_sign_negative() {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
