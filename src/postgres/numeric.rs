//! Binary `numeric` codec. Values travel as canonical decimal text so no
//! precision is lost on the way to or from the engine.

use std::error::Error;

use tokio_util::bytes::BytesMut;

const SIGN_POS: u16 = 0x0000;
const SIGN_NEG: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_PINF: u16 = 0xD000;
const SIGN_NINF: u16 = 0xF000;

type BoxError = Box<dyn Error + Sync + Send>;

fn read_u16(raw: &[u8], offset: usize) -> Result<u16, BoxError> {
    raw.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "invalid numeric payload: truncated".into())
}

pub(crate) fn decode(raw: &[u8]) -> Result<String, BoxError> {
    let ndigits = usize::from(read_u16(raw, 0)?);
    let weight = i32::from(i16::from_be_bytes(read_u16(raw, 2)?.to_be_bytes()));
    let sign = read_u16(raw, 4)?;
    let dscale = usize::from(read_u16(raw, 6)?);

    match sign {
        SIGN_NAN => return Ok("NaN".to_string()),
        SIGN_PINF => return Ok("Infinity".to_string()),
        SIGN_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }
    if sign != SIGN_POS && sign != SIGN_NEG {
        return Err(format!("unsupported numeric sign 0x{sign:04x}").into());
    }

    let mut groups = Vec::with_capacity(ndigits);
    for index in 0..ndigits {
        let group = read_u16(raw, 8 + index * 2)?;
        if group > 9999 {
            return Err("invalid numeric payload: digit group out of range".into());
        }
        groups.push(group);
    }

    // Group i has base-10000 exponent (weight - i).
    let group_at = |exp: i32| -> u16 {
        let idx = weight - exp;
        usize::try_from(idx)
            .ok()
            .and_then(|i| groups.get(i).copied())
            .unwrap_or(0)
    };

    let mut integer = String::new();
    if weight >= 0 {
        for exp in (0..=weight).rev() {
            let group = group_at(exp);
            if integer.is_empty() {
                if group != 0 {
                    integer.push_str(&group.to_string());
                }
            } else {
                integer.push_str(&format!("{group:04}"));
            }
        }
    }
    if integer.is_empty() {
        integer.push('0');
    }

    let mut fraction = String::new();
    let mut exp = -1;
    while fraction.len() < dscale {
        fraction.push_str(&format!("{:04}", group_at(exp)));
        exp -= 1;
    }
    fraction.truncate(dscale);

    let is_zero = integer == "0" && fraction.bytes().all(|b| b == b'0');
    let mut out = String::with_capacity(integer.len() + fraction.len() + 2);
    if sign == SIGN_NEG && !is_zero {
        out.push('-');
    }
    out.push_str(&integer);
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// Encode decimal text (`"-12.345"`, `"NaN"`, `"-Infinity"`) as a binary `numeric`.
pub(crate) fn encode(text: &str, out: &mut BytesMut) -> Result<(), BoxError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        push_header(out, 0, 0, SIGN_NAN, 0);
        return Ok(());
    }
    if let Some(sign) = infinity_sign(text) {
        push_header(out, 0, 0, sign, 0);
        return Ok(());
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!("invalid numeric literal `{text}`").into());
    }
    let dscale = u16::try_from(frac_part.len())?;

    let int_digits = int_part.trim_start_matches('0');
    let int_pad = (4 - int_digits.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let digits: String = "0".repeat(int_pad) + int_digits + frac_part + &"0".repeat(frac_pad);

    let mut groups: Vec<u16> = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0_u16, |acc, d| acc * 10 + u16::from(d - b'0'))
        })
        .collect();
    let mut weight = i32::try_from((int_pad + int_digits.len()) / 4)? - 1;

    while groups.first() == Some(&0) {
        groups.remove(0);
        weight -= 1;
    }
    while groups.last() == Some(&0) {
        groups.pop();
    }

    if groups.is_empty() {
        push_header(out, 0, 0, SIGN_POS, dscale);
        return Ok(());
    }

    let sign = if negative { SIGN_NEG } else { SIGN_POS };
    let weight = i16::try_from(weight)?;
    push_header(
        out,
        u16::try_from(groups.len())?,
        u16::from_be_bytes(weight.to_be_bytes()),
        sign,
        dscale,
    );
    for group in groups {
        out.extend_from_slice(&group.to_be_bytes());
    }
    Ok(())
}

fn infinity_sign(text: &str) -> Option<u16> {
    let (sign, word) = match text.strip_prefix('-') {
        Some(rest) => (SIGN_NINF, rest),
        None => (SIGN_PINF, text.strip_prefix('+').unwrap_or(text)),
    };
    (word.eq_ignore_ascii_case("infinity") || word.eq_ignore_ascii_case("inf")).then_some(sign)
}

fn push_header(out: &mut BytesMut, ndigits: u16, weight: u16, sign: u16, dscale: u16) {
    out.extend_from_slice(&ndigits.to_be_bytes());
    out.extend_from_slice(&weight.to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&dscale.to_be_bytes());
}
