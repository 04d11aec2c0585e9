//! Binary result formats that `tokio-postgres` has no `FromSql` impl for.
//! Each value is rendered the way the engine prints it in text mode.

use std::error::Error;
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

type BoxError = Box<dyn Error + Sync + Send>;

const USECS_PER_SEC: u64 = 1_000_000;
const USECS_PER_MINUTE: u64 = 60 * USECS_PER_SEC;
const USECS_PER_HOUR: u64 = 60 * USECS_PER_MINUTE;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

fn take<const N: usize>(raw: &[u8], offset: usize, what: &str) -> Result<[u8; N], BoxError> {
    raw.get(offset..offset + N)
        .and_then(|b| <[u8; N]>::try_from(b).ok())
        .ok_or_else(|| format!("invalid {what} payload: truncated").into())
}

/// `HH:MM:SS[.ffffff]`, trailing fractional zeros dropped. Hours may exceed 24.
fn clock(micros: u64) -> String {
    let hours = micros / USECS_PER_HOUR;
    let minutes = micros % USECS_PER_HOUR / USECS_PER_MINUTE;
    let seconds = micros % USECS_PER_MINUTE / USECS_PER_SEC;
    let fraction = micros % USECS_PER_SEC;
    let mut out = format!("{hours:02}:{minutes:02}:{seconds:02}");
    if fraction != 0 {
        let digits = format!("{fraction:06}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// `interval` in the default `postgres` output style, e.g. `1 year 2 mons`,
/// `-1 days +02:00:00`, `00:00:00`.
pub(crate) fn interval(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 16 {
        return Err(format!("invalid interval payload: {} bytes", raw.len()).into());
    }
    let micros = i64::from_be_bytes(take(raw, 0, "interval")?);
    let days = i32::from_be_bytes(take(raw, 8, "interval")?);
    let months = i32::from_be_bytes(take(raw, 12, "interval")?);

    let mut out = String::new();
    let mut is_zero = true;
    let mut is_before = false;
    for (value, unit) in [(months / 12, "year"), (months % 12, "mon"), (days, "day")] {
        if value == 0 {
            continue;
        }
        if !is_zero {
            out.push(' ');
        }
        if is_before && value > 0 {
            out.push('+');
        }
        let plural = if value == 1 { "" } else { "s" };
        let _ = write!(out, "{value} {unit}{plural}");
        is_before = value < 0;
        is_zero = false;
    }
    if is_zero || micros != 0 {
        if !is_zero {
            out.push(' ');
        }
        if micros < 0 {
            out.push('-');
        } else if is_before {
            out.push('+');
        }
        out.push_str(&clock(micros.unsigned_abs()));
    }
    Ok(out)
}

/// `timetz` as `HH:MM:SS[.f]±HH[:MM[:SS]]`.
pub(crate) fn timetz(raw: &[u8]) -> Result<String, BoxError> {
    let micros = i64::from_be_bytes(take(raw, 0, "timetz")?);
    // The engine stores the zone as seconds west of UTC.
    let west = i32::from_be_bytes(take(raw, 8, "timetz")?);
    let mut out = clock(u64::try_from(micros)?);
    let offset = -i64::from(west);
    out.push(if offset < 0 { '-' } else { '+' });
    let offset = offset.unsigned_abs();
    let (hours, minutes, seconds) = (offset / 3600, offset / 60 % 60, offset % 60);
    let _ = write!(out, "{hours:02}");
    if minutes != 0 || seconds != 0 {
        let _ = write!(out, ":{minutes:02}");
    }
    if seconds != 0 {
        let _ = write!(out, ":{seconds:02}");
    }
    Ok(out)
}

/// `inet` / `cidr`. The prefix length is printed for `cidr` always and for
/// `inet` only when it does not cover the whole address.
pub(crate) fn inet(raw: &[u8]) -> Result<String, BoxError> {
    let [family, bits, is_cidr, len] = take::<4>(raw, 0, "inet")?;
    let addr = raw
        .get(4..)
        .filter(|addr| addr.len() == usize::from(len))
        .ok_or("invalid inet payload: address length mismatch")?;
    let (ip, full) = match family {
        PGSQL_AF_INET => (IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(addr)?)), 32),
        PGSQL_AF_INET6 => (IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(addr)?)), 128),
        other => return Err(format!("unsupported inet address family {other}").into()),
    };
    if is_cidr != 0 || bits != full {
        Ok(format!("{ip}/{bits}"))
    } else {
        Ok(ip.to_string())
    }
}

/// `macaddr` / `macaddr8` as colon-separated lowercase hex.
pub(crate) fn macaddr(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 6 && raw.len() != 8 {
        return Err(format!("invalid macaddr payload: {} bytes", raw.len()).into());
    }
    Ok(raw
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":"))
}

/// `bit` / `varbit` as a string of `0` and `1`.
pub(crate) fn bit_string(raw: &[u8]) -> Result<String, BoxError> {
    let len = usize::try_from(i32::from_be_bytes(take(raw, 0, "bit")?))?;
    let bytes = raw.get(4..).unwrap_or_default();
    if bytes.len() < len.div_ceil(8) {
        return Err("invalid bit payload: truncated".into());
    }
    Ok((0..len)
        .map(|i| if bytes[i / 8] & (0x80 >> (i % 8)) == 0 { '0' } else { '1' })
        .collect())
}

/// Split a binary record or composite into `(field type oid, payload)` pairs.
/// NULL fields have no payload.
pub(crate) fn record_fields(raw: &[u8]) -> Result<Vec<(u32, Option<&[u8]>)>, BoxError> {
    let count = usize::try_from(i32::from_be_bytes(take(raw, 0, "record")?))?;
    let mut offset = 4;
    let mut fields = Vec::new();
    for _ in 0..count {
        let oid = u32::from_be_bytes(take(raw, offset, "record")?);
        let len = i32::from_be_bytes(take(raw, offset + 4, "record")?);
        offset += 8;
        if len < 0 {
            fields.push((oid, None));
            continue;
        }
        let len = usize::try_from(len)?;
        let payload = raw
            .get(offset..offset + len)
            .ok_or("invalid record payload: truncated")?;
        offset += len;
        fields.push((oid, Some(payload)));
    }
    if offset != raw.len() {
        return Err("invalid record payload: trailing bytes".into());
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_wire(micros: i64, days: i32, months: i32) -> Vec<u8> {
        let mut out = micros.to_be_bytes().to_vec();
        out.extend_from_slice(&days.to_be_bytes());
        out.extend_from_slice(&months.to_be_bytes());
        out
    }

    #[test]
    fn interval_matches_engine_output() {
        let hour = 3_600_000_000_i64;
        assert_eq!(interval(&interval_wire(0, 1, 0)).unwrap(), "1 day");
        assert_eq!(interval(&interval_wire(0, 0, 0)).unwrap(), "00:00:00");
        assert_eq!(interval(&interval_wire(0, 3, 14)).unwrap(), "1 year 2 mons 3 days");
        assert_eq!(interval(&interval_wire(2 * hour, -1, 0)).unwrap(), "-1 days +02:00:00");
        assert_eq!(interval(&interval_wire(-90_500_000, 0, 0)).unwrap(), "-00:01:30.5");
        assert_eq!(interval(&interval_wire(30 * hour, 2, 0)).unwrap(), "2 days 30:00:00");
        assert!(interval(&[0; 12]).is_err());
    }

    #[test]
    fn timetz_prints_offset_east_of_utc() {
        let mut raw = (10 * 3_600_000_000_i64).to_be_bytes().to_vec();
        raw.extend_from_slice(&(-7200_i32).to_be_bytes());
        assert_eq!(timetz(&raw).unwrap(), "10:00:00+02");

        let mut raw = 1_500_000_i64.to_be_bytes().to_vec();
        raw.extend_from_slice(&19800_i32.to_be_bytes());
        assert_eq!(timetz(&raw).unwrap(), "00:00:01.5-05:30");
    }

    #[test]
    fn inet_and_cidr() {
        assert_eq!(inet(&[2, 32, 0, 4, 127, 0, 0, 1]).unwrap(), "127.0.0.1");
        assert_eq!(inet(&[2, 24, 0, 4, 10, 1, 2, 3]).unwrap(), "10.1.2.3/24");
        assert_eq!(inet(&[2, 8, 1, 4, 10, 0, 0, 0]).unwrap(), "10.0.0.0/8");

        let mut v6 = vec![3, 128, 0, 16];
        v6.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        assert_eq!(inet(&v6).unwrap(), "::1");

        assert!(inet(&[2, 32, 0, 4, 127]).is_err());
        assert!(inet(&[9, 32, 0, 0]).is_err());
    }

    #[test]
    fn macaddr_and_bits() {
        assert_eq!(macaddr(&[8, 0, 0x2b, 1, 2, 3]).unwrap(), "08:00:2b:01:02:03");
        assert!(macaddr(&[1, 2, 3]).is_err());

        let mut raw = 10_i32.to_be_bytes().to_vec();
        raw.extend_from_slice(&[0b1010_0000, 0b1100_0000]);
        assert_eq!(bit_string(&raw).unwrap(), "1010000011");
        assert!(bit_string(&10_i32.to_be_bytes()).is_err());
    }

    #[test]
    fn record_fields_split_with_nulls() {
        let mut raw = 2_i32.to_be_bytes().to_vec();
        raw.extend_from_slice(&23_u32.to_be_bytes());
        raw.extend_from_slice(&4_i32.to_be_bytes());
        raw.extend_from_slice(&7_i32.to_be_bytes());
        raw.extend_from_slice(&25_u32.to_be_bytes());
        raw.extend_from_slice(&(-1_i32).to_be_bytes());

        let fields = record_fields(&raw).unwrap();
        assert_eq!(fields, vec![(23, Some(&7_i32.to_be_bytes()[..])), (25, None)]);

        raw.push(0);
        assert!(record_fields(&raw).is_err());
    }
}
