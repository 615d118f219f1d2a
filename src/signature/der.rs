//! ECDSA signature transcoding between ASN.1 DER (`SEQUENCE { INTEGER r,
//! INTEGER s }`, what the platform primitive emits/expects) and the
//! fixed-length `R||S` concatenation used on the wire (RFC 7518 §3.4).

use crate::error::JoseError;

fn malformed(msg: impl Into<String>) -> JoseError {
    JoseError::MalformedToken(msg.into())
}

/// Read a DER length octet (or octets, for the single-byte long form this
/// crate supports; lengths beyond 255 never occur for ECDSA r/s values).
fn read_der_length(bytes: &[u8], pos: &mut usize) -> Result<usize, JoseError> {
    let first = *bytes
        .get(*pos)
        .ok_or_else(|| malformed("DER: truncated length"))?;
    *pos += 1;
    if first < 0x80 {
        Ok(first as usize)
    } else if first == 0x81 {
        let len = *bytes
            .get(*pos)
            .ok_or_else(|| malformed("DER: truncated long-form length"))?;
        *pos += 1;
        Ok(len as usize)
    } else {
        Err(malformed("DER: unsupported length form"))
    }
}

fn append_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        out.push(0x81);
        out.push(len as u8);
    }
}

/// Parse one `INTEGER` field, returning its content bytes with any leading
/// sign-zero byte stripped.
fn read_der_integer<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a [u8], JoseError> {
    let tag = *bytes
        .get(*pos)
        .ok_or_else(|| malformed("DER: truncated integer tag"))?;
    if tag != 0x02 {
        return Err(malformed("DER: expected INTEGER tag"));
    }
    *pos += 1;
    let len = read_der_length(bytes, pos)?;
    let start = *pos;
    let end = start
        .checked_add(len)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| malformed("DER: integer length out of range"))?;
    *pos = end;
    let mut content = &bytes[start..end];
    while content.len() > 1 && content[0] == 0x00 {
        content = &content[1..];
    }
    Ok(content)
}

/// DER `SEQUENCE { INTEGER r, INTEGER s }` -> fixed-length `R||S`, each half
/// left-padded to `coord_len` bytes.
pub fn der_to_concat(der: &[u8], coord_len: usize) -> Result<Vec<u8>, JoseError> {
    let mut pos = 0usize;
    let tag = *der.get(pos).ok_or_else(|| malformed("DER: empty"))?;
    if tag != 0x30 {
        return Err(malformed("DER: expected SEQUENCE tag"));
    }
    pos += 1;
    let seq_len = read_der_length(der, &mut pos)?;
    if pos + seq_len != der.len() {
        return Err(malformed("DER: SEQUENCE length does not match input"));
    }

    let r = read_der_integer(der, &mut pos)?;
    let s = read_der_integer(der, &mut pos)?;
    if pos != der.len() {
        return Err(malformed("DER: trailing bytes after signature"));
    }
    if r.len() > coord_len || s.len() > coord_len {
        return Err(malformed("DER: integer too large for curve"));
    }

    let mut out = vec![0u8; coord_len * 2];
    out[coord_len - r.len()..coord_len].copy_from_slice(r);
    out[2 * coord_len - s.len()..2 * coord_len].copy_from_slice(s);
    Ok(out)
}

fn encode_der_integer(out: &mut Vec<u8>, mut value: &[u8]) {
    while value.len() > 1 && value[0] == 0x00 {
        value = &value[1..];
    }
    out.push(0x02); // INTEGER
    let needs_sign_byte = !value.is_empty() && value[0] & 0x80 != 0;
    let content_len = value.len() + if needs_sign_byte { 1 } else { 0 };
    append_der_length(out, content_len);
    if needs_sign_byte {
        out.push(0x00);
    }
    out.extend_from_slice(value);
}

/// Fixed-length `R||S` -> DER `SEQUENCE { INTEGER r, INTEGER s }`.
pub fn concat_to_der(rs: &[u8], coord_len: usize) -> Result<Vec<u8>, JoseError> {
    if rs.len() != coord_len * 2 {
        return Err(malformed("R||S: unexpected length for curve"));
    }
    let (r, s) = rs.split_at(coord_len);

    let mut content = Vec::new();
    encode_der_integer(&mut content, r);
    encode_der_integer(&mut content, s);

    let mut out = Vec::new();
    out.push(0x30); // SEQUENCE
    append_der_length(&mut out, content.len());
    out.extend_from_slice(&content);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_values() {
        let rs = {
            let mut v = vec![0u8; 64];
            v[31] = 0x01;
            v[63] = 0x02;
            v
        };
        let der = concat_to_der(&rs, 32).unwrap();
        let back = der_to_concat(&der, 32).unwrap();
        assert_eq!(back, rs);
    }

    #[test]
    fn round_trips_high_bit_values() {
        // Both halves have their top bit set, forcing a DER sign byte.
        let mut rs = vec![0xFFu8; 64];
        rs[0] = 0x80;
        rs[32] = 0x80;
        let der = concat_to_der(&rs, 32).unwrap();
        // Each INTEGER should have gained a leading 0x00 sign byte.
        assert_eq!(der[0], 0x30);
        let back = der_to_concat(&der, 32).unwrap();
        assert_eq!(back, rs);
    }

    #[test]
    fn round_trips_all_zero_halves() {
        let rs = vec![0u8; 64];
        let der = concat_to_der(&rs, 32).unwrap();
        let back = der_to_concat(&der, 32).unwrap();
        assert_eq!(back, rs);
    }

    #[test]
    fn rejects_wrong_length_concat() {
        let rs = vec![0u8; 63];
        assert!(concat_to_der(&rs, 32).is_err());
    }

    #[test]
    fn rejects_malformed_der() {
        assert!(der_to_concat(&[0x02, 0x01, 0x00], 32).is_err()); // not a SEQUENCE
        assert!(der_to_concat(&[0x30, 0x05, 0x02, 0x01, 0x00], 32).is_err()); // truncated
    }
}
