//! Torrent content hash derivation (spec §6).
//!
//! `magnet:` URIs are handled by a regex extract of the `btih` parameter.
//! `http(s)://` URIs name a `.torrent` file: fetch it, decode the bencode
//! envelope, and SHA-1 the re-encoded `info` dictionary. No general-purpose
//! bencode crate appears anywhere in the corpus and the grammar needed here
//! — a dict of byte-strings/integers/lists/dicts — is small, so it's
//! hand-rolled in the style of the teacher's own hand-rolled binary parser
//! in `parity/parser.rs` rather than pulled in as a dependency.

use crate::account::btih_regex;
use crate::error::HashError;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Extract and uppercase the `btih` parameter from a magnet URI.
pub fn from_magnet(uri: &str) -> crate::Result<String> {
    btih_regex()
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .ok_or_else(|| HashError::MissingBtih.into())
}

/// SHA-1 the `info` dictionary of a `.torrent` payload, returning the
/// 40-hex-character content identifier, uppercased to match the magnet
/// form.
pub fn from_torrent_bytes(bytes: &[u8]) -> crate::Result<String> {
    let (value, _) = decode(bytes)?;
    let info = match value {
        BencodeValue::Dict(map) => map
            .get("info".as_bytes())
            .cloned()
            .ok_or(HashError::MissingInfoDict)?,
        _ => return Err(HashError::MissingInfoDict.into()),
    };

    let mut encoded = Vec::new();
    encode(&info, &mut encoded);

    let mut hasher = Sha1::new();
    hasher.update(&encoded);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect::<String>().to_uppercase())
}

/// Derive the content hash from either a `magnet:` or `http(s)://` URI. The
/// caller supplies the fetched bytes for the latter case since fetching is
/// an I/O concern this module doesn't own.
pub fn from_uri(uri: &str, torrent_bytes: Option<&[u8]>) -> crate::Result<String> {
    if uri.starts_with("magnet:") {
        from_magnet(uri)
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        let bytes = torrent_bytes.ok_or_else(|| {
            HashError::InvalidBencode("no .torrent payload supplied for http(s) URI".into())
        })?;
        from_torrent_bytes(bytes)
    } else {
        Err(HashError::UnsupportedScheme(uri.to_string()).into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BencodeValue {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

fn decode(input: &[u8]) -> crate::Result<(BencodeValue, &[u8])> {
    match input.first() {
        Some(b'i') => decode_int(input),
        Some(b'l') => decode_list(input),
        Some(b'd') => decode_dict(input),
        Some(c) if c.is_ascii_digit() => decode_bytes(input),
        _ => Err(HashError::InvalidBencode("unexpected token".into()).into()),
    }
}

fn decode_int(input: &[u8]) -> crate::Result<(BencodeValue, &[u8])> {
    let rest = &input[1..];
    let end = rest
        .iter()
        .position(|&b| b == b'e')
        .ok_or_else(|| HashError::InvalidBencode("unterminated integer".into()))?;
    let s = std::str::from_utf8(&rest[..end])
        .map_err(|_| HashError::InvalidBencode("integer is not utf-8".into()))?;
    let n: i64 = s
        .parse()
        .map_err(|_| HashError::InvalidBencode(format!("'{s}' is not an integer")))?;
    Ok((BencodeValue::Int(n), &rest[end + 1..]))
}

fn decode_bytes(input: &[u8]) -> crate::Result<(BencodeValue, &[u8])> {
    let colon = input
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| HashError::InvalidBencode("missing ':' in byte string".into()))?;
    let len_str = std::str::from_utf8(&input[..colon])
        .map_err(|_| HashError::InvalidBencode("length prefix is not utf-8".into()))?;
    let len: usize = len_str
        .parse()
        .map_err(|_| HashError::InvalidBencode(format!("'{len_str}' is not a valid length")))?;
    let start = colon + 1;
    let end = start + len;
    if end > input.len() {
        return Err(HashError::InvalidBencode("byte string runs past end of input".into()).into());
    }
    Ok((BencodeValue::Bytes(input[start..end].to_vec()), &input[end..]))
}

fn decode_list(input: &[u8]) -> crate::Result<(BencodeValue, &[u8])> {
    let mut rest = &input[1..];
    let mut items = Vec::new();
    loop {
        match rest.first() {
            Some(b'e') => {
                rest = &rest[1..];
                break;
            }
            Some(_) => {
                let (value, next) = decode(rest)?;
                items.push(value);
                rest = next;
            }
            None => return Err(HashError::InvalidBencode("unterminated list".into()).into()),
        }
    }
    Ok((BencodeValue::List(items), rest))
}

fn decode_dict(input: &[u8]) -> crate::Result<(BencodeValue, &[u8])> {
    let mut rest = &input[1..];
    let mut map = BTreeMap::new();
    loop {
        match rest.first() {
            Some(b'e') => {
                rest = &rest[1..];
                break;
            }
            Some(_) => {
                let (key, next) = decode_bytes(rest)?;
                let key_bytes = match key {
                    BencodeValue::Bytes(b) => b,
                    _ => unreachable!("decode_bytes always returns Bytes"),
                };
                let (value, next) = decode(next)?;
                map.insert(key_bytes, value);
                rest = next;
            }
            None => return Err(HashError::InvalidBencode("unterminated dict".into()).into()),
        }
    }
    Ok((BencodeValue::Dict(map), rest))
}

fn encode(value: &BencodeValue, out: &mut Vec<u8>) {
    match value {
        BencodeValue::Bytes(b) => {
            out.extend(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend(b);
        }
        BencodeValue::Int(n) => {
            out.push(b'i');
            out.extend(n.to_string().as_bytes());
            out.push(b'e');
        }
        BencodeValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode(item, out);
            }
            out.push(b'e');
        }
        BencodeValue::Dict(map) => {
            out.push(b'd');
            // BTreeMap already iterates in sorted key order, matching
            // bencode's canonical dict ordering requirement.
            for (k, v) in map {
                encode(&BencodeValue::Bytes(k.clone()), out);
                encode(v, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_btih_from_magnet() {
        let uri = "magnet:?xt=urn:btih:abcdef0123456789&dn=test";
        assert_eq!(from_magnet(uri).unwrap(), "ABCDEF0123456789");
    }

    #[test]
    fn magnet_without_btih_errors() {
        let err = from_magnet("magnet:?dn=test").unwrap_err();
        assert!(matches!(err, crate::Error::Hash(HashError::MissingBtih)));
    }

    #[test]
    fn decodes_simple_bencode_dict() {
        let input = b"d4:infod6:lengthi1024eee";
        let (value, rest) = decode(input).unwrap();
        assert!(rest.is_empty());
        match value {
            BencodeValue::Dict(map) => {
                assert!(map.contains_key("info".as_bytes()));
            }
            _ => panic!("expected dict"),
        }
    }

    #[test]
    fn torrent_hash_is_stable_for_identical_info_dict() {
        let a = b"d8:announce3:foo4:infod6:lengthi10e4:name3:aaaee";
        let b = b"d8:announce3:bar4:infod6:lengthi10e4:name3:aaaee";
        assert_eq!(
            from_torrent_bytes(a).unwrap(),
            from_torrent_bytes(b).unwrap(),
            "hash depends only on the info dict, not the rest of the torrent"
        );
    }

    #[test]
    fn missing_info_dict_errors() {
        let input = b"d8:announce3:fooe";
        let err = from_torrent_bytes(input).unwrap_err();
        assert!(matches!(err, crate::Error::Hash(HashError::MissingInfoDict)));
    }

    #[test]
    fn unsupported_scheme_errors() {
        let err = from_uri("ftp://example.com/x.torrent", None).unwrap_err();
        assert!(matches!(err, crate::Error::Hash(HashError::UnsupportedScheme(_))));
    }
}
