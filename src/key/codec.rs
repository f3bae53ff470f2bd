//! Sort-order preserving value codec.
//!
//! Every component is written as a one-byte type tag followed by its payload:
//!
//! - `Int`: sign-flipped, big-endian 4 bytes
//! - `BigInt` / `Timestamp`: sign-flipped, big-endian 8 bytes
//! - `Float` / `Double`: order-preserving IEEE 754 bits, big-endian
//! - `Boolean`: one byte, `0x00` or `0x01`
//! - `Text` / `Blob`: `0x00` escaped as `0x00 0x01`, terminated by `0x00 0x00`
//! - `Null`: tag only
//!
//! The encoding is self-delimiting, so a composite key is the plain
//! concatenation of its components. For ascending components byte order
//! matches native order; the explicit comparator stays authoritative.

use crate::error::{IndexError, Result};
use crate::key::value::{sortable_f32, sortable_f64, NativeType, Value};

/// Type tags. `NULL` is the lowest so a null component sorts first.
pub mod tags {
    pub const NULL: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const INT: u8 = 0x02;
    pub const BIGINT: u8 = 0x03;
    pub const FLOAT: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const TEXT: u8 = 0x06;
    pub const BLOB: u8 = 0x07;
    pub const TIMESTAMP: u8 = 0x08;
}

const SIGN_FLIP_I32: u32 = 0x8000_0000;
const SIGN_FLIP_I64: u64 = 0x8000_0000_0000_0000;
const ESCAPE: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

/// Encodes and decodes single component values of a known native type.
pub trait ValueCodec: Send + Sync {
    /// Append the encoding of `value` (which must conform to `ty`) to `buf`.
    fn encode_into(&self, value: &Value, ty: NativeType, buf: &mut Vec<u8>) -> Result<()>;

    /// Decode one value of type `ty` from the front of `bytes`.
    ///
    /// Returns the value and the number of bytes consumed.
    fn decode_prefix(&self, bytes: &[u8], ty: NativeType) -> Result<(Value, usize)>;

    fn encode(&self, value: &Value, ty: NativeType) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(value, ty, &mut buf)?;
        Ok(buf)
    }

    /// Decode exactly one value; trailing bytes are an error.
    fn decode(&self, bytes: &[u8], ty: NativeType) -> Result<Value> {
        let (value, used) = self.decode_prefix(bytes, ty)?;
        if used != bytes.len() {
            return Err(IndexError::Decode(format!(
                "{} trailing bytes after {} value",
                bytes.len() - used,
                ty
            )));
        }
        Ok(value)
    }
}

/// The default codec: tagged, order-preserving, self-delimiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortableCodec;

fn tag_for(ty: NativeType) -> u8 {
    match ty {
        NativeType::Boolean => tags::BOOLEAN,
        NativeType::Int => tags::INT,
        NativeType::BigInt => tags::BIGINT,
        NativeType::Float => tags::FLOAT,
        NativeType::Double => tags::DOUBLE,
        NativeType::Text => tags::TEXT,
        NativeType::Blob => tags::BLOB,
        NativeType::Timestamp => tags::TIMESTAMP,
    }
}

fn encode_escaped(data: &[u8], buf: &mut Vec<u8>) {
    for &byte in data {
        if byte == TERMINATOR {
            buf.push(TERMINATOR);
            buf.push(ESCAPE);
        } else {
            buf.push(byte);
        }
    }
    buf.push(TERMINATOR);
    buf.push(TERMINATOR);
}

/// Decode an escaped byte run. Returns the data and bytes consumed.
fn decode_escaped(bytes: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != TERMINATOR {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(&TERMINATOR) => return Ok((out, i + 2)),
            Some(&ESCAPE) => {
                out.push(TERMINATOR);
                i += 2;
            }
            Some(other) => {
                return Err(IndexError::Decode(format!(
                    "invalid escape byte 0x{other:02x} at offset {}",
                    i + 1
                )))
            }
            None => break,
        }
    }
    Err(IndexError::Decode("unterminated byte sequence".to_string()))
}

fn take<const N: usize>(bytes: &[u8], ty: NativeType) -> Result<[u8; N]> {
    if bytes.len() < N {
        return Err(IndexError::Decode(format!(
            "truncated {} value: need {} bytes, have {}",
            ty,
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    Ok(out)
}

impl ValueCodec for SortableCodec {
    fn encode_into(&self, value: &Value, ty: NativeType, buf: &mut Vec<u8>) -> Result<()> {
        if !value.conforms_to(ty) {
            return Err(IndexError::Encode(format!(
                "value {} does not conform to type {}",
                value, ty
            )));
        }
        match value {
            Value::Null => buf.push(tags::NULL),
            Value::Boolean(v) => {
                buf.push(tags::BOOLEAN);
                buf.push(u8::from(*v));
            }
            Value::Int(v) => {
                buf.push(tags::INT);
                buf.extend_from_slice(&((*v as u32) ^ SIGN_FLIP_I32).to_be_bytes());
            }
            Value::BigInt(v) | Value::Timestamp(v) => {
                buf.push(tag_for(ty));
                buf.extend_from_slice(&((*v as u64) ^ SIGN_FLIP_I64).to_be_bytes());
            }
            Value::Float(v) => {
                buf.push(tags::FLOAT);
                buf.extend_from_slice(&sortable_f32(*v).to_be_bytes());
            }
            Value::Double(v) => {
                buf.push(tags::DOUBLE);
                buf.extend_from_slice(&sortable_f64(*v).to_be_bytes());
            }
            Value::Text(v) => {
                buf.push(tags::TEXT);
                encode_escaped(v.as_bytes(), buf);
            }
            Value::Blob(v) => {
                buf.push(tags::BLOB);
                encode_escaped(v, buf);
            }
        }
        Ok(())
    }

    fn decode_prefix(&self, bytes: &[u8], ty: NativeType) -> Result<(Value, usize)> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| IndexError::Decode(format!("missing {} component", ty)))?;
        if tag == tags::NULL {
            return Ok((Value::Null, 1));
        }
        if tag != tag_for(ty) {
            return Err(IndexError::Decode(format!(
                "unexpected tag 0x{tag:02x} for {} component",
                ty
            )));
        }
        let (value, used) = match ty {
            NativeType::Boolean => match take::<1>(payload, ty)?[0] {
                0 => (Value::Boolean(false), 1),
                1 => (Value::Boolean(true), 1),
                other => {
                    return Err(IndexError::Decode(format!("invalid boolean byte 0x{other:02x}")))
                }
            },
            NativeType::Int => {
                let raw = u32::from_be_bytes(take::<4>(payload, ty)?);
                (Value::Int((raw ^ SIGN_FLIP_I32) as i32), 4)
            }
            NativeType::BigInt | NativeType::Timestamp => {
                let raw = u64::from_be_bytes(take::<8>(payload, ty)?);
                let v = (raw ^ SIGN_FLIP_I64) as i64;
                let value = if ty == NativeType::BigInt {
                    Value::BigInt(v)
                } else {
                    Value::Timestamp(v)
                };
                (value, 8)
            }
            NativeType::Float => {
                let raw = u32::from_be_bytes(take::<4>(payload, ty)?);
                let bits = if raw & SIGN_FLIP_I32 != 0 { raw ^ SIGN_FLIP_I32 } else { !raw };
                (Value::Float(f32::from_bits(bits)), 4)
            }
            NativeType::Double => {
                let raw = u64::from_be_bytes(take::<8>(payload, ty)?);
                let bits = if raw & SIGN_FLIP_I64 != 0 { raw ^ SIGN_FLIP_I64 } else { !raw };
                (Value::Double(f64::from_bits(bits)), 8)
            }
            NativeType::Text => {
                let (data, used) = decode_escaped(payload)?;
                let text = String::from_utf8(data)
                    .map_err(|e| IndexError::Decode(format!("invalid UTF-8 in text component: {e}")))?;
                (Value::Text(text), used)
            }
            NativeType::Blob => {
                let (data, used) = decode_escaped(payload)?;
                (Value::Blob(data), used)
            }
        };
        Ok((value, used + 1))
    }
}
