use super::{Decode, VarUInt};

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DecodingError {
    #[error("Malformed input: {0} ({1:?})")]
    MalformedInput(String, Vec<u8>),
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("VarUInt casting: {0}")]
    VarUIntCasting(u128),
    #[error("Unexpected key prefix: {0:?}")]
    UnexpectedPrefix(Vec<u8>),
}

// Helper method to create MalformedInput error with just a message
pub fn malformed_input<S: Into<String>>(msg: S, bytes: &[u8]) -> DecodingError {
    DecodingError::MalformedInput(msg.into(), bytes.to_vec())
}

pub type DecodingResult<'a, T> = Result<(T, &'a [u8]), DecodingError>;

fn split_bytes<'a>(bytes: &'a [u8], len: usize, what: &str) -> DecodingResult<'a, &'a [u8]> {
    bytes
        .split_at_checked(len)
        .ok_or_else(|| malformed_input(format!("{what} insufficient bytes"), bytes))
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (data, rest) = split_bytes(bytes, N, "array")?;

        let mut out = [0u8; N];
        out.copy_from_slice(data);

        Ok((out, rest))
    }
}

impl Decode for u8 {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        bytes
            .split_first()
            .map(|(b, rest)| (*b, rest))
            .ok_or_else(|| malformed_input("u8 insufficient bytes", bytes))
    }
}

impl Decode for bool {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        match u8::decode(bytes)? {
            (0, rest) => Ok((false, rest)),
            (1, rest) => Ok((true, rest)),
            _ => Err(malformed_input("invalid bool", bytes)),
        }
    }
}

impl Decode for VarUInt {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (len, rest) = u8::decode(bytes)?;
        let len = len as usize;

        if len > 16 {
            return Err(malformed_input("varuint len exceeds maximum", bytes));
        }

        let (data, rest) = split_bytes(rest, len, "varuint")?;

        let mut be_128 = [0u8; 16];
        be_128[16 - len..].copy_from_slice(data);

        Ok((VarUInt(u128::from_be_bytes(be_128)), rest))
    }
}

macro_rules! impl_uint_decode {
    ($t:ty) => {
        impl Decode for $t {
            fn decode(bytes: &[u8]) -> DecodingResult<'_, $t> {
                let (varuint, rem) = VarUInt::decode(bytes)?;

                let casted = Self::try_from(varuint)?;

                Ok((casted, rem))
            }
        }
    };
}

impl_uint_decode!(usize);
impl_uint_decode!(u16);
impl_uint_decode!(u32);
impl_uint_decode!(u64);
impl_uint_decode!(u128);

impl<A: Decode> Decode for Vec<A> {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (len, mut bytes) = usize::decode(bytes)?;
        // every item takes at least one byte, don't trust the length prefix beyond that
        let mut vec = Vec::with_capacity(len.min(bytes.len()));

        for _ in 0..len {
            let (item, rest) = A::decode(bytes)?;
            bytes = rest;

            vec.push(item);
        }

        Ok((vec, bytes))
    }
}

impl Decode for String {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (len, rest) = usize::decode(bytes)?;
        let (data, rest) = split_bytes(rest, len, "string")?;

        Ok((String::from_utf8(data.to_vec())?, rest))
    }
}

impl<A: Decode> Decode for Option<A> {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        match u8::decode(bytes)? {
            (0, rest) => Ok((None, rest)),
            (1, rest) => {
                let (inner, rest) = A::decode(rest)?;
                Ok((Some(inner), rest))
            }
            _ => Err(malformed_input("invalid option tag", bytes)),
        }
    }
}

impl Decode for () {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        Ok(((), bytes))
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (a, bytes) = A::decode(bytes)?;
        let (b, bytes) = B::decode(bytes)?;

        Ok(((a, b), bytes))
    }
}

impl<A: Decode, B: Decode, C: Decode> Decode for (A, B, C) {
    fn decode(bytes: &[u8]) -> DecodingResult<'_, Self> {
        let (a, bytes) = A::decode(bytes)?;
        let (b, bytes) = B::decode(bytes)?;
        let (c, bytes) = C::decode(bytes)?;

        Ok(((a, b, c), bytes))
    }
}
