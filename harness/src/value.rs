//! Typed call arguments and results
//!
//! [`TypedValue`] is what scenarios pass into a binding and what they get
//! back from a query. Conversion to and from the ABI codec's dynamic values
//! is checked against the declared parameter types.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::json_abi::Param;
use alloy::primitives::{Address, Sign, B256, I256, U256};

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Bool(bool),
    Uint(U256),
    Int(I256),
    Address(Address),
    String(String),
    Bytes(Vec<u8>),
    /// Named fields; decoded structs keep ABI declaration order, arguments
    /// may list fields in any order
    Struct(Vec<(String, TypedValue)>),
    Sequence(Vec<TypedValue>),
}

impl TypedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::Bool(_) => "bool",
            TypedValue::Uint(_) => "uint",
            TypedValue::Int(_) => "int",
            TypedValue::Address(_) => "address",
            TypedValue::String(_) => "string",
            TypedValue::Bytes(_) => "bytes",
            TypedValue::Struct(_) => "struct",
            TypedValue::Sequence(_) => "sequence",
        }
    }

    fn mismatch(&self, wanted: &str) -> HarnessError {
        HarnessError::decode("value", format!("expected {wanted}, found {}", self.kind()))
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            TypedValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            TypedValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_u256(&self) -> Result<U256> {
        match self {
            TypedValue::Uint(u) => Ok(*u),
            TypedValue::Int(i) if !i.is_negative() => Ok(i.into_raw()),
            other => Err(other.mismatch("unsigned integer")),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        let value = self.as_u256()?;
        u64::try_from(value)
            .map_err(|_| HarnessError::decode("value", format!("{value} does not fit in u64")))
    }

    pub fn as_i256(&self) -> Result<I256> {
        match self {
            TypedValue::Int(i) => Ok(*i),
            TypedValue::Uint(u) => I256::checked_from_sign_and_abs(Sign::Positive, *u)
                .ok_or_else(|| HarnessError::decode("value", format!("{u} does not fit in int256"))),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        let value = self.as_i256()?;
        i64::try_from(value)
            .map_err(|_| HarnessError::decode("value", format!("{value} does not fit in i64")))
    }

    pub fn as_address(&self) -> Result<Address> {
        match self {
            TypedValue::Address(a) => Ok(*a),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            TypedValue::Bytes(b) => Ok(b),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_slice(&self) -> Result<&[TypedValue]> {
        match self {
            TypedValue::Sequence(items) => Ok(items),
            other => Err(other.mismatch("sequence")),
        }
    }

    /// Look up a struct field by its ABI name
    pub fn field(&self, name: &str) -> Result<&TypedValue> {
        match self {
            TypedValue::Struct(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value)
                .ok_or_else(|| HarnessError::decode("value", format!("struct has no field {name:?}"))),
            other => Err(other.mismatch("struct")),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl From<U256> for TypedValue {
    fn from(v: U256) -> Self {
        TypedValue::Uint(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        TypedValue::Uint(U256::from(v))
    }
}

impl From<u128> for TypedValue {
    fn from(v: u128) -> Self {
        TypedValue::Uint(U256::from(v))
    }
}

impl From<I256> for TypedValue {
    fn from(v: I256) -> Self {
        TypedValue::Int(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int(I256::try_from(v).unwrap_or_default())
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::from(i64::from(v))
    }
}

impl From<Address> for TypedValue {
    fn from(v: Address) -> Self {
        TypedValue::Address(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        TypedValue::Bytes(v)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(v: &[u8]) -> Self {
        TypedValue::Bytes(v.to_vec())
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(v: Vec<TypedValue>) -> Self {
        TypedValue::Sequence(v)
    }
}

/// Layout of an ABI parameter: names struct fields on decode and orders
/// them on encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Leaf,
    Tuple(Vec<(String, Shape)>),
    Array(Box<Shape>),
}

static LEAF: Shape = Shape::Leaf;

impl Shape {
    pub fn of(param: &Param) -> Self {
        Self::from_parts(&param.ty, &param.components)
    }

    fn element(&self) -> &Shape {
        match self {
            Shape::Array(inner) => inner.as_ref(),
            _ => &LEAF,
        }
    }

    fn fields(&self, count: usize) -> Vec<&Shape> {
        match self {
            Shape::Tuple(fields) if fields.len() == count => fields.iter().map(|(_, s)| s).collect(),
            _ => vec![&LEAF; count],
        }
    }

    fn from_parts(ty: &str, components: &[Param]) -> Self {
        if let Some(inner) = strip_array_suffix(ty) {
            return Shape::Array(Box::new(Self::from_parts(inner, components)));
        }
        if ty == "tuple" {
            return Shape::Tuple(
                components
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (field_name(&c.name, i), Self::from_parts(&c.ty, &c.components)))
                    .collect(),
            );
        }
        Shape::Leaf
    }
}

pub(crate) fn field_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        index.to_string()
    } else {
        name.to_string()
    }
}

// "tuple[]" -> "tuple", "uint256[3]" -> "uint256"
fn strip_array_suffix(ty: &str) -> Option<&str> {
    if !ty.ends_with(']') {
        return None;
    }
    ty.rfind('[').map(|pos| &ty[..pos])
}

/// Convert a decoded ABI value into a [`TypedValue`] following `shape`
pub fn from_dyn(method: &str, value: DynSolValue, shape: &Shape) -> Result<TypedValue> {
    Ok(match value {
        DynSolValue::Bool(b) => TypedValue::Bool(b),
        DynSolValue::Uint(u, _) => TypedValue::Uint(u),
        DynSolValue::Int(i, _) => TypedValue::Int(i),
        DynSolValue::Address(a) => TypedValue::Address(a),
        DynSolValue::FixedBytes(word, size) => TypedValue::Bytes(word[..size].to_vec()),
        DynSolValue::Function(f) => TypedValue::Bytes(f.as_slice().to_vec()),
        DynSolValue::Bytes(b) => TypedValue::Bytes(b),
        DynSolValue::String(s) => TypedValue::String(s),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let inner = match shape {
                Shape::Array(inner) => inner.as_ref(),
                _ => &Shape::Leaf,
            };
            TypedValue::Sequence(
                items
                    .into_iter()
                    .map(|item| from_dyn(method, item, inner))
                    .collect::<Result<_>>()?,
            )
        }
        DynSolValue::Tuple(items) => {
            let names: Vec<(String, Shape)> = match shape {
                Shape::Tuple(fields) if fields.len() == items.len() => fields.clone(),
                Shape::Tuple(fields) => {
                    return Err(HarnessError::decode(
                        method,
                        format!("tuple has {} fields, ABI declares {}", items.len(), fields.len()),
                    ))
                }
                _ => (0..items.len()).map(|i| (i.to_string(), Shape::Leaf)).collect(),
            };
            TypedValue::Struct(
                items
                    .into_iter()
                    .zip(names)
                    .map(|(item, (name, field_shape))| {
                        Ok((name, from_dyn(method, item, &field_shape)?))
                    })
                    .collect::<Result<_>>()?,
            )
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(HarnessError::decode(
                method,
                format!("unsupported ABI value {other:?}"),
            ))
        }
    })
}

/// Convert a scenario-supplied argument into an ABI value of type `ty`
///
/// Struct fields are matched to tuple components by name when `shape`
/// declares them; sequences are always positional.
pub fn to_dyn(method: &str, value: &TypedValue, ty: &DynSolType, shape: &Shape) -> Result<DynSolValue> {
    let mismatch = || {
        HarnessError::encoding(
            method,
            format!("cannot pass {} as {}", value.kind(), ty.sol_type_name()),
        )
    };

    Ok(match (ty, value) {
        (DynSolType::Bool, TypedValue::Bool(b)) => DynSolValue::Bool(*b),
        (DynSolType::Uint(bits), TypedValue::Uint(u)) => {
            if u.bit_len() > *bits {
                return Err(HarnessError::encoding(
                    method,
                    format!("{u} overflows uint{bits}"),
                ));
            }
            DynSolValue::Uint(*u, *bits)
        }
        (DynSolType::Uint(bits), TypedValue::Int(i)) => {
            if i.is_negative() {
                return Err(HarnessError::encoding(
                    method,
                    format!("{i} is negative but uint{bits} is expected"),
                ));
            }
            return to_dyn(method, &TypedValue::Uint(i.into_raw()), ty, shape);
        }
        (DynSolType::Int(bits), TypedValue::Int(i)) => {
            check_int_width(method, *i, *bits)?;
            DynSolValue::Int(*i, *bits)
        }
        (DynSolType::Int(bits), TypedValue::Uint(u)) => {
            let i = I256::checked_from_sign_and_abs(Sign::Positive, *u)
                .ok_or_else(|| HarnessError::encoding(method, format!("{u} overflows int{bits}")))?;
            check_int_width(method, i, *bits)?;
            DynSolValue::Int(i, *bits)
        }
        (DynSolType::Address, TypedValue::Address(a)) => DynSolValue::Address(*a),
        (DynSolType::Address, TypedValue::String(s)) => DynSolValue::Address(parse_address(s)?),
        (DynSolType::String, TypedValue::String(s)) => DynSolValue::String(s.clone()),
        (DynSolType::Bytes, TypedValue::Bytes(b)) => DynSolValue::Bytes(b.clone()),
        (DynSolType::FixedBytes(size), TypedValue::Bytes(b)) => {
            if b.len() != *size {
                return Err(HarnessError::encoding(
                    method,
                    format!("bytes{size} needs exactly {size} bytes, got {}", b.len()),
                ));
            }
            let mut word = B256::ZERO;
            word[..*size].copy_from_slice(b);
            DynSolValue::FixedBytes(word, *size)
        }
        (DynSolType::Array(inner), TypedValue::Sequence(items)) => DynSolValue::Array(
            items
                .iter()
                .map(|item| to_dyn(method, item, inner, shape.element()))
                .collect::<Result<_>>()?,
        ),
        (DynSolType::FixedArray(inner, len), TypedValue::Sequence(items)) => {
            if items.len() != *len {
                return Err(HarnessError::encoding(
                    method,
                    format!("expected {len} elements, got {}", items.len()),
                ));
            }
            DynSolValue::FixedArray(
                items
                    .iter()
                    .map(|item| to_dyn(method, item, inner, shape.element()))
                    .collect::<Result<_>>()?,
            )
        }
        (DynSolType::Tuple(types), TypedValue::Sequence(items)) => {
            DynSolValue::Tuple(zip_tuple(method, types, shape, items.iter().collect())?)
        }
        (DynSolType::Tuple(types), TypedValue::Struct(fields)) => {
            let ordered = match shape {
                Shape::Tuple(declared) => order_fields(method, declared, fields)?,
                _ => fields.iter().map(|(_, v)| v).collect(),
            };
            DynSolValue::Tuple(zip_tuple(method, types, shape, ordered)?)
        }
        _ => return Err(mismatch()),
    })
}

fn zip_tuple(
    method: &str,
    types: &[DynSolType],
    shape: &Shape,
    items: Vec<&TypedValue>,
) -> Result<Vec<DynSolValue>> {
    if items.len() != types.len() {
        return Err(HarnessError::encoding(
            method,
            format!("tuple needs {} fields, got {}", types.len(), items.len()),
        ));
    }
    items
        .into_iter()
        .zip(types)
        .zip(shape.fields(types.len()))
        .map(|((item, ty), field_shape)| to_dyn(method, item, ty, field_shape))
        .collect()
}

// Struct fields in declaration order; every declared name must be given once
fn order_fields<'a>(
    method: &str,
    declared: &[(String, Shape)],
    given: &'a [(String, TypedValue)],
) -> Result<Vec<&'a TypedValue>> {
    if given.len() != declared.len() {
        return Err(HarnessError::encoding(
            method,
            format!("tuple needs {} fields, got {}", declared.len(), given.len()),
        ));
    }
    declared
        .iter()
        .map(|(name, _)| {
            given
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value)
                .ok_or_else(|| HarnessError::encoding(method, format!("struct has no field {name:?}")))
        })
        .collect()
}

fn check_int_width(method: &str, value: I256, bits: usize) -> Result<()> {
    if bits >= 256 {
        return Ok(());
    }
    // Two's complement range of intN is [-2^(N-1), 2^(N-1) - 1]
    let limit = U256::from(1u8) << (bits - 1);
    let abs = value.unsigned_abs();
    let fits = if value.is_negative() { abs <= limit } else { abs < limit };
    if fits {
        Ok(())
    } else {
        Err(HarnessError::encoding(method, format!("{value} overflows int{bits}")))
    }
}

/// Parse a 20-byte hex address (with or without `0x`)
pub fn parse_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.len() != 40 {
        return Err(HarnessError::InvalidAddress(raw.to_string()));
    }
    trimmed
        .parse::<Address>()
        .map_err(|_| HarnessError::InvalidAddress(raw.to_string()))
}
