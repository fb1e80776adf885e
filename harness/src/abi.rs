//! ABI descriptors and the per-binding method table
//!
//! A [`MethodTable`] is built once from an [`AbiDescriptor`]: every method's
//! input types and output shapes are resolved up front, so calls only look a
//! method up by name and arity.

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{address, Address};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{HarnessError, Result};
use crate::value::{field_name, from_dyn, to_dyn, Shape, TypedValue};

pub const WASMD_PRECOMPILE: Address = address!("0000000000000000000000000000000000001002");
pub const STAKING_PRECOMPILE: Address = address!("0000000000000000000000000000000000001005");
pub const GOV_PRECOMPILE: Address = address!("0000000000000000000000000000000000001006");
pub const DISTRIBUTION_PRECOMPILE: Address = address!("0000000000000000000000000000000000001007");
pub const ORACLE_PRECOMPILE: Address = address!("0000000000000000000000000000000000001008");

/// Precompiles exercised by the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precompile {
    /// ERC20 pointer contract for a bank denom (deployed, address from fixture)
    Erc20,
    Gov,
    Distribution,
    Staking,
    Oracle,
    Wasmd,
}

impl Precompile {
    pub const ALL: [Precompile; 6] = [
        Precompile::Erc20,
        Precompile::Gov,
        Precompile::Distribution,
        Precompile::Staking,
        Precompile::Oracle,
        Precompile::Wasmd,
    ];

    /// Fixed precompile address; `None` for the deployed ERC20 pointer
    pub fn fixed_address(self) -> Option<Address> {
        match self {
            Precompile::Erc20 => None,
            Precompile::Gov => Some(GOV_PRECOMPILE),
            Precompile::Distribution => Some(DISTRIBUTION_PRECOMPILE),
            Precompile::Staking => Some(STAKING_PRECOMPILE),
            Precompile::Oracle => Some(ORACLE_PRECOMPILE),
            Precompile::Wasmd => Some(WASMD_PRECOMPILE),
        }
    }

    /// ABI location inside the node repository's `precompiles/` directory
    pub fn abi_path(self) -> &'static str {
        match self {
            Precompile::Erc20 => "common/erc20_abi.json",
            Precompile::Gov => "gov/abi.json",
            Precompile::Distribution => "distribution/abi.json",
            Precompile::Staking => "staking/abi.json",
            Precompile::Oracle => "oracle/abi.json",
            Precompile::Wasmd => "wasmd/abi.json",
        }
    }

    fn bundled_json(self) -> &'static str {
        match self {
            Precompile::Erc20 => include_str!("../abi/erc20.json"),
            Precompile::Gov => include_str!("../abi/gov.json"),
            Precompile::Distribution => include_str!("../abi/distribution.json"),
            Precompile::Staking => include_str!("../abi/staking.json"),
            Precompile::Oracle => include_str!("../abi/oracle.json"),
            Precompile::Wasmd => include_str!("../abi/wasmd.json"),
        }
    }
}

impl std::fmt::Display for Precompile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Precompile::Erc20 => write!(f, "erc20"),
            Precompile::Gov => write!(f, "gov"),
            Precompile::Distribution => write!(f, "distribution"),
            Precompile::Staking => write!(f, "staking"),
            Precompile::Oracle => write!(f, "oracle"),
            Precompile::Wasmd => write!(f, "wasmd"),
        }
    }
}

/// A parsed JSON ABI document
#[derive(Debug, Clone)]
pub struct AbiDescriptor {
    abi: JsonAbi,
}

impl AbiDescriptor {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let abi: JsonAbi =
            serde_json::from_str(json).map_err(|e| HarnessError::InvalidAbi(e.to_string()))?;
        Ok(Self { abi })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::InvalidAbi(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// The copy shipped with the harness
    pub fn bundled(precompile: Precompile) -> Result<Self> {
        Self::from_json_str(precompile.bundled_json())
    }

    /// Load from the node's `precompiles/` directory when given, bundled otherwise
    pub fn for_precompile(precompile: Precompile, abi_dir: Option<&Path>) -> Result<Self> {
        match abi_dir {
            Some(dir) => Self::from_path(&dir.join(precompile.abi_path())),
            None => Self::bundled(precompile),
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.abi.functions()
    }

    pub fn json_abi(&self) -> &JsonAbi {
        &self.abi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    ReadOnly,
    NonPayable,
    Payable,
}

impl From<StateMutability> for Mutability {
    fn from(value: StateMutability) -> Self {
        match value {
            StateMutability::Pure | StateMutability::View => Mutability::ReadOnly,
            StateMutability::NonPayable => Mutability::NonPayable,
            StateMutability::Payable => Mutability::Payable,
        }
    }
}

/// One callable method with its types resolved
#[derive(Debug, Clone)]
pub struct Method {
    function: Function,
    inputs: Vec<DynSolType>,
    input_shapes: Vec<Shape>,
    outputs: Vec<DynSolType>,
    output_shapes: Vec<(String, Shape)>,
    mutability: Mutability,
}

impl Method {
    fn build(function: &Function) -> Result<Self> {
        let resolve = |ty: &alloy::json_abi::Param| {
            ty.resolve().map_err(|e| {
                HarnessError::InvalidAbi(format!("{}: type {:?}: {}", function.name, ty.ty, e))
            })
        };

        let inputs = function.inputs.iter().map(resolve).collect::<Result<Vec<_>>>()?;
        let input_shapes = function.inputs.iter().map(Shape::of).collect();
        let outputs = function.outputs.iter().map(resolve).collect::<Result<Vec<_>>>()?;
        let output_shapes = function
            .outputs
            .iter()
            .enumerate()
            .map(|(i, p)| (field_name(&p.name, i), Shape::of(p)))
            .collect();

        Ok(Self {
            function: function.clone(),
            inputs,
            input_shapes,
            outputs,
            output_shapes,
            mutability: function.state_mutability.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn signature(&self) -> String {
        self.function.signature()
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn is_read_only(&self) -> bool {
        self.mutability == Mutability::ReadOnly
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Selector followed by the ABI-encoded arguments
    pub fn encode(&self, args: &[TypedValue]) -> Result<Vec<u8>> {
        if args.len() != self.inputs.len() {
            return Err(HarnessError::encoding(
                self.name(),
                format!("expected {} arguments, got {}", self.inputs.len(), args.len()),
            ));
        }

        let values = args
            .iter()
            .zip(self.inputs.iter().zip(&self.input_shapes))
            .map(|(arg, (ty, shape))| to_dyn(self.name(), arg, ty, shape))
            .collect::<Result<Vec<_>>>()?;

        let mut calldata = self.function.selector().to_vec();
        calldata.extend_from_slice(&DynSolValue::Tuple(values).abi_encode_params());
        Ok(calldata)
    }

    /// Decode return data
    ///
    /// One output yields that value, several yield a struct keyed by output
    /// name, none yield an empty sequence.
    pub fn decode_output(&self, data: &[u8]) -> Result<TypedValue> {
        if self.outputs.is_empty() {
            return Ok(TypedValue::Sequence(vec![]));
        }

        let decoded = DynSolType::Tuple(self.outputs.clone())
            .abi_decode_params(data)
            .map_err(|e| HarnessError::decode(self.name(), e.to_string()))?;

        let DynSolValue::Tuple(mut values) = decoded else {
            return Err(HarnessError::decode(self.name(), "expected a tuple of outputs"));
        };

        if values.len() != self.output_shapes.len() {
            return Err(HarnessError::decode(
                self.name(),
                format!("expected {} outputs, got {}", self.output_shapes.len(), values.len()),
            ));
        }

        if values.len() == 1 {
            let (_, shape) = &self.output_shapes[0];
            return from_dyn(self.name(), values.remove(0), shape);
        }

        let fields = values
            .into_iter()
            .zip(&self.output_shapes)
            .map(|(value, (name, shape))| Ok((name.clone(), from_dyn(self.name(), value, shape)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(TypedValue::Struct(fields))
    }
}

/// Method name -> overloads, resolved once per ABI
#[derive(Debug, Clone)]
pub struct MethodTable {
    by_name: BTreeMap<String, Vec<Method>>,
}

impl MethodTable {
    pub fn from_abi(abi: &AbiDescriptor) -> Result<Arc<Self>> {
        let mut by_name: BTreeMap<String, Vec<Method>> = BTreeMap::new();
        for function in abi.functions() {
            by_name
                .entry(function.name.clone())
                .or_default()
                .push(Method::build(function)?);
        }

        if by_name.is_empty() {
            return Err(HarnessError::InvalidAbi("ABI declares no functions".to_string()));
        }

        Ok(Arc::new(Self { by_name }))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Pick the overload of `name` taking `arity` arguments
    pub fn resolve(&self, name: &str, arity: usize) -> Result<&Method> {
        let overloads = self
            .by_name
            .get(name)
            .ok_or_else(|| HarnessError::UnknownMethod(name.to_string()))?;

        let mut matching = overloads.iter().filter(|m| m.arity() == arity);
        match (matching.next(), matching.next()) {
            (Some(method), None) => Ok(method),
            (Some(_), Some(_)) => Err(HarnessError::encoding(
                name,
                format!("{} overloads take {} arguments", overloads.len(), arity),
            )),
            (None, _) => Err(HarnessError::encoding(
                name,
                format!(
                    "no overload takes {} arguments (available: {})",
                    arity,
                    overloads
                        .iter()
                        .map(Method::signature)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        }
    }
}
