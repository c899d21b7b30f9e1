//! Core types for guarded mutations

use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Base units per whole token (18 decimals)
pub const WEI_PER_TOKEN: u64 = 1_000_000_000_000_000_000;

/// Well-known key: current block number
pub const BLOCK_NUMBER_KEY: &str = "chain.block-number";

/// Well-known key: current block timestamp (unix seconds)
pub const TIMESTAMP_KEY: &str = "chain.timestamp";

fn parse_hex<const N: usize>(value: &str, what: &str) -> Result<[u8; N]> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes)
        .map_err(|e| Error::InvalidParams(format!("invalid {} '{}': {}", what, value, e)))?;
    Ok(bytes)
}

/// Account or contract address (20 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex::<20>(s.trim(), "address").map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Token amount in base units (wei)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero tokens
    pub const ZERO: Amount = Amount(0);

    /// From base units
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Base units
    pub fn wei(&self) -> u128 {
        self.0
    }

    /// Parse a decimal token string such as `"1.5"` into base units.
    ///
    /// Digits beyond 18 decimal places are truncated.
    pub fn from_tokens(value: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParams(format!("invalid amount '{}': {}", value, reason));

        let tokens = Decimal::from_str(value.trim()).map_err(|e| invalid(&e.to_string()))?;
        if tokens.is_sign_negative() && !tokens.is_zero() {
            return Err(invalid("amount cannot be negative"));
        }

        tokens
            .checked_mul(Decimal::from(WEI_PER_TOKEN))
            .and_then(|wei| wei.trunc().to_u128())
            .map(Self)
            .ok_or_else(|| invalid("amount out of range"))
    }

    /// Whole tokens
    pub fn whole_tokens(&self) -> u128 {
        self.0 / u128::from(WEI_PER_TOKEN)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// True when zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Six decimal places, rounded down
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = u128::from(WEI_PER_TOKEN);
        let fraction = (self.0 % unit) / 1_000_000_000_000;
        write!(f, "{}.{:06}", self.0 / unit, fraction)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse::<u128>().map(Amount).map_err(de::Error::custom)
    }
}

/// Key identifying one piece of remote state, e.g. `auction.lot.exists/3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Key with no arguments
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.0.push('/');
        self.0.push_str(&arg.to_string());
        self
    }

    /// `chain.block-number`
    pub fn block_number() -> Self {
        Self::new(BLOCK_NUMBER_KEY)
    }

    /// `chain.timestamp`
    pub fn timestamp() -> Self {
        Self::new(TIMESTAMP_KEY)
    }

    /// Path without arguments
    pub fn path(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Full key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value read from, or sent to, the remote ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// Flag
    Bool(bool),
    /// Count, index, block number or timestamp
    Uint(u64),
    /// Token amount
    Amount(Amount),
    /// Address
    Address(Address),
    /// Free text
    Text(String),
    /// Storage that was never written; reads as the zero value of any kind
    Unset,
}

impl StateValue {
    /// Kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            StateValue::Bool(_) => "bool",
            StateValue::Uint(_) => "uint",
            StateValue::Amount(_) => "amount",
            StateValue::Address(_) => "address",
            StateValue::Text(_) => "text",
            StateValue::Unset => "unset",
        }
    }

    /// True for never-written storage
    pub fn is_unset(&self) -> bool {
        matches!(self, StateValue::Unset)
    }

    /// Bool payload; unset is `false`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(v) => Some(*v),
            StateValue::Unset => Some(false),
            _ => None,
        }
    }

    /// Uint payload; unset is `0`
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            StateValue::Uint(v) => Some(*v),
            StateValue::Unset => Some(0),
            _ => None,
        }
    }

    /// Amount payload; unset is zero
    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            StateValue::Amount(v) => Some(*v),
            StateValue::Unset => Some(Amount::ZERO),
            _ => None,
        }
    }

    /// Address payload; unset is the zero address
    pub fn as_address(&self) -> Option<Address> {
        match self {
            StateValue::Address(v) => Some(*v),
            StateValue::Unset => Some(Address::ZERO),
            _ => None,
        }
    }

    /// Text payload; unset is empty
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(v) => Some(v),
            StateValue::Unset => Some(""),
            _ => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

impl From<u64> for StateValue {
    fn from(v: u64) -> Self {
        StateValue::Uint(v)
    }
}

impl From<Amount> for StateValue {
    fn from(v: Amount) -> Self {
        StateValue::Amount(v)
    }
}

impl From<Address> for StateValue {
    fn from(v: Address) -> Self {
        StateValue::Address(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Text(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Text(v)
    }
}

/// Mutation kind, e.g. `odao.join`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Operation(&'static str);

impl Operation {
    /// Name an operation
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Registered name
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Named parameter bundle for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, StateValue>);

impl Params {
    /// Empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<StateValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw lookup
    pub fn get(&self, name: &str) -> Option<&StateValue> {
        self.0.get(name)
    }

    /// True if set
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no parameters are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        extract: impl FnOnce(&'a StateValue) -> Option<T>,
    ) -> Result<T> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| Error::InvalidParams(format!("missing parameter '{}'", name)))?;
        extract(value).ok_or_else(|| {
            Error::InvalidParams(format!(
                "parameter '{}' must be {}, got {}",
                name,
                expected,
                value.kind()
            ))
        })
    }

    /// Required bool parameter
    pub fn bool(&self, name: &str) -> Result<bool> {
        self.typed(name, "bool", StateValue::as_bool)
    }

    /// Required uint parameter
    pub fn uint(&self, name: &str) -> Result<u64> {
        self.typed(name, "uint", StateValue::as_uint)
    }

    /// Required amount parameter
    pub fn amount(&self, name: &str) -> Result<Amount> {
        self.typed(name, "amount", StateValue::as_amount)
    }

    /// Required address parameter
    pub fn address(&self, name: &str) -> Result<Address> {
        self.typed(name, "address", StateValue::as_address)
    }

    /// Required text parameter
    pub fn text(&self, name: &str) -> Result<&str> {
        self.typed(name, "text", StateValue::as_text)
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Flag {
    /// Check name
    pub name: &'static str,
    /// Explanation shown when blocking
    pub reason: &'static str,
    /// True if this check blocks the operation
    pub blocking: bool,
}

/// Composite eligibility decision for one invocation.
///
/// Flags keep the declaration order of their checks, independent of
/// the order in which the checks completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    operation: Operation,
    flags: Vec<Flag>,
}

impl EligibilityResult {
    /// Build from flags in declaration order
    pub fn new(operation: Operation, flags: Vec<Flag>) -> Self {
        Self { operation, flags }
    }

    /// Operation evaluated
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// True iff no flag is blocking
    pub fn eligible(&self) -> bool {
        !self.flags.iter().any(|f| f.blocking)
    }

    /// All flags
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Blocking state of one named check
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|f| f.name == name).map(|f| f.blocking)
    }

    /// Reasons of every blocking check
    pub fn blocking_reasons(&self) -> Vec<&'static str> {
        self.flags
            .iter()
            .filter(|f| f.blocking)
            .map(|f| f.reason)
            .collect()
    }
}

/// Opaque reference to a submitted mutation (32-byte hash)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionHandle([u8; 32]);

impl TransactionHandle {
    /// Wrap a hash
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TransactionHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex::<32>(s.trim(), "transaction hash").map(Self)
    }
}

impl Serialize for TransactionHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Inclusion status of a handle. Included and Failed are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Not yet in a block
    Pending,
    /// Included and applied
    Included {
        /// Block number
        block: u64,
    },
    /// Included but reverted
    Failed {
        /// Revert reason
        reason: String,
    },
}

impl ConfirmationStatus {
    /// True for Included and Failed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationStatus::Pending)
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Included { .. } => "included",
            ConfirmationStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Pending => f.write_str("pending"),
            ConfirmationStatus::Included { block } => write!(f, "included in block {}", block),
            ConfirmationStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
