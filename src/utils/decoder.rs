//! Transaction field decoder
//! Parses hex/decimal quantities, method selectors and ERC20 approval calldata

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::TransactionRecord;
use crate::utils::constants::{WEI_PER_ETH, WEI_PER_GWEI};

// ERC20 allowance functions
sol! {
    function approve(address spender, uint256 amount) external returns (bool);
    function increaseAllowance(address spender, uint256 addedValue) external returns (bool);
}

/// 4-byte selector of `approve(address,uint256)` (0x095ea7b3)
pub const APPROVE_SELECTOR: [u8; 4] = approveCall::SELECTOR;

/// Parameters of a decoded allowance call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalParams {
    pub spender: Address,
    pub amount: U256,
}

/// Parse a quantity given as `0x`-prefixed hex or as a decimal string
pub fn parse_quantity(raw: &str) -> Result<U256, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty quantity".to_string());
    }
    if raw.eq_ignore_ascii_case("0x") {
        return Ok(U256::ZERO);
    }
    U256::from_str(raw).map_err(|e| format!("{} ({:?})", e, raw))
}

/// Read a quantity field; numbers and numeric strings are both accepted
pub fn quantity_field(tx: &TransactionRecord, field: &str) -> AppResult<Option<U256>> {
    match tx.get(field) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => parse_quantity(s)
            .map(Some)
            .map_err(|e| AppError::invalid_field(field, e)),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(|v| Some(U256::from(v)))
            .ok_or_else(|| AppError::invalid_field(field, "expected non-negative integer")),
        Some(other) => Err(AppError::invalid_field(
            field,
            format!("expected quantity, got {}", other),
        )),
    }
}

/// Lossy conversion for ratios
pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::MAX)
}

/// Convert wei to ETH
pub fn wei_to_eth(wei: U256) -> f64 {
    let wei_u128: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei_u128 as f64 / WEI_PER_ETH
}

/// Convert wei to gwei
pub fn wei_to_gwei(wei: U256) -> f64 {
    let wei_u128: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei_u128 as f64 / WEI_PER_GWEI
}

/// Decode `0x`-prefixed (or bare) hex into bytes
pub fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.trim();
    let stripped = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    hex::decode(stripped).ok()
}

/// First four bytes of a method id or of full calldata
pub fn selector(raw: &str) -> Option<[u8; 4]> {
    let bytes = decode_hex(raw)?;
    bytes.get(..4)?.try_into().ok()
}

/// Decode `approve` / `increaseAllowance` calldata
pub fn decode_approval(calldata: &[u8]) -> Option<ApprovalParams> {
    if calldata.len() < 4 {
        return None;
    }

    if let Ok(call) = approveCall::abi_decode(calldata, false) {
        return Some(ApprovalParams {
            spender: call.spender,
            amount: call.amount,
        });
    }

    increaseAllowanceCall::abi_decode(calldata, false)
        .ok()
        .map(|call| ApprovalParams {
            spender: call.spender,
            amount: call.addedValue,
        })
}

/// Is this selector one of the allowance-granting calls?
pub fn is_approval_selector(sel: &[u8; 4]) -> bool {
    *sel == APPROVE_SELECTOR || *sel == increaseAllowanceCall::SELECTOR
}

/// Lowercase, trimmed address for map keys and set lookups
#[inline]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
