//! Client for the split-payment contract and its ERC-20 token.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use tracing::{debug, info};

use crate::chains::CanonicalChain;
use crate::config::SplitConfig;
use crate::error::{DefierError, Result};
use crate::interfaces::signer::{TransactionRequest, WalletSigner};
use crate::units::parse_units;

pub(crate) mod abi {
    use alloy_sol_types::sol;

    sol! {
        function decimals() external view returns (uint8);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function split(address[] recipients, uint256[] amounts) external;
    }
}

pub fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| DefierError::Validation(format!("not a 20-byte address: {raw}")))
}

fn to_calldata(data: Vec<u8>) -> String {
    format!("0x{}", hex::encode(data))
}

/// First 32-byte word of an `eth_call` result.
fn decode_word(output: &str) -> Result<U256> {
    let bytes = hex::decode(output.trim().trim_start_matches("0x"))
        .map_err(|e| DefierError::Serialization(format!("invalid call output {output}: {e}")))?;
    let word: [u8; 32] = bytes
        .get(..32)
        .and_then(|word| word.try_into().ok())
        .ok_or_else(|| {
            DefierError::Serialization(format!(
                "call output too short: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
    Ok(U256::from_be_bytes(word))
}

#[derive(Clone)]
pub struct SplitContract {
    signer: Arc<dyn WalletSigner>,
    chain: CanonicalChain,
    contract_address: String,
    token_address: String,
}

impl SplitContract {
    pub fn new(signer: Arc<dyn WalletSigner>, config: &SplitConfig) -> Self {
        Self {
            signer,
            chain: config.chain,
            contract_address: config.contract_address.clone(),
            token_address: config.token_address.clone(),
        }
    }

    pub fn chain(&self) -> CanonicalChain {
        self.chain
    }

    async fn read_word(&self, to: &str, data: Vec<u8>) -> Result<U256> {
        let output = self
            .signer
            .call(&TransactionRequest {
                from: None,
                to: to.to_string(),
                data: to_calldata(data),
                value: None,
            })
            .await?;
        decode_word(&output)
    }

    async fn resolve_owner(&self, sender: Option<&str>) -> Result<String> {
        if let Some(sender) = sender.filter(|s| !s.trim().is_empty()) {
            return Ok(sender.to_string());
        }
        self.signer
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DefierError::Validation("no wallet account is connected".to_string()))
    }

    /// Pays `amounts[i]` (human units) to `recipients[i]`, approving the
    /// contract first when the allowance is short. Returns the split
    /// transaction hash.
    pub async fn split_transfer(
        &self,
        recipients: &[String],
        amounts: &[String],
        sender: Option<&str>,
    ) -> Result<String> {
        if recipients.is_empty() || recipients.len() != amounts.len() {
            return Err(DefierError::Validation(
                "recipients and amounts length mismatch".to_string(),
            ));
        }
        let recipient_addresses = recipients
            .iter()
            .map(|recipient| parse_address(recipient))
            .collect::<Result<Vec<_>>>()?;
        let contract = parse_address(&self.contract_address)?;
        let owner_raw = self.resolve_owner(sender).await?;
        let owner = parse_address(&owner_raw)?;

        let decimals = self
            .read_word(&self.token_address, abi::decimalsCall {}.abi_encode())
            .await?;
        let decimals = u8::try_from(decimals).map_err(|_| {
            DefierError::Provider(format!("token reports unsupported decimals: {decimals}"))
        })?;

        let scaled = amounts
            .iter()
            .map(|amount| {
                parse_units(amount, decimals).ok_or_else(|| {
                    DefierError::Validation(format!("invalid split amount: {amount}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let total = scaled
            .iter()
            .try_fold(U256::ZERO, |acc, value| acc.checked_add(*value))
            .ok_or_else(|| DefierError::Validation("split total overflows".to_string()))?;

        let allowance_call = abi::allowanceCall {
            owner,
            spender: contract,
        };
        let allowance = self
            .read_word(&self.token_address, allowance_call.abi_encode())
            .await?;
        if allowance < total {
            info!(allowance = %allowance, total = %total, "Approving split contract");
            let approve_call = abi::approveCall {
                spender: contract,
                amount: total,
            };
            let approve_hash = self
                .signer
                .send_transaction(&TransactionRequest {
                    from: Some(owner_raw.clone()),
                    to: self.token_address.clone(),
                    data: to_calldata(approve_call.abi_encode()),
                    value: None,
                })
                .await?;
            let receipt = self.signer.wait_for_receipt(&approve_hash).await?;
            if !receipt.success {
                return Err(DefierError::Provider(format!(
                    "approval transaction {approve_hash} reverted"
                )));
            }
            debug!(tx_hash = %approve_hash, "Split approval confirmed");
        }

        let split_call = abi::splitCall {
            recipients: recipient_addresses,
            amounts: scaled,
        };
        let tx_hash = self
            .signer
            .send_transaction(&TransactionRequest {
                from: Some(owner_raw),
                to: self.contract_address.clone(),
                data: to_calldata(split_call.abi_encode()),
                value: None,
            })
            .await?;
        info!(tx_hash = %tx_hash, recipients = recipients.len(), "Split submitted");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_the_erc20_abi() {
        assert_eq!(hex::encode(abi::decimalsCall::SELECTOR), "313ce567");
        assert_eq!(hex::encode(abi::approveCall::SELECTOR), "095ea7b3");
        assert_eq!(hex::encode(abi::allowanceCall::SELECTOR), "dd62ed3e");
    }

    #[test]
    fn split_calldata_lays_out_both_dynamic_arrays() {
        let a = Address::repeat_byte(0x11);
        let b = Address::repeat_byte(0x22);
        let data = abi::splitCall {
            recipients: vec![a, b],
            amounts: vec![U256::from(5), U256::from(7)],
        }
        .abi_encode();
        // selector + 2 offsets + (len + 2) + (len + 2)
        assert_eq!(data.len(), 4 + 32 * 8);
        let word = |i: usize| U256::from_be_slice(&data[4 + 32 * i..4 + 32 * (i + 1)]);
        assert_eq!(word(0), U256::from(64));
        assert_eq!(word(1), U256::from(160));
        assert_eq!(word(2), U256::from(2));
        assert_eq!(&data[4 + 32 * 3 + 12..4 + 32 * 4], a.as_slice());
        assert_eq!(word(7), U256::from(7));
    }

    #[test]
    fn addresses_must_be_twenty_bytes() {
        assert!(parse_address("0x1111111111111111111111111111111111111111").is_ok());
        assert!(matches!(parse_address("0x1234"), Err(DefierError::Validation(_))));
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn call_output_reads_the_first_word() {
        let output = format!("0x{:064x}{:064x}", 6, 9);
        assert_eq!(decode_word(&output).unwrap(), U256::from(6));
        assert!(decode_word("0x06").is_err());
        assert!(decode_word("0xzz").is_err());
    }
}
