//! Minimal Solidity ABI encoding for the calls and events the front end uses.

use crate::{CallValue, ClientError, ReadCall, WriteCall};
use pf_api_types::{Address, ContractEvent, ContractRef, EventKind, U256, Wei};
use sha3::{Digest, Keccak256};

pub type Word = [u8; 32];

pub fn keccak(input: &[u8]) -> Word {
    Keccak256::digest(input).into()
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_signature(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Funded => "Funded(address,uint256,uint256)",
        EventKind::NftMinted => "NftMinted(address)",
        EventKind::TierUpgraded => "TierUpgraded(address,uint256)",
    }
}

pub fn event_topic(kind: EventKind) -> Word {
    keccak(event_signature(kind).as_bytes())
}

pub fn uint_word(value: U256) -> Word {
    let mut word = [0_u8; 32];
    for (index, slot) in word.iter_mut().enumerate() {
        *slot = value.byte(31 - index);
    }
    word
}

pub fn address_word(address: &Address) -> Word {
    let mut word = [0_u8; 32];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

pub fn encode_read(call: &ReadCall) -> Vec<u8> {
    let mut data = selector(call.signature()).to_vec();
    match call {
        ReadCall::ContributionUsd(address) => data.extend_from_slice(&address_word(address)),
        ReadCall::RewardFor(amount) => data.extend_from_slice(&uint_word(amount.0)),
        ReadCall::RewardPoolBalance
        | ReadCall::NftTotalSupply
        | ReadCall::TokenDecimals
        | ReadCall::TokenSymbol => {}
    }
    data
}

/// Target contract, calldata and attached value of a write.
pub fn encode_write(call: &WriteCall) -> (ContractRef, Vec<u8>, Wei) {
    match call {
        WriteCall::Fund { value } => (ContractRef::Funding, selector("fund()").to_vec(), *value),
    }
}

pub fn decode_uint(data: &[u8]) -> Result<U256, ClientError> {
    if data.len() < 32 {
        return Err(ClientError::Decode(format!(
            "expected 32-byte word, got {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_big_endian(&data[..32]))
}

pub fn decode_string(data: &[u8]) -> Result<String, ClientError> {
    let offset = word_to_usize(data, 0)?;
    let length = word_to_usize(data, offset)?;
    let start = offset + 32;
    let bytes = data
        .get(start..start + length)
        .ok_or_else(|| ClientError::Decode("string body out of range".into()))?;
    String::from_utf8(bytes.to_vec()).map_err(|err| ClientError::Decode(err.to_string()))
}

fn word_to_usize(data: &[u8], at: usize) -> Result<usize, ClientError> {
    let word = data
        .get(at..at + 32)
        .ok_or_else(|| ClientError::Decode(format!("no word at offset {at}")))?;
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return Err(ClientError::Decode("offset out of range".into()));
    }
    Ok(value.low_u64() as usize)
}

pub fn decode_read(call: &ReadCall, data: &[u8]) -> Result<CallValue, ClientError> {
    match call {
        ReadCall::TokenSymbol => decode_string(data).map(CallValue::Text),
        _ => decode_uint(data).map(CallValue::Uint),
    }
}

pub fn decode_event(topics: &[Word], data: &[u8]) -> Result<ContractEvent, ClientError> {
    let Some(topic0) = topics.first() else {
        return Err(ClientError::Decode("log has no topics".into()));
    };
    let subject = topics
        .get(1)
        .ok_or_else(|| ClientError::Decode("log is missing its indexed address".into()))
        .and_then(|word| {
            Address::from_word(word).map_err(|err| ClientError::Decode(err.to_string()))
        })?;

    if *topic0 == event_topic(EventKind::Funded) {
        let eth_amount = decode_uint(data)?;
        let pica_awarded = decode_uint(data.get(32..).unwrap_or_default())?;
        Ok(ContractEvent::Funded {
            funder: subject,
            eth_amount: Wei(eth_amount),
            pica_awarded: Wei(pica_awarded),
        })
    } else if *topic0 == event_topic(EventKind::NftMinted) {
        Ok(ContractEvent::NftMinted { recipient: subject })
    } else if *topic0 == event_topic(EventKind::TierUpgraded) {
        Ok(ContractEvent::TierUpgraded {
            user: subject,
            total_usd: Wei(decode_uint(data)?),
        })
    } else {
        Err(ClientError::Decode(format!("unknown event topic 0x{}", hex::encode(topic0))))
    }
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex_prefixed(raw: &str) -> Result<Vec<u8>, ClientError> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(body).map_err(|err| ClientError::Decode(format!("bad hex {raw}: {err}")))
}

pub fn word_from_hex(raw: &str) -> Result<Word, ClientError> {
    let bytes = from_hex_prefixed(raw)?;
    bytes
        .try_into()
        .map_err(|_| ClientError::Decode(format!("expected 32-byte topic, got {raw}")))
}

/// JSON-RPC quantity encoding: hex without leading zeros.
pub fn quantity(value: U256) -> String {
    format!("0x{value:x}")
}

pub fn parse_quantity(raw: &str) -> Result<U256, ClientError> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    if body.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(body, 16).map_err(|_| ClientError::Decode(format!("bad quantity {raw}")))
}
