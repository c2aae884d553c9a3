//! Decoding of the tradable contract's `Redeem` event.
//!
//! ```text
//! event Redeem(address redeemer, uint256 tokenId, uint8 offerId)
//! ```
//!
//! Parameters are read in declaration order: as many as there are indexed
//! topics (after the signature topic) come from the topics, the rest from
//! consecutive 32-byte words of the log data.

use crate::chain::rpc::Log;
use crate::errors::{FulfillmentError, Result};
use sha3::{Digest, Keccak256};

pub const REDEEM_EVENT_SIGNATURE: &str = "Redeem(address,uint256,uint8)";

const WORD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Address,
    Uint256,
    Uint8,
}

const REDEEM_PARAMS: [ParamKind; 3] = [ParamKind::Address, ParamKind::Uint256, ParamKind::Uint8];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemEvent {
    /// Lowercase hex address of the redeemer.
    pub redeemer: String,
    /// Decimal rendering of the `uint256` token id.
    pub token_id: String,
    pub offer_id: String,
}

/// `topics[0]` of every Redeem log.
pub fn redeem_topic() -> [u8; WORD] {
    Keccak256::digest(REDEEM_EVENT_SIGNATURE.as_bytes()).into()
}

pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits).map_err(|e| FulfillmentError::Decode(format!("invalid hex {:?}: {}", value, e)))
}

fn decode_word(value: &str) -> Result<[u8; WORD]> {
    let bytes = decode_hex(value)?;
    <[u8; WORD]>::try_from(bytes.as_slice())
        .map_err(|_| FulfillmentError::Decode(format!("expected a 32-byte word, got {} bytes", bytes.len())))
}

pub fn decode_redeem_log(log: &Log) -> Result<RedeemEvent> {
    let signature = log
        .topics
        .first()
        .ok_or_else(|| FulfillmentError::Decode("log has no topics".to_string()))?;
    if decode_word(signature)? != redeem_topic() {
        return Err(FulfillmentError::Decode(format!(
            "log is not a {} event",
            REDEEM_EVENT_SIGNATURE
        )));
    }

    let indexed = log.topics.len() - 1;
    if indexed > REDEEM_PARAMS.len() {
        return Err(FulfillmentError::Decode(format!(
            "{} indexed topics for a {}-parameter event",
            indexed,
            REDEEM_PARAMS.len()
        )));
    }

    let data = decode_hex(&log.data)?;
    let expected = (REDEEM_PARAMS.len() - indexed) * WORD;
    if data.len() != expected {
        return Err(FulfillmentError::Decode(format!(
            "log data is {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    let mut words: Vec<[u8; WORD]> = Vec::with_capacity(REDEEM_PARAMS.len());
    for topic in &log.topics[1..] {
        words.push(decode_word(topic)?);
    }
    for chunk in data.chunks_exact(WORD) {
        let mut word = [0u8; WORD];
        word.copy_from_slice(chunk);
        words.push(word);
    }

    let mut values = REDEEM_PARAMS
        .iter()
        .zip(words.iter())
        .map(|(kind, word)| decode_param(*kind, word));

    let redeemer = next_value(&mut values)?;
    let token_id = next_value(&mut values)?;
    let offer_id = next_value(&mut values)?;

    Ok(RedeemEvent {
        redeemer,
        token_id,
        offer_id,
    })
}

fn next_value(values: &mut impl Iterator<Item = Result<String>>) -> Result<String> {
    values
        .next()
        .unwrap_or_else(|| Err(FulfillmentError::Decode("missing event parameter".to_string())))
}

fn decode_param(kind: ParamKind, word: &[u8; WORD]) -> Result<String> {
    match kind {
        ParamKind::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(FulfillmentError::Decode("address word has dirty high bytes".to_string()));
            }
            Ok(format!("0x{}", hex::encode(&word[12..])))
        }
        ParamKind::Uint256 => Ok(uint_to_decimal(word)),
        ParamKind::Uint8 => {
            if word[..WORD - 1].iter().any(|b| *b != 0) {
                return Err(FulfillmentError::Decode("uint8 value out of range".to_string()));
            }
            Ok(word[WORD - 1].to_string())
        }
    }
}

/// Big-endian unsigned integer to decimal, by repeated division.
pub fn uint_to_decimal(word: &[u8]) -> String {
    let mut number = word.to_vec();
    let mut digits: Vec<char> = Vec::new();

    while number.iter().any(|b| *b != 0) {
        let mut remainder: u32 = 0;
        for byte in number.iter_mut() {
            let acc = (remainder << 8) | u32::from(*byte);
            *byte = (acc / 10) as u8;
            remainder = acc % 10;
        }
        digits.push(char::from(b'0' + remainder as u8));
    }

    if digits.is_empty() {
        return "0".to_string();
    }
    digits.iter().rev().collect()
}
