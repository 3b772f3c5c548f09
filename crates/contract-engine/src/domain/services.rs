//! # Domain Services
//!
//! Pure, deterministic helpers shared by the VM, compiler and service:
//! hashing, contract address derivation, and the 32-byte word encoding used
//! for calldata and return data.

use crate::domain::value_objects::{Address, Bytes, Hash, Word, U256};
use sha3::{Digest, Keccak256};

// =============================================================================
// HASHING
// =============================================================================

/// Keccak-256 of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    Hash::new(Keccak256::digest(data).into())
}

// =============================================================================
// CONTRACT ADDRESS
// =============================================================================

/// Address of a contract deployed by `sender` with deployment nonce `nonce`.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut content = Vec::with_capacity(30);
    rlp_bytes(&mut content, sender.as_bytes());
    rlp_bytes(&mut content, trim_leading_zeros(&nonce.to_be_bytes()));

    // Payload is at most 21 + 9 bytes, so the short list form always applies.
    let mut encoded = Vec::with_capacity(content.len() + 1);
    encoded.push(0xc0 + content.len() as u8);
    encoded.extend_from_slice(&content);

    let hash = keccak256(&encoded);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash.as_bytes()[12..]);
    Address::new(addr)
}

/// RLP string encoding for payloads shorter than 56 bytes.
fn rlp_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    match bytes {
        [single] if *single < 0x80 => out.push(*single),
        _ => {
            out.push(0x80 + bytes.len() as u8);
            out.extend_from_slice(bytes);
        }
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

// =============================================================================
// WORD ENCODING
// =============================================================================

/// Big-endian 32-byte encoding of a word.
#[must_use]
pub fn word_to_bytes(word: Word) -> [u8; 32] {
    let mut out = [0u8; 32];
    word.to_big_endian(&mut out);
    out
}

/// Concatenates each argument as a 32-byte big-endian word.
///
/// This is the constructor-argument encoding and the body of call data.
#[must_use]
pub fn encode_words(args: &[Word]) -> Bytes {
    let mut out = Vec::with_capacity(args.len() * 32);
    for arg in args {
        out.extend_from_slice(&word_to_bytes(*arg));
    }
    Bytes::from(out)
}

/// Call data for a function: 4-byte selector followed by word-encoded args.
#[must_use]
pub fn encode_call(selector: [u8; 4], args: &[Word]) -> Bytes {
    let mut out = Vec::with_capacity(4 + args.len() * 32);
    out.extend_from_slice(&selector);
    out.extend_from_slice(encode_words(args).as_slice());
    Bytes::from(out)
}

/// Reads the `index`th 32-byte word of `data`, zero-padding a short tail.
#[must_use]
pub fn decode_word(data: &[u8], index: usize) -> Word {
    let mut word = [0u8; 32];
    crate::evm::memory::copy_padded(&mut word, data, index.saturating_mul(32));
    U256::from_big_endian(&word)
}

// =============================================================================
// TESTS
// =============================================================================
