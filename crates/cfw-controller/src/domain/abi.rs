//! # Token Call Codec
//!
//! Solidity ABI encoding for the handful of ledger calls a sub-account issues
//! on its own behalf: ERC-20 `transfer`/`balanceOf` and ERC-721
//! `transferFrom`/`safeTransferFrom`/`ownerOf`. Arbitrary owner payloads stay
//! opaque and never pass through this module.

use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::AbiError;

/// Function selectors of the supported ledger calls.
pub mod selectors {
    /// `transfer(address,uint256)`
    pub const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
    /// `balanceOf(address)`
    pub const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
    /// `transferFrom(address,address,uint256)`
    pub const TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];
    /// `safeTransferFrom(address,address,uint256)`
    pub const SAFE_TRANSFER_FROM: [u8; 4] = [0x42, 0x84, 0x2e, 0x0e];
    /// `ownerOf(uint256)`
    pub const OWNER_OF: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
}

/// Size of one ABI word.
pub const WORD: usize = 32;

/// A decoded ledger call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenCall {
    /// ERC-20 `transfer(to, amount)`.
    Transfer { to: Address, amount: U256 },
    /// ERC-20 `balanceOf(holder)`.
    BalanceOf { holder: Address },
    /// ERC-721 `transferFrom(from, to, tokenId)`.
    TransferFrom {
        from: Address,
        to: Address,
        token_id: U256,
    },
    /// ERC-721 `safeTransferFrom(from, to, tokenId)`.
    SafeTransferFrom {
        from: Address,
        to: Address,
        token_id: U256,
    },
    /// ERC-721 `ownerOf(tokenId)`.
    OwnerOf { token_id: U256 },
}

impl TokenCall {
    /// Encodes selector plus arguments.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let (selector, words): ([u8; 4], Vec<[u8; 32]>) = match self {
            Self::Transfer { to, amount } => (selectors::TRANSFER, vec![to.to_word(), u256_word(*amount)]),
            Self::BalanceOf { holder } => (selectors::BALANCE_OF, vec![holder.to_word()]),
            Self::TransferFrom { from, to, token_id } => (
                selectors::TRANSFER_FROM,
                vec![from.to_word(), to.to_word(), u256_word(*token_id)],
            ),
            Self::SafeTransferFrom { from, to, token_id } => (
                selectors::SAFE_TRANSFER_FROM,
                vec![from.to_word(), to.to_word(), u256_word(*token_id)],
            ),
            Self::OwnerOf { token_id } => (selectors::OWNER_OF, vec![u256_word(*token_id)]),
        };

        let mut data = Vec::with_capacity(4 + words.len() * WORD);
        data.extend_from_slice(&selector);
        for word in &words {
            data.extend_from_slice(word);
        }
        Bytes::from_vec(data)
    }

    /// Decodes calldata into a known ledger call.
    ///
    /// # Errors
    ///
    /// `TooShort` for truncated input, `UnknownSelector` for anything else,
    /// `DirtyAddress` for address words with non-zero padding.
    pub fn decode(data: &[u8]) -> Result<Self, AbiError> {
        if data.len() < 4 {
            return Err(AbiError::TooShort {
                expected: 4,
                actual: data.len(),
            });
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        let args = &data[4..];

        match selector {
            selectors::TRANSFER => Ok(Self::Transfer {
                to: decode_address(word(args, 0)?)?,
                amount: decode_u256(word(args, 1)?)?,
            }),
            selectors::BALANCE_OF => Ok(Self::BalanceOf {
                holder: decode_address(word(args, 0)?)?,
            }),
            selectors::TRANSFER_FROM => Ok(Self::TransferFrom {
                from: decode_address(word(args, 0)?)?,
                to: decode_address(word(args, 1)?)?,
                token_id: decode_u256(word(args, 2)?)?,
            }),
            selectors::SAFE_TRANSFER_FROM => Ok(Self::SafeTransferFrom {
                from: decode_address(word(args, 0)?)?,
                to: decode_address(word(args, 1)?)?,
                token_id: decode_u256(word(args, 2)?)?,
            }),
            selectors::OWNER_OF => Ok(Self::OwnerOf {
                token_id: decode_u256(word(args, 0)?)?,
            }),
            other => Err(AbiError::UnknownSelector(other)),
        }
    }
}

/// ERC-20 `transfer(to, amount)` calldata.
#[must_use]
pub fn erc20_transfer(to: Address, amount: U256) -> Bytes {
    TokenCall::Transfer { to, amount }.encode()
}

/// ERC-20 `balanceOf(holder)` calldata.
#[must_use]
pub fn erc20_balance_of(holder: Address) -> Bytes {
    TokenCall::BalanceOf { holder }.encode()
}

/// ERC-721 `transferFrom(from, to, tokenId)` calldata.
#[must_use]
pub fn erc721_transfer_from(from: Address, to: Address, token_id: U256) -> Bytes {
    TokenCall::TransferFrom { from, to, token_id }.encode()
}

/// ERC-721 `ownerOf(tokenId)` calldata.
#[must_use]
pub fn erc721_owner_of(token_id: U256) -> Bytes {
    TokenCall::OwnerOf { token_id }.encode()
}

// =============================================================================
// WORD CODEC
// =============================================================================

fn u256_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn word(args: &[u8], position: usize) -> Result<&[u8], AbiError> {
    let start = position * WORD;
    let end = start + WORD;
    args.get(start..end).ok_or(AbiError::TooShort {
        expected: 4 + end,
        actual: 4 + args.len(),
    })
}

/// Encodes a `uint256` return value.
#[must_use]
pub fn encode_u256(value: U256) -> Bytes {
    Bytes::from_vec(u256_word(value).to_vec())
}

/// Encodes an `address` return value.
#[must_use]
pub fn encode_address(address: Address) -> Bytes {
    Bytes::from_vec(address.to_word().to_vec())
}

/// Encodes a `bool` return value.
#[must_use]
pub fn encode_bool(value: bool) -> Bytes {
    encode_u256(U256::from(u8::from(value)))
}

/// Decodes the first word as `uint256`.
///
/// # Errors
///
/// `TooShort` if fewer than 32 bytes are present.
pub fn decode_u256(data: &[u8]) -> Result<U256, AbiError> {
    let head = data.get(..WORD).ok_or(AbiError::TooShort {
        expected: WORD,
        actual: data.len(),
    })?;
    Ok(U256::from_big_endian(head))
}

/// Decodes the first word as `address`.
///
/// # Errors
///
/// `TooShort` if fewer than 32 bytes are present, `DirtyAddress` if the
/// 12 padding bytes are not zero.
pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    let head = data.get(..WORD).ok_or(AbiError::TooShort {
        expected: WORD,
        actual: data.len(),
    })?;
    if head[..12].iter().any(|&b| b != 0) {
        return Err(AbiError::DirtyAddress);
    }
    Address::from_slice(&head[12..]).ok_or(AbiError::DirtyAddress)
}

/// Interprets an ERC-20 style boolean return.
///
/// Empty return data counts as success (tokens that return nothing).
///
/// # Errors
///
/// `TooShort` for a partial word.
pub fn decode_optional_bool(data: &[u8]) -> Result<bool, AbiError> {
    if data.is_empty() {
        return Ok(true);
    }
    Ok(!decode_u256(data)?.is_zero())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::keccak256;

    fn selector(signature: &str) -> [u8; 4] {
        let hash = keccak256(signature.as_bytes());
        [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
    }

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(selector("transfer(address,uint256)"), selectors::TRANSFER);
        assert_eq!(selector("balanceOf(address)"), selectors::BALANCE_OF);
        assert_eq!(
            selector("transferFrom(address,address,uint256)"),
            selectors::TRANSFER_FROM
        );
        assert_eq!(
            selector("safeTransferFrom(address,address,uint256)"),
            selectors::SAFE_TRANSFER_FROM
        );
        assert_eq!(selector("ownerOf(uint256)"), selectors::OWNER_OF);
    }

    #[test]
    fn test_transfer_layout() {
        let to = Address::new([0x22; 20]);
        let data = erc20_transfer(to, U256::from(7000));
        assert_eq!(data.len(), 4 + 2 * WORD);
        assert_eq!(data.as_slice()[..4], selectors::TRANSFER);
        assert_eq!(data.as_slice()[4..16], [0u8; 12]);
        assert_eq!(data.as_slice()[16..36], [0x22; 20]);
        // 7000 = 0x1b58
        assert_eq!(data.as_slice()[66..68], [0x1b, 0x58]);

        assert_eq!(
            TokenCall::decode(data.as_slice()).unwrap(),
            TokenCall::Transfer {
                to,
                amount: U256::from(7000)
            }
        );
    }

    #[test]
    fn test_decode_rejects_truncated_arguments() {
        let data = erc20_transfer(Address::new([1; 20]), U256::one());
        let err = TokenCall::decode(&data.as_slice()[..40]).unwrap_err();
        assert_eq!(
            err,
            AbiError::TooShort {
                expected: 68,
                actual: 40
            }
        );

        assert!(matches!(
            TokenCall::decode(&[0xa9]),
            Err(AbiError::TooShort { expected: 4, .. })
        ));
    }

    #[test]
    fn test_decode_unknown_selector() {
        let err = TokenCall::decode(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert_eq!(err, AbiError::UnknownSelector([0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_dirty_address_rejected() {
        let mut word = Address::new([3; 20]).to_word();
        word[0] = 1;
        assert_eq!(decode_address(&word), Err(AbiError::DirtyAddress));
    }

    #[test]
    fn test_optional_bool() {
        assert!(decode_optional_bool(&[]).unwrap());
        assert!(decode_optional_bool(encode_bool(true).as_slice()).unwrap());
        assert!(!decode_optional_bool(encode_bool(false).as_slice()).unwrap());
        assert!(decode_optional_bool(&[1, 2, 3]).is_err());
    }
}
