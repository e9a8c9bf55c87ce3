//! # Domain Services
//!
//! Pure address-derivation functions. Deterministic, no side effects, no I/O,
//! no async.

use crate::domain::value_objects::{AccountIndex, Address, Hash};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

// =============================================================================
// CONTRACT ADDRESS COMPUTATION
// =============================================================================

/// Computes the contract address for CREATE.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
///
/// Used for the controller's own identity when it is deployed by an EOA.
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.as_bytes().as_slice());
    stream.append(&nonce);
    address_from_hash(&Keccak256::digest(stream.out()))
}

/// Computes the CREATE2 address from the init code hash.
///
/// Address = keccak256(0xff ++ deployer ++ salt ++ `init_code_hash`)\[12:\]
///
/// Per EIP-1014.
#[must_use]
pub fn compute_create2_address(deployer: Address, salt: Hash, init_code_hash: Hash) -> Address {
    let mut data = Vec::with_capacity(85);
    data.push(0xff);
    data.extend_from_slice(deployer.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(init_code_hash.as_bytes());

    address_from_hash(&Keccak256::digest(&data))
}

/// Computes the CREATE2 address from the full init code.
#[must_use]
pub fn compute_contract_address_create2(deployer: Address, salt: Hash, init_code: &[u8]) -> Address {
    compute_create2_address(deployer, salt, keccak256(init_code))
}

/// Address of sub-account `index` under `controller` running `template_hash`.
///
/// This is the address `DeploymentRegistry` materializes the account at.
#[must_use]
pub fn derive_account_address(
    controller: Address,
    template_hash: Hash,
    index: AccountIndex,
) -> Address {
    compute_create2_address(controller, index.salt(), template_hash)
}

fn address_from_hash(hash: &[u8]) -> Address {
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::U256;
    use proptest::prelude::*;

    fn addr(s: &str) -> Address {
        Address::from_hex(s).unwrap()
    }

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(&[]);
        assert_eq!(
            hex::encode(hash.0),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_create2_eip1014_example_0() {
        let derived = compute_contract_address_create2(Address::ZERO, Hash::ZERO, &[0x00]);
        assert_eq!(derived, addr("0x4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38"));
    }

    #[test]
    fn test_create2_eip1014_example_1() {
        let deployer = addr("0xdeadbeef00000000000000000000000000000000");
        let derived = compute_contract_address_create2(deployer, Hash::ZERO, &[0x00]);
        assert_eq!(derived, addr("0xb928f69bb1d91cd65274e3c79d8986362984fda3"));
    }

    #[test]
    fn test_derive_account_address_uses_index_as_salt() {
        // Index 0 is the all-zero salt of example 0.
        let derived = derive_account_address(Address::ZERO, keccak256(&[0x00]), AccountIndex::from(0));
        assert_eq!(derived, addr("0x4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38"));
    }

    #[test]
    fn test_create_address_depends_on_nonce() {
        let sender = Address::new([1u8; 20]);
        assert_ne!(
            compute_contract_address(sender, 0),
            compute_contract_address(sender, 1)
        );
        assert_ne!(
            compute_contract_address(sender, 127),
            compute_contract_address(sender, 128)
        );
        assert_eq!(
            compute_contract_address(sender, 1_000),
            compute_contract_address(sender, 1_000)
        );
    }

    #[test]
    fn test_create_address_known_vectors() {
        let sender = addr("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
        assert_eq!(
            compute_contract_address(sender, 0),
            addr("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d")
        );
        assert_eq!(
            compute_contract_address(sender, 1),
            addr("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8")
        );
    }

    #[test]
    fn test_create_address_multi_byte_nonce_layout() {
        let sender = Address::new([1u8; 20]);
        let mut preimage = vec![0xd7, 0x94];
        preimage.extend_from_slice(sender.as_bytes());
        preimage.extend_from_slice(&[0x81, 0x80]);

        let hash = keccak256(&preimage);
        assert_eq!(
            compute_contract_address(sender, 128).as_bytes()[..],
            hash.0[12..]
        );
    }

    fn any_index() -> impl Strategy<Value = AccountIndex> {
        any::<[u64; 4]>().prop_map(|limbs| AccountIndex::new(U256(limbs)))
    }

    fn any_address() -> impl Strategy<Value = Address> {
        any::<[u8; 20]>().prop_map(Address::new)
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(controller in any_address(), index in any_index()) {
            let template = keccak256(b"template");
            prop_assert_eq!(
                derive_account_address(controller, template, index),
                derive_account_address(controller, template, index)
            );
        }

        #[test]
        fn prop_distinct_indices_give_distinct_addresses(
            controller in any_address(),
            a in any_index(),
            b in any_index(),
        ) {
            prop_assume!(a != b);
            let template = keccak256(b"template");
            prop_assert_ne!(
                derive_account_address(controller, template, a),
                derive_account_address(controller, template, b)
            );
        }

        #[test]
        fn prop_controller_separates_namespaces(
            first in any_address(),
            second in any_address(),
            index in any_index(),
        ) {
            prop_assume!(first != second);
            let template = keccak256(b"template");
            prop_assert_ne!(
                derive_account_address(first, template, index),
                derive_account_address(second, template, index)
            );
        }
    }
}
