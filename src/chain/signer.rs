use alloy_primitives::{keccak256, Address, B256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::rlp;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("private key is not valid hex")]
    InvalidHex,
    #[error("private key must be 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid secp256k1 key: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}

/// Node signing key
/// The key bytes are wiped when the signer is dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct LocalSigner {
    private_key_bytes: [u8; 32],
    #[zeroize(skip)]
    address: Address,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Load a signer from a hex private key, with or without `0x`
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let mut bytes = hex::decode(key).map_err(|_| SignerError::InvalidHex)?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(SignerError::InvalidLength(len));
        }

        let mut private_key_bytes = [0u8; 32];
        private_key_bytes.copy_from_slice(&bytes);
        bytes.zeroize();

        let secret_key = SecretKey::from_slice(&private_key_bytes)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);

        Ok(Self {
            private_key_bytes,
            address: public_key_address(&public_key),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, returning the recovery id and compact signature
    pub fn sign_hash(&self, hash: &B256) -> Result<(RecoveryId, [u8; 64]), SignerError> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&self.private_key_bytes)?;
        let message = Message::from_digest_slice(hash.as_slice())?;
        let signature: RecoverableSignature = secp.sign_ecdsa_recoverable(&message, &secret_key);
        Ok(signature.serialize_compact())
    }

    /// Sign a legacy transaction with EIP-155 replay protection
    pub fn sign_legacy(&self, tx: &LegacyTransaction) -> Result<Vec<u8>, SignerError> {
        let (recovery_id, signature) = self.sign_hash(&tx.signing_hash())?;
        let v = recovery_id.to_i32() as u64 + 35 + 2 * tx.chain_id;

        let mut fields = tx.base_fields();
        fields.push(rlp::encode_uint(v as u128));
        fields.push(rlp::encode_uint_bytes(&signature[..32]));
        fields.push(rlp::encode_uint_bytes(&signature[32..]));
        Ok(rlp::encode_list(&fields))
    }
}

/// Ethereum address of a public key: last 20 bytes of keccak256 over X || Y
fn public_key_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Pre-EIP-1559 transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_uint(self.nonce as u128),
            rlp::encode_uint(self.gas_price),
            rlp::encode_uint(self.gas_limit as u128),
            rlp::encode_bytes(self.to.as_slice()),
            rlp::encode_uint(self.value),
            rlp::encode_bytes(&self.data),
        ]
    }

    /// keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))
    pub fn signing_hash(&self) -> B256 {
        let mut fields = self.base_fields();
        fields.push(rlp::encode_uint(self.chain_id as u128));
        fields.push(rlp::encode_uint(0));
        fields.push(rlp::encode_uint(0));
        keccak256(rlp::encode_list(&fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (account #0 of local dev chains)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sample_tx() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 7,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            to: Address::from_slice(&[0x42; 20]),
            value: 0,
            data: vec![0xde, 0xad],
            chain_id: 31337,
        }
    }

    #[test]
    fn test_address_derivation() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let expected: Address = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap();
        assert_eq!(signer.address(), expected);

        let unprefixed = LocalSigner::from_hex(&DEV_KEY[2..]).unwrap();
        assert_eq!(unprefixed.address(), expected);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(LocalSigner::from_hex("0xzz"), Err(SignerError::InvalidHex)));
        assert!(matches!(LocalSigner::from_hex("0x0102"), Err(SignerError::InvalidLength(2))));
        let zero = format!("0x{}", "00".repeat(32));
        assert!(matches!(LocalSigner::from_hex(&zero), Err(SignerError::InvalidKey(_))));
    }

    #[test]
    fn test_signature_recovers_signer() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let hash = sample_tx().signing_hash();
        let (recovery_id, compact) = signer.sign_hash(&hash).unwrap();

        let secp = Secp256k1::new();
        let signature = RecoverableSignature::from_compact(&compact, recovery_id).unwrap();
        let message = Message::from_digest_slice(hash.as_slice()).unwrap();
        let recovered = secp.recover_ecdsa(&message, &signature).unwrap();
        assert_eq!(public_key_address(&recovered), signer.address());
    }

    #[test]
    fn test_signed_legacy_is_rlp_list() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let raw = signer.sign_legacy(&sample_tx()).unwrap();
        // Long list prefix: payload exceeds 55 bytes once r and s are included
        assert_eq!(raw[0], 0xf8);
        assert_eq!(raw[1] as usize, raw.len() - 2);
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let rendered = format!("{:?}", signer);
        assert!(!rendered.contains("ac0974"));
    }

    #[test]
    fn test_zeroize_wipes_key_only() {
        let mut signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let address = signer.address();

        signer.zeroize();

        assert_eq!(signer.private_key_bytes, [0u8; 32]);
        assert_eq!(signer.address(), address);
    }
}
