//! # Ed25519 Commitment Signatures
//!
//! The commitment prover signs the 32-byte commitment digest, never the
//! payload, and embeds the public key in both the proof and the
//! verification key. Keys and signatures travel inside proof JSON as
//! lowercase hex, so the wire types here are thin fixed-size wrappers with
//! hex codecs rather than serde impls.
//!
//! ## Security Invariant
//!
//! - The private seed never leaves [`Ed25519KeyPair`]: no accessor, no
//!   `Serialize`, redacted `Debug`.
//! - Verification uses `verify_strict`, rejecting small-order keys and
//!   non-canonical signatures.

use attest_core::error::CryptoError;
use attest_core::{hex, EntropySource};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

macro_rules! fixed_hex {
    ($(#[$meta:meta])* $name:ident, $len:literal, $what:literal, $err:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
                hex::decode_array::<$len>(s)
                    .map(Self)
                    .map_err(|e| CryptoError::$err(format!(concat!($what, ": {}"), e)))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({}..)"), hex::prefix(&self.0))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

fixed_hex!(
    /// Compressed Edwards point identifying a commitment signer.
    Ed25519PublicKey,
    32,
    "public key",
    KeyError
);
fixed_hex!(
    /// Signature over a commitment digest.
    Ed25519Signature,
    64,
    "signature",
    VerificationFailed
);

/// The engine's commitment signing key.
pub struct Ed25519KeyPair {
    key: SigningKey,
}

impl Ed25519KeyPair {
    /// A key whose seed is drawn from `entropy`. With seeded entropy the
    /// key, and so every signature, is reproducible.
    pub fn from_entropy(entropy: &dyn EntropySource) -> Self {
        let mut seed = [0u8; 32];
        entropy.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, digest: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.key.sign(digest).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Check `signature` over `digest` under `signer`.
pub fn verify(
    digest: &[u8],
    signature: &Ed25519Signature,
    signer: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_bytes(&signer.0)
        .map_err(|e| CryptoError::KeyError(format!("public key is not a curve point: {e}")))?;
    key.verify_strict(digest, &ed25519_dalek::Signature::from_bytes(&signature.0))
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::{OsEntropy, SeededEntropy};
    use proptest::prelude::*;

    const DIGEST: [u8; 32] = [0xab; 32];

    fn signer(seed: u8) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(&[seed; 32])
    }

    #[test]
    fn signature_verifies_under_its_own_key_only() {
        let a = signer(1);
        let b = signer(2);
        let sig = a.sign(&DIGEST);
        assert!(verify(&DIGEST, &sig, &a.public_key()).is_ok());
        assert!(matches!(
            verify(&DIGEST, &sig, &b.public_key()),
            Err(CryptoError::VerificationFailed(_))
        ));
    }

    #[test]
    fn different_digest_is_rejected() {
        let kp = signer(1);
        let sig = kp.sign(&DIGEST);
        assert!(verify(&[0u8; 32], &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn seeded_entropy_gives_the_same_key() {
        let a = Ed25519KeyPair::from_entropy(&SeededEntropy::new(11));
        let b = Ed25519KeyPair::from_entropy(&SeededEntropy::new(11));
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(&DIGEST), b.sign(&DIGEST));
        assert_ne!(
            Ed25519KeyPair::from_entropy(&OsEntropy).public_key(),
            a.public_key()
        );
    }

    #[test]
    fn hex_forms_parse_back() {
        let kp = signer(5);
        let pk = kp.public_key();
        let sig = kp.sign(&DIGEST);
        assert_eq!(pk.to_hex().len(), 64);
        assert_eq!(sig.to_hex().len(), 128);
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert_eq!(Ed25519Signature::from_hex(&sig.to_string()).unwrap(), sig);
    }

    #[test]
    fn malformed_hex_maps_to_the_right_error() {
        assert!(matches!(
            Ed25519PublicKey::from_hex("abcd"),
            Err(CryptoError::KeyError(_))
        ));
        assert!(matches!(
            Ed25519Signature::from_hex(&"g".repeat(128)),
            Err(CryptoError::VerificationFailed(_))
        ));
    }

    #[test]
    fn debug_shows_only_the_public_half() {
        let kp = signer(3);
        let shown = format!("{kp:?}");
        assert!(shown.starts_with("Ed25519KeyPair"));
        assert!(!shown.contains(&hex::encode(&[3u8; 32])));
    }

    proptest! {
        #[test]
        fn any_signature_bit_flip_is_rejected(byte in 0usize..64, bit in 0u8..8) {
            let kp = signer(9);
            let mut sig = kp.sign(&DIGEST);
            sig.0[byte] ^= 1 << bit;
            prop_assert!(verify(&DIGEST, &sig, &kp.public_key()).is_err());
        }
    }
}
