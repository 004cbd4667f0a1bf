//! Proptest generators for property-based testing.

use proptest::prelude::*;

use nkms_keystore::NewPolicyContract;
use nkms_keystore_core::{
    Ed25519PublicKey, Ed25519Signature, Hrac, KFrag, PublicKey, SigningKeypair, X25519PublicKey,
    KFRAG_LENGTH, SIGNATURE_LENGTH,
};

/// Generate a random signing keypair.
pub fn keypair() -> impl Strategy<Value = SigningKeypair> {
    any::<[u8; 32]>().prop_map(|seed| SigningKeypair::from_seed(&seed))
}

/// Generate raw key bytes.
pub fn key_bytes() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>()
}

/// Generate a public key of either capability.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    (key_bytes(), any::<bool>()).prop_map(|(bytes, signing)| {
        if signing {
            PublicKey::Signing(Ed25519PublicKey::from_bytes(bytes))
        } else {
            PublicKey::Encrypting(X25519PublicKey::from_bytes(bytes))
        }
    })
}

/// Generate signature bytes (not necessarily valid).
pub fn signature() -> impl Strategy<Value = Ed25519Signature> {
    prop::collection::vec(any::<u8>(), SIGNATURE_LENGTH)
        .prop_map(|b| Ed25519Signature::from_slice(&b).expect("SIGNATURE_LENGTH bytes"))
}

/// Generate a kfrag of the correct length.
pub fn kfrag() -> impl Strategy<Value = KFrag> {
    prop::collection::vec(any::<u8>(), KFRAG_LENGTH)
        .prop_map(|b| KFrag::from_bytes(&b).expect("KFRAG_LENGTH bytes"))
}

/// Generate a non-empty HRAC of up to 64 bytes.
pub fn hrac() -> impl Strategy<Value = Hrac> {
    prop::collection::vec(any::<u8>(), 1..=64).prop_map(Hrac::new)
}

/// Generate a reasonable expiration timestamp.
pub fn expiration() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Parameters for generating a policy contract.
#[derive(Debug, Clone)]
pub struct ContractParams {
    pub alice: SigningKeypair,
    pub hrac: Hrac,
    pub expiration: i64,
    pub deposit: u128,
    pub signed: bool,
}

impl ContractParams {
    /// Build the contract terms, signed by alice if `signed` is set.
    pub fn terms(&self) -> NewPolicyContract {
        let terms = NewPolicyContract::new(
            self.hrac.clone(),
            self.expiration,
            self.deposit,
            self.alice.public_key(),
        );
        if self.signed {
            let signature = self.alice.sign(&terms.terms());
            terms.alice_signature(signature)
        } else {
            terms
        }
    }
}

impl Arbitrary for ContractParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (keypair(), hrac(), expiration(), any::<u128>(), any::<bool>())
            .prop_map(|(alice, hrac, expiration, deposit, signed)| ContractParams {
                alice,
                hrac,
                expiration,
                deposit,
                signed,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nkms_keystore_core::{compose, split, Fingerprint};

    proptest! {
        #[test]
        fn test_fingerprint_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            prop_assert_eq!(Fingerprint::of(&bytes), Fingerprint::of(&bytes));
        }

        #[test]
        fn test_fingerprint_distinguishes_keys(k1 in key_bytes(), k2 in key_bytes()) {
            prop_assume!(k1 != k2);
            prop_assert_ne!(Fingerprint::of(&k1), Fingerprint::of(&k2));
        }

        #[test]
        fn test_codec_roundtrip(sig in signature(), frag in kfrag()) {
            let (s, k) = split(&compose(&sig, &frag)).unwrap();
            prop_assert_eq!(s, sig);
            prop_assert_eq!(k, frag);
        }

        #[test]
        fn test_signed_terms_verify(params: ContractParams) {
            let terms = params.terms();
            prop_assert_eq!(terms.alice_signature.is_some(), params.signed);
            if let Some(signature) = terms.alice_signature {
                prop_assert!(params.alice.public_key().verify(&terms.terms(), &signature).is_ok());
            }
        }
    }
}
