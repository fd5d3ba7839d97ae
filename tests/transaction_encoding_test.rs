//! Wire-format tests for hand-encoded transactions
//!
//! Checks the byte layout of transfers and the signing of opaque
//! aggregator transactions against an independent ed25519 verifier
//! and base58 implementation.

use bundler::base58;
use bundler::tx_builder::{build_transfer, sign_versioned, lamports_from_sol, EncodingError, TransactionBuilderError};
use bundler::wallet::{Address, Keypair};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use proptest::prelude::*;

const BLOCKHASH: [u8; 32] = [7u8; 32];

fn verify(signer: &Keypair, message: &[u8], signature: &[u8]) {
    let key = VerifyingKey::from_bytes(&signer.public_key()).unwrap();
    let signature = Signature::from_slice(signature).unwrap();
    key.verify(message, &signature).unwrap();
}

#[test]
fn test_transfer_layout() {
    let sender = Keypair::from_seed(&[1u8; 32]);
    let recipient = Keypair::from_seed(&[2u8; 32]).address();
    let lamports = lamports_from_sol(0.25).unwrap();

    let tx = build_transfer(&sender, &recipient.to_string(), lamports, &BLOCKHASH).unwrap();
    let bytes = tx.as_bytes();

    // compact(1) ‖ signature ‖ message
    assert_eq!(bytes[0], 1);
    let message = &bytes[65..];
    assert_eq!(&message[..3], &[1, 0, 1]);
    assert_eq!(message[3], 3);
    assert_eq!(&message[4..36], sender.public_key().as_slice());
    assert_eq!(&message[36..68], recipient.as_bytes().as_slice());
    assert_eq!(&message[68..100], &[0u8; 32]);
    assert_eq!(&message[100..132], &BLOCKHASH);

    let instruction = &message[132..];
    assert_eq!(&instruction[..5], &[1, 2, 2, 0, 1]);
    assert_eq!(instruction[5], 12);
    assert_eq!(&instruction[6..10], &2u32.to_le_bytes());
    assert_eq!(&instruction[10..18], &250_000_000u64.to_le_bytes());
    assert_eq!(instruction.len(), 18);

    verify(&sender, message, &bytes[1..65]);
    assert_eq!(tx.signature_base58(), bs58::encode(&bytes[1..65]).into_string());
}

#[test]
fn test_transfer_rejects_bad_recipient() {
    let sender = Keypair::from_seed(&[1u8; 32]);

    let short = bs58::encode([9u8; 31]).into_string();
    assert!(matches!(
        build_transfer(&sender, &short, 1, &BLOCKHASH),
        Err(TransactionBuilderError::Encoding(_))
    ));
    assert!(build_transfer(&sender, "not-base58-0OIl", 1, &BLOCKHASH).is_err());
}

#[test]
fn test_sign_versioned_fills_first_slot() {
    let signer = Keypair::from_seed(&[3u8; 32]);

    let mut tx = vec![0x80, 2];
    tx.extend_from_slice(&[0u8; 128]);
    let message: Vec<u8> = (0u8..200).collect();
    tx.extend_from_slice(&message);

    let signed = sign_versioned(tx.clone(), &signer).unwrap();
    let bytes = signed.as_bytes();

    assert_eq!(bytes.len(), tx.len());
    assert_eq!(&bytes[..2], &[0x80, 2]);
    verify(&signer, &message, &bytes[2..66]);
    // Second slot untouched
    assert_eq!(&bytes[66..130], &[0u8; 64]);
    assert_eq!(&bytes[130..], message.as_slice());
}

#[test]
fn test_sign_versioned_legacy_framing() {
    let signer = Keypair::from_seed(&[4u8; 32]);

    let mut tx = vec![1];
    tx.extend_from_slice(&[0u8; 64]);
    tx.extend_from_slice(b"message body");

    let signed = sign_versioned(tx, &signer).unwrap();
    verify(&signer, b"message body", &signed.as_bytes()[1..65]);
}

#[test]
fn test_sign_versioned_rejects_short_buffers() {
    let signer = Keypair::from_seed(&[5u8; 32]);

    for tx in [vec![], vec![0x80], vec![1u8; 40], vec![0x80, 1, 0, 0]] {
        assert!(matches!(
            sign_versioned(tx, &signer),
            Err(TransactionBuilderError::Encoding(EncodingError::MalformedTransaction(_)))
        ));
    }
}

#[test]
fn test_address_parsing_matches_bs58() {
    let address = Keypair::from_seed(&[6u8; 32]).address();
    let encoded = bs58::encode(address.as_bytes()).into_string();

    assert_eq!(address.to_string(), encoded);
    assert_eq!(encoded.parse::<Address>().unwrap(), address);
}

proptest! {
    #[test]
    fn prop_base58_matches_reference(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
        let ours = base58::encode(&bytes);
        prop_assert_eq!(&ours, &bs58::encode(&bytes).into_string());
        prop_assert_eq!(base58::decode(&ours).unwrap(), bytes);
    }
}
