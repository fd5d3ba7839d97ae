//! Hand-encoded native transfer transactions
//!
//! The legacy message for a single system-program transfer is:
//!
//! ```text
//! header            [1, 0, 1]
//! account keys      compact(3) ‖ sender ‖ recipient ‖ system program (32 zero bytes)
//! recent blockhash  32 bytes
//! instructions      compact(1) ‖ program_id_index(2) ‖ compact(2) ‖ [0, 1]
//!                   ‖ compact(12) ‖ u32le(2) ‖ u64le(lamports)
//! ```
//!
//! The signed transaction is `compact(1) ‖ signature ‖ message`.

use super::compact;
use super::errors::{EncodingError, TransactionBuilderError};
use super::output::{SignedTransaction, SIGNATURE_LENGTH};
use crate::wallet::{Address, Keypair};

/// System program instruction discriminator for `Transfer`
pub const SYSTEM_TRANSFER_DISCRIMINATOR: u32 = 2;

/// Lamports per whole SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Legacy message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

impl MessageHeader {
    /// One signer (the sender), the system program as the only read-only key
    pub const TRANSFER: MessageHeader = MessageHeader {
        num_required_signatures: 1,
        num_readonly_signed_accounts: 0,
        num_readonly_unsigned_accounts: 1,
    };

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.num_required_signatures);
        out.push(self.num_readonly_signed_accounts);
        out.push(self.num_readonly_unsigned_accounts);
    }
}

/// A single lamport transfer; built per call, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferInstruction {
    pub from: Address,
    pub to: Address,
    pub lamports: u64,
}

impl TransferInstruction {
    /// Build from a base58 recipient; fails unless it decodes to 32 bytes
    pub fn new(from: Address, to: &str, lamports: u64) -> Result<Self, TransactionBuilderError> {
        let to: Address = to.parse()?;
        Ok(Self { from, to, lamports })
    }

    /// Instruction data: u32le discriminator followed by u64le amount
    pub fn data(&self) -> [u8; 12] {
        let mut data = [0u8; 12];
        data[..4].copy_from_slice(&SYSTEM_TRANSFER_DISCRIMINATOR.to_le_bytes());
        data[4..].copy_from_slice(&self.lamports.to_le_bytes());
        data
    }
}

/// Encode the unsigned legacy message for a transfer
pub fn encode_transfer_message(
    instruction: &TransferInstruction,
    recent_blockhash: &[u8; 32],
) -> Result<Vec<u8>, EncodingError> {
    let account_keys = [
        instruction.from.as_bytes(),
        instruction.to.as_bytes(),
        Address::SYSTEM_PROGRAM.as_bytes(),
    ];
    let account_indexes = [0u8, 1u8];
    let data = instruction.data();

    let mut message = Vec::with_capacity(3 + 1 + 32 * 3 + 32 + 1 + 1 + 1 + 2 + 1 + data.len());
    MessageHeader::TRANSFER.write(&mut message);

    compact::encode_len(account_keys.len(), &mut message)?;
    for key in account_keys {
        message.extend_from_slice(key);
    }

    message.extend_from_slice(recent_blockhash);

    // Exactly one instruction
    compact::encode_len(1, &mut message)?;
    message.push(2); // program id index: system program
    compact::encode_len(account_indexes.len(), &mut message)?;
    message.extend_from_slice(&account_indexes);
    compact::encode_len(data.len(), &mut message)?;
    message.extend_from_slice(&data);

    Ok(message)
}

/// Sign a legacy message with a single signer and frame it for the wire
pub fn sign_legacy_message(signer: &Keypair, message: Vec<u8>) -> SignedTransaction {
    let signature = signer.sign(&message);

    let mut bytes = Vec::with_capacity(1 + SIGNATURE_LENGTH + message.len());
    compact::encode_u16(1, &mut bytes);
    bytes.extend_from_slice(&signature);
    bytes.extend_from_slice(&message);

    SignedTransaction::new(bytes, signature)
}

/// Build and sign a native transfer from `sender` to `recipient`
pub fn build_transfer(
    sender: &Keypair,
    recipient: &str,
    lamports: u64,
    recent_blockhash: &[u8; 32],
) -> Result<SignedTransaction, TransactionBuilderError> {
    let instruction = TransferInstruction::new(sender.address(), recipient, lamports)?;
    let message = encode_transfer_message(&instruction, recent_blockhash)?;
    Ok(sign_legacy_message(sender, message))
}

/// Convert a caller-supplied SOL amount to lamports (floored)
pub fn lamports_from_sol(sol: f64) -> Result<u64, EncodingError> {
    if !sol.is_finite() || sol < 0.0 {
        return Err(EncodingError::AmountOverflow(sol.to_string()));
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64).floor();
    // u64::MAX as f64 rounds up to 2^64, which itself does not fit
    if lamports >= u64::MAX as f64 {
        return Err(EncodingError::AmountOverflow(sol.to_string()));
    }
    Ok(lamports as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base58;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    // header(3) + compact(1) + keys(96) + blockhash(32) + compact(1)
    const ACCOUNT_KEYS_START: usize = 4;
    const BLOCKHASH_START: usize = ACCOUNT_KEYS_START + 96;
    const INSTRUCTIONS_START: usize = BLOCKHASH_START + 32;

    fn fixture() -> (Keypair, Keypair, [u8; 32]) {
        (
            Keypair::from_seed(&[1u8; 32]),
            Keypair::from_seed(&[2u8; 32]),
            [7u8; 32],
        )
    }

    #[test]
    fn test_transfer_message_layout() {
        let (sender, recipient, blockhash) = fixture();
        let ix = TransferInstruction {
            from: sender.address(),
            to: recipient.address(),
            lamports: 1_000_000_000,
        };
        let message = encode_transfer_message(&ix, &blockhash).unwrap();

        assert_eq!(&message[..3], &[1, 0, 1]);
        assert_eq!(message[3], 3);
        assert_eq!(&message[4..36], &sender.public_key());
        assert_eq!(&message[36..68], &recipient.public_key());
        assert_eq!(&message[68..100], &[0u8; 32]);
        assert_eq!(&message[BLOCKHASH_START..INSTRUCTIONS_START], &blockhash);

        let ix_bytes = &message[INSTRUCTIONS_START..];
        assert_eq!(ix_bytes[0], 1); // one instruction
        assert_eq!(ix_bytes[1], 2); // system program index
        assert_eq!(&ix_bytes[2..5], &[2, 0, 1]); // compact(2) ‖ [0, 1]
        assert_eq!(ix_bytes[5], 12); // data length
        assert_eq!(&ix_bytes[6..10], &2u32.to_le_bytes());

        let amount = u64::from_le_bytes(message[message.len() - 8..].try_into().unwrap());
        assert_eq!(amount, 1_000_000_000);
        assert_eq!(message.len(), INSTRUCTIONS_START + 6 + 12);
    }

    #[test]
    fn test_transfer_message_is_reproducible() {
        let (sender, recipient, blockhash) = fixture();
        let ix = TransferInstruction {
            from: sender.address(),
            to: recipient.address(),
            lamports: 42,
        };
        let first = encode_transfer_message(&ix, &blockhash).unwrap();
        let second = encode_transfer_message(&ix, &blockhash).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signed_transfer_framing_and_signature() {
        let (sender, recipient, blockhash) = fixture();
        let tx = build_transfer(&sender, &recipient.address().to_string(), 5_000, &blockhash)
            .unwrap();
        let bytes = tx.as_bytes();

        assert_eq!(bytes[0], 1);
        let signature: [u8; 64] = bytes[1..65].try_into().unwrap();
        assert_eq!(&signature, tx.signature());

        let verifying = VerifyingKey::from_bytes(&sender.public_key()).unwrap();
        let message = &bytes[65..];
        assert!(verifying
            .verify(message, &Signature::from_bytes(&signature))
            .is_ok());
        assert_eq!(tx.signature_base58(), base58::encode(&signature));
    }

    #[test]
    fn test_recipient_must_be_32_bytes() {
        let (sender, _, blockhash) = fixture();
        let short = base58::encode(&[3u8; 20]);
        let err = build_transfer(&sender, &short, 1, &blockhash).unwrap_err();
        assert_eq!(
            err,
            TransactionBuilderError::Encoding(EncodingError::InvalidAddressLength(20))
        );

        let err = build_transfer(&sender, "not-base58!", 1, &blockhash).unwrap_err();
        assert!(matches!(
            err,
            TransactionBuilderError::Encoding(EncodingError::Codec(_))
        ));
    }

    #[test]
    fn test_max_amount_encodes() {
        let (sender, recipient, blockhash) = fixture();
        let ix = TransferInstruction {
            from: sender.address(),
            to: recipient.address(),
            lamports: u64::MAX,
        };
        let message = encode_transfer_message(&ix, &blockhash).unwrap();
        assert_eq!(&message[message.len() - 8..], &[0xFF; 8]);
    }

    #[test]
    fn test_lamports_conversion() {
        assert_eq!(lamports_from_sol(1.0).unwrap(), 1_000_000_000);
        assert_eq!(lamports_from_sol(0.005).unwrap(), 5_000_000);
        assert_eq!(lamports_from_sol(0.0).unwrap(), 0);
        assert!(matches!(lamports_from_sol(-0.1), Err(EncodingError::AmountOverflow(_))));
        assert!(matches!(lamports_from_sol(f64::NAN), Err(EncodingError::AmountOverflow(_))));
        assert!(matches!(lamports_from_sol(1e12), Err(EncodingError::AmountOverflow(_))));
    }
}
