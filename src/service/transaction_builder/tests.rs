//! 统一交易构建器测试
//!
//! 验证 Draft → Unsigned → Signed 生命周期在各生态上的一致行为

use super::*;
use crate::{
    domain::{
        amount::Amount,
        chain_config::ChainRegistry,
        transaction::{SignatureAlgorithm, TransactionKind},
    },
    service::coin_selection::Utxo,
};

const EVM_FROM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const EVM_TO: &str = "0x742D35cc6634c0532925a3b844bc9E7595F0BEb6";
const SOL_FROM: &str = "4vJ9JU1bJJE96FWSJKvHsmmFADCg4gpZQff4P3bkLKi";
const SOL_TO: &str = "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK";

fn evm_context() -> BuildContext {
    BuildContext::Evm(EvmContext {
        nonce: 3,
        max_fee_per_gas: 30_000_000_000,
        max_priority_fee_per_gas: 1_000_000_000,
        gas_limit: None,
    })
}

fn solana_context() -> BuildContext {
    BuildContext::Solana(SolanaContext {
        recent_blockhash: "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N".to_string(),
        last_valid_block_height: 100,
    })
}

fn build(chain: &str, intent: &TransferIntent, context: BuildContext) -> Result<UnsignedTransaction> {
    let registry = ChainRegistry::new();
    TransactionBuilder::build(registry.get(chain)?, intent, context)
}

#[test]
fn test_evm_lifecycle() {
    let intent = TransferIntent::native(EVM_FROM, EVM_TO, Amount::decimal("0.1"));
    let unsigned = build("ethereum", &intent, evm_context()).unwrap();
    assert_eq!(unsigned.status(), TransactionStatus::Unsigned);
    assert_eq!(unsigned.ecosystem(), Ecosystem::Evm);
    assert!(unsigned.serialized().unwrap().starts_with("0x02"));

    let payload = unsigned.signing_payload().unwrap();
    assert_eq!(payload.algorithm, SignatureAlgorithm::Secp256k1);
    assert_eq!(payload.len(), 1);

    let mut signature = vec![0x11u8; 64];
    signature.push(1);
    let signed = unsigned.sign(vec![signature]).unwrap();
    assert_eq!(signed.status(), TransactionStatus::Signed);
    assert!(signed.serialized().starts_with("0x02"));
    assert_eq!(signed.hash().len(), 66);

    let normalised = signed.to_normalised();
    assert_eq!(normalised.kind, TransactionKind::NativeTransfer);
    assert_eq!(normalised.value, "100000000000000000");
    assert_eq!(normalised.hash.as_deref(), Some(signed.hash()));
    assert_eq!(normalised.status, TransactionStatus::Signed);
}

#[test]
fn test_solana_single_instruction_message() {
    let intent = TransferIntent::native(SOL_FROM, SOL_TO, Amount::base_units("1000000000"));
    let unsigned = build("solana", &intent, solana_context()).unwrap();

    let RawTransaction::Solana(tx) = unsigned.raw() else {
        panic!("expected solana transaction");
    };
    assert_eq!(tx.instructions.len(), 1);
    assert_eq!(tx.message.header.num_required_signatures, 1);
    assert_eq!(tx.message.account_keys[0].to_string(), SOL_FROM);

    let payload = unsigned.signing_payload().unwrap();
    assert_eq!(payload.algorithm, SignatureAlgorithm::Ed25519);
    assert_eq!(payload.data[0], tx.message_bytes().unwrap());
}

#[test]
fn test_signature_count_checked_before_encoding() {
    let intent = TransferIntent::native(SOL_FROM, SOL_TO, Amount::base_units("1"));
    let unsigned = build("solana", &intent, solana_context()).unwrap();

    let err = unsigned
        .sign(vec![vec![0u8; 64], vec![0u8; 64]])
        .unwrap_err();
    assert_eq!(
        err,
        ChainError::SignatureCount {
            expected: 1,
            actual: 2
        }
    );
}

#[test]
fn test_rebuild_leaves_original_untouched() {
    let intent = TransferIntent::native(EVM_FROM, EVM_TO, Amount::decimal("1"));
    let unsigned = build("ethereum", &intent, evm_context()).unwrap();
    let before = unsigned.serialized().unwrap();

    let rebuilt = unsigned
        .rebuild(&RebuildOverrides::new().with_nonce(42))
        .unwrap();
    assert_eq!(unsigned.serialized().unwrap(), before);
    assert_ne!(rebuilt.serialized().unwrap(), before);
    assert_eq!(rebuilt.chain(), "ethereum");
}

#[test]
fn test_context_mismatch() {
    let intent = TransferIntent::native(EVM_FROM, EVM_TO, Amount::decimal("1"));
    let err = build("ethereum", &intent, solana_context()).unwrap_err();
    assert_eq!(err.code(), "encoding_error");
}

#[test]
fn test_substrate_transfer_unsupported() {
    let intent = TransferIntent::native(
        "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5",
        "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5",
        Amount::decimal("1"),
    );
    let err = build("polkadot", &intent, evm_context()).unwrap_err();
    assert!(matches!(err, ChainError::Contract { .. }));
}

#[test]
fn test_alias_resolution() {
    let intent = TransferIntent::native(EVM_FROM, EVM_TO, Amount::decimal("1"));
    let unsigned = build("ETH", &intent, evm_context()).unwrap();
    assert_eq!(unsigned.chain(), "ethereum");
}

#[test]
fn test_utxo_payload_per_input() {
    let utxos = (1u8..=3)
        .map(|n| Utxo {
            txid: hex::encode([n; 32]),
            vout: 0,
            value: 40_000,
            script_pubkey: Vec::new(),
            confirmations: 2,
        })
        .collect();
    let intent = TransferIntent::native(
        "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
        "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
        Amount::base_units("100000"),
    )
    .with_public_key("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
    let unsigned = build(
        "bitcoin",
        &intent,
        BuildContext::Utxo(UtxoContext { utxos, fee_rate: 2 }),
    )
    .unwrap();
    assert_eq!(unsigned.signing_payload().unwrap().len(), 3);
}

#[test]
fn test_raw_transaction_serializes_with_ecosystem_tag() {
    let intent = TransferIntent::native(SOL_FROM, SOL_TO, Amount::base_units("5"));
    let unsigned = build("solana", &intent, solana_context()).unwrap();
    let json = serde_json::to_value(unsigned.raw()).unwrap();
    assert_eq!(json["ecosystem"], "solana");
    assert_eq!(json["transaction"]["fee_payer"], SOL_FROM);
}
