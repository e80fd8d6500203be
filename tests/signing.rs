//! 外部签名器端到端测试
//!
//! 用真实密钥对签名载荷签名，再验证组装结果可被对应链的规则验证。

use ed25519_dalek::{Signer, Verifier};
use k256::ecdsa::{signature::hazmat::PrehashVerifier, RecoveryId, Signature, SigningKey, VerifyingKey};
use txforge::{
    codec::{base58, decode_compact_u16},
    crypto::keccak256,
    domain::{Amount, ChainRegistry, SignatureAlgorithm, TransferIntent},
    service::{
        coin_selection::Utxo,
        transaction_builder::{
            BuildContext, EvmContext, SolanaContext, TransactionBuilder, UnsignedTransaction,
            UtxoContext,
        },
    },
    utils::AddressValidator,
};

const SOL_TO: &str = "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK";
const SOL_BLOCKHASH: &str = "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N";
const EVM_TO: &str = "0x742D35cc6634c0532925a3b844bc9E7595F0BEb6";
/// 私钥为 1 的 P2WPKH 地址（公钥即生成元 G）
const BTC_SENDER: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
const BTC_SENDER_PUBKEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const BTC_RECIPIENT: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";

fn build(chain: &str, intent: &TransferIntent, context: BuildContext) -> UnsignedTransaction {
    let registry = ChainRegistry::new();
    TransactionBuilder::build(registry.get(chain).unwrap(), intent, context).unwrap()
}

fn evm_address(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

#[test]
fn test_solana_ed25519_signature_verifies() {
    let key = ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]);
    let payer = base58::encode(key.verifying_key().as_bytes());

    let intent = TransferIntent::native(payer.as_str(), SOL_TO, Amount::decimal("0.25"));
    let unsigned = build(
        "solana",
        &intent,
        BuildContext::Solana(SolanaContext {
            recent_blockhash: SOL_BLOCKHASH.to_string(),
            last_valid_block_height: 150,
        }),
    );

    let payload = unsigned.signing_payload().unwrap();
    assert_eq!(payload.algorithm, SignatureAlgorithm::Ed25519);
    assert_eq!(payload.len(), 1);

    let signature = key.sign(&payload.data[0]);
    let signed = unsigned.sign(vec![signature.to_bytes().to_vec()]).unwrap();

    // 线格式：compact-u16 签名数 ‖ 签名 ‖ 消息
    let bytes = signed.bytes();
    let (count, consumed) = decode_compact_u16(bytes).unwrap();
    assert_eq!((count, consumed), (1, 1));
    let wire_signature = ed25519_dalek::Signature::from_slice(&bytes[1..65]).unwrap();
    let message = &bytes[65..];
    assert_eq!(message, payload.data[0].as_slice());
    key.verifying_key().verify(message, &wire_signature).unwrap();

    assert_eq!(signed.hash(), base58::encode(&signature.to_bytes()));
    assert_eq!(signed.to_normalised().value, "250000000");
}

#[test]
fn test_evm_recoverable_signature_recovers_sender() {
    let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
    let from = AddressValidator::to_checksum_address(&evm_address(key.verifying_key()));

    let intent = TransferIntent::native(from.as_str(), EVM_TO, Amount::decimal("1.5"));
    let unsigned = build(
        "ethereum",
        &intent,
        BuildContext::Evm(EvmContext {
            nonce: 9,
            max_fee_per_gas: 40_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            gas_limit: Some(21_000),
        }),
    );

    let payload = unsigned.signing_payload().unwrap();
    assert_eq!(payload.algorithm, SignatureAlgorithm::Secp256k1);
    let prehash = &payload.data[0];
    assert_eq!(prehash.len(), 32);

    let (signature, recovery_id) = key.sign_prehash_recoverable(prehash).unwrap();
    let mut wire = signature.to_bytes().to_vec();
    wire.push(recovery_id.to_byte());
    let signed = unsigned.sign(vec![wire.clone()]).unwrap();

    let recovered = VerifyingKey::recover_from_prehash(
        prehash,
        &Signature::from_slice(&wire[..64]).unwrap(),
        RecoveryId::from_byte(wire[64]).unwrap(),
    )
    .unwrap();
    assert_eq!(
        AddressValidator::to_checksum_address(&evm_address(&recovered)),
        from
    );

    // EIP-1559 类型前缀，哈希覆盖完整签名字节
    assert_eq!(signed.bytes()[0], 0x02);
    assert_eq!(signed.hash(), format!("0x{}", hex::encode(keccak256(signed.bytes()))));

    // v = 27/28 与 0/1 等价
    let mut legacy_v = wire;
    legacy_v[64] += 27;
    let relabelled = unsigned.sign(vec![legacy_v]).unwrap();
    assert_eq!(relabelled.hash(), signed.hash());
}

#[test]
fn test_utxo_witness_signature_verifies() {
    let mut secret = [0u8; 32];
    secret[31] = 1;
    let key = SigningKey::from_slice(&secret).unwrap();
    assert_eq!(
        hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
        BTC_SENDER_PUBKEY
    );

    let utxos = vec![
        Utxo {
            txid: "aa".repeat(32),
            vout: 0,
            value: 30_000,
            script_pubkey: Vec::new(),
            confirmations: 3,
        },
        Utxo {
            txid: "bb".repeat(32),
            vout: 1,
            value: 30_000,
            script_pubkey: Vec::new(),
            confirmations: 3,
        },
    ];
    let intent = TransferIntent::native(BTC_SENDER, BTC_RECIPIENT, Amount::base_units("40000"))
        .with_public_key(BTC_SENDER_PUBKEY);
    let unsigned = build(
        "bitcoin",
        &intent,
        BuildContext::Utxo(UtxoContext { utxos, fee_rate: 5 }),
    );

    let payload = unsigned.signing_payload().unwrap();
    assert_eq!(payload.len(), 2);

    let signatures: Vec<Vec<u8>> = payload
        .data
        .iter()
        .map(|sighash| {
            let (signature, _) = key.sign_prehash_recoverable(sighash).unwrap();
            key.verifying_key().verify_prehash(sighash, &signature).unwrap();
            signature.to_bytes().to_vec()
        })
        .collect();
    let signed = unsigned.sign(signatures).unwrap();

    let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(signed.bytes()).unwrap();
    assert_eq!(tx.input.len(), 2);
    for input in &tx.input {
        // [DER‖SIGHASH_ALL, 压缩公钥]
        assert_eq!(input.witness.len(), 2);
        let der = input.witness.nth(0).unwrap();
        assert_eq!(der.last(), Some(&0x01));
        assert_eq!(hex::encode(input.witness.nth(1).unwrap()), BTC_SENDER_PUBKEY);
    }
    assert_eq!(tx.txid().to_string(), signed.hash());
}

#[test]
fn test_wrong_signature_shapes_rejected() {
    let key = ed25519_dalek::SigningKey::from_bytes(&[2u8; 32]);
    let payer = base58::encode(key.verifying_key().as_bytes());
    let intent = TransferIntent::native(payer.as_str(), SOL_TO, Amount::base_units("1"));
    let unsigned = build(
        "solana",
        &intent,
        BuildContext::Solana(SolanaContext {
            recent_blockhash: SOL_BLOCKHASH.to_string(),
            last_valid_block_height: 1,
        }),
    );

    let err = unsigned.sign(vec![vec![0u8; 63]]).unwrap_err();
    assert_eq!(err.code(), "signature_length_mismatch");
    let err = unsigned.sign(vec![vec![0u8; 64], vec![0u8; 64]]).unwrap_err();
    assert_eq!(err.code(), "signature_count_mismatch");
}
