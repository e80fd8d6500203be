//! Solana legacy 消息构建
//!
//! 账户列表去重并按固定全序排列：
//! fee payer → 其他 signer+writable → signer+readonly → non-signer+writable → non-signer+readonly。
//! 同一账户多次出现时权限取逻辑或；每条指令的 program id 以只读非签名者身份隐式加入。
//!
//! 线格式：header(3) ‖ compact(n) ‖ n×32 账户 ‖ blockhash(32) ‖ compact(m) ‖ m×指令，
//! 指令为 program_index(1) ‖ compact(k) ‖ k×账户索引 ‖ compact(len) ‖ data。

use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Serialize, Serializer};

use super::{ChainTransaction, SignedParts};
use crate::{
    codec::{base58, decode_compact_u16, read_u32_le, read_u64_le, write_compact_len},
    domain::{
        chain_config::{ChainConfig, ChainParams, Ecosystem},
        transaction::{
            Asset, NormalisedTransaction, RebuildOverrides, SignatureAlgorithm, SigningPayload,
            TransactionKind, TransferIntent,
        },
    },
    error::{ChainError, Result},
    utils::address_validator::AddressValidator,
};

pub const SIGNATURE_LEN: usize = 64;

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";
pub const COMPUTE_BUDGET_PROGRAM_ID: &str = "ComputeBudget111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

const SYSTEM_TRANSFER: u32 = 2;
const COMPUTE_UNIT_LIMIT: u8 = 2;
const COMPUTE_UNIT_PRICE: u8 = 3;
const TOKEN_TRANSFER_CHECKED: u8 = 12;

/// 32 字节公钥
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 内置程序 id 常量解析
    fn program(id: &str) -> Self {
        // 常量均为合法的 32 字节 base58
        Self::from_str(id).unwrap_or(Self([0u8; 32]))
    }

    pub fn system_program() -> Self {
        Self::program(SYSTEM_PROGRAM_ID)
    }

    pub fn memo_program() -> Self {
        Self::program(MEMO_PROGRAM_ID)
    }

    pub fn compute_budget_program() -> Self {
        Self::program(COMPUTE_BUDGET_PROGRAM_ID)
    }

    pub fn token_program() -> Self {
        Self::program(TOKEN_PROGRAM_ID)
    }
}

impl FromStr for Pubkey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        AddressValidator::parse_solana("solana", s).map(Self)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58::encode(&self.0))
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }

    /// 排序类别：0 signer+writable, 1 signer+readonly, 2 writable, 3 readonly
    fn category(&self) -> u8 {
        match (self.is_signer, self.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

fn serialize_hex<S: Serializer>(data: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(data))
}

/// 系统程序转账
pub fn system_transfer(from: Pubkey, to: Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: Pubkey::system_program(),
        accounts: vec![AccountMeta::new(from, true), AccountMeta::new(to, false)],
        data,
    }
}

/// Memo（签名者为只读 signer）
pub fn memo(signer: Pubkey, text: &str) -> Instruction {
    Instruction {
        program_id: Pubkey::memo_program(),
        accounts: vec![AccountMeta::new_readonly(signer, true)],
        data: text.as_bytes().to_vec(),
    }
}

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = vec![COMPUTE_UNIT_LIMIT];
    data.extend_from_slice(&units.to_le_bytes());
    Instruction {
        program_id: Pubkey::compute_budget_program(),
        accounts: Vec::new(),
        data,
    }
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = vec![COMPUTE_UNIT_PRICE];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: Pubkey::compute_budget_program(),
        accounts: Vec::new(),
        data,
    }
}

/// SPL Token TransferChecked
pub fn token_transfer_checked(
    source: Pubkey,
    mint: Pubkey,
    destination: Pubkey,
    owner: Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![TOKEN_TRANSFER_CHECKED];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: Pubkey::token_program(),
        accounts: vec![
            AccountMeta::new(source, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new(destination, false),
            AccountMeta::new_readonly(owner, true),
        ],
        data,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

impl MessageHeader {
    /// 头部计数必须落在账户列表之内：只读签名者 ≤ 签名者 ≤ 账户数
    pub fn check(&self, key_count: usize) -> Result<()> {
        let signers = usize::from(self.num_required_signatures);
        let readonly_signed = usize::from(self.num_readonly_signed_accounts);
        let readonly_unsigned = usize::from(self.num_readonly_unsigned_accounts);

        if readonly_signed > signers || signers > key_count {
            return Err(ChainError::encoding(format!(
                "message header claims {} signers ({} readonly) for {} accounts",
                signers, readonly_signed, key_count
            )));
        }
        if readonly_unsigned > key_count - signers {
            return Err(ChainError::encoding(format!(
                "message header claims {} readonly unsigned accounts, only {} unsigned",
                readonly_unsigned,
                key_count - signers
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledMessage {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Pubkey,
    pub instructions: Vec<CompiledInstruction>,
}

fn index_u8(index: usize) -> Result<u8> {
    u8::try_from(index)
        .map_err(|_| ChainError::encoding(format!("account index {} exceeds 255", index)))
}

/// 权限取并集的去重账户表
fn merge_accounts(fee_payer: &Pubkey, instructions: &[Instruction]) -> Vec<AccountMeta> {
    let mut metas: Vec<AccountMeta> = vec![AccountMeta::new(*fee_payer, true)];

    let mut upsert = |meta: AccountMeta| {
        match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
            Some(existing) => {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            }
            None => metas.push(meta),
        }
    };

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(*meta);
        }
        upsert(AccountMeta::new_readonly(ix.program_id, false));
    }

    // fee payer 固定在 0 号，其余按类别稳定排序
    metas[1..].sort_by_key(AccountMeta::category);
    metas
}

impl CompiledMessage {
    pub fn compile(
        fee_payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Pubkey,
    ) -> Result<Self> {
        let metas = merge_accounts(fee_payer, instructions);

        let count = |f: fn(&AccountMeta) -> bool| -> Result<u8> {
            index_u8(metas.iter().filter(|m| f(m)).count())
        };
        let header = MessageHeader {
            num_required_signatures: count(|m| m.is_signer)?,
            num_readonly_signed_accounts: count(|m| m.is_signer && !m.is_writable)?,
            num_readonly_unsigned_accounts: count(|m| !m.is_signer && !m.is_writable)?,
        };

        let account_keys: Vec<Pubkey> = metas.iter().map(|m| m.pubkey).collect();
        let position = |key: &Pubkey| -> Result<u8> {
            let index = account_keys
                .iter()
                .position(|k| k == key)
                .ok_or_else(|| ChainError::encoding(format!("account {} not in message", key)))?;
            index_u8(index)
        };

        let instructions = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: position(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| position(&m.pubkey))
                        .collect::<Result<Vec<_>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];

        write_compact_len(&mut out, self.account_keys.len())?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        write_compact_len(&mut out, self.instructions.len())?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            write_compact_len(&mut out, ix.accounts.len())?;
            out.extend_from_slice(&ix.accounts);
            write_compact_len(&mut out, ix.data.len())?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let header = MessageHeader {
            num_required_signatures: reader.byte()?,
            num_readonly_signed_accounts: reader.byte()?,
            num_readonly_unsigned_accounts: reader.byte()?,
        };

        let key_count = reader.compact()?;
        let account_keys = (0..key_count)
            .map(|_| reader.pubkey())
            .collect::<Result<Vec<_>>>()?;
        header.check(account_keys.len())?;
        let recent_blockhash = reader.pubkey()?;

        let ix_count = reader.compact()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.byte()?;
            let n = reader.compact()?;
            let accounts = reader.take(n)?.to_vec();
            let len = reader.compact()?;
            let data = reader.take(len)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        if reader.pos != bytes.len() {
            return Err(ChainError::encoding(format!(
                "{} trailing bytes after message",
                bytes.len() - reader.pos
            )));
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    /// 头部与账户数不一致时一律按只读处理
    pub fn is_writable(&self, index: usize) -> bool {
        let signers = usize::from(self.header.num_required_signatures);
        if index < signers {
            signers
                .checked_sub(usize::from(self.header.num_readonly_signed_accounts))
                .is_some_and(|writable| index < writable)
        } else {
            self.account_keys
                .len()
                .checked_sub(signers)
                .and_then(|n| n.checked_sub(usize::from(self.header.num_readonly_unsigned_accounts)))
                .is_some_and(|writable| index - signers < writable)
        }
    }

    /// 还原为带权限的指令列表（权限为合并后的结果）
    pub fn decompile(&self) -> Result<Vec<Instruction>> {
        let key = |index: u8| -> Result<Pubkey> {
            self.account_keys
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| ChainError::encoding(format!("account index {} out of range", index)))
        };

        self.instructions
            .iter()
            .map(|ix| {
                Ok(Instruction {
                    program_id: key(ix.program_id_index)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|&i| {
                            Ok(AccountMeta {
                                pubkey: key(i)?,
                                is_signer: self.is_signer(usize::from(i)),
                                is_writable: self.is_writable(usize::from(i)),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| ChainError::encoding("message truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn compact(&mut self) -> Result<usize> {
        let (value, used) = decode_compact_u16(&self.bytes[self.pos..])?;
        self.pos += used;
        Ok(usize::from(value))
    }

    fn pubkey(&mut self) -> Result<Pubkey> {
        let mut key = [0u8; 32];
        key.copy_from_slice(self.take(32)?);
        Ok(Pubkey(key))
    }
}

/// Provider 拉取的构建上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaContext {
    pub recent_blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolanaTransaction {
    pub fee_payer: Pubkey,
    pub recent_blockhash: Pubkey,
    pub last_valid_block_height: u64,
    pub lamports_per_signature: u64,
    pub instructions: Vec<Instruction>,
    #[serde(skip)]
    pub message: CompiledMessage,
}

impl SolanaTransaction {
    pub fn new(
        fee_payer: Pubkey,
        instructions: Vec<Instruction>,
        recent_blockhash: Pubkey,
        last_valid_block_height: u64,
        lamports_per_signature: u64,
    ) -> Result<Self> {
        let message = CompiledMessage::compile(&fee_payer, &instructions, recent_blockhash)?;
        Ok(Self {
            fee_payer,
            recent_blockhash,
            last_valid_block_height,
            lamports_per_signature,
            instructions,
            message,
        })
    }

    /// 从链上已编译消息还原（查询已上链交易时使用）
    pub fn from_message(message: CompiledMessage, lamports_per_signature: u64) -> Result<Self> {
        let fee_payer = *message
            .account_keys
            .first()
            .ok_or_else(|| ChainError::encoding("message has no account keys"))?;
        let instructions = message.decompile()?;
        Ok(Self {
            fee_payer,
            recent_blockhash: message.recent_blockhash,
            last_valid_block_height: 0,
            lamports_per_signature,
            instructions,
            message,
        })
    }

    pub fn message_bytes(&self) -> Result<Vec<u8>> {
        self.message.serialize()
    }

    fn compute_budget(&self) -> (Option<u32>, Option<u64>) {
        let program = Pubkey::compute_budget_program();
        let mut limit = None;
        let mut price = None;
        for ix in self.instructions.iter().filter(|ix| ix.program_id == program) {
            match ix.data.first() {
                Some(&COMPUTE_UNIT_LIMIT) => limit = read_u32_le(&ix.data, 1).ok(),
                Some(&COMPUTE_UNIT_PRICE) => price = read_u64_le(&ix.data, 1).ok(),
                _ => {}
            }
        }
        (limit, price)
    }

    /// 基础签名费 + 优先费（price × limit / 10^6，向上取整）
    pub fn estimated_fee(&self) -> u64 {
        let base = self
            .lamports_per_signature
            .saturating_mul(u64::from(self.message.header.num_required_signatures));
        let priority = match self.compute_budget() {
            (Some(limit), Some(price)) => {
                let micro = u128::from(limit) * u128::from(price);
                u64::try_from(micro.div_ceil(1_000_000)).unwrap_or(u64::MAX)
            }
            _ => 0,
        };
        base.saturating_add(priority)
    }
}

impl ChainTransaction for SolanaTransaction {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Solana
    }

    fn encode_unsigned(&self) -> Result<String> {
        Ok(BASE64.encode(self.message_bytes()?))
    }

    /// 每个必需签名者一条，内容均为消息字节
    fn signing_payload(&self) -> Result<SigningPayload> {
        let message = self.message_bytes()?;
        let signers = usize::from(self.message.header.num_required_signatures);
        Ok(SigningPayload {
            algorithm: SignatureAlgorithm::Ed25519,
            data: vec![message; signers],
        })
    }

    fn apply_signatures(&self, signatures: &[Vec<u8>]) -> Result<SignedParts> {
        let expected = usize::from(self.message.header.num_required_signatures);
        if signatures.is_empty() || signatures.len() != expected {
            return Err(ChainError::SignatureCount {
                expected,
                actual: signatures.len(),
            });
        }
        for (index, sig) in signatures.iter().enumerate() {
            if sig.len() != SIGNATURE_LEN {
                return Err(ChainError::SignatureLength {
                    index,
                    expected: SIGNATURE_LEN,
                    actual: sig.len(),
                });
            }
        }

        let message = self.message_bytes()?;
        let mut bytes = Vec::with_capacity(3 + signatures.len() * SIGNATURE_LEN + message.len());
        write_compact_len(&mut bytes, signatures.len())?;
        for sig in signatures {
            bytes.extend_from_slice(sig);
        }
        bytes.extend_from_slice(&message);

        Ok(SignedParts {
            serialized: BASE64.encode(&bytes),
            hash: base58::encode(&signatures[0]),
            bytes,
        })
    }

    fn to_normalised(&self, chain: &str) -> NormalisedTransaction {
        let system = Pubkey::system_program();
        let token = Pubkey::token_program();
        let memo_program = Pubkey::memo_program();

        let mut tx = NormalisedTransaction::new(chain, TransactionKind::Unknown)
            .with_parties(self.fee_payer.to_string(), String::new())
            .with_fee(self.estimated_fee())
            .with_meta("recent_blockhash", self.recent_blockhash.to_string())
            .with_meta("last_valid_block_height", self.last_valid_block_height);

        for ix in &self.instructions {
            if ix.program_id == system
                && ix.data.len() == 12
                && read_u32_le(&ix.data, 0).ok() == Some(SYSTEM_TRANSFER)
                && ix.accounts.len() == 2
            {
                tx.kind = TransactionKind::NativeTransfer;
                tx.from = ix.accounts[0].pubkey.to_string();
                tx.to = ix.accounts[1].pubkey.to_string();
                tx.value = read_u64_le(&ix.data, 4).unwrap_or_default().to_string();
            } else if ix.program_id == token
                && ix.data.first() == Some(&TOKEN_TRANSFER_CHECKED)
                && ix.data.len() == 10
                && ix.accounts.len() == 4
            {
                tx.kind = TransactionKind::TokenTransfer;
                tx.from = ix.accounts[3].pubkey.to_string();
                tx.to = ix.accounts[2].pubkey.to_string();
                tx.value = read_u64_le(&ix.data, 1).unwrap_or_default().to_string();
                tx = tx
                    .with_meta("mint", ix.accounts[1].pubkey.to_string())
                    .with_meta("decimals", ix.data[9]);
            } else if ix.program_id == memo_program {
                tx = tx.with_meta("memo", String::from_utf8_lossy(&ix.data).into_owned());
            }
        }
        tx
    }

    /// 计算预算指令置于最前；同类指令被替换而非追加
    fn rebuild(&self, overrides: &RebuildOverrides) -> Result<Self> {
        let (limit, price) = self.compute_budget();
        let limit = overrides.compute_unit_limit.or(limit);
        let price = overrides.compute_unit_price.or(price);

        let budget_program = Pubkey::compute_budget_program();
        let mut instructions = Vec::with_capacity(self.instructions.len() + 2);
        if let Some(units) = limit {
            instructions.push(set_compute_unit_limit(units));
        }
        if let Some(micro_lamports) = price {
            instructions.push(set_compute_unit_price(micro_lamports));
        }
        instructions.extend(
            self.instructions
                .iter()
                .filter(|ix| ix.program_id != budget_program)
                .cloned(),
        );

        let (recent_blockhash, fallback_height) = match &overrides.recent_blockhash {
            // 旧高度只对旧 blockhash 有效
            Some(hash) => (parse_blockhash(hash)?, 0),
            None => (self.recent_blockhash, self.last_valid_block_height),
        };
        let last_valid_block_height = overrides
            .last_valid_block_height
            .unwrap_or(fallback_height);

        Self::new(
            self.fee_payer,
            instructions,
            recent_blockhash,
            last_valid_block_height,
            self.lamports_per_signature,
        )
    }
}

fn parse_blockhash(hash: &str) -> Result<Pubkey> {
    let bytes = base58::decode(hash)
        .map_err(|e| ChainError::invalid_hash("solana", hash, e.to_string()))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map(Pubkey)
        .map_err(|_| ChainError::invalid_hash("solana", hash, "blockhash must be 32 bytes"))
}

/// 构建 Solana 转账（原生 SOL 或 SPL TransferChecked）
pub fn build(
    config: &ChainConfig,
    intent: &TransferIntent,
    ctx: &SolanaContext,
) -> Result<SolanaTransaction> {
    let chain = config.alias.as_str();
    let from = Pubkey(AddressValidator::parse_solana(chain, &intent.from)?);
    let to = Pubkey(AddressValidator::parse_solana(chain, &intent.to)?);
    let lamports_per_signature = match config.params {
        ChainParams::Solana {
            lamports_per_signature,
        } => lamports_per_signature,
        _ => return Err(ChainError::UnsupportedChain(chain.to_string())),
    };

    let overrides = &intent.overrides;
    let blockhash_str = overrides
        .recent_blockhash
        .as_deref()
        .unwrap_or(&ctx.recent_blockhash);
    let recent_blockhash = parse_blockhash(blockhash_str)?;

    let mut instructions = Vec::new();
    if let Some(units) = overrides.compute_unit_limit {
        instructions.push(set_compute_unit_limit(units));
    }
    if let Some(price) = overrides.compute_unit_price {
        instructions.push(set_compute_unit_price(price));
    }

    match &intent.asset {
        Asset::Native => {
            let lamports = intent.amount.to_base_units_u64(config.decimals)?;
            instructions.push(system_transfer(from, to, lamports));
        }
        Asset::SplToken {
            mint,
            decimals,
            source_account,
            destination_account,
        } => {
            let mint = Pubkey(AddressValidator::parse_solana(chain, mint)?);
            let source = Pubkey(AddressValidator::parse_solana(chain, source_account)?);
            let destination = Pubkey(AddressValidator::parse_solana(chain, destination_account)?);
            let amount = intent.amount.to_base_units_u64(u32::from(*decimals))?;
            instructions.push(token_transfer_checked(
                source,
                mint,
                destination,
                from,
                amount,
                *decimals,
            ));
        }
        _ => return Err(ChainError::contract(chain, "non-SPL token transfer")),
    }

    if let Some(text) = &intent.memo {
        instructions.push(memo(from, text));
    }

    let tx = SolanaTransaction::new(
        from,
        instructions,
        recent_blockhash,
        ctx.last_valid_block_height,
        lamports_per_signature,
    )?;

    tracing::debug!(
        chain = %chain,
        accounts = tx.message.account_keys.len(),
        instructions = tx.instructions.len(),
        "Solana message compiled"
    );
    Ok(tx)
}
