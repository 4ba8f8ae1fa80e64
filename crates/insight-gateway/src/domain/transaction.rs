//! Raw transaction decoding and the inventory view published to subscribers.
//!
//! Only what the `tx` event needs is decoded: input sequences, output values
//! and scripts, and enough structure to compute the txid (witness data is
//! skipped and excluded from the hash).

use crate::domain::network::{encode_address, sha256d, Network};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Satoshis per coin
pub const SATOSHIS_PER_COIN: f64 = 100_000_000.0;

/// Inputs with a sequence below this value signal replace-by-fee
const RBF_SEQUENCE_THRESHOLD: u32 = u32::MAX - 1;

/// Upper bound on any amount in satoshis (21 million coins)
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Raw transaction decode errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),
    #[error("trailing {0} bytes after locktime")]
    TrailingBytes(usize),
    #[error("varint too large: {0}")]
    OversizedCount(u64),
    #[error("invalid segwit flag: {0:#04x}")]
    InvalidSegwitFlag(u8),
    #[error("output value out of range: {0}")]
    ValueOutOfRange(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prev_txid: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// Standard address for P2PKH / P2SH scripts
    pub fn address(&self, network: Network) -> Option<String> {
        let s = &self.script_pubkey;
        // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
        if s.len() == 25 && s[0] == 0x76 && s[1] == 0xa9 && s[2] == 0x14 && s[23] == 0x88 && s[24] == 0xac {
            let hash: [u8; 20] = s[3..23].try_into().ok()?;
            return Some(encode_address(network.pubkey_hash_version(), &hash));
        }
        // OP_HASH160 <20> OP_EQUAL
        if s.len() == 23 && s[0] == 0xa9 && s[1] == 0x14 && s[22] == 0x87 {
            let hash: [u8; 20] = s[2..22].try_into().ok()?;
            return Some(encode_address(network.script_hash_version(), &hash));
        }
        None
    }
}

/// Decoded transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
    /// Double SHA-256 of the witness-stripped serialization (internal byte order)
    txid: [u8; 32],
}

impl RawTransaction {
    /// Decode a serialized transaction (legacy or segwit)
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);

        let version = r.read_u32()? as i32;

        let mut segwit = false;
        if r.peek()? == 0x00 {
            r.read_u8()?;
            let flag = r.read_u8()?;
            if flag != 0x01 {
                return Err(DecodeError::InvalidSegwitFlag(flag));
            }
            segwit = true;
        }
        let body_start = r.pos;

        let input_count = r.read_count()?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let prev_txid: [u8; 32] = r.read_array()?;
            let prev_index = r.read_u32()?;
            let script_len = r.read_count()?;
            let script_sig = r.read_bytes(script_len)?.to_vec();
            let sequence = r.read_u32()?;
            inputs.push(TxInput {
                prev_txid,
                prev_index,
                script_sig,
                sequence,
            });
        }

        let output_count = r.read_count()?;
        let mut outputs = Vec::with_capacity(output_count);
        let mut total: u64 = 0;
        for _ in 0..output_count {
            let value = r.read_u64()?;
            total = total
                .checked_add(value)
                .filter(|sum| value <= MAX_MONEY && *sum <= MAX_MONEY)
                .ok_or(DecodeError::ValueOutOfRange(value))?;
            let script_len = r.read_count()?;
            let script_pubkey = r.read_bytes(script_len)?.to_vec();
            outputs.push(TxOutput {
                value,
                script_pubkey,
            });
        }
        let body_end = r.pos;

        if segwit {
            for _ in 0..input_count {
                let items = r.read_count()?;
                for _ in 0..items {
                    let len = r.read_count()?;
                    r.read_bytes(len)?;
                }
            }
        }

        let lock_time = r.read_u32()?;
        if r.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(r.remaining()));
        }

        // version || inputs || outputs || locktime, witness excluded
        let mut stripped = Vec::with_capacity(bytes.len());
        stripped.extend_from_slice(&bytes[..4]);
        stripped.extend_from_slice(&bytes[body_start..body_end]);
        stripped.extend_from_slice(&bytes[bytes.len() - 4..]);

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
            txid: sha256d(&stripped),
        })
    }

    /// Transaction id as displayed by nodes (byte-reversed hex)
    pub fn txid(&self) -> String {
        let mut display = self.txid;
        display.reverse();
        hex::encode(display)
    }

    /// Sum of all output values in satoshis
    pub fn value_out(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |sum, o| sum.saturating_add(o.value))
    }

    /// Whether any input opts in to replace-by-fee
    pub fn is_rbf(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| input.sequence < RBF_SEQUENCE_THRESHOLD)
    }
}

/// The `tx` event payload: a decoded, subscriber-facing view of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvTransaction {
    pub txid: String,
    /// Total output value in coins
    #[serde(rename = "valueOut")]
    pub value_out: f64,
    /// One single-entry map `{address: satoshis}` per addressable output
    pub vout: Vec<BTreeMap<String, u64>>,
    #[serde(rename = "isRBF")]
    pub is_rbf: bool,
}

impl InvTransaction {
    pub fn from_transaction(tx: &RawTransaction, network: Network) -> Self {
        let vout = tx
            .outputs
            .iter()
            .filter_map(|output| {
                output
                    .address(network)
                    .map(|address| BTreeMap::from([(address, output.value)]))
            })
            .collect();

        Self {
            txid: tx.txid(),
            value_out: tx.value_out() as f64 / SATOSHIS_PER_COIN,
            vout,
            is_rbf: tx.is_rbf(),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof(self.pos))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof(self.pos));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        match self.read_u8()? {
            0xfd => Ok(self.read_u16()? as u64),
            0xfe => Ok(self.read_u32()? as u64),
            0xff => self.read_u64(),
            n => Ok(n as u64),
        }
    }

    /// Varint used as an element count or length; bounded by the bytes left
    fn read_count(&mut self) -> Result<usize, DecodeError> {
        let n = self.read_varint()?;
        if n > self.remaining() as u64 {
            return Err(DecodeError::OversizedCount(n));
        }
        Ok(n as usize)
    }
}
