//! Network parameters and base58check address handling.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Bitcoin network the node runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Livenet,
    Testnet,
    Regtest,
}

impl Network {
    /// Version byte of pay-to-pubkey-hash addresses
    pub const fn pubkey_hash_version(&self) -> u8 {
        match self {
            Network::Livenet => 0x00,
            Network::Testnet | Network::Regtest => 0x6f,
        }
    }

    /// Version byte of pay-to-script-hash addresses
    pub const fn script_hash_version(&self) -> u8 {
        match self {
            Network::Livenet => 0x05,
            Network::Testnet | Network::Regtest => 0xc4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Livenet => "livenet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "livenet" | "mainnet" | "main" => Ok(Network::Livenet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(()),
        }
    }
}

/// Double SHA-256
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Encode a 20-byte hash with a version byte as a base58check address
pub fn encode_address(version: u8, hash160: &[u8; 20]) -> String {
    bs58::encode(hash160).with_check_version(version).into_string()
}

/// Check that `address` is a valid base58check P2PKH or P2SH address for `network`
pub fn is_valid_address(address: &str, network: Network) -> bool {
    // checksum verified and stripped; version byte kept
    let Ok(payload) = bs58::decode(address).with_check(None).into_vec() else {
        return false;
    };
    if payload.len() != 21 {
        return false;
    }

    payload[0] == network.pubkey_hash_version() || payload[0] == network.script_hash_version()
}
