//! Chain ids the library has built-in knowledge of.

pub const ETHEREUM: u64 = 1;
pub const GOERLI: u64 = 5;
pub const BSC: u64 = 56;
pub const BSC_TESTNET: u64 = 97;
pub const POLYGON: u64 = 137;
pub const OPBNB: u64 = 204;
pub const ZKSYNC: u64 = 324;
pub const BASE: u64 = 8453;
pub const ARBITRUM_ONE: u64 = 42161;
pub const LINEA: u64 = 59144;
pub const SEPOLIA: u64 = 11155111;

/// Known chain IDs → human-readable names.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        ETHEREUM => "Ethereum".to_string(),
        GOERLI => "Goerli".to_string(),
        BSC => "BNB Chain".to_string(),
        BSC_TESTNET => "BNB Chain Testnet".to_string(),
        POLYGON => "Polygon".to_string(),
        OPBNB => "opBNB".to_string(),
        ZKSYNC => "zkSync Era".to_string(),
        BASE => "Base".to_string(),
        ARBITRUM_ONE => "Arbitrum One".to_string(),
        LINEA => "Linea".to_string(),
        SEPOLIA => "Sepolia".to_string(),
        _ => format!("Chain {chain_id}"),
    }
}
