pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Leading `'0'` hex characters a mined block hash must carry.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Fixed payout queued for the miner after each successful round.
pub const MINING_REWARD: u64 = 100;

/// Sentinel sender for reward transactions minted by the ledger itself.
pub const REWARD_SENDER: &str = "SYSTEM";

/// The genesis block has no real predecessor.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

pub const GENESIS_NOTE: &str = "Genesis Block - the start of the chain";
