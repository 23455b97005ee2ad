pub mod sled_store;

use anyhow::{bail, Result};
use minichain_core::chain::Blockchain;
use minichain_core::Block;

/// Persistence backends the ledger can be saved to and loaded from.
/// Implementations must store blocks field-for-field: every field that feeds
/// the block hash has to survive a round trip unchanged.
pub trait Storage: Send + Sync {
    fn put_block(&self, block: &Block) -> Result<()>;
    fn get_block(&self, index: u64) -> Result<Option<Block>>;
    fn tip_height(&self) -> Result<Option<u64>>;
    fn tip_hash(&self) -> Result<Option<String>>;
    fn put_difficulty(&self, difficulty: usize) -> Result<()>;
    fn difficulty(&self) -> Result<Option<usize>>;
    fn clear(&self) -> Result<()>;
}

/// Writes the chain difficulty and every block to the store.
/// Pending transactions are not persisted; they are unconfirmed by
/// definition.
pub fn save_chain<S: Storage>(store: &S, ledger: &Blockchain) -> Result<()> {
    store.put_difficulty(ledger.difficulty())?;
    for block in ledger.blocks() {
        store.put_block(block)?;
    }
    Ok(())
}

/// Rebuilds a ledger from storage, re-validating the whole chain on the way
/// in. `Ok(None)` when the store holds no chain yet.
pub fn load_chain<S: Storage>(store: &S) -> Result<Option<Blockchain>> {
    let Some(tip) = store.tip_height()? else {
        return Ok(None);
    };
    let Some(difficulty) = store.difficulty()? else {
        bail!("store has blocks but no recorded difficulty");
    };
    let mut blocks = Vec::with_capacity(tip as usize + 1);
    for index in 0..=tip {
        match store.get_block(index)? {
            Some(block) => blocks.push(block),
            None => bail!("missing block {index} below the stored tip {tip}"),
        }
    }
    match Blockchain::from_parts(difficulty, blocks) {
        Ok(ledger) => Ok(Some(ledger)),
        Err(fault) => bail!("stored chain failed validation: {fault}"),
    }
}
