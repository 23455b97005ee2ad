use crate::Storage;
use anyhow::Result;
use minichain_core::Block;
use sled::Db;
use std::path::Path;
use tracing::info;

const TREE_BLOCKS: &str = "blocks";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";
const KEY_DIFFICULTY: &[u8] = b"difficulty";

/// Sled-backed block store: blocks keyed by big-endian index in their own
/// tree, tip metadata and difficulty in the default tree.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        info!("sled store opened");
        Ok(Self { db })
    }

    fn blocks(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree(TREE_BLOCKS)?)
    }
}

impl Storage for SledStore {
    fn put_block(&self, block: &Block) -> Result<()> {
        let tree = self.blocks()?;
        let key = block.index.to_be_bytes();
        let bytes = bincode::serialize(block)?;
        tree.insert(key, bytes)?;

        // update tip
        self.db.insert(KEY_TIP_HEIGHT, &block.index.to_be_bytes())?;
        self.db.insert(KEY_TIP_HASH, block.hash.as_bytes())?;

        self.db.flush()?;
        Ok(())
    }

    fn get_block(&self, index: u64) -> Result<Option<Block>> {
        match self.blocks()?.get(index.to_be_bytes())? {
            Some(ivec) => Ok(Some(bincode::deserialize(&ivec)?)),
            None => Ok(None),
        }
    }

    fn tip_height(&self) -> Result<Option<u64>> {
        Ok(self.db.get(KEY_TIP_HEIGHT)?.map(|v| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&v);
            u64::from_be_bytes(arr)
        }))
    }

    fn tip_hash(&self) -> Result<Option<String>> {
        match self.db.get(KEY_TIP_HASH)? {
            Some(v) => Ok(Some(String::from_utf8(v.to_vec())?)),
            None => Ok(None),
        }
    }

    fn put_difficulty(&self, difficulty: usize) -> Result<()> {
        self.db
            .insert(KEY_DIFFICULTY, &(difficulty as u64).to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn difficulty(&self) -> Result<Option<usize>> {
        Ok(self.db.get(KEY_DIFFICULTY)?.map(|v| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&v);
            u64::from_be_bytes(arr) as usize
        }))
    }

    fn clear(&self) -> Result<()> {
        self.blocks()?.clear()?;
        self.db.remove(KEY_TIP_HEIGHT)?;
        self.db.remove(KEY_TIP_HASH)?;
        self.db.remove(KEY_DIFFICULTY)?;
        self.db.flush()?;
        Ok(())
    }
}
