use crate::alphabet::Letter;
use crate::sequence_set::SequenceSet;

/// A loaded subset of the database.
///
/// Carries its own [`SequenceSet`] for the (possibly masked) sequences, optionally the
/// unmasked originals, a title table and the mapping from block-local ids to
/// database-global OIds. Blocks are created by the loader, consumed read-only by the
/// extension core and dropped between rounds.
pub struct Block {
    seqs: SequenceSet,
    unmasked: Option<SequenceSet>,
    titles: Vec<String>,
    block2oid: Vec<i64>,
}

impl Block {
    pub fn new() -> Block {
        Block {
            seqs: SequenceSet::new(),
            unmasked: None,
            titles: Vec::new(),
            block2oid: Vec::new(),
        }
    }

    /// Adds a sequence with its title and global OId; returns the block-local id.
    pub fn push(&mut self, title: &str, seq: &[Letter], oid: i64) -> u32 {
        let id = self.seqs.push(seq);
        self.titles.push(title.to_string());
        self.block2oid.push(oid);
        id as u32
    }

    /// Installs the arena padding; call once after the last push.
    pub fn finish(&mut self) {
        self.seqs.finish();
        if let Some(u) = &mut self.unmasked {
            u.finish();
        }
    }

    pub fn seqs(&self) -> &SequenceSet {
        &self.seqs
    }

    /// The unmasked sequences if the loader kept them, otherwise the masked set.
    pub fn unmasked_seqs(&self) -> &SequenceSet {
        self.unmasked.as_ref().unwrap_or(&self.seqs)
    }

    pub fn set_unmasked(&mut self, set: SequenceSet) {
        self.unmasked = Some(set);
    }

    pub fn title(&self, block_id: u32) -> &str {
        &self.titles[block_id as usize]
    }

    /// Database-global ordinal of a block-local id.
    pub fn oid(&self, block_id: u32) -> i64 {
        self.block2oid[block_id as usize]
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn letters(&self) -> usize {
        self.seqs.letters()
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::new()
    }
}
