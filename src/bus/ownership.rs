use std::collections::HashMap;
use std::ops::RangeInclusive;

//===========================================================================//

/// The user id that bypasses every permission check without claiming
/// anything.
pub const SUPERUSER: u8 = 0;

/// The user id that bypasses every permission check and releases every
/// block it touches.
pub const RELEASE_USER: u8 = 255;

//===========================================================================//

/// Tracks which user owns each block of main memory.
///
/// A block is claimed by the first ordinary user who successfully writes
/// to it; after that, other ordinary users may neither read nor write it
/// until [`RELEASE_USER`] touches it.
#[derive(Clone, Debug, Default)]
pub struct OwnershipTable {
    owners: HashMap<u32, u8>,
}

impl OwnershipTable {
    /// Returns a table in which no block is owned.
    pub fn new() -> OwnershipTable {
        OwnershipTable { owners: HashMap::new() }
    }

    /// Returns the owner of the given block, if any.
    pub fn owner(&self, block: u32) -> Option<u8> {
        self.owners.get(&block).copied()
    }

    /// Returns the number of owned blocks.
    pub fn num_owned(&self) -> usize {
        self.owners.len()
    }

    /// Decides whether `user` may access `blocks`.  For [`RELEASE_USER`],
    /// this also releases the blocks.
    pub fn check(&mut self, user: u8, blocks: RangeInclusive<u32>) -> bool {
        match user {
            SUPERUSER => true,
            RELEASE_USER => {
                self.release(blocks);
                true
            }
            _ => blocks.into_iter().all(|block| {
                self.owner(block).is_none_or(|owner| owner == user)
            }),
        }
    }

    /// Records `user` as the owner of every block in `blocks` that has no
    /// owner yet.  Does nothing for the privileged user ids.
    pub fn claim(&mut self, user: u8, blocks: RangeInclusive<u32>) {
        if user == SUPERUSER || user == RELEASE_USER {
            return;
        }
        for block in blocks {
            self.owners.entry(block).or_insert_with(|| {
                log::info!("block {block} claimed by user {user}");
                user
            });
        }
    }

    /// Clears the owner of every block in `blocks`.
    pub fn release(&mut self, blocks: RangeInclusive<u32>) {
        for block in blocks {
            if let Some(owner) = self.owners.remove(&block) {
                log::info!("block {block} released from user {owner}");
            }
        }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{OwnershipTable, RELEASE_USER, SUPERUSER};

    #[test]
    fn unowned_blocks_are_open_to_everyone() {
        let mut table = OwnershipTable::new();
        assert!(table.check(1, 0..=3));
        assert!(table.check(200, 7..=7));
        assert_eq!(table.num_owned(), 0);
    }

    #[test]
    fn first_writer_claims() {
        let mut table = OwnershipTable::new();
        table.claim(2, 2..=3);
        table.claim(5, 3..=4);
        assert_eq!(table.owner(2), Some(2));
        assert_eq!(table.owner(3), Some(2));
        assert_eq!(table.owner(4), Some(5));
        assert!(table.check(2, 2..=3));
        assert!(!table.check(2, 3..=4));
        assert!(!table.check(7, 2..=2));
        assert!(table.check(7, 5..=9));
    }

    #[test]
    fn privileged_users_never_claim() {
        let mut table = OwnershipTable::new();
        table.claim(SUPERUSER, 0..=1);
        table.claim(RELEASE_USER, 0..=1);
        assert_eq!(table.num_owned(), 0);
    }

    #[test]
    fn superuser_bypasses_ownership() {
        let mut table = OwnershipTable::new();
        table.claim(3, 0..=0);
        assert!(table.check(SUPERUSER, 0..=0));
        assert_eq!(table.owner(0), Some(3));
    }

    #[test]
    fn release_user_clears_touched_blocks() {
        let mut table = OwnershipTable::new();
        table.claim(3, 0..=2);
        assert!(table.check(RELEASE_USER, 1..=2));
        assert_eq!(table.owner(0), Some(3));
        assert_eq!(table.owner(1), None);
        assert_eq!(table.owner(2), None);
        assert!(table.check(4, 1..=2));
    }
}

//===========================================================================//
