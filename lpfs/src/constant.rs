pub type BlockAddr = u64;
pub type Ino = u64;
pub type Block = [u8; BLOCK_SIZE];
/// (块号, 块内字节偏移)
pub type InodeAddr = (BlockAddr, u32);

pub const BLOCK_SIZE_BITS: usize = 12;
pub const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_BITS;

pub const NULL: BlockAddr = 0;
pub const SUPER: BlockAddr = 0;
pub const ROOT_INO: Ino = 1;

/// byte address -> (block, in-block offset)
pub fn split_byte_addr(byte_addr: u64) -> InodeAddr {
    (
        byte_addr >> BLOCK_SIZE_BITS,
        (byte_addr & (BLOCK_SIZE as u64 - 1)) as u32,
    )
}

pub fn join_byte_addr((block, offset): InodeAddr) -> u64 {
    (block << BLOCK_SIZE_BITS) + offset as u64
}

// size 除以 BLOCK_SIZE 向上取整
pub fn blocks_for(size: u64) -> u64 {
    (size >> BLOCK_SIZE_BITS) + (size & (BLOCK_SIZE as u64 - 1) != 0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(blocks_for(10000), 3);
        assert_eq!(blocks_for(0), 0);
        assert_eq!(blocks_for(4096), 1);
        assert_eq!(blocks_for(4097), 2);
        assert_eq!(blocks_for(u64::MAX), (u64::MAX >> 12) + 1);
    }

    #[test]
    fn byte_addr_split() {
        assert_eq!(split_byte_addr(3 * 4096 + 512), (3, 512));
        assert_eq!(join_byte_addr((3, 512)), 3 * 4096 + 512);
    }
}
