//! Placeholder terrain used to cover the world while a transfer swaps servers.

use crate::{ChunkPos, Dimension};

/// Sub-chunk storage format version written into empty chunks.
pub const SUB_CHUNK_VERSION: u8 = 9;

/// Encodes a chunk column made of one air-only sub-chunk and uniform biomes.
pub fn empty_chunk(dimension: Dimension) -> Vec<u8> {
    let sections = dimension.sub_chunk_count() as usize;
    let mut buf = Vec::with_capacity(4 + sections * 2);

    // version, storage count, sub-chunk y index
    buf.extend_from_slice(&[SUB_CHUNK_VERSION, 0, 0]);

    // One single-value biome palette per section: a header with zero bits
    // per entry followed by the palette's only entry.
    for _ in 0..sections {
        buf.push(1);
        write_var_u32(&mut buf, dimension.default_biome());
    }

    // border blocks
    buf.push(0);
    buf
}

/// Every chunk position in the square of `radius` around `center`,
/// row by row along x.
pub fn chunk_ring(center: ChunkPos, radius: i32) -> impl Iterator<Item = ChunkPos> {
    (center.x - radius..=center.x + radius)
        .flat_map(move |x| (center.z - radius..=center.z + radius).map(move |z| ChunkPos { x, z }))
}

fn write_var_u32(buf: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}
