use crate::error::{MapError, Result};
use crate::tile::TileRef;
use crate::tileset::{TileSet, TileSetId};

/// Largest gid for which a direct lookup table is built; above it lookups
/// binary-search the range list instead.
pub const MAX_LUT_GID: u32 = 1 << 16;

const NO_TILESET: u16 = u16::MAX;

/// The gid range owned by one tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GidRange {
    /// gid of tile 0.
    pub first_gid: u32,
    /// Owning tileset.
    pub tileset: TileSetId,
    /// Number of gids covered, `max_tile_id + 1`.
    pub span: u32,
}

impl GidRange {
    /// Last gid of a non-empty range, `None` when empty or past `u32::MAX`.
    pub fn last_gid(&self) -> Option<u32> {
        self.span
            .checked_sub(1)
            .and_then(|n| self.first_gid.checked_add(n))
    }

    fn overflow(&self) -> MapError {
        MapError::GidOverflow {
            first_gid: self.first_gid,
            span: self.span,
        }
    }

    fn contains(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid - self.first_gid < self.span
    }
}

/// Mapping between gids and `(tileset, local id)` pairs for one document pass.
///
/// gid 0 never resolves: it means "no tile".
#[derive(Debug, Clone, Default)]
pub struct GidTable {
    ranges: Vec<GidRange>,
    lut: Vec<u16>,
}

impl GidTable {
    /// Allocates gids for `tilesets` in order, starting at 1 and advancing by
    /// each tileset's span. Fails with [`MapError::GidOverflow`] when the
    /// tilesets need more gids than a `u32` holds.
    pub fn assign(tilesets: &[TileSet]) -> Result<Self> {
        let mut first_gid = 1u32;
        let mut ranges = Vec::with_capacity(tilesets.len());
        for ts in tilesets {
            let range = GidRange {
                first_gid,
                tileset: ts.id(),
                span: ts.gid_span(),
            };
            first_gid = first_gid
                .checked_add(range.span)
                .ok_or_else(|| range.overflow())?;
            ranges.push(range);
        }
        Self::from_ranges(ranges)
    }

    /// Builds a table from ranges read from a document. Ranges may arrive in
    /// any order; where they overlap the one listed later wins.
    pub fn from_ranges(mut ranges: Vec<GidRange>) -> Result<Self> {
        ranges.sort_by_key(|r| r.first_gid);

        let mut max_gid = 0;
        for r in ranges.iter().filter(|r| r.span > 0) {
            max_gid = max_gid.max(r.last_gid().ok_or_else(|| r.overflow())?);
        }

        let mut lut = Vec::new();
        if max_gid <= MAX_LUT_GID && ranges.len() < NO_TILESET as usize {
            lut = vec![NO_TILESET; (max_gid + 1) as usize];
            for (i, r) in ranges.iter().enumerate() {
                for gid in r.first_gid..r.first_gid + r.span {
                    lut[gid as usize] = i as u16;
                }
            }
            lut[0] = NO_TILESET;
        }

        Ok(GidTable { ranges, lut })
    }

    /// Ranges in tileset order.
    pub fn ranges(&self) -> &[GidRange] {
        &self.ranges
    }

    /// Highest gid covered by any tileset, 0 when there is none.
    pub fn max_gid(&self) -> u32 {
        self.ranges
            .iter()
            .filter_map(GidRange::last_gid)
            .max()
            .unwrap_or(0)
    }

    /// firstgid assigned to `tileset`, if it is in the table.
    pub fn first_gid(&self, tileset: TileSetId) -> Option<u32> {
        self.ranges
            .iter()
            .find(|r| r.tileset == tileset)
            .map(|r| r.first_gid)
    }

    /// gid of a tile reference, or `None` when its tileset is not in the table
    /// or the id lies past the tileset's range.
    pub fn gid_of(&self, tile: TileRef) -> Option<u32> {
        let range = self.ranges.iter().find(|r| r.tileset == tile.tileset)?;
        (tile.id < range.span).then(|| range.first_gid + tile.id)
    }

    /// Resolves a gid to the tile it names.
    #[inline]
    pub fn resolve(&self, gid: u32) -> Option<TileRef> {
        if gid == 0 {
            return None;
        }
        let range = if self.lut.is_empty() {
            let idx = self.ranges.partition_point(|r| r.first_gid <= gid);
            self.ranges[..idx].iter().rev().find(|r| r.contains(gid))?
        } else {
            let idx = *self.lut.get(gid as usize)?;
            if idx == NO_TILESET {
                return None;
            }
            &self.ranges[idx as usize]
        };
        Some(TileRef::new(range.tileset, gid - range.first_gid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Tile;

    fn tileset_with_max_id(name: &str, max_id: u32) -> TileSet {
        let mut ts = TileSet::new(name);
        for id in 0..=max_id {
            ts.add_tile(Tile::new(id));
        }
        ts
    }

    #[test]
    fn assignment_is_cumulative_and_deterministic() {
        let t1 = tileset_with_max_id("t1", 3);
        let t2 = tileset_with_max_id("t2", 0);
        let sets = vec![t1.clone(), t2.clone()];

        let table = GidTable::assign(&sets).expect("gids fit");
        assert_eq!(table.first_gid(t1.id()), Some(1));
        assert_eq!(table.first_gid(t2.id()), Some(5));
        assert_eq!(table.max_gid(), 5);

        let again = GidTable::assign(&sets).expect("gids fit");
        assert_eq!(again.ranges(), table.ranges());
    }

    #[test]
    fn resolves_both_ways() {
        let t1 = tileset_with_max_id("t1", 3);
        let t2 = tileset_with_max_id("t2", 1);
        let table = GidTable::assign(&[t1.clone(), t2.clone()]).expect("gids fit");

        assert_eq!(table.resolve(0), None);
        assert_eq!(table.resolve(1), Some(t1.tile_ref(0)));
        assert_eq!(table.resolve(4), Some(t1.tile_ref(3)));
        assert_eq!(table.resolve(6), Some(t2.tile_ref(1)));
        assert_eq!(table.resolve(7), None);

        assert_eq!(table.gid_of(t2.tile_ref(1)), Some(6));
        assert_eq!(table.gid_of(t2.tile_ref(2)), None);
    }

    #[test]
    fn sparse_ranges_without_lut() {
        let a = TileSet::new("a");
        let b = TileSet::new("b");
        let table = GidTable::from_ranges(vec![
            GidRange {
                first_gid: MAX_LUT_GID + 10,
                tileset: b.id(),
                span: 5,
            },
            GidRange {
                first_gid: 1,
                tileset: a.id(),
                span: 2,
            },
        ])
        .expect("ranges fit");
        assert!(table.lut.is_empty());
        assert_eq!(table.resolve(2), Some(a.tile_ref(1)));
        assert_eq!(table.resolve(3), None);
        assert_eq!(table.resolve(MAX_LUT_GID + 12), Some(b.tile_ref(2)));
        assert_eq!(table.resolve(MAX_LUT_GID + 15), None);
    }

    #[test]
    fn ranges_past_the_last_gid_are_errors() {
        let a = TileSet::new("a");
        let err = GidTable::from_ranges(vec![GidRange {
            first_gid: u32::MAX,
            tileset: a.id(),
            span: 2,
        }])
        .expect_err("gid u32::MAX + 1 does not exist");
        assert!(matches!(err, MapError::GidOverflow { first_gid: u32::MAX, span: 2 }));

        let ends_exactly = GidTable::from_ranges(vec![GidRange {
            first_gid: u32::MAX,
            tileset: a.id(),
            span: 1,
        }])
        .expect("last gid is u32::MAX");
        assert_eq!(ends_exactly.resolve(u32::MAX), Some(a.tile_ref(0)));
    }

    #[test]
    fn assignment_reports_exhausted_gid_space() {
        let small = tileset_with_max_id("small", 1);
        let mut huge = TileSet::new("huge");
        huge.add_tile(Tile::new(u32::MAX - 1));
        let err = GidTable::assign(&[small, huge]).expect_err("needs more than u32::MAX gids");
        assert!(matches!(err, MapError::GidOverflow { first_gid: 3, .. }));
    }
}
