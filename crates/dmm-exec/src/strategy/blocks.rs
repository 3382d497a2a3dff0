//! Block-shuffle strategy
//!
//! Three stages, each one task per partition:
//!
//! 1. `generate`: partition `p` generates its contiguous range of `A` tiles and
//!    of `B` tiles and shuffles each by contraction key (`A(i,k)` and `B(k,j)`
//!    both go to reducer `k % P`).
//! 2. `cogroup-multiply`: each reducer groups its tiles by key, multiplies every
//!    `A × B` pair of a group, pre-combines the products by output key and
//!    shuffles the partials by output index.
//! 3. `reduce`: each reducer folds the partials of its destinations, checks
//!    that every destination received exactly `nbK` contributions and returns
//!    per-tile sums.
//!
//! The driver then checks that every destination was produced exactly once.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use tracing::debug;

use dmm_core::{
    route, BlockGrid, ContractionKey, DmmError, DmmResult, Element, MatrixId, OutputKey,
    RangePartitioner, Tile, TileGenerator,
};
use dmm_kernels::{multiply_tile, tile_checksum, Combiner, Partial};

use crate::config::RunRequest;
use crate::result::MetricValue;
use crate::session::Session;
use crate::shuffle::{exchange, read_blocks, MapOutput, ShuffleWriter};
use crate::strategy::StrategyOutput;

const NOTES: &str = "Block-based approach: shuffle expected (cogroup + reduce by key).";

/// Key an operand tile joins on: block column of `A`, block row of `B`
pub fn contraction_key<T: Element>(tile: &Tile<T>) -> DmmResult<ContractionKey> {
    match tile.matrix() {
        MatrixId::A => Ok(tile.coord().col),
        MatrixId::B => Ok(tile.coord().row),
        MatrixId::C => Err(DmmError::execution(
            "cogroup-multiply",
            format!("output tile {} in the operand shuffle", tile.coord()),
        )),
    }
}

/// Operand tiles sharing one contraction key
struct Group<T> {
    a: Vec<Tile<T>>,
    b: Vec<Tile<T>>,
}

fn cogroup<T: Element>(tiles: Vec<Tile<T>>) -> DmmResult<HashMap<ContractionKey, Group<T>>> {
    let mut groups: HashMap<ContractionKey, Group<T>> = HashMap::new();
    for tile in tiles {
        let key = contraction_key(&tile)?;
        let group = groups.entry(key).or_insert_with(|| Group {
            a: Vec::new(),
            b: Vec::new(),
        });
        match tile.matrix() {
            MatrixId::A => group.a.push(tile),
            _ => group.b.push(tile),
        }
    }
    Ok(groups)
}

pub fn run<T: Element>(session: &Session, request: &RunRequest) -> DmmResult<StrategyOutput> {
    let grid = request.grid()?;
    let parts = request.partitions();
    let bs = grid.tile_size();
    let gen = TileGenerator::new(request.seed());

    // Stage 1: generate + shuffle by contraction key
    let a_split = RangePartitioner::new(grid.total_a_tiles(), parts)?;
    let b_split = RangePartitioner::new(grid.total_b_tiles(), parts)?;
    let ranges: Vec<(Range<usize>, Range<usize>)> =
        (0..parts).map(|p| (a_split.range(p), b_split.range(p))).collect();

    let generated = session.run_stage("generate", ranges, |ctx, (a_range, b_range)| {
        let mut writer = ShuffleWriter::new(ctx, "tiles", parts);
        for t in a_range {
            let tile = gen.generate_tile::<T>(MatrixId::A, grid.a_coord(t), bs)?;
            writer.write(route(contraction_key(&tile)?, parts), &tile)?;
        }
        for t in b_range {
            let tile = gen.generate_tile::<T>(MatrixId::B, grid.b_coord(t), bs)?;
            writer.write(route(contraction_key(&tile)?, parts), &tile)?;
        }
        let output = writer.finish();
        ctx.add_result_bytes(output.memory_bytes());
        Ok(output)
    })?;
    let mut shuffle_records: u64 = generated.iter().map(MapOutput::records).sum();

    // Stage 2: join, multiply, map-side combine, shuffle by output key
    let inboxes = exchange(generated, parts)?;
    let joined = session.run_stage("cogroup-multiply", inboxes, |ctx, blocks| {
        let tiles: Vec<Tile<T>> = read_blocks(ctx, blocks)?;
        let mut combiner = Combiner::new();
        let mut products = 0usize;
        for (key, group) in cogroup(tiles)? {
            debug!(key, a = group.a.len(), b = group.b.len(), "joined group");
            for a in &group.a {
                for b in &group.b {
                    combiner.insert(Partial::from_product(multiply_tile(a, b)?)?)?;
                    products += 1;
                }
            }
        }

        let mut writer = ShuffleWriter::new(ctx, "partials", parts);
        for partial in combiner.into_partials() {
            writer.write(route(grid.output_index(&partial.key()), parts), &partial)?;
        }
        let output = writer.finish();
        ctx.add_result_bytes(output.memory_bytes());
        Ok((output, products))
    })?;
    let (partial_outputs, products): (Vec<_>, Vec<usize>) = joined.into_iter().unzip();
    shuffle_records += partial_outputs.iter().map(MapOutput::records).sum::<u64>();
    let partial_products: usize = products.iter().sum();

    // Stage 3: reduce by output key
    let inboxes = exchange(partial_outputs, parts)?;
    let reduced = session.run_stage("reduce", inboxes, |ctx, blocks| {
        let partials: Vec<Partial<T>> = read_blocks(ctx, blocks)?;
        let mut combiner = Combiner::new();
        for partial in partials {
            combiner.insert(partial)?;
        }
        debug!(destinations = combiner.len(), "reduced partials");

        let sums = combiner
            .into_partials()
            .into_iter()
            .map(|finished| finish_destination(&grid, finished))
            .collect::<DmmResult<Vec<_>>>()?;
        ctx.add_result_bytes((sums.len() * std::mem::size_of::<(OutputKey, f64)>()) as u64);
        Ok(sums)
    })?;

    let checksum = collect_checksum(&grid, reduced.into_iter().flatten())?;
    if partial_products != grid.total_partial_products() {
        return Err(DmmError::execution(
            "cogroup-multiply",
            format!(
                "{} partial products, expected {}",
                partial_products,
                grid.total_partial_products()
            ),
        ));
    }

    let mut extra = BTreeMap::new();
    extra.insert("partitions".to_string(), MetricValue::from(parts));
    extra.insert("blockSize".to_string(), MetricValue::from(bs));
    extra.insert("blocksI".to_string(), MetricValue::from(grid.blocks_i()));
    extra.insert("blocksK".to_string(), MetricValue::from(grid.blocks_k()));
    extra.insert("blocksJ".to_string(), MetricValue::from(grid.blocks_j()));
    extra.insert("partialProducts".to_string(), MetricValue::from(partial_products));
    extra.insert("shuffleRecords".to_string(), MetricValue::from(shuffle_records));
    extra.insert("notes".to_string(), MetricValue::from(NOTES));

    Ok(StrategyOutput { checksum, extra })
}

/// Checksum of a fully reduced destination, which must hold exactly `nbK` products
fn finish_destination<T: Element>(
    grid: &BlockGrid,
    finished: Partial<T>,
) -> DmmResult<(OutputKey, f64)> {
    if finished.contributions() != grid.blocks_k() {
        return Err(DmmError::execution(
            "reduce",
            format!(
                "destination {} received {} contributions, expected {}",
                finished.key(),
                finished.contributions(),
                grid.blocks_k()
            ),
        ));
    }
    Ok((finished.key(), tile_checksum(finished.tile())))
}

/// Sum per-tile checksums, requiring each destination exactly once
fn collect_checksum<I>(grid: &BlockGrid, sums: I) -> DmmResult<f64>
where
    I: IntoIterator<Item = (OutputKey, f64)>,
{
    let mut seen = vec![false; grid.total_output_tiles()];
    let mut checksum = 0.0;
    for (key, sum) in sums {
        let in_grid = key.row < grid.blocks_i() && key.col < grid.blocks_j();
        let slot = if in_grid {
            seen.get_mut(grid.output_index(&key))
        } else {
            None
        };
        match slot {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(DmmError::execution(
                    "reduce",
                    format!("destination {} reduced twice", key),
                ))
            }
            None => {
                return Err(DmmError::execution(
                    "reduce",
                    format!(
                        "destination {} outside the {}x{} output grid",
                        key,
                        grid.blocks_i(),
                        grid.blocks_j()
                    ),
                ))
            }
        }
        checksum += sum;
    }
    if let Some(missing) = grid.output_keys().find(|k| !seen[grid.output_index(k)]) {
        return Err(DmmError::execution(
            "reduce",
            format!("no partials for destination {}", missing),
        ));
    }
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmm_core::{Case, TileCoord};

    fn grid() -> BlockGrid {
        BlockGrid::new(&Case::square(4).unwrap(), 2).unwrap()
    }

    #[test]
    fn test_contraction_keys() {
        let a = Tile::<f32>::zeros(MatrixId::A, TileCoord::new(3, 1), 2);
        let b = Tile::<f32>::zeros(MatrixId::B, TileCoord::new(1, 5), 2);
        let c = Tile::<f32>::zeros(MatrixId::C, TileCoord::new(0, 0), 2);
        assert_eq!(contraction_key(&a).unwrap(), 1);
        assert_eq!(contraction_key(&b).unwrap(), 1);
        assert!(contraction_key(&c).is_err());
    }

    #[test]
    fn test_cogroup_never_mixes_operands() {
        let tiles = vec![
            Tile::<f32>::zeros(MatrixId::A, TileCoord::new(0, 0), 1),
            Tile::<f32>::zeros(MatrixId::A, TileCoord::new(1, 0), 1),
            Tile::<f32>::zeros(MatrixId::B, TileCoord::new(0, 0), 1),
            Tile::<f32>::zeros(MatrixId::B, TileCoord::new(1, 0), 1),
        ];
        let groups = cogroup(tiles).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&0].a.len(), 2);
        assert_eq!(groups[&0].b.len(), 1);
        assert!(groups[&0].b.iter().all(|t| t.matrix() == MatrixId::B));
        assert_eq!(groups[&1].a.len(), 0);
    }

    fn contributions(key: TileCoord, count: usize) -> Partial<f64> {
        let product = || {
            let mut tile = Tile::<f64>::zeros(MatrixId::C, key, 2);
            tile.as_mut_slice().fill(1.0);
            Partial::from_product(tile).unwrap()
        };
        let mut acc = product();
        for _ in 1..count {
            acc = acc.merge(product()).unwrap();
        }
        acc
    }

    #[test]
    fn test_finish_destination_counts_contributions() {
        let g = grid();
        assert_eq!(g.blocks_k(), 2);
        let key = TileCoord::new(1, 0);

        let (done, sum) = finish_destination(&g, contributions(key, 2)).unwrap();
        assert_eq!(done, key);
        assert_eq!(sum, 8.0);

        let short = finish_destination(&g, contributions(key, 1)).unwrap_err();
        assert!(short.to_string().contains("received 1 contributions, expected 2"));

        let extra = finish_destination(&g, contributions(key, 3)).unwrap_err();
        assert!(extra.to_string().contains("received 3 contributions, expected 2"));
    }

    #[test]
    fn test_collect_checksum_requires_every_destination() {
        let g = grid();
        let all: Vec<_> = g.output_keys().map(|k| (k, 1.0)).collect();
        assert_eq!(collect_checksum(&g, all.clone()).unwrap(), 4.0);

        let err = collect_checksum(&g, all[..3].to_vec()).unwrap_err();
        assert!(err.to_string().contains("no partials for destination (1, 1)"));

        let mut dup = all.clone();
        dup.push(all[0]);
        assert!(collect_checksum(&g, dup).unwrap_err().to_string().contains("twice"));

        let stray = vec![(TileCoord::new(0, 7), 1.0)];
        assert!(collect_checksum(&g, stray).unwrap_err().to_string().contains("outside"));
    }
}
