use alloy::eips::BlockNumberOrTag;
use chrono::{DateTime, Utc};

use crate::{ScannerError, ledger::LedgerClient};

/// Finds the block produced at or just before `target`.
///
/// See [`locate_block_at`].
///
/// # Errors
///
/// [`ScannerError::BlockLookup`] if any block read fails.
pub async fn locate_block<C: LedgerClient>(
    client: &C,
    target: DateTime<Utc>,
) -> Result<u64, ScannerError> {
    // Instants before the epoch can only precede every block.
    let target = u64::try_from(target.timestamp()).unwrap_or(0);
    locate_block_at(client, target).await
}

/// Binary search over `[1, latest]` for the block whose timestamp is `target` (Unix seconds).
///
/// Block timestamps are assumed non-decreasing with block number. An exact match is returned as
/// soon as it is probed; otherwise the result is the greatest block whose timestamp is below
/// `target`, which is `0` when block 1 is already later than `target`.
///
/// # Errors
///
/// [`ScannerError::BlockLookup`] if any block read fails.
pub async fn locate_block_at<C: LedgerClient>(
    client: &C,
    target: u64,
) -> Result<u64, ScannerError> {
    let latest = read_block(client, BlockNumberOrTag::Latest).await?;

    let mut left: u64 = 1;
    let mut right: u64 = latest.number;
    let mut probes = 0_u32;

    while left <= right {
        let mid = left + (right - left) / 2;
        let block = read_block(client, BlockNumberOrTag::Number(mid)).await?;
        probes += 1;

        match block.timestamp.cmp(&target) {
            std::cmp::Ordering::Equal => {
                debug!(
                    target_timestamp = target,
                    block = mid,
                    probes,
                    "Located block with exact timestamp"
                );
                return Ok(mid);
            }
            std::cmp::Ordering::Less => left = mid + 1,
            // mid >= 1 here, so this cannot underflow
            std::cmp::Ordering::Greater => right = mid - 1,
        }
    }

    debug!(target_timestamp = target, block = right, probes, "Located closest earlier block");
    Ok(right)
}

async fn read_block<C: LedgerClient>(
    client: &C,
    block: BlockNumberOrTag,
) -> Result<crate::ledger::BlockInfo, ScannerError> {
    client.get_block(block).await.map_err(|source| {
        error!(block = %block, error = %source, "Block lookup failed");
        ScannerError::BlockLookup { block, source }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;

    // Block n is produced at 1_000 + 12 * n.
    fn regular_chain(head: u64) -> MockLedger {
        MockLedger::with_blocks((0..=head).map(|n| (n, 1_000 + 12 * n)))
    }

    #[tokio::test]
    async fn exact_timestamp_returns_that_block() -> anyhow::Result<()> {
        let ledger = regular_chain(500);

        for n in [1, 2, 137, 250, 499, 500] {
            assert_eq!(locate_block_at(&ledger, 1_000 + 12 * n).await?, n);
        }

        Ok(())
    }

    #[tokio::test]
    async fn between_blocks_returns_the_earlier_one() -> anyhow::Result<()> {
        let ledger = regular_chain(500);

        assert_eq!(locate_block_at(&ledger, 1_000 + 12 * 42 + 5).await?, 42);
        assert_eq!(locate_block_at(&ledger, 1_000 + 12 * 43 - 1).await?, 42);

        Ok(())
    }

    #[tokio::test]
    async fn after_head_returns_head() -> anyhow::Result<()> {
        let ledger = regular_chain(300);

        assert_eq!(locate_block_at(&ledger, u64::MAX).await?, 300);

        Ok(())
    }

    #[tokio::test]
    async fn before_first_block_returns_zero() -> anyhow::Result<()> {
        let ledger = regular_chain(300);

        assert_eq!(locate_block_at(&ledger, 1_000).await?, 0);
        assert_eq!(locate_block_at(&ledger, 0).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn irregular_spacing() -> anyhow::Result<()> {
        let timestamps = [0_u64, 10, 11, 50, 51, 52, 400, 401, 900, 1_000];
        let ledger = MockLedger::with_blocks((0..).zip(timestamps));

        assert_eq!(locate_block_at(&ledger, 50).await?, 3);
        assert_eq!(locate_block_at(&ledger, 399).await?, 5);
        assert_eq!(locate_block_at(&ledger, 950).await?, 8);
        assert_eq!(locate_block_at(&ledger, 5_000).await?, 9);

        Ok(())
    }

    #[tokio::test]
    async fn result_never_overshoots_target() -> anyhow::Result<()> {
        let ledger = regular_chain(1_000);

        for target in (900..14_000).step_by(97) {
            let block = locate_block_at(&ledger, target).await?;
            if block > 0 {
                let ts = ledger.block_timestamp(block).unwrap_or_default();
                assert!(ts <= target, "block {block} at {ts} is after {target}");
            }
            if block < 1_000 {
                let next = ledger.block_timestamp(block + 1).unwrap_or_default();
                assert!(next > target, "block {} at {next} is not after {target}", block + 1);
            }
        }

        Ok(())
    }

    #[tokio::test]
    async fn datetime_target_uses_unix_seconds() -> anyhow::Result<()> {
        let ledger = regular_chain(100);
        let target = DateTime::from_timestamp(1_000 + 12 * 77, 0).expect("valid timestamp");

        assert_eq!(locate_block(&ledger, target).await?, 77);

        Ok(())
    }

    #[tokio::test]
    async fn search_is_logarithmic() -> anyhow::Result<()> {
        let ledger = regular_chain(1 << 16);

        locate_block_at(&ledger, 1_000 + 12 * 12_345 + 1).await?;

        // latest lookup plus at most ceil(log2(65_536)) + 1 probes
        assert!(ledger.block_reads() <= 18, "{} block reads", ledger.block_reads());

        Ok(())
    }

    #[tokio::test]
    async fn failing_lookup_is_a_block_lookup_error() {
        let ledger = regular_chain(100);
        ledger.fail_block(50);

        let err = locate_block_at(&ledger, 1_000 + 12 * 30).await.unwrap_err();
        assert!(
            matches!(err, ScannerError::BlockLookup { block: BlockNumberOrTag::Number(50), .. }),
            "{err:?}"
        );
    }
}
