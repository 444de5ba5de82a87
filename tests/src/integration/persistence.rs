//! # Restart Recovery
//!
//! A node backed by the file store is dropped and reopened. The reloaded
//! block tree, head, state, and checksum must match what was committed, and
//! the chain must keep working from there.

#[cfg(test)]
mod tests {
    use crate::fixtures::{miner, TestChain, Wallet};
    use qc_02_block_storage::FileBackedKVStore;
    use qc_08_consensus::domain::solve_block;
    use qc_08_consensus::{AcceptOutcome, BlockRejection, ConsensusConfig, ConsensusError};
    use shared_types::CoinOutput;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> TestChain<FileBackedKVStore> {
        let kv = FileBackedKVStore::open(dir.path().join("consensus.db")).unwrap();
        TestChain::open(kv, ConsensusConfig::testing())
    }

    #[test]
    fn test_reorged_chain_survives_restart() {
        let dir = TempDir::new().unwrap();
        let alice = Wallet::from_seed(1);

        let (head, height, checksum, snapshot, loser, paid) = {
            let chain = open(&dir);
            let genesis = chain.genesis();
            let a1 = chain.add(&genesis, alice.address(), vec![]);
            let coins = chain.set.processed_block(&a1).unwrap().block.miner_payout_id(0);
            let value = chain.set.config().subsidy(1);
            let a = chain.extend(&a1, 2, 1);

            // A side branch overtakes A, then A's transfer lands on the winner.
            let b = chain.extend(&a1, 3, 2);
            assert_eq!(chain.head(), b[2]);
            let tx = alice.pay(
                &[coins],
                vec![CoinOutput {
                    value,
                    unlock_hash: miner(7),
                }],
                None,
            );
            let paid = tx.coin_output_id(0);
            chain.add(&b[2], miner(2), vec![tx]);
            chain.set.check_consistency().unwrap();

            (
                chain.head(),
                chain.set.current_height(),
                chain.set.consensus_checksum(),
                chain.set.state_snapshot(),
                a[1],
                paid,
            )
        };

        let chain = open(&dir);
        assert_eq!(chain.head(), head);
        assert_eq!(chain.set.current_height(), height);
        assert_eq!(chain.set.consensus_checksum(), checksum);
        assert_eq!(chain.set.state_snapshot(), snapshot);
        assert!(chain.set.output(&paid).is_some());
        chain.set.check_consistency().unwrap();

        // The losing branch is still known, with its cached diffs.
        let stored = chain.set.processed_block(&loser).unwrap();
        assert!(stored.diffs_generated);
        assert!(!chain.set.in_current_path(&loser));

        let next = chain.mine(&head, miner(1), vec![]);
        assert_eq!(chain.accept(next).unwrap(), AcceptOutcome::Extended);
        assert_eq!(chain.set.current_height(), height + 1);
    }

    #[test]
    fn test_invalid_marks_survive_restart() {
        let dir = TempDir::new().unwrap();

        let bad = {
            let chain = open(&dir);
            let template = chain
                .set
                .block_template(&chain.genesis(), miner(1), vec![])
                .unwrap();
            let mut block = template.block;
            block.miner_payouts[0].value += 1;
            assert!(solve_block(&mut block, &template.target, 1_000_000));
            let bad = block.id();
            assert!(matches!(
                chain.accept(block),
                Err(ConsensusError::InvalidBlock {
                    reason: BlockRejection::BadMinerPayouts { .. },
                    ..
                })
            ));
            assert!(chain.set.processed_block(&bad).is_none());
            bad
        };

        let chain = open(&dir);
        assert!(chain.set.is_invalid(&bad));
        assert_eq!(chain.head(), chain.genesis());
    }
}
