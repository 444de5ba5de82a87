//! # Storage Contract Lifecycle
//!
//! Formation is gated by the contract hardfork height. A formed contract
//! locks its payout until `window_end`, where it resolves to its valid-proof
//! outputs if a storage proof landed inside the window and to its
//! missed-proof outputs otherwise. Reorgs across any of these steps must
//! leave the same state as a node that only saw the winning branch.

#[cfg(test)]
mod tests {
    use crate::fixtures::{miner, TestChain, Wallet};
    use qc_02_block_storage::InMemoryKVStore;
    use qc_08_consensus::{BlockRejection, ConsensusError};
    use shared_types::{
        contract_payout_id, merkle, storage_proof_segment, BlockId, CoinInput, CoinOutput,
        ContractId, ContractTerms, Currency, StorageProof, Transaction, UnlockHash,
    };

    const WINDOW_START: u64 = 12;
    const WINDOW_END: u64 = 14;
    const PAYOUT: Currency = 50_000;

    fn file() -> Vec<u8> {
        (0..300u32).map(|i| (i % 251) as u8).collect()
    }

    fn host() -> UnlockHash {
        miner(0xA0)
    }

    fn renter() -> UnlockHash {
        miner(0xB0)
    }

    fn formation(wallet: &Wallet, input: shared_types::OutputId, value: Currency) -> Transaction {
        let data = file();
        let terms = ContractTerms {
            file_size: data.len() as u64,
            file_merkle_root: merkle::file_root(&data),
            window_start: WINDOW_START,
            window_end: WINDOW_END,
            payout: PAYOUT,
            valid_proof_outputs: vec![CoinOutput {
                value: PAYOUT,
                unlock_hash: host(),
            }],
            missed_proof_outputs: vec![CoinOutput {
                value: PAYOUT,
                unlock_hash: renter(),
            }],
            unlock_hash: renter(),
        };
        let mut tx = Transaction {
            coin_inputs: vec![CoinInput {
                parent_id: input,
                unlock_conditions: wallet.conditions(),
            }],
            coin_outputs: vec![CoinOutput {
                value: value - PAYOUT,
                unlock_hash: wallet.address(),
            }],
            contracts: vec![terms],
            ..Default::default()
        };
        wallet.sign(&mut tx);
        tx
    }

    fn proof(chain: &TestChain<InMemoryKVStore>, id: ContractId) -> Transaction {
        let data = file();
        let trigger = chain.set.block_at_height(WINDOW_START - 1).unwrap();
        let index = storage_proof_segment(&id, &trigger, merkle::segment_count(data.len() as u64));
        let (segment, hash_set) = merkle::build_proof(&data, index).unwrap();
        Transaction {
            storage_proofs: vec![StorageProof {
                contract_id: id,
                segment,
                hash_set,
            }],
            ..Default::default()
        }
    }

    /// Chain at height 9 whose block 1 pays `wallet`. Returns the spendable
    /// output, its value, and the head.
    fn funded_chain(wallet: &Wallet) -> (TestChain<InMemoryKVStore>, shared_types::OutputId, Currency, BlockId) {
        let chain = TestChain::new();
        let b1 = chain.add(&chain.genesis(), wallet.address(), vec![]);
        let coins = chain.set.processed_block(&b1).unwrap().block.miner_payout_id(0);
        let value = chain.set.config().subsidy(1);
        let rest = chain.extend(&b1, 7, 1);
        let head = rest[6];
        assert_eq!(chain.set.current_height(), 8);
        (chain, coins, value, head)
    }

    // =========================================================================
    // HARDFORK GATING
    // =========================================================================

    #[test]
    fn test_contract_rejected_before_hardfork() {
        let alice = Wallet::from_seed(1);
        let (chain, coins, value, head) = funded_chain(&alice);
        assert_eq!(chain.set.config().contract_hardfork_height, 10);

        let early = chain.mine(&head, miner(1), vec![formation(&alice, coins, value)]);
        let err = chain.accept(early).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::InvalidBlock {
                reason: BlockRejection::ContractBeforeHardfork {
                    height: 9,
                    activation: 10
                },
                ..
            }
        ));
        assert_eq!(chain.set.current_height(), 8);
    }

    #[test]
    fn test_contract_accepted_at_hardfork() {
        let alice = Wallet::from_seed(1);
        let (chain, coins, value, head) = funded_chain(&alice);
        let h9 = chain.add(&head, miner(1), vec![]);

        let tx = formation(&alice, coins, value);
        let cid = tx.contract_id(0);
        chain.add(&h9, miner(1), vec![tx]);

        assert_eq!(chain.set.current_height(), 10);
        let contract = chain.set.contract(&cid).unwrap();
        assert_eq!(contract.terms.payout, PAYOUT);
        assert_eq!(contract.proven_at, None);
        assert!(chain.set.output(&coins).is_none());
        chain.set.check_consistency().unwrap();
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Forms the contract at 10 and mines to height 11. Returns the chain,
    /// the contract ID, and the block at 11 (the proof trigger).
    fn formed_contract() -> (TestChain<InMemoryKVStore>, ContractId, BlockId) {
        let alice = Wallet::from_seed(1);
        let (chain, coins, value, head) = funded_chain(&alice);
        let h9 = chain.add(&head, miner(1), vec![]);
        let tx = formation(&alice, coins, value);
        let cid = tx.contract_id(0);
        let h10 = chain.add(&h9, miner(1), vec![tx]);
        let h11 = chain.add(&h10, miner(1), vec![]);
        (chain, cid, h11)
    }

    #[test]
    fn test_proven_contract_pays_valid_outputs() {
        let (chain, cid, h11) = formed_contract();
        let h12 = chain.add(&h11, miner(1), vec![proof(&chain, cid)]);
        assert_eq!(chain.set.contract(&cid).unwrap().proven_at, Some(12));

        let h13 = chain.add(&h12, miner(1), vec![]);
        assert!(chain.set.contract(&cid).is_some());
        chain.add(&h13, miner(1), vec![]);

        assert!(chain.set.contract(&cid).is_none());
        let paid = chain.set.output(&contract_payout_id(&cid, true, 0)).unwrap();
        assert_eq!(paid.value, PAYOUT);
        assert_eq!(paid.unlock_hash, host());
        assert!(chain.set.output(&contract_payout_id(&cid, false, 0)).is_none());
        chain.set.check_consistency().unwrap();
    }

    #[test]
    fn test_unproven_contract_pays_missed_outputs() {
        let (chain, cid, h11) = formed_contract();
        chain.extend(&h11, 3, 1);

        assert_eq!(chain.set.current_height(), WINDOW_END);
        assert!(chain.set.contract(&cid).is_none());
        let missed = chain.set.output(&contract_payout_id(&cid, false, 0)).unwrap();
        assert_eq!(missed.unlock_hash, renter());
        chain.set.check_consistency().unwrap();
    }

    #[test]
    fn test_second_proof_is_rejected() {
        let (chain, cid, h11) = formed_contract();
        let h12 = chain.add(&h11, miner(1), vec![proof(&chain, cid)]);

        let again = chain.mine(&h12, miner(1), vec![proof(&chain, cid)]);
        assert!(matches!(
            chain.accept(again),
            Err(ConsensusError::InvalidBlock {
                reason: BlockRejection::State(_),
                ..
            })
        ));
        assert_eq!(chain.head(), h12);
    }

    #[test]
    fn test_reorg_undoes_proof_and_resolution() {
        let (chain, cid, h11) = formed_contract();
        let h12 = chain.add(&h11, miner(1), vec![proof(&chain, cid)]);
        let h13 = chain.add(&h12, miner(1), vec![]);
        let h14 = chain.add(&h13, miner(1), vec![]);
        assert!(chain.set.output(&contract_payout_id(&cid, true, 0)).is_some());

        // A proof-less branch from 11 that ends up heavier.
        let other = chain.extend(&h11, 4, 9);
        assert_eq!(chain.head(), other[3]);
        assert!(!chain.set.in_current_path(&h14));
        assert!(chain.set.output(&contract_payout_id(&cid, true, 0)).is_none());
        assert!(chain.set.output(&contract_payout_id(&cid, false, 0)).is_some());
        chain.set.check_consistency().unwrap();

        let mut winning = Vec::new();
        for height in 1..=chain.set.current_height() {
            winning.push(chain.set.block_at_height(height).unwrap());
        }
        let direct = TestChain::new();
        chain.replay_into(&direct, &winning);
        assert_eq!(direct.set.consensus_checksum(), chain.set.consensus_checksum());
        assert_eq!(direct.set.state_snapshot(), chain.set.state_snapshot());
    }
}
