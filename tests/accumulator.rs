use utreexo::accumulator::error::AccumulatorError;
use utreexo::accumulator::forest::Forest;
use utreexo::accumulator::node_hash::BitcoinNodeHash;
use utreexo::accumulator::pollard::Pollard;
use utreexo::accumulator::proof::BatchProof;
use utreexo::accumulator::types::Leaf;
use utreexo::accumulator::util::hash_from_u8;
use utreexo::simchain::SimChain;

/// Proves `dels` from the forest, feeds the proof to the pollard, then applies the same block
/// to both.
fn apply_block(
    forest: &mut Forest,
    pollard: &mut Pollard,
    adds: &[Leaf],
    dels: &[BitcoinNodeHash],
) -> Result<Vec<BitcoinNodeHash>, AccumulatorError> {
    let proof = forest.prove_block(dels)?;
    pollard.ingest_block_proof(&proof)?;

    let forest_tops = forest.modify(adds, proof.targets())?;
    let pollard_tops = pollard.modify(adds, proof.targets())?;
    assert_eq!(forest_tops, pollard_tops);

    Ok(forest_tops)
}

fn assert_complete(forest: &Forest) {
    assert!(forest.is_consistent());
    assert_eq!(
        forest.get_tops().len() as u32,
        forest.num_leaves().count_ones()
    );
}

#[test]
fn test_forest_and_pollard_converge() {
    let mut chain = SimChain::with_seed(0x07, 1).with_lookahead(4);
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();
    let mut added = 0;

    for block in 0..200u32 {
        let (adds, dels) = chain.next_block(block % 13 + 1);
        added += adds.len() as u64;
        apply_block(&mut forest, &mut pollard, &adds, &dels).unwrap();

        assert_eq!(forest.num_leaves(), pollard.num_leaves());
        assert_eq!(forest.get_tops(), pollard.get_tops());
        assert_complete(&forest);
    }

    assert!(forest.num_leaves() < added);
}

#[test]
fn test_long_lived_leaves() {
    let mut chain = SimChain::with_seed(0xff, 7).with_lookahead(32);
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();

    for _ in 0..300 {
        let (adds, dels) = chain.next_block(20);
        apply_block(&mut forest, &mut pollard, &adds, &dels).unwrap();
    }

    assert_eq!(forest.get_tops(), pollard.get_tops());
    assert_complete(&forest);
    // A pollard only keeps what it was asked to remember, plus what it needs to update it
    assert!(pollard.node_count() < forest.num_leaves() as usize * 2);
}

#[test]
fn test_remembered_leaf_survives() {
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();

    let kept = hash_from_u8(200);
    let mut adds: Vec<Leaf> = (0..10).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
    adds.push(Leaf::new(kept, true));
    apply_block(&mut forest, &mut pollard, &adds, &[]).unwrap();

    // Churn everything around the remembered leaf
    let mut next = 11u8;
    for round in 0..15u8 {
        let adds: Vec<Leaf> = (0..5)
            .map(|i| Leaf::forgettable(hash_from_u8(next + i)))
            .collect();
        let dels = [hash_from_u8(next - 11), hash_from_u8(next - 11 + (round % 3) + 1)];
        next += 5;
        apply_block(&mut forest, &mut pollard, &adds, &dels).unwrap();

        let position = forest.leaf_position(&kept).unwrap();
        assert_eq!(pollard.remembered_leaves(), vec![(position, kept)]);
    }

    // No proof needed to spend it
    let position = forest.leaf_position(&kept).unwrap();
    let forest_tops = forest.modify(&[], &[position]).unwrap();
    let pollard_tops = pollard.modify(&[], &[position]).unwrap();
    assert_eq!(forest_tops, pollard_tops);
    assert!(pollard.remembered_leaves().is_empty());
}

#[test]
fn test_every_bit_flip_is_rejected() {
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();
    let adds: Vec<Leaf> = (0..8).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
    apply_block(&mut forest, &mut pollard, &adds, &[]).unwrap();

    let proof = forest
        .prove_block(&[hash_from_u8(0), hash_from_u8(5)])
        .unwrap();
    let bytes = proof.to_bytes();
    let node_count = pollard.node_count();

    for byte in 0..bytes.len() {
        for bit in 0..8 {
            let mut corrupted = bytes.clone();
            corrupted[byte] ^= 1 << bit;

            let result = BatchProof::<BitcoinNodeHash>::from_bytes(&corrupted)
                .and_then(|proof| pollard.ingest_block_proof(&proof));
            assert!(result.is_err(), "flipping bit {bit} of byte {byte} went unnoticed");
            assert_eq!(pollard.node_count(), node_count);
        }
    }

    // The untouched proof still goes through
    let proof = BatchProof::<BitcoinNodeHash>::from_bytes(&bytes).unwrap();
    pollard.ingest_block_proof(&proof).unwrap();
}

#[test]
fn test_prove_then_ingest() {
    let mut chain = SimChain::with_seed(0x0f, 3);
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();
    let mut all_leaves = Vec::new();

    for _ in 0..40 {
        let (adds, dels) = chain.next_block(9);
        all_leaves.extend(adds.iter().map(|leaf| leaf.hash));
        apply_block(&mut forest, &mut pollard, &adds, &dels).unwrap();
    }

    // Any subset of live leaves can be proven, not just the ones a block spends
    let live: Vec<_> = all_leaves
        .into_iter()
        .filter(|hash| forest.leaf_position(hash).is_some())
        .collect();
    for chunk in live.chunks(5) {
        let proof = forest.prove_block(chunk).unwrap();
        proof
            .verify(forest.num_leaves(), &forest.get_tops())
            .unwrap();
        pollard.ingest_block_proof(&proof).unwrap();
    }
}

#[test]
fn test_delete_then_add() {
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();

    let adds: Vec<Leaf> = (0..16)
        .map(|i| Leaf::new(hash_from_u8(i), i == 9))
        .collect();
    apply_block(&mut forest, &mut pollard, &adds, &[]).unwrap();

    let tops = apply_block(&mut forest, &mut pollard, &[], &[hash_from_u8(2)]).unwrap();
    assert_eq!(tops.len(), 4);
    assert_eq!(
        tops[0].to_string(),
        "29a408b4bec8f8d5f3a45a0d733d096524269029a690d7d98b5ce627fef5ef36"
    );

    let tops = apply_block(
        &mut forest,
        &mut pollard,
        &[Leaf::forgettable(hash_from_u8(16))],
        &[],
    )
    .unwrap();
    assert_eq!(tops.len(), 1);
    assert_eq!(
        tops[0].to_string(),
        "b0e315ccf83b896f7982f254454825259c1f3b3dd6222f564c89fe3f0963194c"
    );

    let position = forest.leaf_position(&hash_from_u8(9)).unwrap();
    assert_eq!(pollard.remembered_leaves(), vec![(position, hash_from_u8(9))]);
}

#[test]
fn test_stale_proof_is_rejected() {
    let mut forest = Forest::new();
    let mut pollard = Pollard::new();
    let adds: Vec<Leaf> = (0..8).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
    apply_block(&mut forest, &mut pollard, &adds, &[]).unwrap();

    let stale = forest.prove_block(&[hash_from_u8(6)]).unwrap();
    apply_block(&mut forest, &mut pollard, &[], &[hash_from_u8(1)]).unwrap();

    assert!(matches!(
        pollard.ingest_block_proof(&stale),
        Err(AccumulatorError::ProofVerification { .. }) | Err(AccumulatorError::MalformedProof(_))
    ));
}
